//! Sample-accurate playback of a [`Timeline`].
//!
//! Once per audio block, [`Sequencer::process_midi`] turns the slice of
//! musical time covered by the block into [`TimedEvent`]s:
//!
//! ```text
//!   block beats = samples * tempo / (60 * sample_rate)
//!
//!   no loop crossing        [pos ─────────── pos+len)
//!   crossing the loop end   [pos ── loop_end) [loop_start ── loop_start+overflow)
//! ```
//!
//! Each window is handled in three steps: note-ons for notes starting in
//! it, note-offs for active notes whose end falls before the window end,
//! then automation sampled at the window end. Sample offsets come from the
//! sequencer's monotonic play clock rather than the (wrapping) position, so
//! a note-off scheduled before a loop jump still lands on the right sample.
//!
//! The audio thread is the only writer of the playhead. Other threads edit
//! the transport through a [`SequencerHandle`] command queue, observe it
//! through a [`TransportMonitor`], and receive note and automation events on
//! `rtrb` queues instead of callbacks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use atomic_float::AtomicF64;
use rtrb::{Consumer, Producer, RingBuffer};
use tracing::{debug, warn};

use crate::error::{PrepareError, TransportError};
use crate::io::midi::{EventBuffer, MidiMessage, NoteEvent, ParameterEvent, TimedEvent};
use crate::sequencing::time_signature::TimeSignature;
use crate::sequencing::timeline::Timeline;
use crate::sequencing::transport::{check_grid, check_loop, check_tempo, TransportState};
use crate::MAX_ACTIVE_NOTES;

const DEFAULT_SAMPLE_RATE: f64 = 44_100.0;

/// Loop passes generated event by event within one block. A block longer
/// than this many loop lengths skips the remainder.
const MAX_LOOP_WINDOWS: usize = 16;

/// A note between its note-on and note-off.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveNote {
    pub pitch: u8,
    pub velocity: u8,
    pub start_beat: f64,
    pub end_beat: f64,
    end_clock: f64,
}

/// Transport edits queued from another thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransportCommand {
    Play,
    Stop,
    TogglePlayStop,
    SetPosition(f64),
    SetTempo(f64),
    SetTimeSignature { numerator: u8, denominator: u8 },
    SetLooping(bool),
    SetLoopStart(f64),
    SetLoopEnd(f64),
    SetLoopRegion { start: f64, end: f64 },
    SetQuantizationGrid(f64),
}

#[derive(Debug)]
struct Published {
    position: AtomicF64,
    tempo: AtomicF64,
    playing: AtomicBool,
}

/// Offsets within the current block.
struct BlockClock {
    start: f64,
    samples_per_beat: f64,
    last: usize,
}

impl BlockClock {
    #[inline]
    fn offset(&self, clock: f64) -> usize {
        let samples = ((clock - self.start) * self.samples_per_beat).round().max(0.0);
        (samples as usize).min(self.last)
    }
}

/// One contiguous span of timeline beats inside a block.
struct Window {
    start: f64,
    end: f64,
    clock: f64,
}

impl Window {
    #[inline]
    fn clock_at(&self, beat: f64) -> f64 {
        self.clock + (beat - self.start)
    }

    #[inline]
    fn clock_end(&self) -> f64 {
        self.clock_at(self.end)
    }
}

/// Active notes and listener queues, kept apart from the timeline so the
/// two can be borrowed independently while generating.
struct NoteTracker {
    active: Vec<ActiveNote>,
    pending_offs: Vec<u8>,
    notes_tx: Option<Producer<NoteEvent>>,
    params_tx: Option<Producer<ParameterEvent>>,
}

impl NoteTracker {
    fn new() -> Self {
        Self {
            active: Vec::with_capacity(MAX_ACTIVE_NOTES),
            pending_offs: Vec::with_capacity(MAX_ACTIVE_NOTES),
            notes_tx: None,
            params_tx: None,
        }
    }

    fn notify(&mut self, note: NoteEvent) {
        if let Some(tx) = self.notes_tx.as_mut() {
            // A slow listener loses events; playback never waits for it.
            let _ = tx.push(note);
        }
    }

    fn emit_off(&mut self, note: ActiveNote, at_beat: f64, offset: usize, out: &mut EventBuffer) {
        out.push(TimedEvent::note_off(offset, note.pitch));
        self.notify(NoteEvent::new(note.pitch, 0, at_beat, 0.0));
    }

    fn generate(
        &mut self,
        timeline: Option<&dyn Timeline>,
        window: &Window,
        block: &BlockClock,
        out: &mut EventBuffer,
    ) {
        if let Some(timeline) = timeline {
            timeline.notes_in_range(window.start, window.end, &mut |note| {
                if note.velocity > 0 && note.time_beats >= window.start && note.time_beats < window.end {
                    self.start_note(note, window.clock_at(note.time_beats), block, out);
                }
            });
        }

        self.release_due(window.clock_end(), block, out);

        if let Some(timeline) = timeline {
            self.automate(timeline, window, block, out);
        }
    }

    fn start_note(&mut self, note: &NoteEvent, at_clock: f64, block: &BlockClock, out: &mut EventBuffer) {
        let offset = block.offset(at_clock);

        if let Some(index) = self.active.iter().position(|a| a.pitch == note.pitch) {
            let sounding = self.active.remove(index);
            self.emit_off(sounding, note.time_beats, offset, out);
        }
        if self.active.len() >= MAX_ACTIVE_NOTES {
            return;
        }

        out.push(TimedEvent::note_on(offset, note.pitch, note.velocity));
        self.active.push(ActiveNote {
            pitch: note.pitch,
            velocity: note.velocity,
            start_beat: note.time_beats,
            end_beat: note.end_beats(),
            end_clock: at_clock + note.duration_beats.max(0.0),
        });
        self.notify(*note);
    }

    fn release_due(&mut self, until_clock: f64, block: &BlockClock, out: &mut EventBuffer) {
        let mut i = 0;
        while i < self.active.len() {
            if self.active[i].end_clock < until_clock {
                let note = self.active.remove(i);
                self.emit_off(note, note.end_beat, block.offset(note.end_clock), out);
            } else {
                i += 1;
            }
        }
    }

    fn automate(&mut self, timeline: &dyn Timeline, window: &Window, block: &BlockClock, out: &mut EventBuffer) {
        let beat = window.end;
        let offset = block.offset(window.clock_end());
        let params_tx = &mut self.params_tx;

        timeline.automated_parameters(&mut |param| {
            let Some(value) = timeline.parameter_value_at(param, beat) else {
                return;
            };
            out.push(TimedEvent::new(offset, MidiMessage::Automation { param, value }));
            if let Some(tx) = params_tx.as_mut() {
                let _ = tx.push(ParameterEvent {
                    param,
                    value,
                    time_beats: beat,
                });
            }
        });
    }

    /// Report every active note as ended and queue its MIDI note-off for the
    /// next output block.
    fn release_all(&mut self, at_beat: f64) {
        for note in &self.active {
            if self.pending_offs.len() < self.pending_offs.capacity() {
                self.pending_offs.push(note.pitch);
            }
            if let Some(tx) = self.notes_tx.as_mut() {
                let _ = tx.push(NoteEvent::new(note.pitch, 0, at_beat, 0.0));
            }
        }
        self.active.clear();
    }

    fn flush_pending(&mut self, out: &mut EventBuffer) {
        for pitch in self.pending_offs.drain(..) {
            out.push(TimedEvent::note_off(0, pitch));
        }
    }
}

pub struct Sequencer {
    transport: TransportState,
    playing: bool,
    sample_rate: f64,
    timeline: Option<Arc<dyn Timeline>>,
    tracker: NoteTracker,
    /// Beats played since construction. Never wraps.
    clock: f64,
    commands: Option<Consumer<TransportCommand>>,
    rejected_commands: usize,
    published: Arc<Published>,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::with_state(TransportState::default())
    }

    /// Start from a validated transport record, stopped.
    pub fn with_state(transport: TransportState) -> Self {
        let published = Arc::new(Published {
            position: AtomicF64::new(transport.position),
            tempo: AtomicF64::new(transport.tempo),
            playing: AtomicBool::new(false),
        });
        Self {
            transport,
            playing: false,
            sample_rate: DEFAULT_SAMPLE_RATE,
            timeline: None,
            tracker: NoteTracker::new(),
            clock: 0.0,
            commands: None,
            rejected_commands: 0,
            published,
        }
    }

    /// Bind to a sample rate. `block_size` is only checked; `process_midi`
    /// accepts blocks of any length afterwards.
    pub fn prepare(&mut self, sample_rate: f32, block_size: usize) -> Result<(), PrepareError> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(PrepareError::InvalidSampleRate(sample_rate));
        }
        if block_size == 0 {
            return Err(PrepareError::InvalidBlockSize(block_size));
        }
        self.sample_rate = sample_rate as f64;
        debug!(sample_rate, block_size, "sequencer prepared");
        Ok(())
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn set_timeline(&mut self, timeline: Option<Arc<dyn Timeline>>) {
        debug!(attached = timeline.is_some(), "sequencer timeline set");
        self.timeline = timeline;
    }

    pub fn timeline(&self) -> Option<&Arc<dyn Timeline>> {
        self.timeline.as_ref()
    }

    // -- transport --------------------------------------------------------

    pub fn play(&mut self) {
        if !self.playing {
            self.playing = true;
            self.publish();
        }
    }

    /// Stop and flush. Listeners hear a note-off for every active note right
    /// away; the matching MIDI note-offs open the next output block.
    pub fn stop(&mut self) {
        if self.playing {
            self.playing = false;
            self.tracker.release_all(self.transport.position);
            self.publish();
        }
    }

    pub fn toggle_play_stop(&mut self) {
        if self.playing {
            self.stop();
        } else {
            self.play();
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn set_position(&mut self, beats: f64) {
        self.transport.set_position(beats);
        self.publish();
    }

    pub fn position(&self) -> f64 {
        self.transport.position
    }

    pub fn set_tempo(&mut self, bpm: f64) -> Result<(), TransportError> {
        self.transport.set_tempo(bpm)?;
        self.publish();
        Ok(())
    }

    pub fn tempo(&self) -> f64 {
        self.transport.tempo
    }

    pub fn set_time_signature(&mut self, numerator: u8, denominator: u8) -> Result<(), TransportError> {
        self.transport.set_time_signature(numerator, denominator)
    }

    pub fn time_signature(&self) -> TimeSignature {
        self.transport.time_signature()
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.transport.looping = looping;
    }

    pub fn is_looping(&self) -> bool {
        self.transport.looping
    }

    pub fn set_loop_start(&mut self, beats: f64) -> Result<(), TransportError> {
        self.transport.set_loop_start(beats)
    }

    pub fn set_loop_end(&mut self, beats: f64) -> Result<(), TransportError> {
        self.transport.set_loop_end(beats)
    }

    pub fn set_loop_region(&mut self, start: f64, end: f64) -> Result<(), TransportError> {
        self.transport.set_loop_region(start, end)
    }

    pub fn loop_start(&self) -> f64 {
        self.transport.loop_start
    }

    pub fn loop_end(&self) -> f64 {
        self.transport.loop_end
    }

    pub fn set_quantization_grid(&mut self, beats: f64) -> Result<(), TransportError> {
        self.transport.set_quantization_grid(beats)
    }

    pub fn quantization_grid(&self) -> f64 {
        self.transport.quantization_grid
    }

    pub fn quantize_time(&self, beats: f64) -> f64 {
        self.transport.quantize_time(beats)
    }

    pub fn beats_to_seconds(&self, beats: f64) -> f64 {
        self.transport.beats_to_seconds(beats)
    }

    pub fn seconds_to_beats(&self, seconds: f64) -> f64 {
        self.transport.seconds_to_beats(seconds)
    }

    /// Nearest whole sample at the prepared rate. Negative input gives 0.
    pub fn seconds_to_samples(&self, seconds: f64) -> usize {
        (seconds * self.sample_rate).round().max(0.0) as usize
    }

    pub fn active_notes(&self) -> &[ActiveNote] {
        &self.tracker.active
    }

    // -- persistence --------------------------------------------------------

    pub fn snapshot(&self) -> TransportState {
        self.transport
    }

    /// Replace the transport with a saved record. Playback stops; an invalid
    /// record is rejected and the current state kept.
    pub fn restore(&mut self, state: TransportState) -> Result<(), TransportError> {
        if let Err(err) = state.validate() {
            warn!(%err, "rejected transport state");
            return Err(err);
        }
        self.stop();
        self.transport = state;
        self.transport.set_position(state.position);
        self.publish();
        debug!(position = state.position, tempo = state.tempo, "transport restored");
        Ok(())
    }

    // -- cross-thread plumbing ---------------------------------------------

    /// Queue note-on/off reports. Replaces any previous subscriber.
    pub fn subscribe_notes(&mut self, capacity: usize) -> Consumer<NoteEvent> {
        let (tx, rx) = RingBuffer::new(capacity);
        self.tracker.notes_tx = Some(tx);
        rx
    }

    /// Queue automation reports. Replaces any previous subscriber.
    pub fn subscribe_parameters(&mut self, capacity: usize) -> Consumer<ParameterEvent> {
        let (tx, rx) = RingBuffer::new(capacity);
        self.tracker.params_tx = Some(tx);
        rx
    }

    /// Handle for editing the transport from another thread. Commands are
    /// applied at the start of the next `process_midi`. Replaces any
    /// previous handle.
    pub fn command_handle(&mut self, capacity: usize) -> SequencerHandle {
        let (tx, rx) = RingBuffer::new(capacity);
        self.commands = Some(rx);
        SequencerHandle { tx }
    }

    /// Queued commands that failed validation when applied.
    pub fn rejected_commands(&self) -> usize {
        self.rejected_commands
    }

    pub fn monitor(&self) -> TransportMonitor {
        TransportMonitor {
            published: Arc::clone(&self.published),
            timeline: self.timeline.clone(),
        }
    }

    fn publish(&self) {
        let p = &self.published;
        p.position.store(self.transport.position, Ordering::Release);
        p.tempo.store(self.transport.tempo, Ordering::Release);
        p.playing.store(self.playing, Ordering::Release);
    }

    fn drain_commands(&mut self) {
        while let Some(command) = self.commands.as_mut().and_then(|rx| rx.pop().ok()) {
            if self.apply(command).is_err() {
                self.rejected_commands += 1;
            }
        }
    }

    fn apply(&mut self, command: TransportCommand) -> Result<(), TransportError> {
        match command {
            TransportCommand::Play => self.play(),
            TransportCommand::Stop => self.stop(),
            TransportCommand::TogglePlayStop => self.toggle_play_stop(),
            TransportCommand::SetPosition(beats) => self.set_position(beats),
            TransportCommand::SetTempo(bpm) => self.set_tempo(bpm)?,
            TransportCommand::SetTimeSignature {
                numerator,
                denominator,
            } => self.set_time_signature(numerator, denominator)?,
            TransportCommand::SetLooping(looping) => self.set_looping(looping),
            TransportCommand::SetLoopStart(beats) => self.set_loop_start(beats)?,
            TransportCommand::SetLoopEnd(beats) => self.set_loop_end(beats)?,
            TransportCommand::SetLoopRegion { start, end } => self.set_loop_region(start, end)?,
            TransportCommand::SetQuantizationGrid(beats) => self.set_quantization_grid(beats)?,
        }
        Ok(())
    }

    // -- audio thread ---------------------------------------------------------

    /// Fill `output` with this block's events.
    ///
    /// Stopped (or without a timeline) the input passes straight through.
    /// Playing, generated events come first and input events are merged in
    /// after them; the result is sorted by offset. Input offsets past the
    /// block end are clamped to its last sample.
    ///
    /// An empty block generates nothing and keeps note-offs left by `stop`
    /// for the next block that has samples.
    pub fn process_midi(&mut self, input: &[TimedEvent], output: &mut EventBuffer, num_samples: usize) {
        self.drain_commands();
        output.clear();

        if num_samples == 0 {
            output.extend_from_slice(input);
            self.publish();
            return;
        }

        self.tracker.flush_pending(output);
        if self.playing {
            self.advance(num_samples, output);
        }

        let last = num_samples - 1;
        for event in input {
            output.push(TimedEvent::new(event.offset.min(last), event.message));
        }
        output.sort_by_offset();
        self.publish();
    }

    fn advance(&mut self, num_samples: usize, out: &mut EventBuffer) {
        let t = self.transport;
        let samples_per_beat = t.samples_per_beat(self.sample_rate);
        let block_beats = num_samples as f64 / samples_per_beat;
        let block = BlockClock {
            start: self.clock,
            samples_per_beat,
            last: num_samples - 1,
        };

        let timeline = self.timeline.as_deref();
        let tracker = &mut self.tracker;

        let mut position = t.position;
        if t.looping && position >= t.loop_end {
            position = t.loop_start;
        }

        let mut clock = self.clock;
        let mut remaining = block_beats;
        let mut windows = 0;
        while remaining > 0.0 {
            if windows == MAX_LOOP_WINDOWS {
                position = t.loop_start + (position - t.loop_start + remaining).rem_euclid(t.loop_length());
                break;
            }
            windows += 1;

            let crosses = t.looping && position < t.loop_end && position + remaining > t.loop_end;
            let end = if crosses { t.loop_end } else { position + remaining };
            let window = Window {
                start: position,
                end,
                clock,
            };
            tracker.generate(timeline, &window, &block, out);

            if !crosses {
                position = end;
                break;
            }
            let span = end - position;
            clock += span;
            remaining -= span;
            position = t.loop_start;
        }

        self.clock += block_beats;
        tracker.release_due(self.clock, &block, out);
        self.transport.position = position;
    }
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

/// Control-thread side of the command queue.
///
/// Values that can be checked without the sequencer's current state are
/// rejected here; the rest are checked when applied and counted in
/// [`Sequencer::rejected_commands`].
pub struct SequencerHandle {
    tx: Producer<TransportCommand>,
}

fn logged(result: Result<(), TransportError>) -> Result<(), TransportError> {
    if let Err(err) = &result {
        warn!(%err, "rejected transport command");
    }
    result
}

impl SequencerHandle {
    pub fn send(&mut self, command: TransportCommand) -> Result<(), TransportError> {
        logged(self.tx.push(command).map_err(|_| TransportError::QueueFull))
    }

    pub fn play(&mut self) -> Result<(), TransportError> {
        self.send(TransportCommand::Play)
    }

    pub fn stop(&mut self) -> Result<(), TransportError> {
        self.send(TransportCommand::Stop)
    }

    pub fn toggle_play_stop(&mut self) -> Result<(), TransportError> {
        self.send(TransportCommand::TogglePlayStop)
    }

    pub fn set_position(&mut self, beats: f64) -> Result<(), TransportError> {
        self.send(TransportCommand::SetPosition(beats))
    }

    pub fn set_tempo(&mut self, bpm: f64) -> Result<(), TransportError> {
        logged(check_tempo(bpm))?;
        self.send(TransportCommand::SetTempo(bpm))
    }

    pub fn set_time_signature(&mut self, numerator: u8, denominator: u8) -> Result<(), TransportError> {
        logged(TimeSignature::new(numerator, denominator).map(|_| ()))?;
        self.send(TransportCommand::SetTimeSignature {
            numerator,
            denominator,
        })
    }

    pub fn set_looping(&mut self, looping: bool) -> Result<(), TransportError> {
        self.send(TransportCommand::SetLooping(looping))
    }

    pub fn set_loop_start(&mut self, beats: f64) -> Result<(), TransportError> {
        self.send(TransportCommand::SetLoopStart(beats))
    }

    pub fn set_loop_end(&mut self, beats: f64) -> Result<(), TransportError> {
        self.send(TransportCommand::SetLoopEnd(beats))
    }

    pub fn set_loop_region(&mut self, start: f64, end: f64) -> Result<(), TransportError> {
        logged(check_loop(start, end))?;
        self.send(TransportCommand::SetLoopRegion { start, end })
    }

    pub fn set_quantization_grid(&mut self, beats: f64) -> Result<(), TransportError> {
        logged(check_grid(beats))?;
        self.send(TransportCommand::SetQuantizationGrid(beats))
    }
}

/// Read-only view of the transport for display code.
///
/// Position, tempo and playing state are whatever the audio thread last
/// published. [`TransportMonitor::timer_callback`] samples automation at that
/// position for meters and knobs; it never moves the playhead.
#[derive(Clone)]
pub struct TransportMonitor {
    published: Arc<Published>,
    timeline: Option<Arc<dyn Timeline>>,
}

impl TransportMonitor {
    pub fn position(&self) -> f64 {
        self.published.position.load(Ordering::Acquire)
    }

    pub fn tempo(&self) -> f64 {
        self.published.tempo.load(Ordering::Acquire)
    }

    pub fn is_playing(&self) -> bool {
        self.published.playing.load(Ordering::Acquire)
    }

    pub fn set_timeline(&mut self, timeline: Option<Arc<dyn Timeline>>) {
        self.timeline = timeline;
    }

    /// Report every automated value at the published position. Does nothing
    /// while stopped. Returns the number of values reported.
    pub fn timer_callback(&self, mut report: impl FnMut(ParameterEvent)) -> usize {
        if !self.is_playing() {
            return 0;
        }
        let Some(timeline) = self.timeline.as_deref() else {
            return 0;
        };

        let beat = self.position();
        let mut count = 0;
        timeline.automated_parameters(&mut |param| {
            if let Some(value) = timeline.parameter_value_at(param, beat) {
                report(ParameterEvent {
                    param,
                    value,
                    time_beats: beat,
                });
                count += 1;
            }
        });
        count
    }
}
