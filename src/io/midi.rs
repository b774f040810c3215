#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::sequencing::timeline::ParamId;

/// Block-local message delivered to graph nodes and MIDI consumers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MidiMessage {
    NoteOn { pitch: u8, velocity: u8 },
    NoteOff { pitch: u8 },
    /// Automation value sampled from the timeline.
    Automation { param: ParamId, value: f32 },
}

/// A message stamped with its sample offset inside the current block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedEvent {
    pub offset: usize,
    pub message: MidiMessage,
}

impl TimedEvent {
    pub fn new(offset: usize, message: MidiMessage) -> Self {
        Self { offset, message }
    }

    pub fn note_on(offset: usize, pitch: u8, velocity: u8) -> Self {
        Self::new(offset, MidiMessage::NoteOn { pitch, velocity })
    }

    pub fn note_off(offset: usize, pitch: u8) -> Self {
        Self::new(offset, MidiMessage::NoteOff { pitch })
    }
}

/// Fixed-capacity event list for one audio block.
///
/// Storage is reserved at construction. Once full, further pushes are counted
/// and dropped rather than reallocating on the audio thread.
#[derive(Debug)]
pub struct EventBuffer {
    events: Vec<TimedEvent>,
    capacity: usize,
    dropped: usize,
}

impl EventBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Vec::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    /// Append an event. Returns `false` if the buffer was full.
    #[inline]
    pub fn push(&mut self, event: TimedEvent) -> bool {
        if self.events.len() >= self.capacity {
            self.dropped += 1;
            return false;
        }
        self.events.push(event);
        true
    }

    pub fn extend_from_slice(&mut self, events: &[TimedEvent]) {
        for &event in events {
            self.push(event);
        }
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Events dropped since construction because the buffer was full.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn as_slice(&self) -> &[TimedEvent] {
        &self.events
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TimedEvent> {
        self.events.iter()
    }

    /// Stable in-place sort by sample offset.
    ///
    /// Insertion sort: block event lists are short and usually nearly sorted,
    /// and `slice::sort_by_key` may allocate.
    pub fn sort_by_offset(&mut self) {
        for i in 1..self.events.len() {
            let mut j = i;
            while j > 0 && self.events[j - 1].offset > self.events[j].offset {
                self.events.swap(j - 1, j);
                j -= 1;
            }
        }
    }
}

impl<'a> IntoIterator for &'a EventBuffer {
    type Item = &'a TimedEvent;
    type IntoIter = std::slice::Iter<'a, TimedEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

/// A note on the musical timeline. `velocity == 0` marks a note-off when
/// the event is reported to listeners.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteEvent {
    pub pitch: u8,
    pub velocity: u8,
    pub time_beats: f64,
    pub duration_beats: f64,
}

impl NoteEvent {
    pub fn new(pitch: u8, velocity: u8, time_beats: f64, duration_beats: f64) -> Self {
        Self {
            pitch,
            velocity,
            time_beats,
            duration_beats,
        }
    }

    pub fn is_note_off(&self) -> bool {
        self.velocity == 0
    }

    pub fn end_beats(&self) -> f64 {
        self.time_beats + self.duration_beats
    }
}

/// An automation value reported to parameter listeners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterEvent {
    pub param: ParamId,
    pub value: f32,
    pub time_beats: f64,
}
