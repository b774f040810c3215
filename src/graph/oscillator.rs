use crate::dsp::oscillator::{detune_ratio, Oscillator, Waveform};
use crate::dsp::param::{ChoiceHandle, ChoiceParameter, ParamHandle, ParamRange, SmoothedAtomicParameter};
use crate::error::PrepareError;
use crate::graph::node::{EventCursor, NodeKind, ProcessSpec, ProcessingNode, StereoBlock};
use crate::io::converter::midi_note_to_freq;
use crate::io::midi::{MidiMessage, TimedEvent};

/*
Audio Oscillator
================

An oscillator is the fundamental sound source in a synthesizer. It generates
a repeating waveform at a specific frequency (pitch), producing the raw
audio material that gets shaped by envelopes, filters, and effects.

Waveform Types and Their Character:
-----------------------------------

Sine: The purest tone - a single frequency with no harmonics.
Sawtooth: The richest waveform - all harmonics, falling off as 1/n.
Square: Hollow - odd harmonics only. Pulse width skews the duty cycle,
  thinning the sound towards a nasal pulse at either extreme.
Triangle: Mellow - odd harmonics falling off as 1/n².
Noise: Random samples - no pitch.

Parameters
----------

  frequency    20 - 20000 Hz   pitch; overwritten by note-on when key tracking
  pulse_width  0.01 - 0.99     square only
  detune       ±100 cents      multiplies the frequency by 2^(cents/1200)
  gain         0 - 1           output level

The waveform selector is read every sample, so a switch lands on the next
sample the node renders. The node is a source: whatever arrives in the
running buffer is replaced by the oscillator's mono output on both channels.
*/

const SMOOTHING_MS: f64 = 50.0;

pub const FREQUENCY: &str = "frequency";
pub const PULSE_WIDTH: &str = "pulse_width";
pub const DETUNE: &str = "detune";
pub const GAIN: &str = "gain";

pub struct OscillatorNode {
    osc: Oscillator,
    waveform: ChoiceParameter<Waveform>,
    frequency: SmoothedAtomicParameter,
    pulse_width: SmoothedAtomicParameter,
    detune: SmoothedAtomicParameter,
    gain: SmoothedAtomicParameter,
    key_tracking: bool,
    sample_rate: f32,
    prepared: bool,
}

impl OscillatorNode {
    pub fn new(waveform: Waveform) -> Self {
        Self {
            osc: Oscillator::new(),
            waveform: ChoiceParameter::new(waveform),
            frequency: SmoothedAtomicParameter::new(
                FREQUENCY,
                ParamRange::new(20.0, 20_000.0, 440.0),
                SMOOTHING_MS,
            ),
            pulse_width: SmoothedAtomicParameter::new(
                PULSE_WIDTH,
                ParamRange::new(0.01, 0.99, 0.5),
                SMOOTHING_MS,
            ),
            detune: SmoothedAtomicParameter::new(
                DETUNE,
                ParamRange::new(-100.0, 100.0, 0.0),
                SMOOTHING_MS,
            ),
            gain: SmoothedAtomicParameter::new(GAIN, ParamRange::new(0.0, 1.0, 0.5), SMOOTHING_MS),
            key_tracking: true,
            sample_rate: 0.0,
            prepared: false,
        }
    }

    pub fn sine() -> Self {
        Self::new(Waveform::Sine)
    }

    pub fn sawtooth() -> Self {
        Self::new(Waveform::Sawtooth)
    }

    pub fn square() -> Self {
        Self::new(Waveform::Square)
    }

    /// Ignore note pitches and always play the `frequency` parameter.
    pub fn with_key_tracking(mut self, enabled: bool) -> Self {
        self.key_tracking = enabled;
        self
    }

    pub fn with_frequency(self, hz: f32) -> Self {
        self.frequency.set_target(hz);
        self
    }

    pub fn with_gain(self, gain: f32) -> Self {
        self.gain.set_target(gain);
        self
    }

    pub fn waveform_handle(&self) -> ChoiceHandle<Waveform> {
        self.waveform.handle()
    }

    pub fn frequency(&self) -> ParamHandle {
        self.frequency.handle()
    }

    pub fn pulse_width(&self) -> ParamHandle {
        self.pulse_width.handle()
    }

    pub fn detune(&self) -> ParamHandle {
        self.detune.handle()
    }

    pub fn gain(&self) -> ParamHandle {
        self.gain.handle()
    }

    fn handle_event(&mut self, event: &TimedEvent) {
        if let MidiMessage::NoteOn { pitch, velocity } = event.message {
            if velocity > 0 && self.key_tracking {
                self.frequency.jump_to(midi_note_to_freq(pitch));
            }
        }
    }
}

impl ProcessingNode for OscillatorNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Oscillator
    }

    fn prepare(&mut self, spec: &ProcessSpec) -> Result<(), PrepareError> {
        spec.validate()?;
        self.sample_rate = spec.sample_rate;
        for param in [
            &mut self.frequency,
            &mut self.pulse_width,
            &mut self.detune,
            &mut self.gain,
        ] {
            param.prepare(spec.sample_rate);
        }
        self.osc.reset();
        self.prepared = true;
        Ok(())
    }

    fn process(&mut self, block: &mut StereoBlock<'_>, events: &[TimedEvent]) {
        if !self.prepared {
            return;
        }

        let mut cursor = EventCursor::new(events);
        for i in 0..block.len() {
            while let Some(event) = cursor.pop_due(i) {
                self.handle_event(event);
            }

            let waveform = self.waveform.get();
            let frequency = self.frequency.next_smoothed_value() * detune_ratio(self.detune.next_smoothed_value());
            let pulse_width = self.pulse_width.next_smoothed_value();
            let gain = self.gain.next_smoothed_value();

            let out = self
                .osc
                .next_sample(waveform, frequency, pulse_width, self.sample_rate)
                * gain;

            block.left[i] = out;
            block.right[i] = out;
        }
    }

    fn release(&mut self) {
        self.prepared = false;
    }

    fn is_prepared(&self) -> bool {
        self.prepared
    }

    fn param_count(&self) -> usize {
        4
    }

    fn param(&self, index: usize) -> Option<ParamHandle> {
        match index {
            0 => Some(self.frequency.handle()),
            1 => Some(self.pulse_width.handle()),
            2 => Some(self.detune.handle()),
            3 => Some(self.gain.handle()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48_000.0;

    fn render(node: &mut OscillatorNode, n: usize, events: &[TimedEvent]) -> (Vec<f32>, Vec<f32>) {
        let mut left = vec![0.25; n];
        let mut right = vec![0.25; n];
        node.process(&mut StereoBlock::new(&mut left, &mut right), events);
        (left, right)
    }

    fn zero_crossings(buffer: &[f32]) -> usize {
        buffer
            .windows(2)
            .filter(|w| w[0] <= 0.0 && w[1] > 0.0)
            .count()
    }

    #[test]
    fn writes_identical_channels_at_gain() {
        let mut node = OscillatorNode::square().with_gain(0.5);
        node.prepare(&ProcessSpec::new(SR, 512)).unwrap();

        let (left, right) = render(&mut node, 512, &[]);
        assert_eq!(left, right);
        assert!(left.iter().all(|s| (s.abs() - 0.5).abs() < 1e-6));
    }

    #[test]
    fn note_on_sets_pitch_at_its_offset() {
        let mut node = OscillatorNode::sine().with_gain(1.0).with_frequency(100.0);
        node.prepare(&ProcessSpec::new(SR, 2048)).unwrap();

        // A5 = 880 Hz from sample 1024 onwards
        let (left, _) = render(&mut node, 2048, &[TimedEvent::note_on(1024, 81, 100)]);

        let before = zero_crossings(&left[..1024]);
        let after = zero_crossings(&left[1024..]);
        assert!(before <= 3, "100 Hz over 1024 samples, got {before}");
        assert!((18..=19).contains(&after), "880 Hz over 1024 samples, got {after}");
        assert!((node.frequency().target() - 880.0).abs() < 0.01);
    }

    #[test]
    fn key_tracking_can_be_disabled() {
        let mut node = OscillatorNode::sine().with_key_tracking(false).with_frequency(220.0);
        node.prepare(&ProcessSpec::new(SR, 64)).unwrap();
        render(&mut node, 64, &[TimedEvent::note_on(0, 81, 100)]);
        assert_eq!(node.frequency().target(), 220.0);
    }

    #[test]
    fn waveform_switch_applies_on_next_block() {
        let mut node = OscillatorNode::sine().with_gain(1.0);
        node.prepare(&ProcessSpec::new(SR, 256)).unwrap();
        render(&mut node, 256, &[]);

        node.waveform_handle().set(Waveform::Square);
        let (left, _) = render(&mut node, 256, &[]);
        assert!(left.iter().all(|s| s.abs() == 1.0));
    }

    #[test]
    fn waveform_switch_lands_on_the_next_sample() {
        let mut node = OscillatorNode::sine().with_gain(1.0);
        node.prepare(&ProcessSpec::new(SR, 1)).unwrap();
        let handle = node.waveform_handle();

        let mut samples = Vec::new();
        for i in 0..8 {
            handle.set(if i % 2 == 1 { Waveform::Square } else { Waveform::Sine });
            let (left, _) = render(&mut node, 1, &[]);
            samples.push(left[0]);
        }

        // square samples are exactly ±1, sine samples this close to phase zero are not
        for (i, s) in samples.iter().enumerate() {
            if i % 2 == 1 {
                assert_eq!(s.abs(), 1.0, "sample {i}: {s}");
            } else {
                assert!(s.abs() < 0.5, "sample {i}: {s}");
            }
        }
    }

    #[test]
    fn parameters_are_listed_by_name() {
        let node = OscillatorNode::sine();
        assert_eq!(node.param_count(), 4);
        let names: Vec<_> = (0..4).filter_map(|i| node.param(i)).map(|p| p.name()).collect();
        assert_eq!(names, [FREQUENCY, PULSE_WIDTH, DETUNE, GAIN]);

        let detune = node.param_by_name(DETUNE).unwrap();
        detune.set_target(500.0);
        assert_eq!(node.detune().target(), 100.0);
    }

    #[test]
    fn unprepared_node_leaves_buffer_alone() {
        let mut node = OscillatorNode::sine();
        let (left, _) = render(&mut node, 16, &[]);
        assert!(left.iter().all(|&s| s == 0.25));
    }
}
