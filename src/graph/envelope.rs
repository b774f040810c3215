use crate::dsp::envelope::{Envelope, EnvelopeStage};
use crate::dsp::param::{ParamHandle, ParamRange, SmoothedAtomicParameter};
use crate::error::PrepareError;
use crate::graph::node::{EventCursor, NodeKind, ProcessSpec, ProcessingNode, StereoBlock};
use crate::io::converter::velocity_to_gain;
use crate::io::midi::{MidiMessage, TimedEvent};
use crate::MIN_TIME_MS;

pub const ATTACK: &str = "attack";
pub const DECAY: &str = "decay";
pub const SUSTAIN: &str = "sustain";
pub const RELEASE: &str = "release";

/// Amplitude envelope applied to the running buffer.
///
/// Gated by note events: the most recent note-on owns the gate and only its
/// own note-off releases it. Times are in milliseconds and take effect on the
/// very next sample; sustain is smoothed.
///
/// A note-on from silence takes its velocity at once. Retriggering a sounding
/// envelope glides the velocity gain to the new note's over the attack time.
pub struct EnvelopeNode {
    env: Envelope,
    attack: SmoothedAtomicParameter,
    decay: SmoothedAtomicParameter,
    sustain: SmoothedAtomicParameter,
    release: SmoothedAtomicParameter,
    held_pitch: Option<u8>,
    velocity_gain: f32,
    velocity_target: f32,
    velocity_step: f32,
    velocity_ramp: usize,
    sample_rate: f32,
    prepared: bool,
}

impl EnvelopeNode {
    pub fn new() -> Self {
        Self::adsr(10.0, 100.0, 0.7, 200.0)
    }

    pub fn adsr(attack_ms: f32, decay_ms: f32, sustain: f32, release_ms: f32) -> Self {
        let time = |name, default| {
            SmoothedAtomicParameter::new(name, ParamRange::new(MIN_TIME_MS as f64, 5_000.0, default), 0.0)
        };

        let node = Self {
            env: Envelope::new(0.0),
            attack: time(ATTACK, 10.0),
            decay: time(DECAY, 100.0),
            sustain: SmoothedAtomicParameter::new(SUSTAIN, ParamRange::new(0.0, 1.0, 0.7), 50.0),
            release: SmoothedAtomicParameter::new(
                RELEASE,
                ParamRange::new(MIN_TIME_MS as f64, 10_000.0, 200.0),
                0.0,
            ),
            held_pitch: None,
            velocity_gain: 1.0,
            velocity_target: 1.0,
            velocity_step: 0.0,
            velocity_ramp: 0,
            sample_rate: 0.0,
            prepared: false,
        };

        node.attack.set_target(attack_ms);
        node.decay.set_target(decay_ms);
        node.sustain.set_target(sustain);
        node.release.set_target(release_ms);
        node
    }

    pub fn attack(&self) -> ParamHandle {
        self.attack.handle()
    }

    pub fn decay(&self) -> ParamHandle {
        self.decay.handle()
    }

    pub fn sustain(&self) -> ParamHandle {
        self.sustain.handle()
    }

    pub fn release_time(&self) -> ParamHandle {
        self.release.handle()
    }

    pub fn stage(&self) -> EnvelopeStage {
        self.env.stage()
    }

    pub fn level(&self) -> f32 {
        self.env.level()
    }

    pub fn is_active(&self) -> bool {
        self.env.is_active()
    }

    fn handle_event(&mut self, event: &TimedEvent) {
        match event.message {
            MidiMessage::NoteOn { pitch, velocity } if velocity > 0 => {
                self.held_pitch = Some(pitch);
                self.set_velocity(velocity_to_gain(velocity));
                self.env.note_on();
            }
            MidiMessage::NoteOn { pitch, .. } | MidiMessage::NoteOff { pitch } => {
                if self.held_pitch == Some(pitch) {
                    self.held_pitch = None;
                    self.env.note_off();
                }
            }
            MidiMessage::Automation { .. } => {}
        }
    }

    fn set_velocity(&mut self, gain: f32) {
        self.velocity_target = gain;
        if !self.env.is_active() {
            self.velocity_gain = gain;
            self.velocity_ramp = 0;
            return;
        }

        let samples = (self.attack.current() * 0.001 * self.sample_rate).round().max(1.0) as usize;
        self.velocity_step = (gain - self.velocity_gain) / samples as f32;
        self.velocity_ramp = samples;
    }

    #[inline]
    fn next_velocity_gain(&mut self) -> f32 {
        if self.velocity_ramp > 0 {
            self.velocity_ramp -= 1;
            self.velocity_gain = if self.velocity_ramp == 0 {
                self.velocity_target
            } else {
                self.velocity_gain + self.velocity_step
            };
        }
        self.velocity_gain
    }

    fn reset_velocity(&mut self) {
        self.velocity_gain = self.velocity_target;
        self.velocity_ramp = 0;
    }
}

impl Default for EnvelopeNode {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingNode for EnvelopeNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Envelope
    }

    fn prepare(&mut self, spec: &ProcessSpec) -> Result<(), PrepareError> {
        spec.validate()?;
        self.sample_rate = spec.sample_rate;
        self.env.set_sample_rate(spec.sample_rate);
        self.env.reset();
        self.reset_velocity();
        for param in [
            &mut self.attack,
            &mut self.decay,
            &mut self.sustain,
            &mut self.release,
        ] {
            param.prepare(spec.sample_rate);
        }
        self.held_pitch = None;
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

            self.env.set_attack_ms(self.attack.next_smoothed_value());
            self.env.set_decay_ms(self.decay.next_smoothed_value());
            self.env.set_sustain(self.sustain.next_smoothed_value());
            self.env.set_release_ms(self.release.next_smoothed_value());

            let gain = self.env.next_sample() * self.next_velocity_gain();
            block.left[i] *= gain;
            block.right[i] *= gain;
        }
    }

    fn release(&mut self) {
        self.env.reset();
        self.reset_velocity();
        self.held_pitch = None;
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
            0 => Some(self.attack.handle()),
            1 => Some(self.decay.handle()),
            2 => Some(self.sustain.handle()),
            3 => Some(self.release.handle()),
            _ => None,
        }
    }
}
