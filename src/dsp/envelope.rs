use crate::MIN_TIME_MS;

/// Accumulated increments may land a hair short of a stage target.
const LEVEL_EPSILON: f32 = 1e-6;

/*
ADSR Envelope Implementation
============================

A linear ADSR envelope generator, the workhorse of amplitude control.

Vocabulary
----------

  level       The envelope's current output value (0.0 to 1.0). This multiplies
              the audio signal to control its amplitude over time.

  stage       Which phase of the envelope we're in: Idle, Attack, Decay,
              Sustain, or Release. A state machine governs transitions.

  gate        The note on/off signal. Gate high (note_on) triggers Attack.
              Gate low (note_off) triggers Release from wherever we are.

  increment   How much `level` changes per sample. Derived from the stage
              time in milliseconds and the prepared sample rate.


The Shape: Linear Ramps
-----------------------

  Level
    1.0 ┐     ╱╲
        │    ╱  ╲___________
    S   │   ╱               ╲
        │  ╱                 ╲
    0.0 └─╱───────────────────╲──→ Time
        Attack Decay  Sustain  Release
         (A)   (D)      (S)      (R)


The Math: Time to Increment
---------------------------

    increment = span / (time_ms / 1000 * sample_rate)

  Attack:   span = 1.0                          (0 → 1)
  Decay:    span = 1.0 - sustain                (1 → S)
  Release:  span = level at note_off            (L → 0)

The increment is recomputed every sample from the current time setting. If a
time parameter changes mid-stage only the slope of the REMAINING ramp changes;
the level itself never jumps.


The State Machine
-----------------

    ┌──────┐  note_on   ┌────────┐  level=1   ┌───────┐  level=S  ┌─────────┐
    │ Idle │ ─────────→ │ Attack │ ─────────→ │ Decay │ ────────→ │ Sustain │
    └──────┘            └────────┘            └───────┘           └─────────┘
        ↑                    │ note_off           │ note_off           │ note_off
        │ level=0            ↓                    ↓                    ↓
        └──────────────── ┌─────────┐ ←───────────┴────────────────────┘
                          │ Release │
                          └─────────┘

note_on from Release restarts Attack from the CURRENT level, so a retrigger
never clicks. note_off from any active stage releases from the current level.
*/

/// The current stage of the envelope state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

pub struct Envelope {
    attack_ms: f32,
    decay_ms: f32,
    sustain_level: f32,
    release_ms: f32,
    sample_rate: f32,

    stage: EnvelopeStage,
    level: f32,
    decay_start_level: f32,
    release_start_level: f32,
}

impl Envelope {
    pub fn new(sample_rate: f32) -> Self {
        Self::adsr(sample_rate, 10.0, 100.0, 0.7, 200.0)
    }

    pub fn adsr(sample_rate: f32, attack_ms: f32, decay_ms: f32, sustain: f32, release_ms: f32) -> Self {
        Self {
            attack_ms: attack_ms.max(MIN_TIME_MS),
            decay_ms: decay_ms.max(MIN_TIME_MS),
            sustain_level: sustain.clamp(0.0, 1.0),
            release_ms: release_ms.max(MIN_TIME_MS),
            sample_rate,

            stage: EnvelopeStage::Idle,
            level: 0.0,
            decay_start_level: 1.0,
            release_start_level: 0.0,
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
    }

    pub fn set_attack_ms(&mut self, ms: f32) {
        self.attack_ms = ms.max(MIN_TIME_MS);
    }

    pub fn set_decay_ms(&mut self, ms: f32) {
        self.decay_ms = ms.max(MIN_TIME_MS);
    }

    pub fn set_sustain(&mut self, level: f32) {
        self.sustain_level = level.clamp(0.0, 1.0);
    }

    pub fn set_release_ms(&mut self, ms: f32) {
        self.release_ms = ms.max(MIN_TIME_MS);
    }

    /// Gate high.
    pub fn note_on(&mut self) {
        self.stage = EnvelopeStage::Attack;
    }

    /// Gate low: release from the current level.
    pub fn note_off(&mut self) {
        if matches!(self.stage, EnvelopeStage::Idle | EnvelopeStage::Release) {
            return;
        }

        self.release_start_level = self.level;
        self.stage = EnvelopeStage::Release;
    }

    #[inline]
    fn samples_for(&self, ms: f32) -> f32 {
        (ms * 0.001 * self.sample_rate).max(1.0)
    }

    /// Advance the envelope by one sample and return the new level.
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        match self.stage {
            EnvelopeStage::Idle => {
                self.level = 0.0;
            }

            EnvelopeStage::Attack => {
                self.level += 1.0 / self.samples_for(self.attack_ms);

                if self.level >= 1.0 - LEVEL_EPSILON {
                    self.level = 1.0;
                    self.decay_start_level = 1.0;
                    self.stage = EnvelopeStage::Decay;
                }
            }

            EnvelopeStage::Decay => {
                let target = self.sustain_level;
                let span = (self.decay_start_level - target).max(0.0);
                self.level -= span / self.samples_for(self.decay_ms);

                if self.level <= target {
                    self.level = target;
                    self.stage = EnvelopeStage::Sustain;
                }
            }

            EnvelopeStage::Sustain => {
                self.level = self.sustain_level;
            }

            EnvelopeStage::Release => {
                self.level -= self.release_start_level / self.samples_for(self.release_ms);

                if self.level <= 0.0 {
                    self.level = 0.0;
                    self.stage = EnvelopeStage::Idle;
                }
            }
        }

        debug_assert!((0.0..=1.0).contains(&self.level));
        self.level
    }

    /// Render a block of envelope values into the buffer.
    pub fn render(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.next_sample();
        }
    }

    /// Returns true if the envelope is producing output (not idle).
    pub fn is_active(&self) -> bool {
        !matches!(self.stage, EnvelopeStage::Idle)
    }

    pub fn reset(&mut self) {
        self.stage = EnvelopeStage::Idle;
        self.level = 0.0;
        self.decay_start_level = 1.0;
        self.release_start_level = 0.0;
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn stage(&self) -> EnvelopeStage {
        self.stage
    }
}
