use std::f32::consts::TAU;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dsp::param::Choice;

/// Waveform shapes produced by [`Oscillator`].
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Waveform {
    #[default]
    Sine,
    Triangle,
    Sawtooth,
    Square,
    Noise,
}

impl Choice for Waveform {
    fn to_index(self) -> u8 {
        self as u8
    }

    fn from_index(index: u8) -> Self {
        match index {
            1 => Waveform::Triangle,
            2 => Waveform::Sawtooth,
            3 => Waveform::Square,
            4 => Waveform::Noise,
            _ => Waveform::Sine,
        }
    }
}

/// Phase accumulator and waveform shaper.
///
/// Naive (non band-limited) shapes; phase runs over `[0, 1)`.
pub struct Oscillator {
    phase: f32,
    noise_state: u32,
}

impl Oscillator {
    pub fn new() -> Self {
        Self {
            phase: 0.0,
            noise_state: 0x1234_5678,
        }
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Produce one sample and advance the phase by `frequency / sample_rate`.
    ///
    /// `pulse_width` only affects [`Waveform::Square`].
    #[inline]
    pub fn next_sample(
        &mut self,
        waveform: Waveform,
        frequency: f32,
        pulse_width: f32,
        sample_rate: f32,
    ) -> f32 {
        let phase = self.phase;
        let out = match waveform {
            Waveform::Sine => (TAU * phase).sin(),
            Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
            Waveform::Sawtooth => 2.0 * phase - 1.0,
            Waveform::Square => {
                if phase < pulse_width {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Noise => self.next_noise(),
        };

        self.phase += frequency / sample_rate;
        self.phase -= self.phase.floor();

        out
    }

    // xorshift32
    #[inline]
    fn next_noise(&mut self) -> f32 {
        let mut x = self.noise_state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.noise_state = x;
        (x as i32 as f32) / (i32::MAX as f32)
    }
}

impl Default for Oscillator {
    fn default() -> Self {
        Self::new()
    }
}

/// Frequency multiplier for a detune in cents (100 cents = 1 semitone).
#[inline]
pub fn detune_ratio(cents: f32) -> f32 {
    2.0_f32.powf(cents / 1200.0)
}
