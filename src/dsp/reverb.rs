//! Reverb - Room Simulation via Delay Networks
//!
//! Reverb simulates the sound of a space by creating many delayed, filtered
//! reflections of the input signal. This implementation runs two classic
//! Schroeder networks side by side, one per output channel.
//!
//! # Stereo Schroeder Architecture
//!
//! ```text
//!                 ┌──→ [Comb ×4] ──→ (+) ──→ [Allpass ×2] ──→ wet L ─┐
//! (L+R)/2 ────────┤                                                   ├─→ width ─→ mix ─→ out
//!                 └──→ [Comb ×4] ──→ (+) ──→ [Allpass ×2] ──→ wet R ─┘
//!                      (+ spread)
//! ```
//!
//! The right network's delays are offset by a small spread so the two tails
//! decorrelate.
//!
//! ## Comb Filters
//!
//! ```text
//! y[n] = x[n] + feedback * lowpass(y[n - delay])
//! ```
//!
//! The one-pole lowpass in the loop is the damping: high frequencies die
//! faster than lows. Delay times are mutually prime to avoid resonant buildup.
//!
//! ## Allpass Filters
//!
//! ```text
//! y[n] = -g * x[n] + x[n - delay] + g * y[n - delay]
//! ```
//!
//! # Parameters
//!
//! - **Room Size**: Comb feedback, 0.7 to 0.98 (larger = longer tail)
//! - **Damping**: High-frequency absorption (higher = darker, shorter)
//! - **Width**: 0 folds both tails to mono, 1 keeps them fully apart
//! - **Mix**: Dry/wet blend

use std::collections::TryReserveError;

const COMB_DELAYS_MS: [f32; 4] = [29.7, 37.1, 41.1, 43.7];
const ALLPASS_DELAYS_MS: [f32; 2] = [5.0, 1.7];
/// Extra delay of the right network, in samples at 44.1 kHz.
const STEREO_SPREAD: f32 = 23.0;
const ALLPASS_FEEDBACK: f32 = 0.5;

fn delay_samples(ms: f32, sample_rate: f32, spread: f32) -> usize {
    let spread = spread * sample_rate / 44_100.0;
    ((ms * sample_rate / 1000.0) + spread).max(1.0) as usize
}

fn zeroed(len: usize) -> Result<Vec<f32>, TryReserveError> {
    let mut buffer = Vec::new();
    buffer.try_reserve_exact(len)?;
    buffer.resize(len, 0.0);
    Ok(buffer)
}

/// A damped comb filter.
pub struct CombFilter {
    buffer: Vec<f32>,
    write_pos: usize,
    feedback: f32,
    damp: f32,
    filter_state: f32,
}

impl CombFilter {
    pub fn new(delay_samples: usize) -> Result<Self, TryReserveError> {
        Ok(Self {
            buffer: zeroed(delay_samples.max(1))?,
            write_pos: 0,
            feedback: 0.5,
            damp: 0.5,
            filter_state: 0.0,
        })
    }

    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(0.0, 0.99);
    }

    pub fn set_damp(&mut self, damp: f32) {
        self.damp = damp.clamp(0.0, 1.0);
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let output = self.buffer[self.write_pos];

        self.filter_state = output * (1.0 - self.damp) + self.filter_state * self.damp;
        self.buffer[self.write_pos] = input + self.filter_state * self.feedback;

        self.write_pos += 1;
        if self.write_pos == self.buffer.len() {
            self.write_pos = 0;
        }

        output
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.filter_state = 0.0;
        self.write_pos = 0;
    }
}

/// A Schroeder allpass diffuser.
pub struct AllpassFilter {
    buffer: Vec<f32>,
    write_pos: usize,
    feedback: f32,
}

impl AllpassFilter {
    pub fn new(delay_samples: usize) -> Result<Self, TryReserveError> {
        Ok(Self {
            buffer: zeroed(delay_samples.max(1))?,
            write_pos: 0,
            feedback: ALLPASS_FEEDBACK,
        })
    }

    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(0.0, 0.9);
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let delayed = self.buffer[self.write_pos];
        let output = -self.feedback * input + delayed;
        self.buffer[self.write_pos] = input + self.feedback * output;

        self.write_pos += 1;
        if self.write_pos == self.buffer.len() {
            self.write_pos = 0;
        }

        output
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

/// One channel: four parallel combs into two series allpasses.
pub struct SchroederNetwork {
    combs: Vec<CombFilter>,
    allpasses: Vec<AllpassFilter>,
}

impl SchroederNetwork {
    pub fn new(sample_rate: f32, spread: f32) -> Result<Self, TryReserveError> {
        let mut combs = Vec::new();
        combs.try_reserve_exact(COMB_DELAYS_MS.len())?;
        for ms in COMB_DELAYS_MS {
            combs.push(CombFilter::new(delay_samples(ms, sample_rate, spread))?);
        }

        let mut allpasses = Vec::new();
        allpasses.try_reserve_exact(ALLPASS_DELAYS_MS.len())?;
        for ms in ALLPASS_DELAYS_MS {
            allpasses.push(AllpassFilter::new(delay_samples(ms, sample_rate, spread))?);
        }

        Ok(Self { combs, allpasses })
    }

    pub fn set_room_size(&mut self, size: f32) {
        let feedback = 0.7 + size.clamp(0.0, 1.0) * 0.28;
        for comb in &mut self.combs {
            comb.set_feedback(feedback);
        }
    }

    pub fn set_damping(&mut self, damp: f32) {
        for comb in &mut self.combs {
            comb.set_damp(damp);
        }
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let mut output = 0.0;
        for comb in &mut self.combs {
            output += comb.process(input);
        }
        output *= 0.25;

        for allpass in &mut self.allpasses {
            output = allpass.process(output);
        }

        output
    }

    pub fn reset(&mut self) {
        for comb in &mut self.combs {
            comb.reset();
        }
        for allpass in &mut self.allpasses {
            allpass.reset();
        }
    }
}

/// Coefficients derived from the four user-facing controls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReverbSettings {
    pub room_size: f32,
    pub damping: f32,
    pub width: f32,
    pub mix: f32,
}

impl Default for ReverbSettings {
    fn default() -> Self {
        Self {
            room_size: 0.5,
            damping: 0.5,
            width: 1.0,
            mix: 0.3,
        }
    }
}

pub struct StereoReverb {
    left: SchroederNetwork,
    right: SchroederNetwork,
    settings: ReverbSettings,
    dry: f32,
    wet_same: f32,
    wet_cross: f32,
}

impl StereoReverb {
    /// Allocates every delay buffer for `sample_rate`.
    pub fn new(sample_rate: f32) -> Result<Self, TryReserveError> {
        let mut reverb = Self {
            left: SchroederNetwork::new(sample_rate, 0.0)?,
            right: SchroederNetwork::new(sample_rate, STEREO_SPREAD)?,
            settings: ReverbSettings::default(),
            dry: 0.0,
            wet_same: 0.0,
            wet_cross: 0.0,
        };
        reverb.apply(ReverbSettings::default());
        Ok(reverb)
    }

    pub fn settings(&self) -> ReverbSettings {
        self.settings
    }

    /// Recompute the internal coefficients.
    pub fn apply(&mut self, settings: ReverbSettings) {
        let ReverbSettings {
            room_size,
            damping,
            width,
            mix,
        } = settings;

        self.left.set_room_size(room_size);
        self.right.set_room_size(room_size);
        self.left.set_damping(damping);
        self.right.set_damping(damping);

        let width = width.clamp(0.0, 1.0);
        let wet = mix.clamp(0.0, 1.0);
        self.wet_same = wet * (width * 0.5 + 0.5);
        self.wet_cross = wet * ((1.0 - width) * 0.5);
        self.dry = 1.0 - wet;

        self.settings = settings;
    }

    #[inline]
    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let input = (left + right) * 0.5;
        let wet_l = self.left.process(input);
        let wet_r = self.right.process(input);

        (
            left * self.dry + wet_l * self.wet_same + wet_r * self.wet_cross,
            right * self.dry + wet_r * self.wet_same + wet_l * self.wet_cross,
        )
    }

    pub fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
    }
}
