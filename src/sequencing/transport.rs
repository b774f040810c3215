//! Musical transport state and tempo arithmetic.
//!
//! [`TransportState`] is both the live record the sequencer plays from and
//! the flat record persisted to resume a session. Every mutation goes through
//! a validating setter: invalid input is rejected and the previous value kept.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::sequencing::time_signature::TimeSignature;

pub const DEFAULT_TEMPO: f64 = 120.0;
pub const DEFAULT_LOOP_END: f64 = 4.0;
pub const DEFAULT_QUANTIZATION_GRID: f64 = 0.25;

/// Position, tempo, meter, loop region and grid. Playing state is not part
/// of it and is never persisted.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransportState {
    /// Playhead in quarter-note beats
    pub position: f64,
    /// Beats per minute
    pub tempo: f64,
    pub time_sig_num: u8,
    pub time_sig_den: u8,
    pub looping: bool,
    pub loop_start: f64,
    pub loop_end: f64,
    /// Grid spacing in beats used by `quantize_time`
    pub quantization_grid: f64,
}

impl Default for TransportState {
    fn default() -> Self {
        Self {
            position: 0.0,
            tempo: DEFAULT_TEMPO,
            time_sig_num: 4,
            time_sig_den: 4,
            looping: false,
            loop_start: 0.0,
            loop_end: DEFAULT_LOOP_END,
            quantization_grid: DEFAULT_QUANTIZATION_GRID,
        }
    }
}

pub(crate) fn check_tempo(bpm: f64) -> Result<(), TransportError> {
    if bpm.is_finite() && bpm > 0.0 {
        Ok(())
    } else {
        Err(TransportError::InvalidTempo(bpm))
    }
}

pub(crate) fn check_grid(beats: f64) -> Result<(), TransportError> {
    if beats.is_finite() && beats > 0.0 {
        Ok(())
    } else {
        Err(TransportError::InvalidQuantizationGrid(beats))
    }
}

pub(crate) fn check_loop(start: f64, end: f64) -> Result<(), TransportError> {
    if start.is_finite() && end.is_finite() && start >= 0.0 && start < end {
        Ok(())
    } else {
        Err(TransportError::InvalidLoopRegion { start, end })
    }
}

impl TransportState {
    /// Check every invariant of a record built field by field (e.g. loaded
    /// from disk).
    pub fn validate(&self) -> Result<(), TransportError> {
        check_tempo(self.tempo)?;
        TimeSignature::new(self.time_sig_num, self.time_sig_den)?;
        check_loop(self.loop_start, self.loop_end)?;
        check_grid(self.quantization_grid)?;
        if !self.position.is_finite() {
            return Err(TransportError::InvalidPosition(self.position));
        }
        Ok(())
    }

    pub fn time_signature(&self) -> TimeSignature {
        TimeSignature {
            numerator: self.time_sig_num,
            denominator: self.time_sig_den,
        }
    }

    /// Negative and non-finite positions collapse to zero.
    pub fn set_position(&mut self, beats: f64) {
        self.position = if beats.is_finite() { beats.max(0.0) } else { 0.0 };
    }

    pub fn set_tempo(&mut self, bpm: f64) -> Result<(), TransportError> {
        check_tempo(bpm)?;
        self.tempo = bpm;
        Ok(())
    }

    pub fn set_time_signature(&mut self, numerator: u8, denominator: u8) -> Result<(), TransportError> {
        let signature = TimeSignature::new(numerator, denominator)?;
        self.time_sig_num = signature.numerator;
        self.time_sig_den = signature.denominator;
        Ok(())
    }

    pub fn set_loop_start(&mut self, beats: f64) -> Result<(), TransportError> {
        check_loop(beats, self.loop_end)?;
        self.loop_start = beats;
        Ok(())
    }

    pub fn set_loop_end(&mut self, beats: f64) -> Result<(), TransportError> {
        check_loop(self.loop_start, beats)?;
        self.loop_end = beats;
        Ok(())
    }

    /// Move both loop points at once, for moves that would transiently
    /// invert the region if applied one at a time.
    pub fn set_loop_region(&mut self, start: f64, end: f64) -> Result<(), TransportError> {
        check_loop(start, end)?;
        self.loop_start = start;
        self.loop_end = end;
        Ok(())
    }

    pub fn set_quantization_grid(&mut self, beats: f64) -> Result<(), TransportError> {
        check_grid(beats)?;
        self.quantization_grid = beats;
        Ok(())
    }

    #[inline]
    pub fn beats_to_seconds(&self, beats: f64) -> f64 {
        beats * 60.0 / self.tempo
    }

    #[inline]
    pub fn seconds_to_beats(&self, seconds: f64) -> f64 {
        seconds * self.tempo / 60.0
    }

    /// Samples spanned by one beat at `sample_rate`.
    #[inline]
    pub fn samples_per_beat(&self, sample_rate: f64) -> f64 {
        sample_rate * 60.0 / self.tempo
    }

    /// Round to the nearest multiple of the quantization grid.
    pub fn quantize_time(&self, beats: f64) -> f64 {
        (beats / self.quantization_grid).round() * self.quantization_grid
    }

    #[inline]
    pub fn loop_length(&self) -> f64 {
        self.loop_end - self.loop_start
    }
}
