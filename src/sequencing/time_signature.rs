#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// Meter of the transport.
///
/// Positions are always counted in quarter-note beats; the signature only
/// decides how those beats group into bars.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSignature {
    /// Number of notes per bar
    pub numerator: u8,
    /// Note value of one count (4 = quarter, 8 = eighth)
    pub denominator: u8,
}

impl TimeSignature {
    pub const FOUR_FOUR: TimeSignature = TimeSignature {
        numerator: 4,
        denominator: 4,
    };

    pub const THREE_FOUR: TimeSignature = TimeSignature {
        numerator: 3,
        denominator: 4,
    };

    pub const SIX_EIGHT: TimeSignature = TimeSignature {
        numerator: 6,
        denominator: 8,
    };

    pub fn new(numerator: u8, denominator: u8) -> Result<Self, TransportError> {
        if numerator == 0 || denominator == 0 {
            return Err(TransportError::InvalidTimeSignature {
                numerator,
                denominator,
            });
        }
        Ok(Self {
            numerator,
            denominator,
        })
    }

    /// Length of one bar in quarter-note beats.
    /// 4/4 = 4, 3/4 = 3, 6/8 = 3, 7/8 = 3.5
    pub fn beats_per_bar(&self) -> f64 {
        self.numerator as f64 * 4.0 / self.denominator as f64
    }

    /// 1-based bar and beat for a position, as shown on a transport display.
    ///
    /// The beat is counted in the signature's own note value, so 6/8 runs
    /// from beat 1 to beat 6.
    pub fn bar_and_beat(&self, position_beats: f64) -> (u32, f64) {
        let position = position_beats.max(0.0);
        let bar_len = self.beats_per_bar();
        let bar = (position / bar_len).floor();
        let within = position - bar * bar_len;
        let counts = within * self.denominator as f64 / 4.0;
        (bar as u32 + 1, counts + 1.0)
    }

    /// Compound meters group their counts in threes (6/8, 9/8, 12/8).
    pub fn is_compound(&self) -> bool {
        self.denominator >= 8 && self.numerator > 3 && self.numerator % 3 == 0
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::FOUR_FOUR
    }
}
