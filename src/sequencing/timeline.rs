//! Read-only query interface to the musical timeline.
//!
//! The sequencer calls these from the audio thread once per block, so
//! implementations must not allocate, lock or block. Results are delivered
//! through visitor callbacks instead of returned collections for that reason.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::io::midi::NoteEvent;

/// Identifies one automation lane on the timeline.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamId(pub u32);

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "param{}", self.0)
    }
}

pub trait Timeline: Send + Sync {
    /// Visit every note whose start lies in `[start_beats, end_beats)`, in
    /// ascending start order.
    fn notes_in_range(&self, start_beats: f64, end_beats: f64, visit: &mut dyn FnMut(&NoteEvent));

    /// Visit the id of every parameter that has automation.
    fn automated_parameters(&self, visit: &mut dyn FnMut(ParamId));

    /// Automation value of `id` at `beat`, `None` if `id` has no lane.
    fn parameter_value_at(&self, id: ParamId, beat: f64) -> Option<f32>;
}
