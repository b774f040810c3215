//! Low-level DSP primitives used by the higher level graph nodes.
//!
//! These components keep to the signal-processing math. Anything that owns
//! memory (delay lines, reverb buffers) reserves it up front and never grows
//! on the audio thread; graph nodes layer parameters and events on top.

/// Fractional circular delay line.
pub mod delay;
/// Attack/decay/sustain/release envelope generator.
pub mod envelope;
/// RBJ biquad with seven responses.
pub mod filter;
/// Oscillator waveforms and noise sources.
pub mod oscillator;
/// Lock-free parameters with linear smoothing.
pub mod param;
/// Stereo Schroeder reverb.
pub mod reverb;

pub use envelope::EnvelopeStage;
pub use param::{ParamHandle, ParamRange, SmoothedAtomicParameter};
