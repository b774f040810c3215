//! Processing nodes and the graph that runs them.
//!
//! Nodes wrap the low-level DSP primitives with what the engine needs:
//! lock-free parameters, sample-accurate note events and a
//! prepare/process/release lifecycle. The `engine` module owns nodes by
//! handle and runs them in connection order once per audio block.

/// Feedback delay with an interpolated read head.
pub mod delay;
/// Node arena, connections and block execution.
pub mod engine;
/// ADSR amplitude envelope gated by note events.
pub mod envelope;
/// Stereo biquad with block-rate coefficient updates.
pub mod filter;
/// Core trait shared by all processing nodes.
pub mod node;
/// Audio-band oscillator with key tracking.
pub mod oscillator;
/// Stereo room reverb.
pub mod reverb;

pub use delay::DelayNode;
pub use engine::{Connection, Graph, NodeId, RunSwitch};
pub use envelope::EnvelopeNode;
pub use filter::FilterNode;
pub use node::{NodeKind, ProcessSpec, ProcessingNode, StereoBlock};
pub use oscillator::OscillatorNode;
pub use reverb::ReverbNode;
