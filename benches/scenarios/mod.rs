//! Whole-engine scenario benchmarks.
//!
//! These model what the audio callback actually does each block: run the
//! sequencer, apply automation, render the node chain.

mod chain;
mod sequencer;

pub use chain::bench_chain;
pub use sequencer::bench_sequencer;
