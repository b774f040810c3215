pub mod config; // Engine settings and TOML loading
pub mod context; // Graph + sequencer as one explicit object
pub mod dsp; // Sample-level primitives
pub mod error;
pub mod graph; // Processing nodes and the graph that runs them
pub mod io; // Event types shared by sequencer and nodes
pub mod sequencing; // Transport, timelines and sample-accurate playback

pub use config::EngineConfig;
pub use context::{DefaultChain, EffectSlot, EngineContext};
pub use error::{ConfigError, GraphError, PrepareError, TransportError};

/// Largest block a node is prepared for.
pub const MAX_BLOCK_SIZE: usize = 2048;
/// Longest delay the delay node can be set to.
pub const MAX_DELAY_MS: f32 = 2000.0;
/// Extra delay-line samples beyond `MAX_DELAY_MS`.
pub const DELAY_SAFETY_MARGIN: usize = 512;
/// Notes the sequencer tracks at once. Further note-ons are dropped.
pub const MAX_ACTIVE_NOTES: usize = 128;
pub(crate) const MIN_TIME_MS: f32 = 0.1;
