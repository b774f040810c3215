//! Musical time: transport, timelines and the block sequencer.

pub mod pattern;
pub mod sequencer;
pub mod time_signature;
pub mod timeline;
pub mod transport;

pub use pattern::{AutomationLane, Pattern};
pub use sequencer::{ActiveNote, Sequencer, SequencerHandle, TransportCommand, TransportMonitor};
pub use time_signature::TimeSignature;
pub use timeline::{ParamId, Timeline};
pub use transport::TransportState;
