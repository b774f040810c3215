//! Error types for control-thread operations.
//!
//! Nothing on the audio path returns these: `process_audio` and
//! `process_midi` are infallible once the engine is prepared. Every error here
//! is raised at edit or prepare time, before the callback ever runs.

use thiserror::Error;

use crate::graph::engine::NodeId;

/// Failures while preparing nodes for playback.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PrepareError {
    #[error("invalid sample rate: {0} Hz")]
    InvalidSampleRate(f32),

    #[error("invalid block size: {0} (must be 1..={max})", max = crate::MAX_BLOCK_SIZE)]
    InvalidBlockSize(usize),

    #[error("{node}: could not allocate {samples} samples")]
    Allocation { node: &'static str, samples: usize },
}

/// Topology and lifecycle errors reported by [`Graph`](crate::graph::engine::Graph).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("node {node} has no port {port}")]
    InvalidPort { node: NodeId, port: usize },

    #[error("node {0} cannot be connected to itself")]
    SelfConnection(NodeId),

    #[error("connection {src}:{src_port} -> {dst}:{dst_port} already exists")]
    DuplicateConnection {
        src: NodeId,
        src_port: usize,
        dst: NodeId,
        dst_port: usize,
    },

    #[error("connection {src}:{src_port} -> {dst}:{dst_port} does not exist")]
    UnknownConnection {
        src: NodeId,
        src_port: usize,
        dst: NodeId,
        dst_port: usize,
    },

    #[error("connecting {src} -> {dst} would create a cycle")]
    CycleDetected { src: NodeId, dst: NodeId },

    #[error("node identifier space exhausted")]
    IdSpaceExhausted,

    #[error("graph has not been prepared")]
    NotPrepared,

    #[error("no default chain has been built")]
    NoDefaultChain,

    #[error(transparent)]
    Prepare(#[from] PrepareError),
}

/// Rejected transport edits. The previous valid value is always kept.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("invalid tempo: {0} BPM (must be > 0)")]
    InvalidTempo(f64),

    #[error("invalid time signature: {numerator}/{denominator}")]
    InvalidTimeSignature { numerator: u8, denominator: u8 },

    #[error("invalid loop region: start={start}, end={end}")]
    InvalidLoopRegion { start: f64, end: f64 },

    #[error("invalid quantization grid: {0} beats (must be > 0)")]
    InvalidQuantizationGrid(f64),

    #[error("invalid position: {0} beats")]
    InvalidPosition(f64),

    #[error("sequencer command queue is full")]
    QueueFull,
}

/// Errors while loading an [`EngineConfig`](crate::config::EngineConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[cfg(feature = "serde")]
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error(transparent)]
    Prepare(#[from] PrepareError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
