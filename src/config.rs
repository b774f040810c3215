//! Engine configuration.
//!
//! ```toml
//! sample_rate = 48000.0
//! block_size = 256
//!
//! [transport]
//! tempo = 96.0
//! looping = true
//! loop_end = 8.0
//! ```
//!
//! Every field is optional and falls back to its default.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::graph::node::ProcessSpec;
use crate::sequencing::transport::TransportState;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub sample_rate: f32,
    /// Largest block the graph processes in one pass
    pub block_size: usize,
    /// Events per block before further events are dropped
    pub event_capacity: usize,
    /// Slots in each note/automation listener queue
    pub listener_queue_capacity: usize,
    /// Slots in the transport command queue
    pub command_queue_capacity: usize,
    pub transport: TransportState,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000.0,
            block_size: 512,
            event_capacity: 512,
            listener_queue_capacity: 1024,
            command_queue_capacity: 64,
            transport: TransportState::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ProcessSpec::new(self.sample_rate, self.block_size).validate()?;
        for (name, value) in [
            ("event_capacity", self.event_capacity),
            ("listener_queue_capacity", self.listener_queue_capacity),
            ("command_queue_capacity", self.command_queue_capacity),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be at least 1")));
            }
        }
        self.transport.validate()?;
        Ok(())
    }

    #[cfg(feature = "serde")]
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        tracing::debug!(?config, "engine config loaded");
        Ok(config)
    }
}

#[cfg(all(test, feature = "serde"))]
mod tests {
    use super::*;
    use crate::error::{PrepareError, TransportError};

    #[test]
    fn empty_document_gives_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn partial_transport_keeps_other_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            block_size = 256

            [transport]
            tempo = 96.0
            looping = true
            "#,
        )
        .unwrap();

        assert_eq!(config.block_size, 256);
        assert_eq!(config.sample_rate, 48_000.0);
        assert_eq!(config.transport.tempo, 96.0);
        assert!(config.transport.looping);
        assert_eq!(config.transport.loop_end, 4.0);
        assert_eq!(config.transport.quantization_grid, 0.25);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            EngineConfig::from_toml_str("block_size = 0"),
            Err(ConfigError::Prepare(PrepareError::InvalidBlockSize(0)))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("[transport]\ntempo = -1.0"),
            Err(ConfigError::Transport(TransportError::InvalidTempo(_)))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("command_queue_capacity = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("sample_rate = \"fast\""),
            Err(ConfigError::Parse(_))
        ));
    }
}
