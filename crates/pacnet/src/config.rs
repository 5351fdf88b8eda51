//! Node configuration.

use std::time::Duration;

use pacnet_game::RuleConfig;
use pacnet_transport::TransportConfig;
use serde::{Deserialize, Serialize};

use crate::PacnetError;

/// Everything a node needs besides its game and view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub transport: TransportConfig,

    pub rules: RuleConfig,

    /// How often scare timers are aged, in Hz.
    pub tick_rate_hz: u32,

    /// Capacity of the command channel into the node actor.
    pub command_buffer: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            rules: RuleConfig::default(),
            tick_rate_hz: 20,
            command_buffer: 64,
        }
    }
}

impl NodeConfig {
    /// A default config bound to the loopback interface.
    pub fn loopback() -> Self {
        Self {
            transport: TransportConfig::loopback(),
            ..Self::default()
        }
    }

    /// Parses a config from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    /// Returns [`PacnetError::Config`] if the JSON is malformed or a value
    /// is out of range.
    pub fn from_json(json: &str) -> Result<Self, PacnetError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| PacnetError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the values a node cannot run with.
    pub fn validate(&self) -> Result<(), PacnetError> {
        if self.tick_rate_hz == 0 {
            return Err(PacnetError::Config("tick_rate_hz must be positive".into()));
        }
        if self.command_buffer == 0 {
            return Err(PacnetError::Config("command_buffer must be positive".into()));
        }
        Ok(())
    }

    /// Time between two ticks.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(1) / self.tick_rate_hz.max(1)
    }
}
