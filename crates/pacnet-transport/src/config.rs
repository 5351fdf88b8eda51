//! Transport configuration.

use serde::{Deserialize, Serialize};

use crate::framing::DEFAULT_MAX_FRAME_LENGTH;

/// Settings for the [`ConnectionManager`](crate::ConnectionManager).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Host the listening endpoint binds to.
    pub bind_host: String,

    /// Frames a single peer may have queued before new ones are dropped.
    pub send_queue_capacity: usize,

    /// Largest accepted frame payload in bytes.
    pub max_frame_length: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            send_queue_capacity: 256,
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
        }
    }
}

impl TransportConfig {
    /// A config bound to the loopback interface. Handy for tests and demos.
    pub fn loopback() -> Self {
        Self {
            bind_host: "127.0.0.1".to_string(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_config_default() {
        let config = TransportConfig::default();
        assert_eq!(config.bind_host, "0.0.0.0");
        assert_eq!(config.send_queue_capacity, 256);
        assert_eq!(config.max_frame_length, 64 * 1024);
    }

    #[test]
    fn test_transport_config_loopback_keeps_other_defaults() {
        let config = TransportConfig::loopback();
        assert_eq!(config.bind_host, "127.0.0.1");
        assert_eq!(config.send_queue_capacity, 256);
    }
}
