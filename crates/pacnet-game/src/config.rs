//! Rule configuration for the authoritative node.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Points, timers and lives used by the [`Referee`](crate::Referee).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    /// Points for an ordinary dot.
    pub dot_points: u32,

    /// Points for a power pellet.
    pub power_points: u32,

    /// Points for catching a scared ghost.
    pub ghost_points: u32,

    /// How long a power pellet keeps ghosts scared.
    pub scare_duration: Duration,

    /// Pacman lives at the start of a game.
    pub starting_lives: u32,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            dot_points: 10,
            power_points: 50,
            ghost_points: 200,
            scare_duration: Duration::from_secs(7),
            starting_lives: 3,
        }
    }
}

impl RuleConfig {
    /// Scare duration as it goes on the wire.
    pub fn scare_millis(&self) -> u64 {
        u64::try_from(self.scare_duration.as_millis()).unwrap_or(u64::MAX)
    }
}
