//! Field types that appear inside frames.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ProtocolError, RECORD_SEPARATOR};

// ---------------------------------------------------------------------------
// Tag
// ---------------------------------------------------------------------------

/// The first field of a frame, selecting what the rest means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tag {
    Confirm,
    Select,
    SelectGood,
    SelectFail,
    Release,
    Map,
    Start,
    Direction,
    Location,
    Scare,
    Eat,
    Die,
    GameOver,
    Hurry,
}

impl Tag {
    /// Every tag in the vocabulary.
    pub const ALL: [Tag; 14] = [
        Tag::Confirm,
        Tag::Select,
        Tag::SelectGood,
        Tag::SelectFail,
        Tag::Release,
        Tag::Map,
        Tag::Start,
        Tag::Direction,
        Tag::Location,
        Tag::Scare,
        Tag::Eat,
        Tag::Die,
        Tag::GameOver,
        Tag::Hurry,
    ];

    /// The tag as it appears on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Confirm => "CONFIRM",
            Self::Select => "SELECT",
            Self::SelectGood => "SELECT_GOOD",
            Self::SelectFail => "SELECT_FAIL",
            Self::Release => "RELEASE",
            Self::Map => "MAP",
            Self::Start => "START",
            Self::Direction => "DIRECTION",
            Self::Location => "LOCATION",
            Self::Scare => "SCARE",
            Self::Eat => "EAT",
            Self::Die => "DIE",
            Self::GameOver => "GAME_OVER",
            Self::Hurry => "HURRY",
        }
    }

    /// Looks up a wire tag. Returns `None` for tags outside the vocabulary.
    pub fn from_wire(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tag| tag.as_str() == text)
    }

    /// Number of fields after the tag a well-formed frame must carry.
    pub fn min_fields(self) -> usize {
        match self {
            Self::Confirm | Self::Hurry => 0,
            Self::Select
            | Self::SelectGood
            | Self::SelectFail
            | Self::Release
            | Self::Map
            | Self::Start => 1,
            Self::Direction | Self::Scare | Self::Die | Self::GameOver => 2,
            Self::Location | Self::Eat => 3,
        }
    }

    /// Returns `true` for tags only the authoritative node may emit.
    pub fn is_authoritative(self) -> bool {
        matches!(self, Self::Scare | Self::Eat | Self::Die | Self::GameOver)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// AgentId
// ---------------------------------------------------------------------------

/// The fixed pool of ghost names. Any other non-numeric agent is invalid.
pub const GHOST_NAMES: [&str; 4] = ["red", "pink", "cyan", "orange"];

/// A controllable character: the unit of ownership.
///
/// On the wire a pacman is its decimal index and a ghost is its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgentId {
    Pacman { index: u16 },
    Ghost { name: String },
}

impl AgentId {
    pub fn pacman(index: u16) -> Self {
        Self::Pacman { index }
    }

    pub fn ghost(name: impl Into<String>) -> Self {
        Self::Ghost { name: name.into() }
    }

    pub fn is_pacman(&self) -> bool {
        matches!(self, Self::Pacman { .. })
    }

    pub fn is_ghost(&self) -> bool {
        matches!(self, Self::Ghost { .. })
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pacman { index } => write!(f, "{index}"),
            Self::Ghost { name } => f.write_str(name),
        }
    }
}

impl FromStr for AgentId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ProtocolError::InvalidField {
            kind: "agent",
            value: s.to_string(),
        };
        if s.is_empty() {
            return Err(invalid());
        }
        if s.bytes().all(|b| b.is_ascii_digit()) {
            let index = s.parse().map_err(|_| invalid())?;
            return Ok(Self::Pacman { index });
        }
        if !GHOST_NAMES.contains(&s) {
            return Err(invalid());
        }
        Ok(Self::Ghost { name: s.to_string() })
    }
}

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// Heading of a moving agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    /// Not moving. `NONE` on the wire.
    Stop,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "UP",
            Self::Down => "DOWN",
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
            Self::Stop => "NONE",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UP" => Ok(Self::Up),
            "DOWN" => Ok(Self::Down),
            "LEFT" => Ok(Self::Left),
            "RIGHT" => Ok(Self::Right),
            "NONE" => Ok(Self::Stop),
            _ => Err(ProtocolError::InvalidField {
                kind: "direction",
                value: s.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// StartEntry
// ---------------------------------------------------------------------------

/// One agent in a `START` frame: identity, spawn cell, and the algorithm
/// that drives it when no human does.
///
/// Encoded as `agent~x~y~algorithm`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartEntry {
    pub agent: AgentId,
    pub x: i32,
    pub y: i32,
    pub algorithm: String,
}

impl fmt::Display for StartEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = RECORD_SEPARATOR;
        write!(f, "{}{sep}{}{sep}{}{sep}{}", self.agent, self.x, self.y, self.algorithm)
    }
}

impl FromStr for StartEntry {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ProtocolError::InvalidField {
            kind: "start entry",
            value: s.to_string(),
        };
        let parts: Vec<&str> = s.split(RECORD_SEPARATOR).collect();
        let [agent, x, y, algorithm] = parts.as_slice() else {
            return Err(invalid());
        };
        Ok(Self {
            agent: agent.parse()?,
            x: x.parse().map_err(|_| invalid())?,
            y: y.parse().map_err(|_| invalid())?,
            algorithm: (*algorithm).to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Outcome and GameUpdate
// ---------------------------------------------------------------------------

/// How a game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Win,
    Lose,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Win => "WIN",
            Self::Lose => "LOSE",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WIN" => Ok(Self::Win),
            "LOSE" => Ok(Self::Lose),
            _ => Err(ProtocolError::InvalidField {
                kind: "outcome",
                value: s.to_string(),
            }),
        }
    }
}

/// An authoritative change to the game session state.
///
/// Computed only by the authoritative node and applied verbatim everywhere
/// else. Scores and lives are absolute totals, never deltas, so a follower
/// that applies the same updates ends up with the same numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameUpdate {
    /// A ghost is scared for `millis` more milliseconds (0 = back to normal).
    Scare { ghost: AgentId, millis: u64 },

    /// The pellet at a cell was eaten; `score` is the new total.
    Eat { x: i32, y: i32, score: u32 },

    /// An agent was caught. `lives` is the remaining pacman lives; `score`
    /// is present when the death changed it.
    Die {
        agent: AgentId,
        lives: u32,
        score: Option<u32>,
    },

    /// The game is over.
    GameOver { outcome: Outcome, score: u32 },
}

impl GameUpdate {
    pub fn tag(&self) -> Tag {
        match self {
            Self::Scare { .. } => Tag::Scare,
            Self::Eat { .. } => Tag::Eat,
            Self::Die { .. } => Tag::Die,
            Self::GameOver { .. } => Tag::GameOver,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_wire_names_round_trip() {
        for tag in Tag::ALL {
            assert_eq!(Tag::from_wire(tag.as_str()), Some(tag));
        }
        assert_eq!(Tag::from_wire("select"), None);
        assert_eq!(Tag::from_wire("CHAT"), None);
    }

    #[test]
    fn test_only_state_changes_are_authoritative() {
        let authoritative: Vec<Tag> =
            Tag::ALL.into_iter().filter(|t| t.is_authoritative()).collect();
        assert_eq!(
            authoritative,
            vec![Tag::Scare, Tag::Eat, Tag::Die, Tag::GameOver]
        );
    }

    #[test]
    fn test_agent_id_numeric_is_pacman() {
        assert_eq!("0".parse::<AgentId>().unwrap(), AgentId::pacman(0));
        assert_eq!("12".parse::<AgentId>().unwrap(), AgentId::pacman(12));
    }

    #[test]
    fn test_agent_id_name_is_ghost() {
        let red: AgentId = "red".parse().unwrap();
        assert!(red.is_ghost());
        assert_eq!(red.to_string(), "red");
    }

    #[test]
    fn test_agent_id_rejects_separators_and_empty() {
        assert!("".parse::<AgentId>().is_err());
        assert!("red~1".parse::<AgentId>().is_err());
        assert!("two words".parse::<AgentId>().is_err());
        assert!("99999999".parse::<AgentId>().is_err());
    }

    #[test]
    fn test_agent_id_ghost_must_come_from_pool() {
        for name in GHOST_NAMES {
            assert_eq!(name.parse::<AgentId>().unwrap(), AgentId::ghost(name));
        }
        assert!("blinky".parse::<AgentId>().is_err());
        assert!("-1".parse::<AgentId>().is_err());
        assert!(crate::HOST_OWNER.parse::<AgentId>().is_err());
    }

    #[test]
    fn test_direction_none_is_stop() {
        assert_eq!("NONE".parse::<Direction>().unwrap(), Direction::Stop);
        assert_eq!(Direction::Stop.to_string(), "NONE");
        assert!("up".parse::<Direction>().is_err());
    }

    #[test]
    fn test_start_entry_parses_four_parts() {
        let entry: StartEntry = "pink~-2~5~minimax".parse().unwrap();
        assert_eq!(entry.agent, AgentId::ghost("pink"));
        assert_eq!((entry.x, entry.y), (-2, 5));
        assert_eq!(entry.algorithm, "minimax");
        assert_eq!(entry.to_string(), "pink~-2~5~minimax");
    }

    #[test]
    fn test_start_entry_rejects_wrong_shape() {
        assert!("pink~1~2".parse::<StartEntry>().is_err());
        assert!("pink~a~2~dfs".parse::<StartEntry>().is_err());
        assert!("pink~1~2~dfs~extra".parse::<StartEntry>().is_err());
    }
}
