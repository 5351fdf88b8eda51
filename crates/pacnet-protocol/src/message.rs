//! Typed view of a frame.
//!
//! [`Message::parse`] is where field counts and field syntax get checked;
//! the codec below it only splits on separators.

use std::str::FromStr;

use crate::{
    AgentId, Direction, Frame, GameUpdate, ProtocolError, StartEntry, Tag,
    decode, encode,
};

/// Owner name used in `SELECT_FAIL` when the local host holds the agent.
pub const HOST_OWNER: &str = "host";

/// A decoded protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Accepting node → new peer: "you are in".
    Confirm,

    /// Peer → authoritative node: "I want to control this agent."
    Select { agent: AgentId },

    /// Authoritative node → peer: the selection was granted.
    SelectGood { agent: AgentId },

    /// Authoritative node → peer: the selection was refused.
    /// `owner` names whoever holds the agent.
    SelectFail {
        agent: AgentId,
        owner: Option<String>,
    },

    /// Peer → authoritative node: "I give this agent back to the AI."
    Release { agent: AgentId },

    /// The maze every node should load.
    Map { maze: String },

    /// Authoritative start: maze plus every agent's spawn.
    Start {
        maze: String,
        entries: Vec<StartEntry>,
    },

    /// An agent changed heading.
    Direction {
        agent: AgentId,
        direction: Direction,
    },

    /// An agent reached a cell.
    Location { agent: AgentId, x: i32, y: i32 },

    /// `SCARE`, `EAT`, `DIE` or `GAME_OVER`.
    Update(GameUpdate),

    /// Authoritative node → unready peer: please pick an agent.
    Hurry,
}

impl Message {
    pub fn tag(&self) -> Tag {
        match self {
            Self::Confirm => Tag::Confirm,
            Self::Select { .. } => Tag::Select,
            Self::SelectGood { .. } => Tag::SelectGood,
            Self::SelectFail { .. } => Tag::SelectFail,
            Self::Release { .. } => Tag::Release,
            Self::Map { .. } => Tag::Map,
            Self::Start { .. } => Tag::Start,
            Self::Direction { .. } => Tag::Direction,
            Self::Location { .. } => Tag::Location,
            Self::Update(update) => update.tag(),
            Self::Hurry => Tag::Hurry,
        }
    }

    /// The agent a movement message is about.
    pub fn moved_agent(&self) -> Option<&AgentId> {
        match self {
            Self::Direction { agent, .. } | Self::Location { agent, .. } => Some(agent),
            _ => None,
        }
    }

    /// Encodes the message into a frame.
    pub fn to_frame(&self) -> Frame {
        let tag = self.tag().as_str();
        match self {
            Self::Confirm | Self::Hurry => encode(tag, std::iter::empty::<String>()),
            Self::Select { agent }
            | Self::SelectGood { agent }
            | Self::Release { agent } => encode(tag, [agent.to_string()]),
            Self::SelectFail { agent, owner } => {
                let mut fields = vec![agent.to_string()];
                fields.extend(owner.clone());
                encode(tag, fields)
            }
            Self::Map { maze } => encode(tag, [maze]),
            Self::Start { maze, entries } => encode(
                tag,
                std::iter::once(maze.clone())
                    .chain(entries.iter().map(StartEntry::to_string)),
            ),
            Self::Direction { agent, direction } => {
                encode(tag, [agent.to_string(), direction.to_string()])
            }
            Self::Location { agent, x, y } => {
                encode(tag, [agent.to_string(), x.to_string(), y.to_string()])
            }
            Self::Update(update) => match update {
                GameUpdate::Scare { ghost, millis } => {
                    encode(tag, [ghost.to_string(), millis.to_string()])
                }
                GameUpdate::Eat { x, y, score } => {
                    encode(tag, [x.to_string(), y.to_string(), score.to_string()])
                }
                GameUpdate::Die { agent, lives, score } => {
                    let mut fields = vec![agent.to_string(), lives.to_string()];
                    fields.extend(score.map(|s| s.to_string()));
                    encode(tag, fields)
                }
                GameUpdate::GameOver { outcome, score } => {
                    encode(tag, [outcome.to_string(), score.to_string()])
                }
            },
        }
    }

    /// Interprets a frame.
    ///
    /// Returns `Ok(None)` for an empty frame. Extra trailing fields are
    /// tolerated so older nodes can read frames from newer ones.
    pub fn parse(frame: &str) -> Result<Option<Self>, ProtocolError> {
        let Some((tag_text, fields)) = decode(frame) else {
            return Ok(None);
        };
        let tag = Tag::from_wire(tag_text)
            .ok_or_else(|| ProtocolError::UnknownTag(tag_text.to_string()))?;

        if fields.len() < tag.min_fields() {
            return Err(ProtocolError::MalformedFrame {
                tag,
                reason: format!(
                    "expected at least {} fields, got {}",
                    tag.min_fields(),
                    fields.len()
                ),
            });
        }

        Self::from_fields(tag, &fields)
            .map(Some)
            .map_err(|e| match e {
                ProtocolError::InvalidField { .. } => ProtocolError::MalformedFrame {
                    tag,
                    reason: e.to_string(),
                },
                other => other,
            })
    }

    fn from_fields(tag: Tag, f: &[&str]) -> Result<Self, ProtocolError> {
        let msg = match tag {
            Tag::Confirm => Self::Confirm,
            Tag::Hurry => Self::Hurry,
            Tag::Select => Self::Select { agent: f[0].parse()? },
            Tag::SelectGood => Self::SelectGood { agent: f[0].parse()? },
            Tag::SelectFail => Self::SelectFail {
                agent: f[0].parse()?,
                owner: f.get(1).filter(|o| !o.is_empty()).map(|o| o.to_string()),
            },
            Tag::Release => Self::Release { agent: f[0].parse()? },
            Tag::Map => Self::Map { maze: non_empty("maze", f[0])? },
            Tag::Start => Self::Start {
                maze: non_empty("maze", f[0])?,
                entries: f[1..]
                    .iter()
                    .map(|entry| entry.parse())
                    .collect::<Result<_, _>>()?,
            },
            Tag::Direction => Self::Direction {
                agent: f[0].parse()?,
                direction: f[1].parse()?,
            },
            Tag::Location => Self::Location {
                agent: f[0].parse()?,
                x: number("x", f[1])?,
                y: number("y", f[2])?,
            },
            Tag::Scare => {
                let ghost: AgentId = f[0].parse()?;
                if !ghost.is_ghost() {
                    return Err(ProtocolError::InvalidField {
                        kind: "ghost",
                        value: f[0].to_string(),
                    });
                }
                Self::Update(GameUpdate::Scare {
                    ghost,
                    millis: number("millis", f[1])?,
                })
            }
            Tag::Eat => Self::Update(GameUpdate::Eat {
                x: number("x", f[0])?,
                y: number("y", f[1])?,
                score: number("score", f[2])?,
            }),
            Tag::Die => Self::Update(GameUpdate::Die {
                agent: f[0].parse()?,
                lives: number("lives", f[1])?,
                score: f
                    .get(2)
                    .map(|s| number("score", s))
                    .transpose()?,
            }),
            Tag::GameOver => Self::Update(GameUpdate::GameOver {
                outcome: f[0].parse()?,
                score: number("score", f[1])?,
            }),
        };
        Ok(msg)
    }
}

impl From<GameUpdate> for Message {
    fn from(update: GameUpdate) -> Self {
        Self::Update(update)
    }
}

fn number<T: FromStr>(kind: &'static str, value: &str) -> Result<T, ProtocolError> {
    value.parse().map_err(|_| ProtocolError::InvalidField {
        kind,
        value: value.to_string(),
    })
}

fn non_empty(kind: &'static str, value: &str) -> Result<String, ProtocolError> {
    if value.is_empty() {
        return Err(ProtocolError::InvalidField {
            kind,
            value: String::new(),
        });
    }
    Ok(value.to_string())
}
