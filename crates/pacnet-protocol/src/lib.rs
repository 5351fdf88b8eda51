//! Wire protocol for pacnet.
//!
//! - **Codec** ([`encode`], [`decode`], [`Frame`]): comma-separated text,
//!   one record per frame, tag first.
//! - **Types** ([`Tag`], [`AgentId`], [`Direction`], [`StartEntry`],
//!   [`GameUpdate`]): what the fields mean.
//! - **Messages** ([`Message`]): a frame checked against its tag's grammar.
//! - **Errors** ([`ProtocolError`]): malformed or unknown frames.
//!
//! The protocol layer knows nothing about sockets or peers. Transport hands
//! it text, it hands back typed messages.
//!
//! ```text
//! Transport (text frames) → Protocol (Message) → Controller (arbitration)
//! ```

mod codec;
mod error;
mod message;
mod types;

pub use codec::{FIELD_SEPARATOR, Frame, RECORD_SEPARATOR, decode, encode};
pub use error::ProtocolError;
pub use message::{HOST_OWNER, Message};
pub use types::{
    AgentId, Direction, GHOST_NAMES, GameUpdate, Outcome, StartEntry, Tag,
};
