//! Error types for the protocol layer.
//!
//! Decoding itself never fails: any string splits into a tag and fields.
//! These errors come from interpreting a frame as a [`Message`](crate::Message).
//! The controller logs and drops them; they never travel back over the wire.

use crate::Tag;

/// Errors that can occur while interpreting a frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The frame's tag is known but its fields are missing or unparseable.
    #[error("malformed {tag} frame: {reason}")]
    MalformedFrame { tag: Tag, reason: String },

    /// The frame's tag is not part of the vocabulary.
    #[error("unknown tag {0:?}")]
    UnknownTag(String),

    /// A single field could not be parsed.
    ///
    /// Returned by the `FromStr` impls of the field types; wrapped into
    /// [`ProtocolError::MalformedFrame`] when it happens inside a frame.
    #[error("invalid {kind} {value:?}")]
    InvalidField { kind: &'static str, value: String },
}
