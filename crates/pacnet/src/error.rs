//! Unified error type for pacnet.

use pacnet_protocol::{AgentId, ProtocolError};
use pacnet_session::SessionError;
use pacnet_transport::{PeerAddr, TransportError};

/// One error type for every node operation.
///
/// The `#[from]` variants let `?` lift a transport, protocol or session
/// error straight out of a node operation.
#[derive(Debug, thiserror::Error)]
pub enum PacnetError {
    /// Listening or connecting failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame could not be understood.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Ownership arbitration refused the request.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A config could not be loaded or is out of range.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The operation is reserved for the server or a standalone node.
    #[error("only the authoritative node can {0}")]
    NotAuthoritative(&'static str),

    /// Some peers have not picked an agent yet. They were sent `HURRY`.
    #[error("{} peer(s) have not picked an agent", .0.len())]
    PeersUnready(Vec<PeerAddr>),

    /// `start_game` was called before `choose_map`.
    #[error("no maze has been chosen")]
    MazeNotChosen,

    /// This node may not report movement for the agent.
    #[error("agent {0} is not driven by this node")]
    NotControlled(AgentId),

    /// The node actor is gone.
    #[error("node has stopped")]
    NodeStopped,
}
