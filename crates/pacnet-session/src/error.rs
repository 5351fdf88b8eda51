//! Error types for the session layer.

use pacnet_protocol::AgentId;
use pacnet_transport::PeerAddr;

use crate::Owner;

/// Errors from ownership arbitration.
///
/// Neither is a local fault: the controller turns them into a `SELECT_FAIL`
/// for the requesting peer, or logs and drops the offending frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Somebody else already controls the agent.
    #[error("agent {agent} is already owned by {owner}")]
    OwnershipConflict { agent: AgentId, owner: Owner },

    /// A peer acted on an agent it does not control.
    #[error("{peer} does not own agent {agent}")]
    NotOwner { peer: PeerAddr, agent: AgentId },
}
