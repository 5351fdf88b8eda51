//! The ownership table: which peer controls which agent.
//!
//! Two maps are kept in lockstep, one per direction, so both "who owns red?"
//! and "what does this peer own?" are O(1). Every mutation goes through a
//! method here and updates both maps, which keeps the table bidirectional:
//! `by_agent[a] == p` exactly when `by_peer[p] == a`.
//!
//! The local host's own selection is not stored here. Callers pass it in
//! when arbitrating, so it acts as a third claimant without ever appearing
//! in either map.
//!
//! # Concurrency note
//!
//! `OwnershipTable` is a plain struct with no interior locking. It is owned
//! by the controller actor and only ever touched from that one task.

use std::collections::HashMap;
use std::fmt;

use pacnet_protocol::{AgentId, HOST_OWNER};
use pacnet_transport::PeerAddr;

use crate::SessionError;

/// Whoever holds an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Owner {
    /// The local host, through its own selection.
    Host,
    /// A connected peer.
    Peer(PeerAddr),
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => f.write_str(HOST_OWNER),
            Self::Peer(peer) => write!(f, "{peer}"),
        }
    }
}

/// Bidirectional agent ↔ peer mapping.
#[derive(Debug, Default)]
pub struct OwnershipTable {
    by_agent: HashMap<AgentId, PeerAddr>,
    by_peer: HashMap<PeerAddr, AgentId>,
}

impl OwnershipTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the peer controlling `agent`, or `None` if the AI drives it.
    pub fn owner_of(&self, agent: &AgentId) -> Option<PeerAddr> {
        self.by_agent.get(agent).copied()
    }

    /// Returns the agent `peer` controls, if it has picked one.
    pub fn agent_of(&self, peer: &PeerAddr) -> Option<&AgentId> {
        self.by_peer.get(peer)
    }

    /// Works out who, if anyone, already holds `agent`.
    ///
    /// `local` is the local host's current selection.
    pub fn holder(&self, agent: &AgentId, local: Option<&AgentId>) -> Option<Owner> {
        if local == Some(agent) {
            return Some(Owner::Host);
        }
        self.owner_of(agent).map(Owner::Peer)
    }

    /// Gives `agent` to `peer`, releasing whatever `peer` held before.
    ///
    /// Returns the agent that was released to make room, if any. Granting a
    /// peer the agent it already holds is a no-op.
    ///
    /// # Errors
    /// Returns [`SessionError::OwnershipConflict`] naming the holder if the
    /// local host or another peer already controls `agent`. The table is
    /// left untouched in that case.
    pub fn grant(
        &mut self,
        peer: PeerAddr,
        agent: AgentId,
        local: Option<&AgentId>,
    ) -> Result<Option<AgentId>, SessionError> {
        match self.holder(&agent, local) {
            Some(Owner::Peer(current)) if current == peer => return Ok(None),
            Some(owner) => {
                return Err(SessionError::OwnershipConflict { agent, owner });
            }
            None => {}
        }

        let released = self.release_peer(&peer);
        tracing::debug!(%peer, %agent, ?released, "ownership granted");
        self.by_agent.insert(agent.clone(), peer);
        self.by_peer.insert(peer, agent);
        Ok(released)
    }

    /// Frees whatever agent `peer` holds. Returns it, if there was one.
    pub fn release_peer(&mut self, peer: &PeerAddr) -> Option<AgentId> {
        let agent = self.by_peer.remove(peer)?;
        self.by_agent.remove(&agent);
        Some(agent)
    }

    /// Frees `agent` on behalf of `peer`.
    ///
    /// # Errors
    /// Returns [`SessionError::NotOwner`] if `peer` does not hold `agent`.
    pub fn release_agent(
        &mut self,
        peer: PeerAddr,
        agent: &AgentId,
    ) -> Result<(), SessionError> {
        if self.owner_of(agent) != Some(peer) {
            return Err(SessionError::NotOwner {
                peer,
                agent: agent.clone(),
            });
        }
        self.release_peer(&peer);
        Ok(())
    }

    /// Returns `true` if `peer` is allowed to move `agent`.
    pub fn controls(&self, peer: &PeerAddr, agent: &AgentId) -> bool {
        self.by_peer.get(peer) == Some(agent)
    }

    /// All ownership pairs, sorted by agent.
    pub fn entries(&self) -> Vec<(AgentId, PeerAddr)> {
        let mut entries: Vec<(AgentId, PeerAddr)> = self
            .by_agent
            .iter()
            .map(|(agent, peer)| (agent.clone(), *peer))
            .collect();
        entries.sort();
        entries
    }

    pub fn len(&self) -> usize {
        self.by_agent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_agent.is_empty()
    }

    /// Checks that both directions agree.
    pub fn is_consistent(&self) -> bool {
        self.by_agent.len() == self.by_peer.len()
            && self
                .by_agent
                .iter()
                .all(|(agent, peer)| self.by_peer.get(peer) == Some(agent))
    }
}

// =========================================================================
// Tests
// =========================================================================
