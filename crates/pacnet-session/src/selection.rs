//! The local host's agent selection.
//!
//! ```text
//!            begin()                confirm()
//! Unclaimed ────────→ PendingLocal ──────────→ Claimed
//!     ↑                    │ reject()             │
//!     │                    ▼                      │
//!     └──── release() ── previous ←───────────────┘
//! ```
//!
//! A node that is its own authority (server or standalone) skips the
//! pending step and calls [`LocalSelection::claim`] directly. A client
//! parks in `PendingLocal` until its server answers with `SELECT_GOOD` or
//! `SELECT_FAIL`; on failure the previous selection comes back.

use pacnet_protocol::AgentId;

/// Where the local selection negotiation stands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SelectionState {
    /// No agent selected; everything is AI-driven locally.
    #[default]
    Unclaimed,
    /// Tentatively selected, waiting for the server's verdict.
    PendingLocal {
        agent: AgentId,
        previous: Option<AgentId>,
    },
    /// Confirmed.
    Claimed(AgentId),
}

/// Local selection state machine.
#[derive(Debug, Clone, Default)]
pub struct LocalSelection {
    state: SelectionState,
}

impl LocalSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    /// The agent this process drives, tentative or confirmed.
    pub fn current(&self) -> Option<&AgentId> {
        match &self.state {
            SelectionState::Unclaimed => None,
            SelectionState::PendingLocal { agent, .. } => Some(agent),
            SelectionState::Claimed(agent) => Some(agent),
        }
    }

    /// The agent this process drives, only once confirmed.
    pub fn claimed(&self) -> Option<&AgentId> {
        match &self.state {
            SelectionState::Claimed(agent) => Some(agent),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, SelectionState::PendingLocal { .. })
    }

    /// Tentatively selects `agent` while a server decides.
    ///
    /// A second `begin` before the verdict keeps the original fallback, so a
    /// rejection always lands on the last confirmed selection.
    pub fn begin(&mut self, agent: AgentId) {
        let previous = match std::mem::take(&mut self.state) {
            SelectionState::Unclaimed => None,
            SelectionState::PendingLocal { previous, .. } => previous,
            SelectionState::Claimed(current) => Some(current),
        };
        self.state = SelectionState::PendingLocal { agent, previous };
    }

    /// Selects `agent` outright. Used when this node is its own authority.
    pub fn claim(&mut self, agent: AgentId) {
        self.state = SelectionState::Claimed(agent);
    }

    /// Applies a `SELECT_GOOD`. Returns `false` if it does not match the
    /// pending selection, in which case nothing changes.
    pub fn confirm(&mut self, agent: &AgentId) -> bool {
        match &self.state {
            SelectionState::PendingLocal { agent: pending, .. } if pending == agent => {
                self.state = SelectionState::Claimed(agent.clone());
                true
            }
            _ => false,
        }
    }

    /// Applies a `SELECT_FAIL`, reverting to the previous selection.
    ///
    /// Returns `Some(previous)` (which may itself be `None`) if the
    /// rejection matched the pending selection, or `None` if it was stale.
    pub fn reject(&mut self, agent: &AgentId) -> Option<Option<AgentId>> {
        match &self.state {
            SelectionState::PendingLocal { agent: pending, .. } if pending == agent => {}
            _ => return None,
        }
        let SelectionState::PendingLocal { previous, .. } = std::mem::take(&mut self.state) else {
            return None;
        };
        self.state = match &previous {
            Some(agent) => SelectionState::Claimed(agent.clone()),
            None => SelectionState::Unclaimed,
        };
        Some(previous)
    }

    /// Drops the selection. Returns the agent that was held, if any.
    pub fn release(&mut self) -> Option<AgentId> {
        match std::mem::take(&mut self.state) {
            SelectionState::Unclaimed => None,
            SelectionState::PendingLocal { agent, .. } | SelectionState::Claimed(agent) => {
                Some(agent)
            }
        }
    }

    /// Turns a pending selection into a confirmed one.
    ///
    /// Used when the server disappears: with nobody left to ask, the local
    /// game is its own authority and the tentative choice stands.
    pub fn settle(&mut self) {
        if let SelectionState::PendingLocal { agent, .. } = &self.state {
            self.state = SelectionState::Claimed(agent.clone());
        }
    }
}
