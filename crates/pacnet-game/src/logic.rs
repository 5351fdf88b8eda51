//! The `GameState` and `View` traits: what the networking core needs from
//! the rest of the game.
//!
//! The core never mutates maze cells directly. Everything it learns from the
//! wire or computes as the authority is handed to a [`GameState`] as a
//! command, and everything the player should hear about goes to a [`View`].

use pacnet_protocol::{AgentId, Direction, GameUpdate, StartEntry};
use pacnet_transport::PeerAddr;

/// What occupies a maze cell, as far as scoring is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pellet {
    Dot,
    Power,
}

/// The maze simulation, owned by the controller.
///
/// Every method is called from the controller's task, never concurrently.
pub trait GameState: Send + 'static {
    /// Applies a `SCARE`, `EAT`, `DIE` or `GAME_OVER` verbatim.
    ///
    /// Scores and lives in the update are absolute, so a follower ends up
    /// with exactly the authority's numbers.
    fn apply_authoritative(&mut self, update: &GameUpdate);

    /// Returns `true` once every pellet is gone.
    fn is_win(&self) -> bool;

    /// Returns `true` once pacman is out of lives.
    fn is_lose(&self) -> bool;

    fn current_score(&self) -> u32;

    fn current_lives(&self) -> u32;

    /// The pellet at a cell, if one is still there.
    fn pellet_at(&self, x: i32, y: i32) -> Option<Pellet>;

    /// Loads a maze by name, ahead of a `START`.
    fn load_maze(&mut self, maze: &str);

    /// Instantiates every agent of a `START`.
    ///
    /// `self_agent` is the one this process drives; the rest are either
    /// remote-controlled or AI-driven.
    fn spawn(&mut self, maze: &str, entries: &[StartEntry], self_agent: Option<&AgentId>);

    /// Changes an agent's heading.
    fn steer(&mut self, agent: &AgentId, direction: Direction);

    /// Moves an agent to a cell.
    fn place(&mut self, agent: &AgentId, x: i32, y: i32);

    /// Hands an agent back to the AI after its owner left or released it.
    fn release_agent(&mut self, _agent: &AgentId) {}

    /// Restarts the game locally after the server went away.
    fn restart_standalone(&mut self);
}

/// The user-facing layer. Strictly one-way, except the incoming gate.
pub trait View: Send + 'static {
    /// Shows a message to the player.
    fn notify(&mut self, text: &str);

    /// Asks whether to accept a peer connecting on our listening `port`.
    fn confirm_incoming(&mut self, peer: PeerAddr, port: u16) -> bool;

    /// Tells the player that `peer` has not picked an agent yet.
    fn prompt_agent_unready(&mut self, peer: PeerAddr);
}
