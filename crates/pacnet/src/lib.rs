//! # pacnet
//!
//! Peer-to-peer multiplayer layer for a maze arcade game.
//!
//! Several processes share one maze. Each drives at most one agent (a pacman
//! or a ghost), sees every other agent move, and trusts a single server node
//! for collisions, score, scare timers and the end of the game. There is no
//! election: whoever listens and has peers is the server.
//!
//! ```text
//! pacnet (this crate)     ← Controller, node actor, config, errors
//!   ├── pacnet-game       ← GameState / View seams, Referee
//!   ├── pacnet-session    ← Role, OwnershipTable, LocalSelection
//!   ├── pacnet-protocol   ← tags, AgentId, Message
//!   └── pacnet-transport  ← ConnectionManager, TCP framing
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pacnet::prelude::*;
//!
//! # async fn run() -> Result<(), PacnetError> {
//! let rules = RuleConfig::default();
//! let node = spawn_node(NodeConfig::default(), MemoryGame::new(&rules), MemoryView::new(true));
//! node.listen(4000).await?;
//! node.select(AgentId::pacman(0)).await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod controller;
mod error;
mod node;

pub use config::NodeConfig;
pub use controller::{Controller, NodeSnapshot};
pub use error::PacnetError;
pub use node::{NodeHandle, spawn_node};

pub use pacnet_game as game;
pub use pacnet_protocol as protocol;
pub use pacnet_session as session;
pub use pacnet_transport as transport;

/// Everything a game needs to run a node.
pub mod prelude {
    pub use crate::{NodeConfig, NodeHandle, NodeSnapshot, PacnetError, spawn_node};
    pub use pacnet_game::{GameState, MemoryGame, MemoryView, Pellet, RuleConfig, View};
    pub use pacnet_protocol::{AgentId, Direction, GameUpdate, Outcome, StartEntry};
    pub use pacnet_session::{Role, SelectionState};
    pub use pacnet_transport::{PeerAddr, TransportConfig};
}

/// Installs a `tracing` subscriber for pacnet.
///
/// `RUST_LOG` wins when set; otherwise pacnet crates log at `info`, or at
/// `debug` when `debug` is true. Calling it twice is harmless.
pub fn init_tracing(debug: bool) {
    let fallback = if debug {
        "pacnet=debug,pacnet_transport=debug,pacnet_session=debug,pacnet_game=debug"
    } else {
        "pacnet=info,pacnet_transport=info,pacnet_session=info,pacnet_game=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
