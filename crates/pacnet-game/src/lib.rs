//! Game-facing seams for pacnet.
//!
//! The networking core never draws a sprite or parses a maze. It talks to
//! the rest of the game through two narrow traits and owns one piece of
//! game logic itself:
//!
//! - [`GameState`]: the maze simulation the core reads and feeds updates
//! - [`View`]: one-way notifications plus the incoming-connection gate
//! - [`Referee`]: the authoritative rules for pellets and collisions
//! - [`RuleConfig`]: scoring and timing values
//!
//! [`MemoryGame`] and [`MemoryView`] are small in-memory implementations of
//! the two traits, for headless peers and tests.
//!
//! ```text
//! Controller ──applyAuthoritative──→ GameState ──is_win/is_lose──→ Controller
//!     │                                  ↑
//!     └──LOCATION──→ Referee ──pellet_at─┘
//! ```

mod config;
mod logic;
mod memory;
mod referee;

pub use config::RuleConfig;
pub use logic::{GameState, Pellet, View};
pub use memory::{MemoryGame, MemorySnapshot, MemoryView};
pub use referee::Referee;
