//! Session layer for pacnet.
//!
//! This crate answers three questions the controller asks on every frame:
//!
//! 1. **What am I?** ([`Role`]) derived fresh from connection state
//! 2. **Who drives which agent?** ([`OwnershipTable`]) with the local
//!    host's selection as a third claimant
//! 3. **What have I picked?** ([`LocalSelection`]) including the pending
//!    state a client sits in while its server decides
//!
//! # How it fits in the stack
//!
//! ```text
//! Controller (above)  ← arbitrates SELECT, gates relays and authority
//!     ↕
//! Session Layer (this crate)  ← roles, ownership, local selection
//!     ↕
//! Protocol + Transport (below)  ← AgentId, PeerAddr, LinkState
//! ```

mod error;
mod ownership;
mod role;
mod selection;

pub use error::SessionError;
pub use ownership::{Owner, OwnershipTable};
pub use role::{Role, is_client_node, is_server_node};
pub use selection::{LocalSelection, SelectionState};
