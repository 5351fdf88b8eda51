//! Transport layer for pacnet.
//!
//! Owns every TCP stream the process has to its peers. The rest of the stack
//! never touches a socket: it sends and receives opaque text frames through a
//! [`ConnectionManager`] and learns about connection lifecycle from the
//! [`PeerEvent`] stream the manager produces.
//!
//! ```text
//! Controller (above)  ← PeerEvent stream, PeerLink sends
//!     ↕
//! Transport (this crate)  ← listener, registry, read/write loops
//!     ↕
//! TCP, length-delimited frames
//! ```

mod config;
mod error;
pub mod framing;
mod manager;

pub use config::TransportConfig;
pub use error::TransportError;
pub use manager::{ConnectionManager, PeerEvent};

use std::fmt;
use std::net::SocketAddr;

/// Address of a remote peer. Key for every peer-indexed table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerAddr(pub SocketAddr);

impl PeerAddr {
    /// Returns the underlying socket address.
    pub fn socket_addr(&self) -> SocketAddr {
        self.0
    }
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<SocketAddr> for PeerAddr {
    fn from(addr: SocketAddr) -> Self {
        Self(addr)
    }
}

/// Connection state the session role is derived from.
pub trait LinkState {
    /// Returns `true` while a listening endpoint is bound.
    fn is_listening(&self) -> bool;

    /// Returns `true` if at least one peer connection is registered.
    fn has_open_connection(&self) -> bool;
}

/// Outbound side of the transport as seen by the protocol controller.
///
/// Sends never fail loudly: a frame addressed to a peer that vanished is a
/// normal race with disconnection, so implementations log and return `false`.
pub trait PeerLink: LinkState + Send + Sync + 'static {
    /// Queues a frame for one peer. Returns `true` if it was queued.
    fn send(&self, peer: PeerAddr, frame: &str) -> bool;

    /// Queues a frame for every registered peer except `except`.
    /// Returns how many peers it was queued for.
    fn broadcast_except(&self, frame: &str, except: Option<PeerAddr>) -> usize;

    /// Queues a frame for every registered peer.
    fn broadcast(&self, frame: &str) -> usize {
        self.broadcast_except(frame, None)
    }

    /// Closes the connection to a peer. Safe to call on a closed peer.
    fn close(&self, peer: PeerAddr);

    /// Lists every registered peer.
    fn peers(&self) -> Vec<PeerAddr>;
}
