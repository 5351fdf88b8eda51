use std::net::SocketAddr;

use crate::PeerAddr;

/// Errors that can occur in the transport layer.
///
/// The first four variants come from connection setup and are returned to
/// the caller of [`ConnectionManager::start_listening`] or
/// [`ConnectionManager::connect_to`]. The last two only show up in logs:
/// a send to a vanished or slow peer is absorbed by the manager.
///
/// [`ConnectionManager::start_listening`]: crate::ConnectionManager::start_listening
/// [`ConnectionManager::connect_to`]: crate::ConnectionManager::connect_to
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Binding the listening endpoint failed (port in use, no privilege).
    #[error("cannot listen: {0}")]
    Bind(#[source] std::io::Error),

    /// The remote host name could not be resolved to an address.
    #[error("cannot resolve {host}: {source}")]
    Resolution {
        host: String,
        #[source]
        source: std::io::Error,
    },

    /// The remote endpoint refused or did not answer.
    #[error("cannot reach {addr}: {source}")]
    Unreachable {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The target is this process's own listening endpoint.
    #[error("refusing to connect to own listening endpoint {0}")]
    SelfConnect(SocketAddr),

    /// No live connection exists for the peer.
    #[error("peer {0} has no live connection")]
    PeerGone(PeerAddr),

    /// The peer's outbound queue is full; the frame was dropped.
    #[error("outbound queue for {0} is full")]
    Backpressure(PeerAddr),
}
