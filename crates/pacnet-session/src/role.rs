//! Session role resolution.
//!
//! There is no election message. Whoever is listening and has at least one
//! peer is the server node; whoever is connected without listening is a
//! client node. The role is recomputed from live connection state every time
//! it is asked for, because peers come and go between any two decisions.

use std::fmt;

use pacnet_transport::LinkState;

/// What this process is in the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Listening with at least one peer: the authoritative relay hub.
    Server,
    /// Connected without listening: a mirror of the server.
    Client,
    /// Nobody to talk to: the local game is its own authority.
    Standalone,
}

impl Role {
    /// Derives the role from the two connection facts it depends on.
    pub fn resolve(listening: bool, has_open_connection: bool) -> Self {
        match (listening, has_open_connection) {
            (true, true) => Self::Server,
            (false, true) => Self::Client,
            (_, false) => Self::Standalone,
        }
    }

    /// Derives the role from a link's current state.
    pub fn of<L: LinkState + ?Sized>(link: &L) -> Self {
        Self::resolve(link.is_listening(), link.has_open_connection())
    }

    /// Returns `true` if this node computes collisions, score and timers.
    pub fn is_authoritative(self) -> bool {
        matches!(self, Self::Server | Self::Standalone)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server => write!(f, "server"),
            Self::Client => write!(f, "client"),
            Self::Standalone => write!(f, "standalone"),
        }
    }
}

/// Returns `true` if `link` currently makes this process the server node.
pub fn is_server_node<L: LinkState + ?Sized>(link: &L) -> bool {
    Role::of(link) == Role::Server
}

/// Returns `true` if `link` currently makes this process a client node.
pub fn is_client_node<L: LinkState + ?Sized>(link: &L) -> bool {
    Role::of(link) == Role::Client
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct FakeLink {
        listening: Cell<bool>,
        connected: Cell<bool>,
    }

    impl LinkState for FakeLink {
        fn is_listening(&self) -> bool {
            self.listening.get()
        }

        fn has_open_connection(&self) -> bool {
            self.connected.get()
        }
    }

    #[test]
    fn test_role_resolve_truth_table() {
        assert_eq!(Role::resolve(true, true), Role::Server);
        assert_eq!(Role::resolve(false, true), Role::Client);
        assert_eq!(Role::resolve(true, false), Role::Standalone);
        assert_eq!(Role::resolve(false, false), Role::Standalone);
    }

    #[test]
    fn test_role_is_recomputed_on_every_query() {
        let link = FakeLink {
            listening: Cell::new(true),
            connected: Cell::new(false),
        };
        assert!(!is_server_node(&link));

        link.connected.set(true);
        assert!(is_server_node(&link));
        assert!(!is_client_node(&link));

        link.listening.set(false);
        assert!(is_client_node(&link));

        link.connected.set(false);
        assert_eq!(Role::of(&link), Role::Standalone);
    }

    #[test]
    fn test_only_client_is_not_authoritative() {
        assert!(Role::Server.is_authoritative());
        assert!(Role::Standalone.is_authoritative());
        assert!(!Role::Client.is_authoritative());
    }
}
