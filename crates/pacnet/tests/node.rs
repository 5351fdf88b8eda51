//! End-to-end tests: real nodes and raw peers on loopback sockets.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use pacnet::game::MemorySnapshot;
use pacnet::prelude::*;
use pacnet::transport::{TransportError, framing};
use tokio::net::TcpStream;
use tokio::time::{Instant, sleep, timeout};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

// =========================================================================
// Helpers
// =========================================================================

const DEADLINE: Duration = Duration::from_secs(5);

struct Peer {
    node: NodeHandle,
    game: MemoryGame,
    view: MemoryView,
}

fn peer_with(game: MemoryGame) -> Peer {
    let view = MemoryView::new(true);
    let node = spawn_node(NodeConfig::loopback(), game.clone(), view.clone());
    Peer { node, game, view }
}

fn peer() -> Peer {
    peer_with(MemoryGame::new(&RuleConfig::default()))
}

/// A bare TCP peer speaking the wire protocol by hand.
struct RawPeer {
    frames: Framed<TcpStream, LengthDelimitedCodec>,
}

impl RawPeer {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let codec = framing::codec(framing::DEFAULT_MAX_FRAME_LENGTH);
        Self {
            frames: Framed::new(stream, codec),
        }
    }

    /// Connects and consumes the `CONFIRM` greeting.
    async fn join(addr: SocketAddr) -> Self {
        let mut raw = Self::connect(addr).await;
        assert_eq!(raw.recv().await, "CONFIRM");
        raw
    }

    fn local_addr(&self) -> SocketAddr {
        self.frames.get_ref().local_addr().unwrap()
    }

    async fn send(&mut self, text: &str) {
        self.frames
            .send(Bytes::from(text.to_string()))
            .await
            .unwrap();
    }

    async fn recv(&mut self) -> String {
        let bytes = timeout(DEADLINE, self.frames.next())
            .await
            .expect("frame should arrive in time")
            .expect("connection should be open")
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn expect_silence(&mut self, window: Duration) {
        if let Ok(Some(frame)) = timeout(window, self.frames.next()).await {
            panic!("expected no frame, got {frame:?}");
        }
    }

    async fn expect_closed(&mut self) {
        let next = timeout(DEADLINE, self.frames.next())
            .await
            .expect("close should arrive in time");
        assert!(next.is_none() || next.is_some_and(|r| r.is_err()));
    }
}

async fn wait_until(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = Instant::now() + DEADLINE;
    while !check() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        sleep(Duration::from_millis(10)).await;
    }
}

async fn wait_snapshot(
    node: &NodeHandle,
    what: &str,
    check: impl Fn(&NodeSnapshot) -> bool,
) -> NodeSnapshot {
    let deadline = Instant::now() + DEADLINE;
    loop {
        let snap = node.snapshot().await.unwrap();
        if check(&snap) {
            return snap;
        }
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        sleep(Duration::from_millis(10)).await;
    }
}

async fn wait_game(
    game: &MemoryGame,
    what: &str,
    check: impl Fn(&MemorySnapshot) -> bool,
) -> MemorySnapshot {
    let mut snap = game.snapshot();
    wait_until(what, || {
        snap = game.snapshot();
        check(&snap)
    })
    .await;
    snap
}

async fn listening(peer: &Peer) -> SocketAddr {
    peer.node.listen(0).await.unwrap()
}

fn red() -> AgentId {
    AgentId::ghost("red")
}

fn pacman() -> AgentId {
    AgentId::pacman(0)
}

fn entries() -> Vec<StartEntry> {
    vec![
        StartEntry {
            agent: pacman(),
            x: 0,
            y: 0,
            algorithm: "greedy".into(),
        },
        StartEntry {
            agent: red(),
            x: 5,
            y: 5,
            algorithm: "minimax".into(),
        },
    ]
}

// =========================================================================
// Connection lifecycle
// =========================================================================

#[tokio::test]
async fn test_accepted_peer_is_confirmed_and_sees_chosen_map() {
    let host = peer();
    let addr = listening(&host).await;
    host.node.choose_map("classic").await.unwrap();

    let mut raw = RawPeer::join(addr).await;
    assert_eq!(raw.recv().await, "MAP,classic");
    assert_eq!(host.view.incoming_requests().len(), 1);
    assert_eq!(host.view.incoming_requests()[0].1, addr.port());
}

#[tokio::test]
async fn test_rejected_peer_is_closed_without_registration() {
    let host = peer();
    host.view.set_accept_incoming(false);
    let addr = listening(&host).await;

    let mut raw = RawPeer::connect(addr).await;
    raw.expect_closed().await;

    let snap = host.node.snapshot().await.unwrap();
    assert_eq!(snap.role, Role::Standalone);
}

#[tokio::test]
async fn test_connecting_to_own_listener_is_refused() {
    let host = peer();
    let addr = listening(&host).await;

    let err = host.node.connect("127.0.0.1", addr.port()).await.unwrap_err();
    assert!(matches!(
        err,
        PacnetError::Transport(TransportError::SelfConnect(_))
    ));
}

#[tokio::test]
async fn test_roles_follow_connection_state() {
    let host = peer();
    let guest = peer();
    assert_eq!(host.node.snapshot().await.unwrap().role, Role::Standalone);

    let addr = listening(&host).await;
    assert_eq!(host.node.snapshot().await.unwrap().role, Role::Standalone);

    let upstream = guest.node.connect("127.0.0.1", addr.port()).await.unwrap();
    let snap = guest.node.snapshot().await.unwrap();
    assert_eq!(snap.role, Role::Client);
    assert_eq!(snap.upstream, Some(upstream));

    wait_snapshot(&host.node, "host to become server", |s| s.role == Role::Server).await;
}

#[tokio::test]
async fn test_reconnecting_to_same_server_keeps_upstream() {
    let host = peer();
    let guest = peer();
    let addr = listening(&host).await;

    let first = guest.node.connect("127.0.0.1", addr.port()).await.unwrap();
    let second = guest.node.connect("127.0.0.1", addr.port()).await.unwrap();
    assert_eq!(first, second);

    // Give a stray Closed from the replaced connection time to show up.
    sleep(Duration::from_millis(150)).await;
    let snap = guest.node.snapshot().await.unwrap();
    assert_eq!(snap.role, Role::Client);
    assert_eq!(snap.upstream, Some(second));
    assert_eq!(guest.game.snapshot().standalone_restarts, 0);

    guest.node.select(red()).await.unwrap();
    wait_snapshot(&guest.node, "red to be confirmed", |s| {
        s.selection == SelectionState::Claimed(red())
    })
    .await;
    let owners = wait_snapshot(&host.node, "host to record red", |s| s.owners.len() == 1)
        .await
        .owners;
    assert_eq!(owners[0].0, red());
}

#[tokio::test]
async fn test_shutdown_stops_the_handle() {
    let host = peer();
    host.node.shutdown().await.unwrap();
    let err = host.node.snapshot().await.unwrap_err();
    assert!(matches!(err, PacnetError::NodeStopped));
}

// =========================================================================
// Selection
// =========================================================================

#[tokio::test]
async fn test_raw_peer_select_is_granted() {
    let host = peer();
    let addr = listening(&host).await;
    let mut raw = RawPeer::join(addr).await;

    raw.send("SELECT,red").await;
    assert_eq!(raw.recv().await, "SELECT_GOOD,red");

    let snap = host.node.snapshot().await.unwrap();
    assert_eq!(snap.owners, vec![(red(), PeerAddr(raw.local_addr()))]);
}

#[tokio::test]
async fn test_concurrent_selects_have_exactly_one_winner() {
    let host = peer();
    let addr = listening(&host).await;
    let mut first = RawPeer::join(addr).await;
    let mut second = RawPeer::join(addr).await;

    first.send("SELECT,red").await;
    second.send("SELECT,red").await;
    let answers = [first.recv().await, second.recv().await];

    let winners: Vec<usize> = (0..2).filter(|i| answers[*i] == "SELECT_GOOD,red").collect();
    assert_eq!(winners.len(), 1, "answers: {answers:?}");
    let winner = winners[0];
    let loser = 1 - winner;
    let winner_addr = [first.local_addr(), second.local_addr()][winner];
    assert_eq!(answers[loser], format!("SELECT_FAIL,red,{winner_addr}"));
}

#[tokio::test]
async fn test_node_client_selection_is_confirmed() {
    let host = peer();
    let guest = peer();
    let addr = listening(&host).await;
    guest.node.connect("127.0.0.1", addr.port()).await.unwrap();

    guest.node.select(red()).await.unwrap();
    wait_snapshot(&guest.node, "red to be confirmed", |s| {
        s.selection == SelectionState::Claimed(red())
    })
    .await;

    let snap = host.node.snapshot().await.unwrap();
    assert_eq!(snap.owners.len(), 1);
    assert_eq!(snap.owners[0].0, red());
}

#[tokio::test]
async fn test_node_client_selection_of_host_agent_is_refused() {
    let host = peer();
    let guest = peer();
    let addr = listening(&host).await;
    host.node.select(red()).await.unwrap();
    guest.node.connect("127.0.0.1", addr.port()).await.unwrap();

    guest.node.select(red()).await.unwrap();
    wait_snapshot(&guest.node, "selection to revert", |s| {
        s.selection == SelectionState::Unclaimed
    })
    .await;
    wait_until("refusal notice", || {
        guest.view.notices().iter().any(|n| n.contains("host"))
    })
    .await;
    assert!(host.node.snapshot().await.unwrap().owners.is_empty());
}

// =========================================================================
// Star relay
// =========================================================================

#[tokio::test]
async fn test_relay_reaches_others_but_never_the_sender() {
    let host = peer();
    let addr = listening(&host).await;
    let mut owner = RawPeer::join(addr).await;
    let mut watcher = RawPeer::join(addr).await;
    owner.send("SELECT,red").await;
    assert_eq!(owner.recv().await, "SELECT_GOOD,red");
    watcher.send("SELECT,0").await;
    assert_eq!(watcher.recv().await, "SELECT_GOOD,0");

    owner.send("LOCATION,red,3,4").await;
    assert_eq!(watcher.recv().await, "LOCATION,red,3,4");
    owner.expect_silence(Duration::from_millis(200)).await;

    wait_game(&host.game, "host to mirror red", |s| {
        s.positions.get(&red()) == Some(&(3, 4))
    })
    .await;
}

#[tokio::test]
async fn test_spoofed_movement_is_not_relayed() {
    let host = peer();
    let addr = listening(&host).await;
    let mut owner = RawPeer::join(addr).await;
    let mut spoofer = RawPeer::join(addr).await;
    owner.send("SELECT,red").await;
    assert_eq!(owner.recv().await, "SELECT_GOOD,red");

    spoofer.send("DIRECTION,red,UP").await;
    owner.expect_silence(Duration::from_millis(200)).await;
    assert!(!host.game.snapshot().headings.contains_key(&red()));
}

#[tokio::test]
async fn test_node_client_sees_relayed_movement() {
    let host = peer();
    let guest = peer();
    let addr = listening(&host).await;
    guest.node.connect("127.0.0.1", addr.port()).await.unwrap();
    let mut raw = RawPeer::join(addr).await;
    raw.send("SELECT,red").await;
    assert_eq!(raw.recv().await, "SELECT_GOOD,red");

    raw.send("DIRECTION,red,LEFT").await;
    wait_game(&guest.game, "guest to see red turn", |s| {
        s.headings.get(&red()) == Some(&Direction::Left)
    })
    .await;
}

// =========================================================================
// Disconnects
// =========================================================================

#[tokio::test]
async fn test_owner_disconnect_frees_agent_for_another_peer() {
    let host = peer();
    let addr = listening(&host).await;
    let mut owner = RawPeer::join(addr).await;
    let mut other = RawPeer::join(addr).await;
    owner.send("SELECT,red").await;
    assert_eq!(owner.recv().await, "SELECT_GOOD,red");

    drop(owner);
    wait_snapshot(&host.node, "red to be released", |s| s.owners.is_empty()).await;
    wait_game(&host.game, "red back under AI", |s| s.released.contains(&red())).await;

    other.send("SELECT,red").await;
    assert_eq!(other.recv().await, "SELECT_GOOD,red");
}

#[tokio::test]
async fn test_client_continues_standalone_when_server_leaves() {
    let host = peer();
    let guest = peer();
    let addr = listening(&host).await;
    guest.node.connect("127.0.0.1", addr.port()).await.unwrap();
    guest.node.select(red()).await.unwrap();
    wait_snapshot(&guest.node, "red to be confirmed", |s| {
        s.selection == SelectionState::Claimed(red())
    })
    .await;

    host.node.shutdown().await.unwrap();

    let snap = wait_snapshot(&guest.node, "guest to go standalone", |s| {
        s.upstream.is_none()
    })
    .await;
    assert_eq!(snap.role, Role::Standalone);
    assert_eq!(snap.selection, SelectionState::Claimed(red()));
    assert_eq!(guest.game.snapshot().standalone_restarts, 1);
    assert!(!guest.view.notices().is_empty());
}

// =========================================================================
// Authority
// =========================================================================

#[tokio::test]
async fn test_start_with_unready_peer_sends_hurry() {
    let host = peer();
    let addr = listening(&host).await;
    let mut raw = RawPeer::join(addr).await;
    host.node.choose_map("classic").await.unwrap();
    assert_eq!(raw.recv().await, "MAP,classic");

    let err = host.node.start_game(entries()).await.unwrap_err();
    assert!(matches!(err, PacnetError::PeersUnready(ref peers) if peers.len() == 1));
    assert_eq!(raw.recv().await, "HURRY");
    assert_eq!(host.view.unready_prompts(), vec![PeerAddr(raw.local_addr())]);
}

#[tokio::test]
async fn test_client_cannot_start_the_game() {
    let host = peer();
    let guest = peer();
    let addr = listening(&host).await;
    guest.node.connect("127.0.0.1", addr.port()).await.unwrap();

    let err = guest.node.start_game(entries()).await.unwrap_err();
    assert!(matches!(err, PacnetError::NotAuthoritative(_)));
}

#[tokio::test]
async fn test_server_decides_and_client_mirrors_a_full_game() {
    let host = peer_with(
        MemoryGame::new(&RuleConfig::default())
            .with_pellet(1, 0, Pellet::Dot)
            .with_pellet(2, 0, Pellet::Dot),
    );
    let guest = peer();
    let addr = listening(&host).await;
    host.node.select(pacman()).await.unwrap();
    guest.node.connect("127.0.0.1", addr.port()).await.unwrap();
    guest.node.select(red()).await.unwrap();
    wait_snapshot(&guest.node, "red to be confirmed", |s| {
        s.selection == SelectionState::Claimed(red())
    })
    .await;

    host.node.choose_map("classic").await.unwrap();
    host.node.start_game(entries()).await.unwrap();
    let snap = wait_game(&guest.game, "guest to start", |s| s.started).await;
    assert_eq!(snap.maze.as_deref(), Some("classic"));
    assert_eq!(snap.self_agent, Some(red()));

    host.node.report_location(pacman(), 1, 0).await.unwrap();
    wait_game(&guest.game, "guest to mirror the eat", |s| s.score == 10).await;

    host.node.report_location(pacman(), 2, 0).await.unwrap();
    let snap = wait_game(&guest.game, "guest to see the win", |s| s.outcome.is_some()).await;
    assert_eq!(snap.outcome, Some(Outcome::Win));
    assert_eq!(snap.score, 20);
    assert_eq!(
        snap.applied,
        vec![
            GameUpdate::Eat { x: 1, y: 0, score: 10 },
            GameUpdate::Eat { x: 2, y: 0, score: 20 },
            GameUpdate::GameOver { outcome: Outcome::Win, score: 20 },
        ]
    );
    assert!(host.node.snapshot().await.unwrap().game_over);
}

#[tokio::test]
async fn test_client_reports_reach_server_but_not_as_verdicts() {
    let host = peer_with(MemoryGame::new(&RuleConfig::default()).with_pellet(1, 0, Pellet::Dot));
    let guest = peer_with(MemoryGame::new(&RuleConfig::default()).with_pellet(1, 0, Pellet::Dot));
    let addr = listening(&host).await;
    guest.node.connect("127.0.0.1", addr.port()).await.unwrap();
    guest.node.select(pacman()).await.unwrap();
    wait_snapshot(&guest.node, "pacman to be confirmed", |s| {
        s.selection == SelectionState::Claimed(pacman())
    })
    .await;
    host.node.choose_map("classic").await.unwrap();
    host.node.start_game(entries()).await.unwrap();
    wait_game(&guest.game, "guest to start", |s| s.started).await;

    guest.node.report_location(pacman(), 1, 0).await.unwrap();

    // The server judges the move and the client applies its verdict.
    wait_game(&host.game, "host to score", |s| s.score == 10).await;
    let snap = wait_game(&guest.game, "guest to mirror", |s| s.outcome.is_some()).await;
    assert_eq!(snap.applied[0], GameUpdate::Eat { x: 1, y: 0, score: 10 });
}
