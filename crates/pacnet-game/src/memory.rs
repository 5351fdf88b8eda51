//! In-memory `GameState` and `View` for headless peers and tests.
//!
//! Both are cheap handles around shared state, so a test can keep a clone
//! and inspect what the controller did after handing the original over.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use pacnet_protocol::{AgentId, Direction, GameUpdate, Outcome, StartEntry};
use pacnet_transport::PeerAddr;
use parking_lot::Mutex;

use crate::{GameState, Pellet, RuleConfig, View};

// ---------------------------------------------------------------------------
// MemoryGame
// ---------------------------------------------------------------------------

/// Everything a [`MemoryGame`] knows, copied out for inspection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemorySnapshot {
    pub maze: Option<String>,
    pub started: bool,
    pub self_agent: Option<AgentId>,
    pub score: u32,
    pub lives: u32,
    pub positions: BTreeMap<AgentId, (i32, i32)>,
    pub headings: BTreeMap<AgentId, Direction>,
    pub scared: BTreeSet<AgentId>,
    pub pellets_left: usize,
    /// Every authoritative update, in application order.
    pub applied: Vec<GameUpdate>,
    pub outcome: Option<Outcome>,
    /// Agents handed back to the AI, in order.
    pub released: Vec<AgentId>,
    pub standalone_restarts: usize,
}

#[derive(Debug)]
struct GameInner {
    view: MemorySnapshot,
    layout: HashMap<(i32, i32), Pellet>,
    pellets: HashMap<(i32, i32), Pellet>,
    starting_lives: u32,
}

impl GameInner {
    fn reset_round(&mut self) {
        self.pellets = self.layout.clone();
        self.view.pellets_left = self.pellets.len();
        self.view.score = 0;
        self.view.lives = self.starting_lives;
        self.view.scared.clear();
        self.view.outcome = None;
    }
}

/// A maze with pellets at fixed cells and no walls.
#[derive(Debug, Clone)]
pub struct MemoryGame {
    inner: Arc<Mutex<GameInner>>,
}

impl MemoryGame {
    pub fn new(rules: &RuleConfig) -> Self {
        let view = MemorySnapshot {
            lives: rules.starting_lives,
            ..MemorySnapshot::default()
        };
        Self {
            inner: Arc::new(Mutex::new(GameInner {
                view,
                layout: HashMap::new(),
                pellets: HashMap::new(),
                starting_lives: rules.starting_lives,
            })),
        }
    }

    /// Adds a pellet to the layout. It appears at the next `spawn`.
    pub fn with_pellet(self, x: i32, y: i32, pellet: Pellet) -> Self {
        self.inner.lock().layout.insert((x, y), pellet);
        self
    }

    pub fn snapshot(&self) -> MemorySnapshot {
        self.inner.lock().view.clone()
    }
}

impl GameState for MemoryGame {
    fn apply_authoritative(&mut self, update: &GameUpdate) {
        let mut inner = self.inner.lock();
        match update {
            GameUpdate::Scare { ghost, millis } => {
                if *millis > 0 {
                    inner.view.scared.insert(ghost.clone());
                } else {
                    inner.view.scared.remove(ghost);
                }
            }
            GameUpdate::Eat { x, y, score } => {
                inner.pellets.remove(&(*x, *y));
                inner.view.pellets_left = inner.pellets.len();
                inner.view.score = *score;
            }
            GameUpdate::Die { agent, lives, score } => {
                // The caught agent respawns; its old cell is meaningless now.
                inner.view.positions.remove(agent);
                inner.view.scared.remove(agent);
                inner.view.lives = *lives;
                if let Some(score) = score {
                    inner.view.score = *score;
                }
            }
            GameUpdate::GameOver { outcome, score } => {
                inner.view.outcome = Some(*outcome);
                inner.view.score = *score;
            }
        }
        inner.view.applied.push(update.clone());
    }

    fn is_win(&self) -> bool {
        let inner = self.inner.lock();
        inner.view.started && !inner.layout.is_empty() && inner.pellets.is_empty()
    }

    fn is_lose(&self) -> bool {
        let inner = self.inner.lock();
        inner.view.started && inner.view.lives == 0
    }

    fn current_score(&self) -> u32 {
        self.inner.lock().view.score
    }

    fn current_lives(&self) -> u32 {
        self.inner.lock().view.lives
    }

    fn pellet_at(&self, x: i32, y: i32) -> Option<Pellet> {
        self.inner.lock().pellets.get(&(x, y)).copied()
    }

    fn load_maze(&mut self, maze: &str) {
        self.inner.lock().view.maze = Some(maze.to_string());
    }

    fn spawn(&mut self, maze: &str, entries: &[StartEntry], self_agent: Option<&AgentId>) {
        let mut inner = self.inner.lock();
        inner.reset_round();
        inner.view.maze = Some(maze.to_string());
        inner.view.started = true;
        inner.view.self_agent = self_agent.cloned();
        inner.view.positions = entries
            .iter()
            .map(|entry| (entry.agent.clone(), (entry.x, entry.y)))
            .collect();
        inner.view.headings.clear();
    }

    fn steer(&mut self, agent: &AgentId, direction: Direction) {
        self.inner.lock().view.headings.insert(agent.clone(), direction);
    }

    fn place(&mut self, agent: &AgentId, x: i32, y: i32) {
        self.inner.lock().view.positions.insert(agent.clone(), (x, y));
    }

    fn release_agent(&mut self, agent: &AgentId) {
        self.inner.lock().view.released.push(agent.clone());
    }

    fn restart_standalone(&mut self) {
        let mut inner = self.inner.lock();
        inner.reset_round();
        inner.view.standalone_restarts += 1;
    }
}

// ---------------------------------------------------------------------------
// MemoryView
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ViewInner {
    accept_incoming: bool,
    notices: Vec<String>,
    unready: Vec<PeerAddr>,
    incoming: Vec<(PeerAddr, u16)>,
}

/// A view that logs and remembers everything it is told.
#[derive(Debug, Clone)]
pub struct MemoryView {
    inner: Arc<Mutex<ViewInner>>,
}

impl MemoryView {
    /// `accept_incoming` is the answer given to every connecting peer.
    pub fn new(accept_incoming: bool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ViewInner {
                accept_incoming,
                ..ViewInner::default()
            })),
        }
    }

    pub fn set_accept_incoming(&self, accept: bool) {
        self.inner.lock().accept_incoming = accept;
    }

    pub fn notices(&self) -> Vec<String> {
        self.inner.lock().notices.clone()
    }

    /// Peers the player was prompted about, in order.
    pub fn unready_prompts(&self) -> Vec<PeerAddr> {
        self.inner.lock().unready.clone()
    }

    /// Every incoming connection the gate was asked about.
    pub fn incoming_requests(&self) -> Vec<(PeerAddr, u16)> {
        self.inner.lock().incoming.clone()
    }
}

impl View for MemoryView {
    fn notify(&mut self, text: &str) {
        tracing::info!(notice = text, "view notice");
        self.inner.lock().notices.push(text.to_string());
    }

    fn confirm_incoming(&mut self, peer: PeerAddr, port: u16) -> bool {
        let mut inner = self.inner.lock();
        inner.incoming.push((peer, port));
        inner.accept_incoming
    }

    fn prompt_agent_unready(&mut self, peer: PeerAddr) {
        tracing::info!(%peer, "peer has not picked an agent");
        self.inner.lock().unready.push(peer);
    }
}
