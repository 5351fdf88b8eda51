//! The protocol controller: arbitration, star relay and authority.
//!
//! A `Controller` owns every piece of protocol state a node has: the
//! ownership table, the local selection, the upstream server, the referee
//! and the two game-side collaborators. It is driven from exactly one task
//! (the node actor), so none of that state needs a lock.
//!
//! ```text
//!              PeerEvent                      local operation
//!                  │                                │
//!                  ▼                                ▼
//!   ┌────────── Controller ──────────────────────────────────┐
//!   │  role = Role::of(link)   (re-derived on every decision) │
//!   │  OwnershipTable · LocalSelection · upstream · Referee   │
//!   └──────┬──────────────────┬────────────────────┬──────────┘
//!          ▼                  ▼                    ▼
//!      PeerLink           GameState              View
//!   (send/broadcast)  (apply/spawn/place)   (notify/confirm)
//! ```
//!
//! Role decides everything:
//!
//! - a **server** arbitrates `SELECT`, relays movement from owners to every
//!   other peer, runs the referee and broadcasts its verdicts;
//! - a **client** asks its upstream, mirrors what the upstream says and
//!   drops anything authoritative from anyone else;
//! - a **standalone** node runs the referee and keeps the verdicts local.

use std::time::Duration;

use pacnet_game::{GameState, Referee, RuleConfig, View};
use pacnet_protocol::{
    AgentId, Direction, GameUpdate, Message, Outcome, StartEntry,
};
use pacnet_session::{
    LocalSelection, Owner, OwnershipTable, Role, SelectionState, SessionError,
};
use pacnet_transport::{PeerAddr, PeerEvent, PeerLink};
use tracing::{debug, info, warn};

use crate::PacnetError;

/// A point-in-time view of a node's protocol state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSnapshot {
    pub role: Role,
    /// Every peer-owned agent, sorted by agent.
    pub owners: Vec<(AgentId, PeerAddr)>,
    pub selection: SelectionState,
    pub upstream: Option<PeerAddr>,
    pub maze: Option<String>,
    pub game_over: bool,
}

/// Protocol state machine for one node.
pub struct Controller<L: PeerLink, G: GameState, V: View> {
    link: L,
    game: G,
    view: V,
    owners: OwnershipTable,
    selection: LocalSelection,
    upstream: Option<PeerAddr>,
    referee: Referee,
    maze: Option<String>,
}

impl<L: PeerLink, G: GameState, V: View> Controller<L, G, V> {
    pub fn new(link: L, game: G, view: V, rules: RuleConfig) -> Self {
        Self {
            link,
            game,
            view,
            owners: OwnershipTable::new(),
            selection: LocalSelection::new(),
            upstream: None,
            referee: Referee::new(rules),
            maze: None,
        }
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    /// The role right now. Never cached: peers come and go between calls.
    pub fn role(&self) -> Role {
        Role::of(&self.link)
    }

    pub fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            role: self.role(),
            owners: self.owners.entries(),
            selection: self.selection.state().clone(),
            upstream: self.upstream,
            maze: self.maze.clone(),
            game_over: self.referee.is_over(),
        }
    }

    // -----------------------------------------------------------------------
    // Transport events
    // -----------------------------------------------------------------------

    pub fn handle_event(&mut self, event: PeerEvent) {
        match event {
            PeerEvent::Incoming { peer, port, reply } => {
                let approved = self.view.confirm_incoming(peer, port);
                debug!(%peer, port, approved, "incoming connection decided");
                let _ = reply.send(approved);
            }
            PeerEvent::Accepted { peer } => self.on_accepted(peer),
            PeerEvent::Connected { peer } => self.on_connected(peer),
            PeerEvent::Frame { peer, text } => self.on_frame(peer, &text),
            PeerEvent::Closed { peer } => self.on_peer_closed(peer),
        }
    }

    fn on_accepted(&mut self, peer: PeerAddr) {
        info!(%peer, "peer joined");
        self.send(peer, &Message::Confirm);
        if let Some(maze) = self.maze.clone() {
            self.send(peer, &Message::Map { maze });
        }
    }

    fn on_connected(&mut self, peer: PeerAddr) {
        info!(%peer, "upstream server set");
        self.upstream = Some(peer);

        // A selection made while alone has to be negotiated again.
        if let Some(agent) = self.selection.claimed().cloned() {
            self.selection.begin(agent.clone());
            self.send(peer, &Message::Select { agent });
        }
    }

    fn on_frame(&mut self, peer: PeerAddr, text: &str) {
        let msg = match Message::parse(text) {
            Ok(Some(msg)) => msg,
            Ok(None) => {
                debug!(%peer, "empty frame ignored");
                return;
            }
            Err(e) => {
                debug!(%peer, error = %e, "dropping frame");
                return;
            }
        };

        let role = self.role();
        match msg {
            Message::Confirm => debug!(%peer, "connection confirmed"),
            Message::Select { agent } => self.on_select(peer, agent, role),
            Message::SelectGood { agent } => self.on_select_good(peer, agent),
            Message::SelectFail { agent, owner } => self.on_select_fail(peer, agent, owner),
            Message::Release { agent } => self.on_release(peer, agent, role),
            Message::Map { maze } => {
                if self.is_upstream(peer) {
                    info!(%maze, "loading maze chosen by server");
                    self.game.load_maze(&maze);
                    self.maze = Some(maze);
                } else {
                    debug!(%peer, "MAP from non-upstream dropped");
                }
            }
            Message::Start { maze, entries } => {
                if self.is_upstream(peer) {
                    self.begin_game(&maze, &entries);
                    self.maze = Some(maze);
                } else {
                    debug!(%peer, "START from non-upstream dropped");
                }
            }
            Message::Direction { .. } | Message::Location { .. } => {
                self.on_movement(peer, text, &msg, role);
            }
            Message::Update(update) => self.on_update(peer, update, role),
            Message::Hurry => {
                if self.is_upstream(peer) {
                    self.view.notify("The host is waiting for you to pick an agent");
                }
            }
        }
    }

    fn on_select(&mut self, peer: PeerAddr, agent: AgentId, role: Role) {
        if role != Role::Server {
            debug!(%peer, %agent, %role, "SELECT ignored: not the server");
            return;
        }
        match self.owners.grant(peer, agent.clone(), self.selection.current()) {
            Ok(released) => {
                if let Some(previous) = released {
                    self.return_to_ai(&previous);
                }
                info!(%peer, %agent, "agent granted");
                self.send(peer, &Message::SelectGood { agent });
            }
            Err(SessionError::OwnershipConflict { agent, owner }) => {
                info!(%peer, %agent, %owner, "agent refused");
                self.send(
                    peer,
                    &Message::SelectFail {
                        agent,
                        owner: Some(owner.to_string()),
                    },
                );
            }
            Err(e) => warn!(%peer, error = %e, "unexpected arbitration failure"),
        }
    }

    fn on_select_good(&mut self, peer: PeerAddr, agent: AgentId) {
        if !self.is_upstream(peer) {
            debug!(%peer, "SELECT_GOOD from non-upstream dropped");
            return;
        }
        if self.selection.confirm(&agent) {
            info!(%agent, "selection confirmed");
        } else {
            debug!(%agent, "stale SELECT_GOOD ignored");
        }
    }

    fn on_select_fail(&mut self, peer: PeerAddr, agent: AgentId, owner: Option<String>) {
        if !self.is_upstream(peer) {
            debug!(%peer, "SELECT_FAIL from non-upstream dropped");
            return;
        }
        let Some(previous) = self.selection.reject(&agent) else {
            debug!(%agent, "stale SELECT_FAIL ignored");
            return;
        };
        info!(%agent, reverted_to = ?previous, "selection refused");
        let text = match owner {
            Some(owner) => format!("{agent} is already taken by {owner}"),
            None => format!("{agent} is already taken"),
        };
        self.view.notify(&text);
    }

    fn on_release(&mut self, peer: PeerAddr, agent: AgentId, role: Role) {
        if role != Role::Server {
            return;
        }
        match self.owners.release_agent(peer, &agent) {
            Ok(()) => {
                info!(%peer, %agent, "agent released");
                self.return_to_ai(&agent);
            }
            Err(e) => debug!(error = %e, "RELEASE dropped"),
        }
    }

    fn on_movement(&mut self, peer: PeerAddr, text: &str, msg: &Message, role: Role) {
        let Some(agent) = msg.moved_agent() else {
            return;
        };
        if self.selection.current() == Some(agent) {
            debug!(%peer, %agent, "update about own agent ignored");
            return;
        }

        match role {
            Role::Server => {
                if !self.owners.controls(&peer, agent) {
                    debug!(%peer, %agent, "movement from non-owner dropped");
                    return;
                }
                self.apply_movement(msg);
                self.link.broadcast_except(text, Some(peer));
                if let Message::Location { agent, x, y } = msg {
                    self.judge(agent, *x, *y);
                }
            }
            Role::Client if self.is_upstream(peer) => self.apply_movement(msg),
            _ => debug!(%peer, %agent, %role, "movement dropped"),
        }
    }

    fn on_update(&mut self, peer: PeerAddr, update: GameUpdate, role: Role) {
        if role != Role::Client || !self.is_upstream(peer) {
            warn!(%peer, tag = %update.tag(), %role, "authoritative update from non-authority dropped");
            return;
        }
        self.game.apply_authoritative(&update);
        if let GameUpdate::GameOver { outcome, score } = update {
            self.view.notify(&game_over_text(outcome, score));
        }
    }

    /// Forgets everything tied to a connection that went away.
    pub fn on_peer_closed(&mut self, peer: PeerAddr) {
        if self.upstream == Some(peer) {
            self.upstream = None;
            warn!(%peer, "lost upstream server, continuing standalone");
            self.view.notify("Lost connection to the host. Continuing on your own.");
            self.selection.settle();
            self.referee.reset(&[]);
            self.game.restart_standalone();
        }
        if let Some(agent) = self.owners.release_peer(&peer) {
            info!(%peer, %agent, "agent returned to AI");
            self.return_to_ai(&agent);
        } else {
            info!(%peer, "peer left");
        }
    }

    // -----------------------------------------------------------------------
    // Local operations
    // -----------------------------------------------------------------------

    /// Picks the agent this process drives.
    ///
    /// A client asks its upstream and stays pending until it answers. A
    /// server or standalone node decides on the spot.
    ///
    /// # Errors
    /// [`SessionError::OwnershipConflict`] if a peer of this server already
    /// drives the agent.
    pub fn select(&mut self, agent: AgentId) -> Result<(), PacnetError> {
        if let (Role::Client, Some(upstream)) = (self.role(), self.upstream) {
            self.selection.begin(agent.clone());
            self.send(upstream, &Message::Select { agent });
            return Ok(());
        }
        if let Some(peer) = self.owners.owner_of(&agent) {
            return Err(SessionError::OwnershipConflict {
                agent,
                owner: Owner::Peer(peer),
            }
            .into());
        }
        if let Some(previous) = self.selection.current().filter(|p| **p != agent).cloned() {
            debug!(%previous, "previous agent returned to AI");
            self.return_to_ai(&previous);
        }
        info!(%agent, "agent selected");
        self.selection.claim(agent);
        Ok(())
    }

    /// Gives the local agent back to the AI.
    pub fn release(&mut self) -> Option<AgentId> {
        let agent = self.selection.release()?;
        if let (Role::Client, Some(upstream)) = (self.role(), self.upstream) {
            self.send(upstream, &Message::Release { agent: agent.clone() });
        }
        self.return_to_ai(&agent);
        Some(agent)
    }

    /// Chooses the maze, loading it here and on every peer.
    pub fn choose_map(&mut self, maze: &str) -> Result<(), PacnetError> {
        let role = self.role();
        if role == Role::Client {
            return Err(PacnetError::NotAuthoritative("choose the maze"));
        }
        self.game.load_maze(maze);
        self.maze = Some(maze.to_string());
        if role == Role::Server {
            self.broadcast(&Message::Map { maze: maze.to_string() });
        }
        Ok(())
    }

    /// Starts a game with the given spawns.
    ///
    /// # Errors
    /// - [`PacnetError::NotAuthoritative`] on a client
    /// - [`PacnetError::MazeNotChosen`] before [`choose_map`](Self::choose_map)
    /// - [`PacnetError::PeersUnready`] if a peer has not picked an agent;
    ///   each of them was sent `HURRY` first
    pub fn start_game(&mut self, entries: Vec<StartEntry>) -> Result<(), PacnetError> {
        let role = self.role();
        if role == Role::Client {
            return Err(PacnetError::NotAuthoritative("start the game"));
        }
        let Some(maze) = self.maze.clone() else {
            return Err(PacnetError::MazeNotChosen);
        };

        if role == Role::Server {
            let mut unready: Vec<PeerAddr> = self
                .link
                .peers()
                .into_iter()
                .filter(|peer| self.owners.agent_of(peer).is_none())
                .collect();
            unready.sort();
            if !unready.is_empty() {
                for peer in &unready {
                    self.send(*peer, &Message::Hurry);
                    self.view.prompt_agent_unready(*peer);
                }
                return Err(PacnetError::PeersUnready(unready));
            }
            self.broadcast(&Message::Start {
                maze: maze.clone(),
                entries: entries.clone(),
            });
        }

        self.begin_game(&maze, &entries);
        Ok(())
    }

    /// Reports a heading change of a locally driven agent.
    pub fn report_direction(
        &mut self,
        agent: AgentId,
        direction: Direction,
    ) -> Result<(), PacnetError> {
        let role = self.check_reporter(&agent)?;
        self.publish_movement(role, &Message::Direction { agent, direction });
        Ok(())
    }

    /// Reports a locally driven agent reaching a cell.
    ///
    /// On an authoritative node this is also where the referee looks for
    /// pellets and collisions.
    pub fn report_location(&mut self, agent: AgentId, x: i32, y: i32) -> Result<(), PacnetError> {
        let role = self.check_reporter(&agent)?;
        self.publish_movement(
            role,
            &Message::Location {
                agent: agent.clone(),
                x,
                y,
            },
        );
        self.judge(&agent, x, y);
        Ok(())
    }

    /// Ages scare timers. Called by the node actor at its tick rate.
    pub fn tick(&mut self, dt: Duration) {
        if !self.role().is_authoritative() {
            return;
        }
        let updates = self.referee.advance(dt);
        self.publish(updates);
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn is_upstream(&self, peer: PeerAddr) -> bool {
        self.upstream == Some(peer)
    }

    fn send(&self, peer: PeerAddr, msg: &Message) {
        self.link.send(peer, msg.to_frame().as_str());
    }

    fn broadcast(&self, msg: &Message) {
        self.link.broadcast(msg.to_frame().as_str());
    }

    fn begin_game(&mut self, maze: &str, entries: &[StartEntry]) {
        info!(%maze, agents = entries.len(), "game starting");
        self.referee.reset(entries);
        self.game.spawn(maze, entries, self.selection.current());
    }

    fn apply_movement(&mut self, msg: &Message) {
        match msg {
            Message::Direction { agent, direction } => self.game.steer(agent, *direction),
            Message::Location { agent, x, y } => self.game.place(agent, *x, *y),
            _ => {}
        }
    }

    /// Checks that this node may speak for `agent`, returning the role the
    /// check was made under.
    ///
    /// A client speaks only for its own agent. An authoritative node also
    /// speaks for every agent no peer owns, since its AI drives them.
    fn check_reporter(&self, agent: &AgentId) -> Result<Role, PacnetError> {
        let role = self.role();
        let own = self.selection.current() == Some(agent);
        let allowed = match role {
            Role::Client => own,
            Role::Server | Role::Standalone => own || self.owners.owner_of(agent).is_none(),
        };
        if allowed {
            Ok(role)
        } else {
            Err(PacnetError::NotControlled(agent.clone()))
        }
    }

    fn publish_movement(&self, role: Role, msg: &Message) {
        match (role, self.upstream) {
            (Role::Client, Some(upstream)) => self.send(upstream, msg),
            (Role::Server, _) => self.broadcast(msg),
            _ => {}
        }
    }

    /// Runs the referee for a location if this node is the authority.
    /// Hands `agent` back to the AI. Its last peer-reported cell no longer
    /// counts for collisions until the AI reports a new one.
    fn return_to_ai(&mut self, agent: &AgentId) {
        self.referee.forget(agent);
        self.game.release_agent(agent);
    }

    fn judge(&mut self, agent: &AgentId, x: i32, y: i32) {
        if !self.role().is_authoritative() {
            return;
        }
        let updates = self.referee.observe(&self.game, agent, x, y);
        self.publish(updates);
    }

    /// Applies authoritative updates locally and, on a server, sends them to
    /// every peer. Ends the game if they decided it.
    fn publish(&mut self, updates: Vec<GameUpdate>) {
        if updates.is_empty() {
            return;
        }
        let server = self.role() == Role::Server;
        for update in updates {
            self.game.apply_authoritative(&update);
            if server {
                self.broadcast(&Message::Update(update));
            }
        }

        if self.referee.is_over() {
            return;
        }
        let outcome = if self.game.is_win() {
            Outcome::Win
        } else if self.game.is_lose() {
            Outcome::Lose
        } else {
            return;
        };
        let score = self.game.current_score();
        let update = GameUpdate::GameOver { outcome, score };
        info!(%outcome, score, "game over");
        self.referee.finish();
        self.game.apply_authoritative(&update);
        if server {
            self.broadcast(&Message::Update(update));
        }
        self.view.notify(&game_over_text(outcome, score));
    }
}

fn game_over_text(outcome: Outcome, score: u32) -> String {
    match outcome {
        Outcome::Win => format!("You win! Final score {score}"),
        Outcome::Lose => format!("Game over. Final score {score}"),
    }
}

// =========================================================================
// Tests
// =========================================================================
