//! Node actor: a Tokio task that owns a [`Controller`].
//!
//! The actor multiplexes three inputs in one `select!` loop, so every
//! protocol decision is made on one task in one total order:
//!
//! ```text
//!  NodeHandle ──NodeCommand──┐
//!  ConnectionManager ──PeerEvent──┼──→ NodeActor ──→ Controller
//!  tokio interval ──tick──────────┘
//! ```
//!
//! Transport events are polled first. A `connect` resolves only after the
//! manager has queued its `Connected` event, so a command sent right after
//! it always sees the new upstream.

use std::net::SocketAddr;
use std::time::Duration;

use pacnet_game::{GameState, View};
use pacnet_protocol::{AgentId, Direction, StartEntry};
use pacnet_transport::{ConnectionManager, PeerAddr, PeerEvent};
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;

use crate::{Controller, NodeConfig, NodeSnapshot, PacnetError};

type Reply<T> = oneshot::Sender<Result<T, PacnetError>>;

/// Commands sent to a node actor through its channel.
enum NodeCommand {
    Select { agent: AgentId, reply: Reply<()> },
    Release { reply: oneshot::Sender<Option<AgentId>> },
    ChooseMap { maze: String, reply: Reply<()> },
    StartGame { entries: Vec<StartEntry>, reply: Reply<()> },
    ReportDirection {
        agent: AgentId,
        direction: Direction,
        reply: Reply<()>,
    },
    ReportLocation {
        agent: AgentId,
        x: i32,
        y: i32,
        reply: Reply<()>,
    },
    Snapshot { reply: oneshot::Sender<NodeSnapshot> },
    Shutdown { reply: oneshot::Sender<()> },
}

/// Handle to a running node. Cheap to clone.
///
/// Connection setup goes straight to the transport; everything that touches
/// protocol state is a command to the actor.
#[derive(Clone)]
pub struct NodeHandle {
    link: ConnectionManager,
    sender: mpsc::Sender<NodeCommand>,
}

impl NodeHandle {
    /// Starts accepting peers. Port 0 lets the OS choose.
    pub async fn listen(&self, port: u16) -> Result<SocketAddr, PacnetError> {
        Ok(self.link.start_listening(port).await?)
    }

    pub fn stop_listening(&self) {
        self.link.stop_listening();
    }

    /// The bound listening address, if listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.link.local_addr()
    }

    /// Connects to a server, which becomes this node's upstream.
    pub async fn connect(&self, host: &str, port: u16) -> Result<PeerAddr, PacnetError> {
        Ok(self.link.connect_to(host, port).await?)
    }

    /// Drops one peer connection.
    pub fn disconnect(&self, peer: PeerAddr) {
        self.link.close_connection(peer);
    }

    /// Drops every peer connection, keeping the listener.
    pub fn disconnect_all(&self) {
        self.link.close_all();
    }

    pub async fn select(&self, agent: AgentId) -> Result<(), PacnetError> {
        self.request(|reply| NodeCommand::Select { agent, reply })
            .await?
    }

    /// Gives the local agent back to the AI. Returns it, if there was one.
    pub async fn release(&self) -> Result<Option<AgentId>, PacnetError> {
        self.request(|reply| NodeCommand::Release { reply }).await
    }

    pub async fn choose_map(&self, maze: impl Into<String>) -> Result<(), PacnetError> {
        let maze = maze.into();
        self.request(|reply| NodeCommand::ChooseMap { maze, reply })
            .await?
    }

    pub async fn start_game(&self, entries: Vec<StartEntry>) -> Result<(), PacnetError> {
        self.request(|reply| NodeCommand::StartGame { entries, reply })
            .await?
    }

    pub async fn report_direction(
        &self,
        agent: AgentId,
        direction: Direction,
    ) -> Result<(), PacnetError> {
        self.request(|reply| NodeCommand::ReportDirection {
            agent,
            direction,
            reply,
        })
        .await?
    }

    pub async fn report_location(
        &self,
        agent: AgentId,
        x: i32,
        y: i32,
    ) -> Result<(), PacnetError> {
        self.request(|reply| NodeCommand::ReportLocation { agent, x, y, reply })
            .await?
    }

    pub async fn snapshot(&self) -> Result<NodeSnapshot, PacnetError> {
        self.request(|reply| NodeCommand::Snapshot { reply }).await
    }

    /// Stops the actor, the listener and every connection.
    pub async fn shutdown(&self) -> Result<(), PacnetError> {
        self.request(|reply| NodeCommand::Shutdown { reply }).await
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> NodeCommand,
    ) -> Result<T, PacnetError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .await
            .map_err(|_| PacnetError::NodeStopped)?;
        reply_rx.await.map_err(|_| PacnetError::NodeStopped)
    }
}

/// The internal node state. Runs inside a Tokio task.
struct NodeActor<G: GameState, V: View> {
    controller: Controller<ConnectionManager, G, V>,
    events: mpsc::UnboundedReceiver<PeerEvent>,
    receiver: mpsc::Receiver<NodeCommand>,
    tick_interval: Duration,
}

impl<G: GameState, V: View> NodeActor<G, V> {
    async fn run(mut self) {
        tracing::info!("node actor started");

        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_tick = tokio::time::Instant::now();

        loop {
            tokio::select! {
                biased;

                Some(event) = self.events.recv() => {
                    self.controller.handle_event(event);
                }
                cmd = self.receiver.recv() => match cmd {
                    Some(NodeCommand::Shutdown { reply }) => {
                        self.controller.link().shutdown();
                        let _ = reply.send(());
                        break;
                    }
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
                now = ticker.tick() => {
                    let dt = now.duration_since(last_tick);
                    last_tick = now;
                    self.controller.tick(dt);
                }
            }
        }

        self.controller.link().shutdown();
        tracing::info!("node actor stopped");
    }

    fn handle_command(&mut self, cmd: NodeCommand) {
        let ctl = &mut self.controller;
        match cmd {
            NodeCommand::Select { agent, reply } => {
                let _ = reply.send(ctl.select(agent));
            }
            NodeCommand::Release { reply } => {
                let _ = reply.send(ctl.release());
            }
            NodeCommand::ChooseMap { maze, reply } => {
                let _ = reply.send(ctl.choose_map(&maze));
            }
            NodeCommand::StartGame { entries, reply } => {
                let _ = reply.send(ctl.start_game(entries));
            }
            NodeCommand::ReportDirection {
                agent,
                direction,
                reply,
            } => {
                let _ = reply.send(ctl.report_direction(agent, direction));
            }
            NodeCommand::ReportLocation { agent, x, y, reply } => {
                let _ = reply.send(ctl.report_location(agent, x, y));
            }
            NodeCommand::Snapshot { reply } => {
                let _ = reply.send(ctl.snapshot());
            }
            NodeCommand::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }
}

/// Spawns a node actor and returns a handle to it.
///
/// Must be called from within a Tokio runtime. The node starts standalone;
/// call [`NodeHandle::listen`] or [`NodeHandle::connect`] to join a session.
pub fn spawn_node<G: GameState, V: View>(
    config: NodeConfig,
    game: G,
    view: V,
) -> NodeHandle {
    let tick_interval = config.tick_interval();
    let (link, events) = ConnectionManager::new(config.transport);
    let (sender, receiver) = mpsc::channel(config.command_buffer.max(1));

    let actor = NodeActor {
        controller: Controller::new(link.clone(), game, view, config.rules),
        events,
        receiver,
        tick_interval,
    };
    tokio::spawn(actor.run());

    NodeHandle { link, sender }
}
