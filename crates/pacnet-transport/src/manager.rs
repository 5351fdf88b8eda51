//! The connection manager: listener, peer registry, and per-connection loops.
//!
//! Every registered connection runs two Tokio tasks:
//!
//! - a **read loop** that decodes frames and forwards them as
//!   [`PeerEvent::Frame`] in arrival order, then emits exactly one
//!   [`PeerEvent::Closed`] when the stream ends, unless a newer connection
//!   to the same address replaced it first;
//! - a **write loop** that drains a bounded per-peer queue, so a slow peer
//!   only ever backs up its own queue.
//!
//! The registry is the single place that maps a [`PeerAddr`] to its
//! connection. It sits behind one `parking_lot` mutex, and every operation
//! under that lock is non-blocking (a `try_send` at most), so broadcast and
//! add/remove are serialized without stalling on I/O.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};
use tracing::{debug, info, warn};

use crate::{LinkState, PeerAddr, PeerLink, TransportConfig, TransportError, framing};

/// Something that happened on a connection, delivered to the controller.
///
/// Events for one peer arrive in the order they happened: the announcing
/// event (`Accepted` or `Connected`) first, then its frames, then `Closed`.
#[derive(Debug)]
pub enum PeerEvent {
    /// An inbound connection is waiting for approval.
    ///
    /// `port` is the local listening port it arrived on. Answer on `reply`;
    /// dropping the sender counts as a rejection.
    Incoming {
        peer: PeerAddr,
        port: u16,
        reply: oneshot::Sender<bool>,
    },

    /// An approved inbound connection is registered and can be sent to.
    Accepted { peer: PeerAddr },

    /// An outbound connection opened by [`ConnectionManager::connect_to`]
    /// is registered.
    Connected { peer: PeerAddr },

    /// A complete frame arrived from a peer.
    Frame { peer: PeerAddr, text: String },

    /// The connection is gone. Sent once per registered connection.
    Closed { peer: PeerAddr },
}

/// Registry entry for one live connection.
///
/// Dropping the entry stops both loops: the write loop sees its queue close
/// and flushes what is left, the read loop sees `_stop` go away.
struct PeerSlot {
    serial: u64,
    outbound: mpsc::Sender<String>,
    /// Set under the registry lock when a newer connection to the same
    /// address takes this slot. A superseded connection never emits `Closed`.
    superseded: Arc<AtomicBool>,
    _stop: oneshot::Sender<()>,
}

impl PeerSlot {
    fn enqueue(&self, peer: PeerAddr, frame: &str) -> Result<(), TransportError> {
        self.outbound
            .try_send(frame.to_owned())
            .map_err(|e| match e {
                TrySendError::Full(_) => TransportError::Backpressure(peer),
                TrySendError::Closed(_) => TransportError::PeerGone(peer),
            })
    }
}

struct Listening {
    addr: SocketAddr,
    accept_task: JoinHandle<()>,
}

struct Shared {
    config: TransportConfig,
    registry: Mutex<HashMap<PeerAddr, PeerSlot>>,
    listener: Mutex<Option<Listening>>,
    events: mpsc::UnboundedSender<PeerEvent>,
    next_serial: AtomicU64,
}

/// Owns the listening endpoint and every peer connection.
///
/// Cheap to clone; all clones share one registry.
#[derive(Clone)]
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

impl ConnectionManager {
    /// Creates a manager and the receiving end of its event stream.
    pub fn new(
        config: TransportConfig,
    ) -> (Self, mpsc::UnboundedReceiver<PeerEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            config,
            registry: Mutex::new(HashMap::new()),
            listener: Mutex::new(None),
            events,
            next_serial: AtomicU64::new(1),
        });
        (Self { shared }, rx)
    }

    /// Binds a listening endpoint and starts accepting peers.
    ///
    /// Port 0 lets the OS pick one; the bound address is returned. A
    /// previous listener, if any, is replaced.
    pub async fn start_listening(
        &self,
        port: u16,
    ) -> Result<SocketAddr, TransportError> {
        let host = self.shared.config.bind_host.as_str();
        let listener = TcpListener::bind((host, port))
            .await
            .map_err(TransportError::Bind)?;
        let addr = listener.local_addr().map_err(TransportError::Bind)?;

        let accept_task = tokio::spawn(accept_loop(
            Arc::clone(&self.shared),
            listener,
            addr.port(),
        ));
        let previous = self
            .shared
            .listener
            .lock()
            .replace(Listening { addr, accept_task });
        if let Some(previous) = previous {
            previous.accept_task.abort();
        }

        info!(%addr, "listening for peers");
        Ok(addr)
    }

    /// Stops accepting new peers. Existing connections stay open.
    pub fn stop_listening(&self) {
        if let Some(listening) = self.shared.listener.lock().take() {
            listening.accept_task.abort();
            info!(addr = %listening.addr, "stopped listening");
        }
    }

    /// Returns the bound listening address, if listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.shared.listener.lock().as_ref().map(|l| l.addr)
    }

    /// Opens an outbound connection and registers it.
    ///
    /// # Errors
    /// - [`TransportError::Resolution`] if `host` does not resolve
    /// - [`TransportError::SelfConnect`] if it resolves to our own listener
    /// - [`TransportError::Unreachable`] if the connect itself fails
    pub async fn connect_to(
        &self,
        host: &str,
        port: u16,
    ) -> Result<PeerAddr, TransportError> {
        let resolution = |source| TransportError::Resolution {
            host: host.to_string(),
            source,
        };
        let target = tokio::net::lookup_host((host, port))
            .await
            .map_err(resolution)?
            .next()
            .ok_or_else(|| {
                resolution(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no addresses",
                ))
            })?;

        if self.is_own_listener(target) {
            return Err(TransportError::SelfConnect(target));
        }

        let stream = TcpStream::connect(target).await.map_err(|source| {
            TransportError::Unreachable {
                addr: target,
                source,
            }
        })?;
        let peer = PeerAddr(stream.peer_addr().unwrap_or(target));

        self.shared.register(peer, stream, PeerEvent::Connected { peer });
        info!(%peer, "connected to peer");
        Ok(peer)
    }

    /// Closes one connection. Safe to call on a peer that is already gone.
    pub fn close_connection(&self, peer: PeerAddr) {
        if self.shared.registry.lock().remove(&peer).is_some() {
            info!(%peer, "closing connection");
        }
    }

    /// Closes every connection.
    pub fn close_all(&self) {
        let drained: Vec<PeerAddr> = {
            let mut registry = self.shared.registry.lock();
            registry.drain().map(|(peer, _)| peer).collect()
        };
        if !drained.is_empty() {
            info!(count = drained.len(), "closed all connections");
        }
    }

    /// Stops listening and closes every connection.
    pub fn shutdown(&self) {
        self.stop_listening();
        self.close_all();
    }

    /// Returns the number of registered peers.
    pub fn peer_count(&self) -> usize {
        self.shared.registry.lock().len()
    }

    fn is_own_listener(&self, target: SocketAddr) -> bool {
        let Some(local) = self.local_addr() else {
            return false;
        };
        if local.port() != target.port() {
            return false;
        }
        let ip = target.ip();
        ip.is_loopback() || ip.is_unspecified() || ip == local.ip()
    }
}

impl LinkState for ConnectionManager {
    fn is_listening(&self) -> bool {
        self.shared.listener.lock().is_some()
    }

    fn has_open_connection(&self) -> bool {
        !self.shared.registry.lock().is_empty()
    }
}

impl PeerLink for ConnectionManager {
    fn send(&self, peer: PeerAddr, frame: &str) -> bool {
        let result = match self.shared.registry.lock().get(&peer) {
            Some(slot) => slot.enqueue(peer, frame),
            None => Err(TransportError::PeerGone(peer)),
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                log_dropped_send(&e);
                false
            }
        }
    }

    fn broadcast_except(&self, frame: &str, except: Option<PeerAddr>) -> usize {
        let mut failures = Vec::new();
        let mut queued = 0;
        {
            let registry = self.shared.registry.lock();
            for (peer, slot) in registry.iter() {
                if Some(*peer) == except {
                    continue;
                }
                match slot.enqueue(*peer, frame) {
                    Ok(()) => queued += 1,
                    Err(e) => failures.push(e),
                }
            }
        }
        for e in &failures {
            log_dropped_send(e);
        }
        if queued == 0 && failures.is_empty() {
            debug!("broadcast with no recipients");
        }
        queued
    }

    fn close(&self, peer: PeerAddr) {
        self.close_connection(peer);
    }

    fn peers(&self) -> Vec<PeerAddr> {
        self.shared.registry.lock().keys().copied().collect()
    }
}

fn log_dropped_send(e: &TransportError) {
    match e {
        TransportError::Backpressure(_) => warn!(error = %e, "frame dropped"),
        _ => debug!(error = %e, "frame dropped"),
    }
}

impl Shared {
    fn codec(&self) -> LengthDelimitedCodec {
        framing::codec(self.config.max_frame_length)
    }

    /// Adds a connection to the registry, announces it, then starts its loops.
    fn register(self: &Arc<Self>, peer: PeerAddr, stream: TcpStream, announce: PeerEvent) {
        let (read_half, write_half) = stream.into_split();
        let serial = self.next_serial.fetch_add(1, Ordering::Relaxed);
        let (outbound, outbound_rx) =
            mpsc::channel(self.config.send_queue_capacity.max(1));
        let (stop, stop_rx) = oneshot::channel();
        let superseded = Arc::new(AtomicBool::new(false));

        let stale = {
            let mut registry = self.registry.lock();
            let stale = registry.insert(
                peer,
                PeerSlot {
                    serial,
                    outbound,
                    superseded: Arc::clone(&superseded),
                    _stop: stop,
                },
            );
            if let Some(stale) = &stale {
                stale.superseded.store(true, Ordering::Release);
            }
            stale
        };
        if stale.is_some() {
            warn!(%peer, "replaced stale connection for peer");
        }
        drop(stale);

        // Announce before the read loop can deliver any frame.
        let _ = self.events.send(announce);

        tokio::spawn(write_loop(
            peer,
            FramedWrite::new(write_half, self.codec()),
            outbound_rx,
        ));
        tokio::spawn(read_loop(
            Arc::clone(self),
            peer,
            serial,
            superseded,
            FramedRead::new(read_half, self.codec()),
            stop_rx,
        ));
    }

    /// Removes `peer` if the registered entry is still this connection, and
    /// emits its `Closed` unless a newer connection took the slot.
    ///
    /// Both happen under the registry lock, so a successor's announcement
    /// can never be followed by its predecessor's `Closed`.
    fn unregister(&self, peer: PeerAddr, serial: u64, superseded: &AtomicBool) {
        let mut registry = self.registry.lock();
        if registry.get(&peer).is_some_and(|slot| slot.serial == serial) {
            registry.remove(&peer);
        }
        if superseded.load(Ordering::Acquire) {
            debug!(%peer, serial, "superseded connection ended quietly");
            return;
        }
        let _ = self.events.send(PeerEvent::Closed { peer });
    }
}

async fn accept_loop(shared: Arc<Shared>, listener: TcpListener, port: u16) {
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "accept failed");
                tokio::time::sleep(Duration::from_millis(50)).await;
                continue;
            }
        };
        let peer = PeerAddr(addr);

        let (reply, approval) = oneshot::channel();
        if shared
            .events
            .send(PeerEvent::Incoming { peer, port, reply })
            .is_err()
        {
            debug!("event receiver gone, accept loop exiting");
            break;
        }

        if approval.await.unwrap_or(false) {
            shared.register(peer, stream, PeerEvent::Accepted { peer });
            info!(%peer, "accepted peer");
        } else {
            info!(%peer, "rejected incoming connection");
            drop(stream);
        }
    }
}

async fn read_loop(
    shared: Arc<Shared>,
    peer: PeerAddr,
    serial: u64,
    superseded: Arc<AtomicBool>,
    mut frames: FramedRead<OwnedReadHalf, LengthDelimitedCodec>,
    mut stop: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut stop => {
                debug!(%peer, "read loop stopped locally");
                break;
            }
            next = frames.next() => match next {
                Some(Ok(bytes)) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => {
                        if shared.events.send(PeerEvent::Frame { peer, text }).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(%peer, error = %e, "dropping frame that is not UTF-8");
                    }
                },
                Some(Err(e)) => {
                    debug!(%peer, error = %e, "read failed");
                    break;
                }
                None => {
                    info!(%peer, "peer closed connection");
                    break;
                }
            }
        }
    }

    shared.unregister(peer, serial, &superseded);
}

async fn write_loop(
    peer: PeerAddr,
    mut sink: FramedWrite<OwnedWriteHalf, LengthDelimitedCodec>,
    mut outbound: mpsc::Receiver<String>,
) {
    while let Some(frame) = outbound.recv().await {
        if let Err(e) = sink.send(Bytes::from(frame)).await {
            debug!(%peer, error = %e, "write failed");
            break;
        }
    }
    let mut half = sink.into_inner();
    let _ = half.shutdown().await;
}
