//! Fan-out relay.
//!
//! The relay owns no document state. Every line read from one peer is queued,
//! unchanged, on every other peer's outbound queue. Each peer has its own
//! FIFO queue, so frames from one sender reach each receiver in order.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::{DEFAULT_MAX_FRAME_LEN, DEFAULT_RELAY_ADDR};
use crate::error::PadResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub addr: String,
    pub max_frame_len: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_RELAY_ADDR.to_string(),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl RelayConfig {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            ..Self::default()
        }
    }
}

type PeerId = u64;

/// Outbound queues of every connected peer.
#[derive(Debug)]
struct Peers {
    queues: Mutex<HashMap<PeerId, mpsc::UnboundedSender<Arc<str>>>>,
    count: watch::Sender<usize>,
    next_id: AtomicU64,
}

impl Peers {
    fn new() -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            count: watch::channel(0).0,
            next_id: AtomicU64::new(1),
        }
    }

    fn register(&self) -> (PeerId, mpsc::UnboundedReceiver<Arc<str>>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        let mut queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
        queues.insert(id, tx);
        self.count.send_replace(queues.len());
        (id, rx)
    }

    fn remove(&self, id: PeerId) {
        let mut queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
        queues.remove(&id);
        self.count.send_replace(queues.len());
    }

    /// Queues `frame` for everyone except `from`. Returns the receiver count.
    fn fan_out(&self, from: PeerId, frame: Arc<str>) -> usize {
        let queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
        queues
            .iter()
            .filter(|(id, _)| **id != from)
            .filter(|(_, queue)| queue.send(Arc::clone(&frame)).is_ok())
            .count()
    }
}

/// A bound, not yet serving relay.
#[derive(Debug)]
pub struct Relay {
    listener: TcpListener,
    config: RelayConfig,
    peers: Arc<Peers>,
}

impl Relay {
    /// Binds the listening socket.
    pub async fn bind(config: RelayConfig) -> PadResult<Self> {
        let listener = TcpListener::bind(&config.addr).await?;
        Ok(Self {
            listener,
            config,
            peers: Arc::new(Peers::new()),
        })
    }

    pub fn local_addr(&self) -> PadResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts peers until `shutdown` fires, then waits for their tasks.
    pub async fn serve(self, shutdown: CancellationToken) -> PadResult<()> {
        let tracker = TaskTracker::new();
        tracing::info!(addr = %self.listener.local_addr()?, "relay listening");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("relay shutting down");
                    break;
                }
                res = self.listener.accept() => {
                    match res {
                        Ok((stream, addr)) => {
                            tracker.spawn(handle_peer(
                                stream,
                                addr,
                                Arc::clone(&self.peers),
                                self.config.max_frame_len,
                                shutdown.clone(),
                            ));
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "failed to accept connection");
                        }
                    }
                }
            }
        }

        tracker.close();
        tracker.wait().await;
        Ok(())
    }

    /// Serves on a spawned task and returns a handle to it.
    pub fn spawn(self) -> PadResult<RelayHandle> {
        let local_addr = self.local_addr()?;
        let peer_count = self.peers.count.subscribe();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(self.serve(shutdown.clone()));
        Ok(RelayHandle {
            local_addr,
            peer_count,
            shutdown,
            task,
        })
    }
}

/// Control surface of a running relay.
#[derive(Debug)]
pub struct RelayHandle {
    local_addr: SocketAddr,
    peer_count: watch::Receiver<usize>,
    shutdown: CancellationToken,
    task: JoinHandle<PadResult<()>>,
}

impl RelayHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of currently connected peers.
    pub fn peer_count(&self) -> usize {
        *self.peer_count.borrow()
    }

    /// Resolves once at least `n` peers are connected.
    pub async fn wait_for_peers(&self, n: usize) {
        let mut count = self.peer_count.clone();
        let _ = count.wait_for(|c| *c >= n).await;
    }

    /// Stops accepting, closes every peer and waits for the relay to finish.
    pub async fn shutdown(self) -> PadResult<()> {
        self.shutdown.cancel();
        match self.task.await {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(error = %err, "relay task failed");
                Ok(())
            }
        }
    }
}

async fn handle_peer(
    stream: TcpStream,
    addr: SocketAddr,
    peers: Arc<Peers>,
    max_frame_len: usize,
    shutdown: CancellationToken,
) {
    if let Err(err) = stream.set_nodelay(true) {
        tracing::debug!(error = %err, "could not set TCP_NODELAY");
    }
    let (read_half, write_half) = stream.into_split();
    let mut lines = FramedRead::new(read_half, LinesCodec::new_with_max_length(max_frame_len));
    let mut sink = FramedWrite::new(write_half, LinesCodec::new_with_max_length(max_frame_len));
    let (id, mut queue) = peers.register();
    tracing::info!(peer = id, %addr, "peer connected");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            frame = queue.recv() => {
                let Some(frame) = frame else { break };
                if let Err(err) = sink.send(frame).await {
                    tracing::debug!(peer = id, error = %err, "write failed");
                    break;
                }
            }
            line = lines.next() => match line {
                Some(Ok(line)) => {
                    let delivered = peers.fan_out(id, Arc::from(line));
                    tracing::trace!(peer = id, delivered, "forwarded frame");
                }
                Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                    tracing::warn!(peer = id, "dropping oversized frame");
                }
                Some(Err(LinesCodecError::Io(err))) => {
                    tracing::debug!(peer = id, error = %err, "read failed");
                    break;
                }
                None => break,
            },
        }
    }

    peers.remove(id);
    tracing::info!(peer = id, %addr, "peer disconnected");
}
