//! Participant side of the synchronization channel.
//!
//! A [`ChannelHandle`] owns one TCP connection to the relay. Outbound frames
//! are queued and written by a writer task; a reader task decodes inbound
//! frames, drops the ones carrying the local [`OriginId`] and hands the rest
//! to [`RemoteChanges`].

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::{SinkExt, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;

use super::event::{ChannelEvent, ConnectionStatus, OriginId};
use super::Broadcaster;
use crate::config::{DEFAULT_MAX_FRAME_LEN, DEFAULT_RELAY_ADDR};
use crate::error::{PadError, PadResult};

/// Where and how to reach the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub addr: String,
    pub max_frame_len: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_RELAY_ADDR.to_string(),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl ChannelConfig {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            ..Self::default()
        }
    }

    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }
}

// =============================================================================
// REMOTE CHANGES
// =============================================================================

/// Events from other participants, in arrival order.
#[derive(Debug)]
pub struct RemoteChanges {
    rx: mpsc::UnboundedReceiver<ChannelEvent>,
}

impl RemoteChanges {
    /// Next remote event, or `None` once the connection is gone.
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        self.rx.recv().await
    }
}

impl Stream for RemoteChanges {
    type Item = ChannelEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

// =============================================================================
// CHANNEL HANDLE
// =============================================================================

/// A live connection to the relay.
#[derive(Debug)]
pub struct ChannelHandle {
    origin_id: OriginId,
    outbound: mpsc::UnboundedSender<String>,
    status: watch::Receiver<ConnectionStatus>,
    status_tx: Arc<watch::Sender<ConnectionStatus>>,
    inbound: Option<mpsc::UnboundedReceiver<ChannelEvent>>,
    max_frame_len: usize,
    shutdown: CancellationToken,
}

impl ChannelHandle {
    /// Connects to the relay at `config.addr`.
    pub async fn connect(config: &ChannelConfig, origin_id: OriginId) -> PadResult<Self> {
        let (status_tx, status) = watch::channel(ConnectionStatus::Connecting);
        let stream = TcpStream::connect(&config.addr).await?;
        stream.set_nodelay(true)?;
        let (read_half, write_half) = stream.into_split();

        let reader =
            FramedRead::new(read_half, LinesCodec::new_with_max_length(config.max_frame_len));
        let writer =
            FramedWrite::new(write_half, LinesCodec::new_with_max_length(config.max_frame_len));
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let status_tx = Arc::new(status_tx);
        let shutdown = CancellationToken::new();

        status_tx.send_replace(ConnectionStatus::Connected);
        tracing::info!(origin = %origin_id, addr = %config.addr, "connected to relay");

        tokio::spawn(read_loop(
            reader,
            origin_id.clone(),
            inbound_tx,
            Arc::clone(&status_tx),
            shutdown.clone(),
        ));
        tokio::spawn(write_loop(
            writer,
            outbound_rx,
            Arc::clone(&status_tx),
            shutdown.clone(),
        ));

        Ok(Self {
            origin_id,
            outbound,
            status,
            status_tx,
            inbound: Some(inbound),
            max_frame_len: config.max_frame_len,
            shutdown,
        })
    }

    /// Connects using a bare address and default limits.
    pub async fn connect_addr(addr: &str, origin_id: OriginId) -> PadResult<Self> {
        Self::connect(&ChannelConfig::new(addr), origin_id).await
    }

    pub fn origin_id(&self) -> &OriginId {
        &self.origin_id
    }

    /// Broadcasts `content` as a documentChanged event from this participant.
    pub fn send(&self, content: &str) -> PadResult<()> {
        let event = ChannelEvent::document_changed(content, self.origin_id.clone());
        self.broadcast(&event)
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// A receiver that observes every status change.
    pub fn status_watch(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Resolves once the connection is no longer up.
    pub async fn closed(&self) {
        let mut status = self.status.clone();
        let _ = status.wait_for(|s| !s.is_connected()).await;
    }

    /// Takes the inbound event stream. Only the first call returns it.
    pub fn remote_changes(&mut self) -> Option<RemoteChanges> {
        self.inbound.take().map(|rx| RemoteChanges { rx })
    }

    /// Invokes `handler` once per remote event on a spawned task.
    ///
    /// Returns `None` if the stream was already taken.
    pub fn on_remote_change<F>(&mut self, mut handler: F) -> Option<JoinHandle<()>>
    where
        F: FnMut(ChannelEvent) + Send + 'static,
    {
        let mut changes = self.remote_changes()?;
        Some(tokio::spawn(async move {
            while let Some(event) = changes.recv().await {
                handler(event);
            }
        }))
    }

    /// Tears the connection down. Missed events are not replayed.
    pub fn disconnect(&self) {
        self.shutdown.cancel();
        self.status_tx.send_replace(ConnectionStatus::Disconnected);
    }
}

impl Broadcaster for ChannelHandle {
    fn broadcast(&self, event: &ChannelEvent) -> PadResult<()> {
        if !self.status().is_connected() {
            return Err(PadError::ChannelDisconnect);
        }
        let frame = event.encode()?;
        if frame.len() > self.max_frame_len {
            return Err(PadError::codec(format!(
                "frame of {} bytes exceeds the {} byte limit",
                frame.len(),
                self.max_frame_len
            )));
        }
        self.outbound.send(frame).map_err(|_| PadError::ChannelDisconnect)
    }

    fn status(&self) -> ConnectionStatus {
        ChannelHandle::status(self)
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// =============================================================================
// IO TASKS
// =============================================================================

async fn read_loop(
    mut reader: FramedRead<tokio::net::tcp::OwnedReadHalf, LinesCodec>,
    origin_id: OriginId,
    inbound: mpsc::UnboundedSender<ChannelEvent>,
    status: Arc<watch::Sender<ConnectionStatus>>,
    shutdown: CancellationToken,
) {
    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = reader.next() => line,
        };
        match line {
            Some(Ok(frame)) => match ChannelEvent::decode(&frame) {
                Ok(event) if event.is_from(&origin_id) => {
                    tracing::trace!(origin = %origin_id, "dropping echoed event");
                }
                Ok(event) => {
                    if inbound.send(event).is_err() {
                        tracing::trace!("remote change receiver dropped");
                    }
                }
                Err(err) => tracing::warn!(error = %err, "skipping malformed frame"),
            },
            Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                tracing::warn!("skipping oversized frame");
            }
            Some(Err(LinesCodecError::Io(err))) => {
                tracing::warn!(error = %err, "relay connection failed");
                break;
            }
            None => {
                tracing::info!(origin = %origin_id, "relay closed the connection");
                break;
            }
        }
    }
    status.send_replace(ConnectionStatus::Disconnected);
    shutdown.cancel();
}

async fn write_loop(
    mut writer: FramedWrite<tokio::net::tcp::OwnedWriteHalf, LinesCodec>,
    mut outbound: mpsc::UnboundedReceiver<String>,
    status: Arc<watch::Sender<ConnectionStatus>>,
    shutdown: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = shutdown.cancelled() => break,
            frame = outbound.recv() => frame,
        };
        let Some(frame) = frame else { break };
        if let Err(err) = writer.send(frame).await {
            tracing::warn!(error = %err, "failed to write frame");
            break;
        }
    }
    status.send_replace(ConnectionStatus::Disconnected);
    shutdown.cancel();
}
