//! Wire events exchanged over the synchronization channel.
//!
//! One event is one JSON object on one line:
//!
//! ```json
//! {"kind":"documentChanged","content":"console.log(1)","originId":"6f1c..."}
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PadError, PadResult};

// =============================================================================
// ORIGIN ID
// =============================================================================

/// Identifies the participant that emitted an event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OriginId(String);

impl OriginId {
    /// Generates a fresh random origin id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wraps an existing id (e.g. one supplied by a browser host).
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OriginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// CHANNEL EVENT
// =============================================================================

/// The wire unit of the synchronization channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ChannelEvent {
    /// The full buffer of the emitting participant.
    DocumentChanged {
        content: String,
        #[serde(rename = "originId")]
        origin_id: OriginId,
    },
}

impl ChannelEvent {
    /// Creates a documentChanged event.
    pub fn document_changed(content: impl Into<String>, origin_id: OriginId) -> Self {
        Self::DocumentChanged {
            content: content.into(),
            origin_id,
        }
    }

    /// The participant that emitted this event.
    pub fn origin_id(&self) -> &OriginId {
        match self {
            Self::DocumentChanged { origin_id, .. } => origin_id,
        }
    }

    /// The buffer content carried by this event.
    pub fn content(&self) -> &str {
        match self {
            Self::DocumentChanged { content, .. } => content,
        }
    }

    /// True when this event was emitted by `origin`.
    pub fn is_from(&self, origin: &OriginId) -> bool {
        self.origin_id() == origin
    }

    /// Encodes the event as a single-line JSON frame (without the newline).
    pub fn encode(&self) -> PadResult<String> {
        serde_json::to_string(self).map_err(PadError::from)
    }

    /// Decodes one frame.
    pub fn decode(frame: &str) -> PadResult<Self> {
        serde_json::from_str(frame.trim_end()).map_err(|e| PadError::codec(e.to_string()))
    }
}

// =============================================================================
// CONNECTION STATUS
// =============================================================================

/// Side-channel signal describing the relay connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionStatus {
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        };
        f.write_str(label)
    }
}

// =============================================================================
// TESTS
// =============================================================================
