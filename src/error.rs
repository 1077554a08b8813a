//! Error types for the shared editing session.

use thiserror::Error;

/// Result type alias for pairpad operations.
pub type PadResult<T> = Result<T, PadError>;

/// Errors that can occur while editing, syncing or formatting a session.
///
/// Execution faults never appear here: the sandbox folds them into
/// [`crate::sandbox::ExecutionResult`] data instead.
#[derive(Error, Debug)]
pub enum PadError {
    /// I/O error on the relay transport or while reading input files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The synchronization channel is not connected.
    #[error("Channel disconnected")]
    ChannelDisconnect,

    /// The external formatter rejected the content.
    #[error("Format failure: {0}")]
    FormatFailure(String),

    /// The advisory backend could not produce a suggestion.
    #[error("Advisory failure: {0}")]
    AdvisoryFailure(String),

    /// A language name did not match any known language.
    #[error("Unknown language: {0}")]
    UnknownLanguage(String),

    /// A wire frame could not be encoded or decoded.
    #[error("Codec error: {0}")]
    Codec(String),

    /// Configuration could not be loaded or parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Index out of bounds for the snapshot history.
    #[error("Snapshot {index} out of bounds for history of length {length}")]
    SnapshotOutOfBounds { index: usize, length: usize },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PadError {
    /// Creates a FormatFailure error.
    pub fn format_failure(msg: impl Into<String>) -> Self {
        Self::FormatFailure(msg.into())
    }

    /// Creates an AdvisoryFailure error.
    pub fn advisory_failure(msg: impl Into<String>) -> Self {
        Self::AdvisoryFailure(msg.into())
    }

    /// Creates an UnknownLanguage error.
    pub fn unknown_language(name: impl Into<String>) -> Self {
        Self::UnknownLanguage(name.into())
    }

    /// Creates a Codec error.
    pub fn codec(msg: impl Into<String>) -> Self {
        Self::Codec(msg.into())
    }

    /// Creates a Config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a SnapshotOutOfBounds error.
    pub fn snapshot_out_of_bounds(index: usize, length: usize) -> Self {
        Self::SnapshotOutOfBounds { index, length }
    }

    /// Creates a Serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// True for errors that only mean "not connected right now".
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::ChannelDisconnect)
    }
}

impl From<serde_json::Error> for PadError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(feature = "net")]
impl From<tokio_util::codec::LinesCodecError> for PadError {
    fn from(err: tokio_util::codec::LinesCodecError) -> Self {
        match err {
            tokio_util::codec::LinesCodecError::Io(io) => Self::Io(io),
            tokio_util::codec::LinesCodecError::MaxLineLengthExceeded => {
                Self::codec("frame exceeds maximum line length")
            }
        }
    }
}
