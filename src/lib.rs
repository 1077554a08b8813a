//! pairpad - a shared code buffer for several people at once.
//!
//! The crate is built from three pieces around one [`SessionState`]:
//!
//! - **Synchronization**: every local edit is broadcast as a whole-buffer
//!   [`ChannelEvent`] through a fan-out relay. Receivers drop their own
//!   echoes and the last event applied wins.
//! - **Execution**: the [`Sandbox`] runs the buffer in an embedded
//!   JavaScript engine and returns what it printed.
//! - **Suggestions**: a debounced, cancellable client asks an advisory
//!   backend about the buffer and never shows a stale answer.
//!
//! # Example
//!
//! ```rust
//! use pairpad::{Language, OriginId, Sandbox, SessionState};
//!
//! let mut session = SessionState::new(OriginId::generate());
//! let mut sandbox = Sandbox::default();
//!
//! // Local edits are applied first, then broadcast (no channel here).
//! let event = session.apply_local_edit("console.log('hi', 1 + 1)");
//! assert_eq!(event.content(), "console.log('hi', 1 + 1)");
//!
//! let result = session.run(&mut sandbox);
//! assert_eq!(result.captured_output, vec!["hi 2"]);
//!
//! session.set_language(Language::Python);
//! assert!(!session.run(&mut sandbox).is_success());
//!
//! session.take_snapshot();
//! assert_eq!(session.history().len(), 1);
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod sandbox;
pub mod session;
pub mod sync;

#[cfg(feature = "net")]
pub mod participant;
#[cfg(feature = "net")]
pub mod suggest;

#[cfg(feature = "cli")]
pub mod telemetry;

// Re-exports for convenience
pub use config::PadConfig;
pub use error::{PadError, PadResult};
pub use format::{CommandFormatter, FormatError, Formatter};
pub use sandbox::{ExecutionLimits, ExecutionResult, ExecutionStatus, Sandbox};
pub use session::{Document, History, Language, Notice, SessionState, SnapshotEntry, Theme};
pub use sync::{Broadcaster, ChannelEvent, ConnectionStatus, OriginId};

#[cfg(feature = "net")]
pub use participant::{Participant, ParticipantCommand, ParticipantUpdate};
#[cfg(feature = "net")]
pub use suggest::{AdvisoryBackend, HttpAdvisor, StubAdvisor, SuggestionClient, SuggestionUpdate};
#[cfg(feature = "net")]
pub use sync::{ChannelHandle, Relay, RelayHandle};

#[cfg(feature = "wasm")]
pub use session::JsSession;
