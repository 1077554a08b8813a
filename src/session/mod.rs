//! Session State module.
//!
//! Each participant owns one [`SessionState`]: the shared buffer as last
//! seen, the language selector, the snapshot history and display flags.

pub mod manager;
pub mod model;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-exports for convenience
pub use manager::{SessionState, SNAPSHOT_SAVED};
pub use model::{Document, History, Language, Notice, SnapshotEntry, Theme, INITIAL_CONTENT};

#[cfg(feature = "wasm")]
pub use wasm::JsSession;
