//! Synchronization Channel
//!
//! Participants exchange whole-buffer [`ChannelEvent`]s through a relay that
//! forwards every frame to every other peer. There is no merge: the last
//! event applied wins, and each receiver drops events carrying its own
//! [`OriginId`].

pub mod event;

#[cfg(feature = "net")]
pub mod channel;
#[cfg(feature = "net")]
pub mod relay;

pub use event::{ChannelEvent, ConnectionStatus, OriginId};

#[cfg(feature = "net")]
pub use channel::{ChannelConfig, ChannelHandle, RemoteChanges};
#[cfg(feature = "net")]
pub use relay::{Relay, RelayConfig, RelayHandle};

use crate::error::PadResult;

/// Outbound side of a channel, as seen by the session that owns it.
pub trait Broadcaster: Send {
    /// Queues `event` for every other participant. Must not block.
    fn broadcast(&self, event: &ChannelEvent) -> PadResult<()>;

    /// Current connection state.
    fn status(&self) -> ConnectionStatus;
}
