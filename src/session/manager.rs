//! Session State: the mutable view one participant holds.
//!
//! All mutation goes through [`SessionState`], which keeps the ordering rules
//! in one place:
//! - local edits are applied before they are broadcast
//! - remote events replace the buffer unless they carry our own origin id
//! - snapshots copy the current buffer into an append-only history

use tracing::{debug, warn};

use super::model::{Document, History, Language, Notice, SnapshotEntry, Theme};
use crate::error::{PadError, PadResult};
use crate::format::Formatter;
use crate::sandbox::{ExecutionResult, Sandbox, NOT_RUN_MESSAGE};
use crate::sync::{Broadcaster, ChannelEvent, ConnectionStatus, OriginId};

/// Notice raised after a snapshot is captured.
pub const SNAPSHOT_SAVED: &str = "Snapshot saved!";

/// One participant's document, history and display flags, plus the channel
/// its local edits are broadcast on.
pub struct SessionState {
    origin_id: OriginId,
    document: Document,
    history: History,
    theme: Theme,
    last_execution: Option<ExecutionResult>,
    notice: Option<Notice>,
    channel: Option<Box<dyn Broadcaster>>,
}

impl SessionState {
    // =========================================================================
    // INITIALIZATION
    // =========================================================================

    /// Creates a session with the default document and no channel.
    pub fn new(origin_id: OriginId) -> Self {
        Self {
            origin_id,
            document: Document::default(),
            history: History::new(),
            theme: Theme::default(),
            last_execution: None,
            notice: None,
            channel: None,
        }
    }

    /// Builder: Start from an existing document.
    pub fn with_document(mut self, document: Document) -> Self {
        self.document = document;
        self
    }

    /// Builder: Attach a channel.
    pub fn with_channel(mut self, channel: impl Broadcaster + 'static) -> Self {
        self.attach_channel(channel);
        self
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    pub fn origin_id(&self) -> &OriginId {
        &self.origin_id
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn content(&self) -> &str {
        self.document.content()
    }

    pub fn language(&self) -> Language {
        self.document.language()
    }

    pub fn revision(&self) -> u64 {
        self.document.revision()
    }

    /// Read-only snapshot history.
    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn last_execution(&self) -> Option<&ExecutionResult> {
        self.last_execution.as_ref()
    }

    /// Output panel text: the last run, or the "not run yet" placeholder.
    pub fn output_text(&self) -> String {
        self.last_execution
            .as_ref()
            .map(ExecutionResult::display_text)
            .unwrap_or_else(|| NOT_RUN_MESSAGE.to_string())
    }

    /// The pending notice, if any, without acknowledging it.
    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    /// Acknowledges and returns the pending notice.
    pub fn take_notice(&mut self) -> Option<Notice> {
        self.notice.take()
    }

    // =========================================================================
    // CHANNEL
    // =========================================================================

    /// Installs the channel local edits are broadcast on, replacing any
    /// previous one.
    pub fn attach_channel(&mut self, channel: impl Broadcaster + 'static) {
        self.channel = Some(Box::new(channel));
    }

    /// Removes and returns the channel. Later edits stay local.
    pub fn detach_channel(&mut self) -> Option<Box<dyn Broadcaster>> {
        self.channel.take()
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.channel
            .as_ref()
            .map_or(ConnectionStatus::Disconnected, |channel| channel.status())
    }

    fn broadcast(&self, event: &ChannelEvent) {
        let Some(channel) = &self.channel else {
            return;
        };
        match channel.broadcast(event) {
            Ok(()) => {}
            Err(err) if err.is_disconnect() => {
                debug!("channel disconnected; edit kept locally");
            }
            Err(err) => warn!(error = %err, "failed to broadcast edit"),
        }
    }

    // =========================================================================
    // EDITS
    // =========================================================================

    /// Replaces the buffer with a locally typed value, then broadcasts it.
    ///
    /// Returns the event that was (or would have been) sent.
    pub fn apply_local_edit(&mut self, content: impl Into<String>) -> ChannelEvent {
        let revision = self.document.replace(content);
        let event = ChannelEvent::document_changed(self.document.content(), self.origin_id.clone());
        debug!(revision, "applied local edit");
        self.broadcast(&event);
        event
    }

    /// Applies an event received from the channel.
    ///
    /// Returns `false` for our own echoed events, which are ignored.
    pub fn apply_remote(&mut self, event: &ChannelEvent) -> bool {
        if event.is_from(&self.origin_id) {
            debug!("ignored echo of local edit");
            return false;
        }
        let revision = self.document.replace(event.content());
        debug!(origin = %event.origin_id(), revision, "applied remote edit");
        true
    }

    pub fn set_language(&mut self, language: Language) {
        self.document.set_language(language);
    }

    /// Flips the theme and returns the new one.
    pub fn toggle_theme(&mut self) -> Theme {
        self.theme = self.theme.toggled();
        self.theme
    }

    // =========================================================================
    // SNAPSHOTS, EXECUTION, FORMATTING
    // =========================================================================

    /// Appends a copy of the current buffer to the history.
    pub fn take_snapshot(&mut self) -> &SnapshotEntry {
        let entry = self.history.record(&self.document);
        debug!(sequence = entry.sequence(), revision = entry.revision(), "snapshot saved");
        self.notice = Some(Notice::Info(SNAPSHOT_SAVED.to_string()));
        entry
    }

    /// Runs the current buffer and keeps the result for display.
    pub fn run(&mut self, sandbox: &mut Sandbox) -> &ExecutionResult {
        let result = sandbox.execute(self.document.content(), self.document.language());
        self.last_execution.insert(result)
    }

    /// Reformats the buffer.
    ///
    /// On success the formatted text is applied as a local edit. On failure
    /// the buffer is left alone and an error notice is raised.
    pub fn format_with(&mut self, formatter: &dyn Formatter) -> PadResult<ChannelEvent> {
        match formatter.format(self.document.content(), self.document.language()) {
            Ok(formatted) => Ok(self.apply_local_edit(formatted)),
            Err(err) => {
                warn!(error = %err, "format failed");
                let message = err.to_string();
                self.notice = Some(Notice::Error(format!("Error formatting code: {}", message)));
                Err(PadError::format_failure(message))
            }
        }
    }
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionState")
            .field("origin_id", &self.origin_id)
            .field("document", &self.document)
            .field("history_len", &self.history.len())
            .field("theme", &self.theme)
            .field("connection", &self.connection_status())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::format::FormatError;
    use crate::sandbox::ExecutionStatus;

    /// Records broadcast events instead of sending them.
    #[derive(Clone, Default)]
    struct Recorder {
        sent: Arc<Mutex<Vec<ChannelEvent>>>,
        disconnected: bool,
    }

    impl Broadcaster for Recorder {
        fn broadcast(&self, event: &ChannelEvent) -> PadResult<()> {
            if self.disconnected {
                return Err(PadError::ChannelDisconnect);
            }
            self.sent.lock().unwrap().push(event.clone());
            Ok(())
        }

        fn status(&self) -> ConnectionStatus {
            if self.disconnected {
                ConnectionStatus::Disconnected
            } else {
                ConnectionStatus::Connected
            }
        }
    }

    fn session_with_recorder() -> (SessionState, Recorder) {
        let recorder = Recorder::default();
        let session = SessionState::new(OriginId::new("me")).with_channel(recorder.clone());
        (session, recorder)
    }

    #[test]
    fn test_local_edit_applies_then_broadcasts() {
        let (mut session, recorder) = session_with_recorder();
        let event = session.apply_local_edit("let a = 1");

        assert_eq!(session.content(), "let a = 1");
        assert_eq!(session.revision(), 1);
        assert_eq!(*recorder.sent.lock().unwrap(), vec![event.clone()]);
        assert!(event.is_from(&OriginId::new("me")));
    }

    #[test]
    fn test_echo_is_never_applied() {
        let (mut session, _) = session_with_recorder();
        session.apply_local_edit("mine");
        let echo = ChannelEvent::document_changed("stale echo", OriginId::new("me"));

        assert!(!session.apply_remote(&echo));
        assert_eq!(session.content(), "mine");
        assert_eq!(session.revision(), 1);
    }

    #[test]
    fn test_last_remote_write_wins() {
        let mut session = SessionState::new(OriginId::new("me"));
        session.apply_local_edit("typing...");
        assert!(session.apply_remote(&ChannelEvent::document_changed("A", OriginId::new("alice"))));
        assert!(session.apply_remote(&ChannelEvent::document_changed("B", OriginId::new("bob"))));
        assert_eq!(session.content(), "B");
    }

    #[test]
    fn test_revision_counts_adopted_changes_locally() {
        let (mut alice, recorder) = session_with_recorder();
        let mut bob = SessionState::new(OriginId::new("bob"));
        for i in 1..=3 {
            bob.apply_local_edit(format!("bob {i}"));
        }

        alice.apply_local_edit("alice 1");
        assert!(alice.apply_remote(&ChannelEvent::document_changed("bob 3", OriginId::new("bob"))));

        // Same content, independent counters.
        assert_eq!(alice.content(), bob.content());
        assert_eq!(alice.revision(), 2);
        assert_eq!(bob.revision(), 3);
        assert!(!alice.apply_remote(&recorder.sent.lock().unwrap()[0]));
        assert_eq!(alice.revision(), 2);
    }

    #[test]
    fn test_disconnected_channel_keeps_local_edits() {
        let recorder = Recorder {
            disconnected: true,
            ..Recorder::default()
        };
        let mut session = SessionState::new(OriginId::new("me")).with_channel(recorder);
        session.apply_local_edit("offline");
        assert_eq!(session.content(), "offline");
        assert_eq!(session.connection_status(), ConnectionStatus::Disconnected);
    }

    #[test]
    fn test_snapshots_are_append_only_copies() {
        let mut session = SessionState::new(OriginId::new("me"));
        let mut expected = Vec::new();
        for text in ["one", "two", "three"] {
            session.apply_local_edit(text);
            session.take_snapshot();
            expected.push(text);
        }
        session.apply_local_edit("four");

        let contents: Vec<_> = session.history().iter().map(SnapshotEntry::content).collect();
        assert_eq!(contents, expected);
        assert_eq!(session.history().len(), 3);
        assert_eq!(session.take_notice(), Some(Notice::Info(SNAPSHOT_SAVED.to_string())));
        assert_eq!(session.take_notice(), None);
    }

    #[test]
    fn test_run_records_result() {
        let mut session = SessionState::new(OriginId::new("me"));
        assert_eq!(session.output_text(), NOT_RUN_MESSAGE);

        session.apply_local_edit("console.log(6 * 7)");
        let mut sandbox = Sandbox::default();
        let result = session.run(&mut sandbox);
        assert_eq!(result.captured_output, vec!["42"]);

        session.set_language(Language::Python);
        assert_eq!(session.run(&mut sandbox).status, ExecutionStatus::Unsupported);
    }

    #[test]
    fn test_format_success_is_a_local_edit() {
        let (mut session, recorder) = session_with_recorder();
        session.apply_local_edit("a");
        let formatter =
            |content: &str, _: Language| Ok::<_, FormatError>(format!("{};\n", content));

        let event = session.format_with(&formatter).unwrap();
        assert_eq!(event.content(), "a;\n");
        assert_eq!(session.content(), "a;\n");
        assert_eq!(session.revision(), 2);
        assert_eq!(recorder.sent.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_format_failure_leaves_content_untouched() {
        let mut session = SessionState::new(OriginId::new("me"));
        session.apply_local_edit("broken(");
        let formatter = |_: &str, _: Language| {
            Err::<String, _>(FormatError::rejected("Unexpected token (1:8)"))
        };

        let err = session.format_with(&formatter).unwrap_err();
        assert!(matches!(err, PadError::FormatFailure(_)));
        assert_eq!(session.content(), "broken(");
        assert_eq!(session.revision(), 1);
        assert_eq!(
            session.take_notice(),
            Some(Notice::Error("Error formatting code: Unexpected token (1:8)".to_string()))
        );
    }

    #[test]
    fn test_theme_toggle() {
        let mut session = SessionState::new(OriginId::generate());
        assert_eq!(session.theme(), Theme::Dark);
        assert_eq!(session.toggle_theme(), Theme::Light);
    }
}
