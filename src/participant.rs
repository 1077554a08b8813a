//! One participant's event loop.
//!
//! A [`Participant`] is the only owner of its [`SessionState`]. User
//! commands, remote changes, suggestion updates and connection status all
//! arrive through a single `select!`, so the document is never mutated from
//! two places at once.

use std::future::pending;

use tokio::sync::{mpsc, watch};

use crate::format::Formatter;
use crate::sandbox::{ExecutionResult, Sandbox};
use crate::session::{Language, Notice, SessionState, SnapshotEntry, Theme};
use crate::suggest::{SuggestionClient, SuggestionUpdate};
use crate::sync::{ChannelEvent, ChannelHandle, ConnectionStatus, RemoteChanges};

/// Notice raised by a format request when no formatter is configured.
pub const NO_FORMATTER_MESSAGE: &str = "No formatter configured";

/// Something the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParticipantCommand {
    /// Replace the buffer.
    Edit(String),
    /// Add text to the end of the buffer.
    Append(String),
    SetLanguage(Language),
    ToggleTheme,
    Snapshot,
    Run,
    Format,
    /// Report the buffer.
    Show,
    /// Report the snapshot history.
    History,
    /// Report connection and document status.
    Status,
    Quit,
}

/// Something the presentation layer should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParticipantUpdate {
    ContentChanged {
        content: String,
        revision: u64,
        remote: bool,
    },
    Execution(ExecutionResult),
    Suggestion(String),
    Notice(Notice),
    LanguageChanged(Language),
    ThemeChanged(Theme),
    SnapshotSaved(SnapshotEntry),
    History(Vec<SnapshotEntry>),
    Status {
        connection: ConnectionStatus,
        revision: u64,
        language: Language,
        theme: Theme,
    },
    Connection(ConnectionStatus),
}

/// Owns a session, its sandbox, its suggestion client and its channel.
pub struct Participant {
    session: SessionState,
    sandbox: Sandbox,
    suggestions: SuggestionClient,
    formatter: Option<Box<dyn Formatter + Send>>,
    remote: Option<RemoteChanges>,
    status: Option<watch::Receiver<ConnectionStatus>>,
}

impl Participant {
    pub fn new(session: SessionState, sandbox: Sandbox, suggestions: SuggestionClient) -> Self {
        Self {
            session,
            sandbox,
            suggestions,
            formatter: None,
            remote: None,
            status: None,
        }
    }

    /// Builder: Broadcast local edits on `channel` and apply its remote changes.
    pub fn with_channel(mut self, mut channel: ChannelHandle) -> Self {
        self.remote = channel.remote_changes();
        self.status = Some(channel.status_watch());
        self.session.attach_channel(channel);
        self
    }

    /// Builder: Set the formatter used by [`ParticipantCommand::Format`].
    pub fn with_formatter(mut self, formatter: impl Formatter + Send + 'static) -> Self {
        self.formatter = Some(Box::new(formatter));
        self
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Processes events until `Quit` or until `commands` closes.
    ///
    /// Returns the session so callers can inspect the final state.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<ParticipantCommand>,
        updates: mpsc::UnboundedSender<ParticipantUpdate>,
    ) -> SessionState {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    None | Some(ParticipantCommand::Quit) => break,
                    Some(command) => {
                        for update in self.handle_command(command) {
                            let _ = updates.send(update);
                        }
                    }
                },
                event = next_remote(&mut self.remote) => match event {
                    Some(event) => {
                        if let Some(update) = self.handle_remote(&event) {
                            let _ = updates.send(update);
                        }
                    }
                    None => self.remote = None,
                },
                update = self.suggestions.next_update() => {
                    let _ = updates.send(self.handle_suggestion(update));
                }
                status = next_status(&mut self.status) => match status {
                    Some(status) => {
                        tracing::info!(%status, "connection status changed");
                        let _ = updates.send(ParticipantUpdate::Connection(status));
                    }
                    None => self.status = None,
                },
            }
        }

        self.suggestions.cancel();
        if let Some(channel) = self.session.detach_channel() {
            tracing::debug!(status = %channel.status(), "leaving session");
        }
        self.session
    }

    /// Applies one command and returns what changed.
    pub fn handle_command(&mut self, command: ParticipantCommand) -> Vec<ParticipantUpdate> {
        match command {
            ParticipantCommand::Edit(content) => vec![self.local_edit(content)],
            ParticipantCommand::Append(text) => {
                let content = format!("{}{}", self.session.content(), text);
                vec![self.local_edit(content)]
            }
            ParticipantCommand::SetLanguage(language) => {
                self.session.set_language(language);
                vec![ParticipantUpdate::LanguageChanged(language)]
            }
            ParticipantCommand::ToggleTheme => {
                vec![ParticipantUpdate::ThemeChanged(self.session.toggle_theme())]
            }
            ParticipantCommand::Snapshot => {
                let entry = self.session.take_snapshot().clone();
                let mut updates = vec![ParticipantUpdate::SnapshotSaved(entry)];
                updates.extend(self.session.take_notice().map(ParticipantUpdate::Notice));
                updates
            }
            ParticipantCommand::Run => {
                let result = self.session.run(&mut self.sandbox).clone();
                vec![ParticipantUpdate::Execution(result)]
            }
            ParticipantCommand::Format => self.format(),
            ParticipantCommand::Show => vec![self.content_update(false)],
            ParticipantCommand::History => {
                vec![ParticipantUpdate::History(self.session.history().as_slice().to_vec())]
            }
            ParticipantCommand::Status => vec![ParticipantUpdate::Status {
                connection: self.session.connection_status(),
                revision: self.session.revision(),
                language: self.session.language(),
                theme: self.session.theme(),
            }],
            ParticipantCommand::Quit => Vec::new(),
        }
    }

    /// Applies a change from another participant.
    pub fn handle_remote(&mut self, event: &ChannelEvent) -> Option<ParticipantUpdate> {
        self.session
            .apply_remote(event)
            .then(|| self.content_update(true))
    }

    fn handle_suggestion(&self, update: SuggestionUpdate) -> ParticipantUpdate {
        if let SuggestionUpdate::Resolved { token, .. } = &update {
            tracing::debug!(%token, "suggestion ready");
        }
        ParticipantUpdate::Suggestion(self.suggestions.display_text().to_string())
    }

    fn local_edit(&mut self, content: String) -> ParticipantUpdate {
        self.session.apply_local_edit(content);
        self.suggestions.notify_change(self.session.content());
        self.content_update(false)
    }

    fn format(&mut self) -> Vec<ParticipantUpdate> {
        let Some(formatter) = self.formatter.as_deref() else {
            return vec![ParticipantUpdate::Notice(Notice::Error(NO_FORMATTER_MESSAGE.to_string()))];
        };
        match self.session.format_with(formatter) {
            Ok(_) => {
                self.suggestions.notify_change(self.session.content());
                vec![self.content_update(false)]
            }
            Err(_) => self
                .session
                .take_notice()
                .map(ParticipantUpdate::Notice)
                .into_iter()
                .collect(),
        }
    }

    fn content_update(&self, remote: bool) -> ParticipantUpdate {
        ParticipantUpdate::ContentChanged {
            content: self.session.content().to_string(),
            revision: self.session.revision(),
            remote,
        }
    }
}

impl std::fmt::Debug for Participant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Participant")
            .field("session", &self.session)
            .field("suggestions", &self.suggestions)
            .field("has_formatter", &self.formatter.is_some())
            .finish()
    }
}

async fn next_remote(remote: &mut Option<RemoteChanges>) -> Option<ChannelEvent> {
    match remote {
        Some(changes) => changes.recv().await,
        None => pending().await,
    }
}

async fn next_status(
    status: &mut Option<watch::Receiver<ConnectionStatus>>,
) -> Option<ConnectionStatus> {
    match status {
        Some(rx) => match rx.changed().await {
            Ok(()) => Some(*rx.borrow_and_update()),
            Err(_) => None,
        },
        None => pending().await,
    }
}
