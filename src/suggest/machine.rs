//! Debounce/cancel state machine for advisory requests.
//!
//! The machine is pure: callers pass the current time in, so every
//! transition can be driven without a runtime. [`SuggestionClient`] runs it
//! on tokio.
//!
//! [`SuggestionClient`]: super::client::SuggestionClient

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

/// Suggestion panel text while a request is in flight.
pub const FETCHING_MESSAGE: &str = "Fetching AI suggestion...";
/// Suggestion panel text after a failed or timed-out request.
pub const FALLBACK_MESSAGE: &str = "AI suggestions are unavailable right now.";
/// Suggestion panel text before any suggestion exists.
pub const PLACEHOLDER_MESSAGE: &str = "Type some code to see AI suggestions...";

/// Default quiet period before a request is issued.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Identifies one advisory request. Strictly increasing per machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RequestToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Resolved,
    Cancelled,
}

/// One advisory request and its lifecycle status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionRequest {
    input_snapshot: String,
    token: RequestToken,
    status: RequestStatus,
}

impl SuggestionRequest {
    /// The document content the request was made for.
    pub fn input_snapshot(&self) -> &str {
        &self.input_snapshot
    }

    pub fn token(&self) -> RequestToken {
        self.token
    }

    pub fn status(&self) -> RequestStatus {
        self.status
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionState {
    Idle,
    /// Waiting for the document to go quiet until `deadline`.
    Debouncing { deadline: Instant },
    Pending { token: RequestToken },
    Resolved { token: RequestToken },
    Cancelled,
}

/// What the suggestion panel shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SuggestionDisplay {
    #[default]
    Placeholder,
    Fetching,
    Suggestion(String),
    Fallback,
}

impl SuggestionDisplay {
    pub fn text(&self) -> &str {
        match self {
            Self::Placeholder => PLACEHOLDER_MESSAGE,
            Self::Fetching => FETCHING_MESSAGE,
            Self::Suggestion(text) => text,
            Self::Fallback => FALLBACK_MESSAGE,
        }
    }
}

/// What happened to a backend response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// Matched the current request and is now displayed.
    Surfaced,
    /// Failure for the current request; the fallback is displayed.
    Fallback,
    /// Carried an old token and was dropped.
    Stale,
}

/// The Suggestion Client state machine.
#[derive(Debug)]
pub struct SuggestionMachine {
    debounce: Duration,
    state: SuggestionState,
    latest_content: String,
    next_token: u64,
    current: Option<SuggestionRequest>,
    display: SuggestionDisplay,
}

impl Default for SuggestionMachine {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl SuggestionMachine {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            state: SuggestionState::Idle,
            latest_content: String::new(),
            next_token: 1,
            current: None,
            display: SuggestionDisplay::default(),
        }
    }

    pub fn state(&self) -> SuggestionState {
        self.state
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// The most recently issued request, with its current status.
    pub fn current_request(&self) -> Option<&SuggestionRequest> {
        self.current.as_ref()
    }

    pub fn display(&self) -> &SuggestionDisplay {
        &self.display
    }

    pub fn display_text(&self) -> &str {
        self.display.text()
    }

    /// When the debounce window closes, if one is open.
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            SuggestionState::Debouncing { deadline } => Some(deadline),
            _ => None,
        }
    }

    /// A document change: (re)opens the debounce window.
    ///
    /// If a request was pending it is cancelled and returned, so the caller
    /// can abort the in-flight call.
    pub fn on_change(
        &mut self,
        content: impl Into<String>,
        now: Instant,
    ) -> Option<SuggestionRequest> {
        self.latest_content = content.into();
        let cancelled = match self.state {
            SuggestionState::Pending { .. } => self.current.as_mut().map(|request| {
                request.status = RequestStatus::Cancelled;
                request.clone()
            }),
            _ => None,
        };
        self.state = SuggestionState::Debouncing {
            deadline: now + self.debounce,
        };
        cancelled
    }

    /// Issues a request once the debounce window has elapsed.
    pub fn poll_deadline(&mut self, now: Instant) -> Option<SuggestionRequest> {
        match self.state {
            SuggestionState::Debouncing { deadline } if now >= deadline => {}
            _ => return None,
        }
        let token = RequestToken(self.next_token);
        self.next_token += 1;

        let request = SuggestionRequest {
            input_snapshot: self.latest_content.clone(),
            token,
            status: RequestStatus::Pending,
        };
        self.current = Some(request.clone());
        self.state = SuggestionState::Pending { token };
        self.display = SuggestionDisplay::Fetching;
        Some(request)
    }

    /// Feeds a backend result back in. Only the current pending token counts.
    pub fn on_response<E>(
        &mut self,
        token: RequestToken,
        result: Result<String, E>,
    ) -> ResponseOutcome {
        if self.state != (SuggestionState::Pending { token }) {
            return ResponseOutcome::Stale;
        }
        match result {
            Ok(text) => {
                if let Some(request) = self.current.as_mut() {
                    request.status = RequestStatus::Resolved;
                }
                self.state = SuggestionState::Resolved { token };
                self.display = SuggestionDisplay::Suggestion(text);
                ResponseOutcome::Surfaced
            }
            Err(_) => {
                if let Some(request) = self.current.as_mut() {
                    request.status = RequestStatus::Cancelled;
                }
                self.state = SuggestionState::Idle;
                self.display = SuggestionDisplay::Fallback;
                ResponseOutcome::Fallback
            }
        }
    }

    /// Abandons any open window or pending request.
    pub fn cancel(&mut self) -> Option<SuggestionRequest> {
        match self.state {
            SuggestionState::Debouncing { .. } => {
                self.state = SuggestionState::Cancelled;
                None
            }
            SuggestionState::Pending { .. } => {
                self.state = SuggestionState::Cancelled;
                self.current.as_mut().map(|request| {
                    request.status = RequestStatus::Cancelled;
                    request.clone()
                })
            }
            _ => None,
        }
    }
}
