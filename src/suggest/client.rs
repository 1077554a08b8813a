//! Async driver for the suggestion state machine.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::backend::{AdvisoryBackend, AdvisoryError, AdvisoryRequest, AdvisoryResponse};
use super::machine::{RequestToken, ResponseOutcome, SuggestionMachine, DEFAULT_DEBOUNCE};

/// Default upper bound on one advisory call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

type Reply = (RequestToken, Result<AdvisoryResponse, AdvisoryError>);

/// What the suggestion panel should change to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuggestionUpdate {
    /// A request was issued.
    Fetching { token: RequestToken },
    /// The current request produced a suggestion.
    Resolved { token: RequestToken, text: String },
    /// The current request failed or timed out; the fallback is shown.
    Failed { token: RequestToken, reason: String },
}

/// Debounces document changes into advisory calls and drops stale replies.
///
/// Feed it changes with [`notify_change`](Self::notify_change) and await
/// [`next_update`](Self::next_update) in a `select!` loop; that future is
/// cancel-safe.
pub struct SuggestionClient {
    backend: Arc<dyn AdvisoryBackend>,
    machine: SuggestionMachine,
    request_timeout: Duration,
    in_flight: Option<(RequestToken, JoinHandle<()>)>,
    replies_tx: mpsc::UnboundedSender<Reply>,
    replies_rx: mpsc::UnboundedReceiver<Reply>,
}

impl SuggestionClient {
    pub fn new(backend: Arc<dyn AdvisoryBackend>) -> Self {
        let (replies_tx, replies_rx) = mpsc::unbounded_channel();
        Self {
            backend,
            machine: SuggestionMachine::new(DEFAULT_DEBOUNCE),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            in_flight: None,
            replies_tx,
            replies_rx,
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.machine = SuggestionMachine::new(debounce);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn machine(&self) -> &SuggestionMachine {
        &self.machine
    }

    pub fn display_text(&self) -> &str {
        self.machine.display_text()
    }

    /// Restarts the debounce window for `content`, aborting any in-flight call.
    pub fn notify_change(&mut self, content: impl Into<String>) {
        if let Some(cancelled) = self.machine.on_change(content, Instant::now()) {
            tracing::debug!(token = %cancelled.token(), "suggestion request superseded");
            self.abort_in_flight();
        }
    }

    /// Abandons the open window and any in-flight call.
    pub fn cancel(&mut self) {
        self.machine.cancel();
        self.abort_in_flight();
    }

    /// Waits for the next visible change. Pends forever while idle.
    pub async fn next_update(&mut self) -> SuggestionUpdate {
        loop {
            let deadline = self.machine.deadline();
            tokio::select! {
                Some((token, result)) = self.replies_rx.recv() => {
                    if let Some(update) = self.handle_reply(token, result) {
                        return update;
                    }
                }
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)),
                    if deadline.is_some() =>
                {
                    if let Some(token) = self.issue(Instant::now()) {
                        return SuggestionUpdate::Fetching { token };
                    }
                }
            }
        }
    }

    fn issue(&mut self, now: Instant) -> Option<RequestToken> {
        let request = self.machine.poll_deadline(now)?;
        let token = request.token();
        let backend = Arc::clone(&self.backend);
        let replies = self.replies_tx.clone();
        let timeout = self.request_timeout;
        let snapshot = request.input_snapshot().to_string();

        tracing::debug!(%token, bytes = snapshot.len(), "issuing suggestion request");
        let handle = tokio::spawn(async move {
            let call = backend.suggest(AdvisoryRequest::new(snapshot));
            let result = match tokio::time::timeout(timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(AdvisoryError::Timeout(timeout)),
            };
            let _ = replies.send((token, result));
        });
        self.in_flight = Some((token, handle));
        Some(token)
    }

    fn handle_reply(
        &mut self,
        token: RequestToken,
        result: Result<AdvisoryResponse, AdvisoryError>,
    ) -> Option<SuggestionUpdate> {
        if matches!(self.in_flight, Some((current, _)) if current == token) {
            self.in_flight = None;
        }
        let reason = result.as_ref().err().map(ToString::to_string);
        match self.machine.on_response(token, result.map(|r| r.suggestion_text)) {
            ResponseOutcome::Surfaced => Some(SuggestionUpdate::Resolved {
                token,
                text: self.machine.display_text().to_string(),
            }),
            ResponseOutcome::Fallback => {
                let reason = reason.unwrap_or_default();
                tracing::warn!(%token, %reason, "suggestion request failed");
                Some(SuggestionUpdate::Failed { token, reason })
            }
            ResponseOutcome::Stale => {
                tracing::debug!(%token, "discarding stale suggestion");
                None
            }
        }
    }

    fn abort_in_flight(&mut self) {
        if let Some((_, handle)) = self.in_flight.take() {
            handle.abort();
        }
    }
}

impl Drop for SuggestionClient {
    fn drop(&mut self) {
        self.abort_in_flight();
    }
}

impl std::fmt::Debug for SuggestionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuggestionClient")
            .field("machine", &self.machine)
            .field("request_timeout", &self.request_timeout)
            .field("in_flight", &self.in_flight.as_ref().map(|(token, _)| *token))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::suggest::machine::FALLBACK_MESSAGE;

    /// Echoes the snapshot back after a delay and records every call.
    struct Recorder {
        delay: Duration,
        calls: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                delay,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AdvisoryBackend for Recorder {
        async fn suggest(
            &self,
            request: AdvisoryRequest,
        ) -> Result<AdvisoryResponse, AdvisoryError> {
            self.calls.lock().unwrap().push(request.snapshot.clone());
            tokio::time::sleep(self.delay).await;
            if request.snapshot == "fail" {
                return Err(AdvisoryError::unavailable("boom"));
            }
            Ok(AdvisoryResponse {
                suggestion_text: format!("for {}", request.snapshot),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_produces_one_call() {
        let backend = Recorder::new(Duration::from_millis(1000));
        let mut client = SuggestionClient::new(backend.clone());

        client.notify_change("a");
        tokio::time::sleep(Duration::from_millis(50)).await;
        client.notify_change("ab");

        let start = Instant::now();
        let fetching = client.next_update().await;
        assert!(start.elapsed() >= Duration::from_millis(300));
        let token = match fetching {
            SuggestionUpdate::Fetching { token } => token,
            other => panic!("unexpected update: {other:?}"),
        };

        assert_eq!(
            client.next_update().await,
            SuggestionUpdate::Resolved {
                token,
                text: "for ab".to_string()
            }
        );
        assert_eq!(backend.calls(), vec!["ab".to_string()]);
        assert_eq!(client.display_text(), "for ab");
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_while_pending_supersedes_request() {
        let backend = Recorder::new(Duration::from_millis(1000));
        let mut client =
            SuggestionClient::new(backend.clone()).with_debounce(Duration::from_millis(100));

        client.notify_change("one");
        let first = client.next_update().await;
        tokio::time::advance(Duration::from_millis(500)).await;
        client.notify_change("two");

        let second = client.next_update().await;
        assert_ne!(first, second);
        match client.next_update().await {
            SuggestionUpdate::Resolved { text, .. } => assert_eq!(text, "for two"),
            other => panic!("unexpected update: {other:?}"),
        }
        assert_eq!(backend.calls(), vec!["one".to_string(), "two".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_shows_fallback() {
        let backend = Recorder::new(Duration::from_secs(60));
        let mut client =
            SuggestionClient::new(backend).with_request_timeout(Duration::from_secs(2));

        client.notify_change("slow");
        client.next_update().await;
        match client.next_update().await {
            SuggestionUpdate::Failed { reason, .. } => assert!(reason.contains("timed out")),
            other => panic!("unexpected update: {other:?}"),
        }
        assert_eq!(client.display_text(), FALLBACK_MESSAGE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backend_error_then_recovery() {
        let backend = Recorder::new(Duration::from_millis(10));
        let mut client = SuggestionClient::new(backend);

        client.notify_change("fail");
        client.next_update().await;
        assert!(matches!(client.next_update().await, SuggestionUpdate::Failed { .. }));

        client.notify_change("ok");
        client.next_update().await;
        assert!(matches!(client.next_update().await, SuggestionUpdate::Resolved { .. }));
    }
}
