//! Suggestion Client
//!
//! Debounces document changes, keeps at most one advisory request in flight
//! and never surfaces a reply for anything but the latest request.

pub mod backend;
pub mod client;
pub mod http;
pub mod machine;

pub use backend::{AdvisoryBackend, AdvisoryError, AdvisoryRequest, AdvisoryResponse, StubAdvisor};
pub use client::{SuggestionClient, SuggestionUpdate, DEFAULT_REQUEST_TIMEOUT};
pub use http::HttpAdvisor;
pub use machine::{
    RequestStatus, RequestToken, ResponseOutcome, SuggestionDisplay, SuggestionMachine,
    SuggestionRequest, SuggestionState, DEFAULT_DEBOUNCE, FALLBACK_MESSAGE, FETCHING_MESSAGE,
    PLACEHOLDER_MESSAGE,
};
