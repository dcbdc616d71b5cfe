use thiserror::Error;

/// Per-attempt failure a single adapter call can raise inside the dispatcher
/// loop. Never surfaced to the caller directly — the dispatcher reduces it.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Provider answered but had nothing usable.
    #[error("empty result")]
    EmptyResult,
    /// Reserved for an unrecoverable failure while the response body itself
    /// was being read (not while parsing an already-read body — a malformed
    /// or unparseable body resolves to `EmptyResult` instead). No adapter
    /// currently raises this: `upstream::UpstreamClient::get` already folds
    /// read failures into `Transport` via `reqwest::Error`'s `From` impl.
    #[error("needs fix before retry")]
    NeedsFixBeforeRetry,
    /// Quota engine veto. Never leaves the dispatcher loop.
    #[error("skip provider")]
    SkipProvider,
    /// Provider's `Type` has no registered adapter.
    #[error("provider type not supported: {0}")]
    ProviderNotSupported(u8),
    /// Network or response-parsing failure.
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for DispatchError {
    fn from(err: reqwest::Error) -> Self {
        DispatchError::Transport(err.to_string())
    }
}

/// Error surfaced by the public API (C7), after the dispatcher has reduced
/// every per-attempt [`DispatchError`] down to one of these.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("no requests left")]
    NoRequestsLeft,
    #[error("empty result")]
    EmptyResult,
    #[error("{0}")]
    Generic(String),
}

/// Failures from loading/saving `Providers.json` / `AutoSavedProviders.json`.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("duplicate provider name in autosave file: {0}")]
    DuplicateName(String),
}
