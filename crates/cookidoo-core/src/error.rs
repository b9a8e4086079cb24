//! Error types for the Cookidoo Today service
//!
//! Two layers live here:
//! - [`FetchError`]: data-plane failures produced by an API client. Only two
//!   kinds exist, and the coordinator treats both the same way.
//! - [`Error`]: everything else (setup, configuration, lifecycle).

use serde::Serialize;
use thiserror::Error;

/// Result type alias for Cookidoo Today operations
pub type Result<T> = std::result::Result<T, Error>;

/// The two failure kinds a caller ever needs to distinguish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Network unreachable, timeout, or HTTP status >= 400
    ConnectFailed,
    /// Body is not JSON, or not an object where one was required
    InvalidResponse,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::ConnectFailed => f.write_str("connect failed"),
            FailureKind::InvalidResponse => f.write_str("invalid response"),
        }
    }
}

/// A failed fetch: a kind plus a human-readable reason
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{kind}: {message}")]
pub struct FetchError {
    /// Failure category
    pub kind: FailureKind,
    /// Reason string, surfaced next to `last_update_success`
    pub message: String,
    /// HTTP status, when the failure was an error status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl FetchError {
    /// Create a connectivity failure (network, timeout, HTTP error status)
    pub fn connect_failed(msg: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::ConnectFailed,
            message: msg.into(),
            status: None,
        }
    }

    /// Create a connectivity failure for an HTTP error status
    pub fn http_status(status: u16, url: &str) -> Self {
        Self {
            kind: FailureKind::ConnectFailed,
            message: format!("HTTP {} for {}", status, url),
            status: Some(status),
        }
    }

    /// Create an invalid-response failure (malformed or wrong-shaped body)
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::InvalidResponse,
            message: msg.into(),
            status: None,
        }
    }

    pub fn is_connect_failed(&self) -> bool {
        self.kind == FailureKind::ConnectFailed
    }

    pub fn is_invalid_response(&self) -> bool {
        self.kind == FailureKind::InvalidResponse
    }
}

/// Core error type for the Cookidoo Today service
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The mandatory first refresh failed; the entry never becomes ready
    #[error("Setup aborted, first refresh failed: {0}")]
    NotReady(FetchError),

    /// Lifecycle misuse (e.g. a second first refresh)
    #[error("Setup error: {0}")]
    Setup(String),

    /// An entry with the same id is already registered
    #[error("Entry already configured: {0}")]
    AlreadyConfigured(String),

    /// Unknown entry or endpoint
    #[error("Not found: {0}")]
    NotFound(String),

    /// The coordinator was shut down, or the fetch being waited on was abandoned
    #[error("Coordinator shut down: {0}")]
    Shutdown(String),

    /// A fetch failed outside of the coordinator (e.g. direct client use)
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a setup (lifecycle) error
    pub fn setup(msg: impl Into<String>) -> Self {
        Self::Setup(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a shutdown error
    pub fn shutdown(msg: impl Into<String>) -> Self {
        Self::Shutdown(msg.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
