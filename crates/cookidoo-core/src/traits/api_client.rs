// # API Client Trait
//
// Defines the interface for talking to the Cookidoo Today backend.
//
// ## Implementations
//
// - reqwest-based: `cookidoo-http` crate
// - Test doubles: `tests/common`
//
// ## Usage
//
// ```rust,ignore
// use cookidoo_core::ApiClient;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let client = /* ApiClient implementation */;
//
//     // Connectivity check
//     client.ping().await?;
//
//     // Today's document
//     let today = client.endpoint("today").unwrap();
//     let payload = client.fetch_json(today).await?;
//
//     Ok(())
// }
// ```

use crate::error::FetchError;
use async_trait::async_trait;

/// A JSON object returned by a JSON endpoint
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// What an endpoint serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointKind {
    /// A JSON object
    Json,
    /// Raw bytes (JPEG snapshots)
    Binary,
}

impl EndpointKind {
    /// Value of the `Accept` header sent for this kind
    pub fn accept(&self) -> &'static str {
        match self {
            EndpointKind::Json => "application/json",
            EndpointKind::Binary => "image/jpeg",
        }
    }
}

/// Endpoint descriptor, fixed at client construction
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Key of the endpoint ("today", "week", ...)
    pub name: String,
    /// Path relative to the base URL
    pub path: String,
    /// Accepted body kind
    pub kind: EndpointKind,
}

impl Endpoint {
    /// Create a JSON endpoint descriptor
    pub fn json(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind: EndpointKind::Json,
        }
    }

    /// Create a binary endpoint descriptor
    pub fn binary(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind: EndpointKind::Binary,
        }
    }
}

/// Trait for backend API clients
///
/// Implementations translate configuration into GET requests and typed
/// results. Every failure is reported as a [`FetchError`] of one of two
/// kinds; nothing is retried here. Retrying means waiting for the
/// coordinator's next tick.
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Fetch a JSON endpoint
    ///
    /// # Returns
    ///
    /// - `Ok(Payload)`: the parsed JSON object
    /// - `Err(FetchError)`: `ConnectFailed` for network errors, timeouts and
    ///   status >= 400; `InvalidResponse` for non-JSON or non-object bodies
    async fn fetch_json(&self, endpoint: &Endpoint) -> Result<Payload, FetchError>;

    /// Fetch a binary endpoint and return the raw body
    async fn fetch_binary(&self, endpoint: &Endpoint) -> Result<Vec<u8>, FetchError>;

    /// All endpoint descriptors, primary JSON endpoint first
    fn endpoints(&self) -> &[Endpoint];

    /// Look up an endpoint by name
    fn endpoint(&self, name: &str) -> Option<&Endpoint> {
        self.endpoints().iter().find(|e| e.name == name)
    }

    /// The primary JSON endpoint, used for connectivity checks
    fn primary_endpoint(&self) -> Option<&Endpoint> {
        self.endpoints()
            .iter()
            .find(|e| e.kind == EndpointKind::Json)
    }

    /// Light connectivity check
    ///
    /// Calls the primary JSON endpoint and discards the payload. The only
    /// contract is "does not fail" when the backend is healthy.
    async fn ping(&self) -> Result<(), FetchError> {
        let endpoint = self
            .primary_endpoint()
            .ok_or_else(|| FetchError::invalid_response("No JSON endpoint configured"))?;
        self.fetch_json(endpoint).await.map(|_| ())
    }

    /// Client name (for logging/debugging)
    fn client_name(&self) -> &'static str;
}
