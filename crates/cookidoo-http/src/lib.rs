// # HTTP API Client
//
// This crate provides the reqwest-based `ApiClient` for the Cookidoo Today
// backend.
//
// ## Behavior
//
// - One GET per call, no retries. Retrying is the coordinator's next tick.
// - Status >= 400, network errors and timeouts are `ConnectFailed`.
// - A body that is not JSON, or not a JSON object, is `InvalidResponse`.
// - The Content-Type header is not checked; the body decides.
//
// ## Credentials
//
// Credentials from the configuration are kept on the client for backends
// that need them, but are never sent or logged by this implementation.

use cookidoo_core::config::{ConnectionConfig, Credentials, join_url, normalize_base_url};
use cookidoo_core::traits::{ApiClient, Endpoint, EndpointKind, Payload};
use cookidoo_core::{Error, FetchError, Result};

use reqwest::header::ACCEPT;
use serde_json::Value;
use std::time::Duration;

/// reqwest-backed client for the Cookidoo Today backend
pub struct HttpApiClient {
    /// Normalized base URL, no trailing slash
    base_url: String,

    /// Endpoint descriptors, primary JSON endpoint first
    endpoints: Vec<Endpoint>,

    /// Per-request timeout
    timeout: Duration,

    /// Backend credentials, passed through untouched
    /// ⚠️ NEVER log these values
    credentials: Option<Credentials>,

    /// HTTP client for API requests
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpApiClient")
            .field("base_url", &self.base_url)
            .field("endpoints", &self.endpoints)
            .field("timeout", &self.timeout)
            .field("has_credentials", &self.credentials.is_some())
            .finish()
    }
}

impl HttpApiClient {
    /// Create a client from connection settings
    ///
    /// # Errors
    ///
    /// - `Error::Config` if the configuration is invalid or the underlying
    ///   HTTP client cannot be built
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        config.validate()?;

        let base_url = normalize_base_url(&config.base_url)?;
        let timeout = config.timeout();

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        if !config.verify_ssl {
            tracing::warn!("TLS certificate verification disabled for {}", base_url);
        }

        Ok(Self {
            base_url,
            endpoints: config.endpoints(),
            timeout,
            credentials: config.credentials.clone(),
            client,
        })
    }

    /// Normalized base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Credentials from the configuration, if any
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Absolute URL of an endpoint
    pub fn url_for(&self, endpoint: &Endpoint) -> String {
        join_url(&self.base_url, &endpoint.path)
    }

    /// GET an endpoint and return the raw body of a non-error response
    async fn get(&self, endpoint: &Endpoint) -> std::result::Result<(String, Vec<u8>), FetchError> {
        let url = self.url_for(endpoint);
        tracing::debug!("GET {} ({})", url, endpoint.name);

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, endpoint.kind.accept())
            .send()
            .await
            .map_err(|e| self.transport_error(&url, e))?;

        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(FetchError::http_status(status.as_u16(), &url));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(&url, e))?;

        Ok((url, body.to_vec()))
    }

    fn transport_error(&self, url: &str, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::connect_failed(format!("Timed out after {:?} for {}", self.timeout, url))
        } else {
            FetchError::connect_failed(format!("Request to {} failed: {}", url, e))
        }
    }
}

#[async_trait::async_trait]
impl ApiClient for HttpApiClient {
    async fn fetch_json(&self, endpoint: &Endpoint) -> std::result::Result<Payload, FetchError> {
        if endpoint.kind != EndpointKind::Json {
            return Err(FetchError::invalid_response(format!(
                "Endpoint '{}' does not serve JSON",
                endpoint.name
            )));
        }

        let (url, body) = self.get(endpoint).await?;

        let value: Value = serde_json::from_slice(&body)
            .map_err(|_| FetchError::invalid_response(format!("Non-JSON response from {}", url)))?;

        match value {
            Value::Object(payload) => Ok(payload),
            _ => Err(FetchError::invalid_response("Expected JSON object")),
        }
    }

    async fn fetch_binary(&self, endpoint: &Endpoint) -> std::result::Result<Vec<u8>, FetchError> {
        let (_, body) = self.get(endpoint).await?;
        Ok(body)
    }

    fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    fn client_name(&self) -> &'static str {
        "http"
    }
}
