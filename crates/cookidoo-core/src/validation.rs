//! Connection validation
//!
//! Checks a base URL and a live backend before an entry is set up, and maps
//! failures onto the small set of codes a setup form shows.

use crate::config::normalize_base_url;
use crate::error::FailureKind;
use crate::traits::ApiClient;
use thiserror::Error;
use tracing::debug;

/// Why a connection could not be validated
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// The URL is malformed, or the backend does not serve the endpoint
    #[error("invalid URL")]
    InvalidUrl,
    /// The backend is unreachable or answered with an error status
    #[error("cannot connect")]
    CannotConnect,
    /// The backend answered with something unexpected
    #[error("unknown error")]
    Unknown,
}

impl ValidationError {
    /// Stable error code for setup forms
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::InvalidUrl => "invalid_url",
            ValidationError::CannotConnect => "cannot_connect",
            ValidationError::Unknown => "unknown",
        }
    }
}

/// Normalize a user-supplied base URL, or fail with `InvalidUrl`
pub fn validate_base_url(raw: &str) -> Result<String, ValidationError> {
    normalize_base_url(raw).map_err(|e| {
        debug!("Rejected base URL: {}", e);
        ValidationError::InvalidUrl
    })
}

/// Ping the backend and classify the outcome
pub async fn validate_connection(client: &dyn ApiClient) -> Result<(), ValidationError> {
    match client.ping().await {
        Ok(()) => Ok(()),
        Err(e) => {
            debug!("Connection check against {} failed: {}", client.client_name(), e);
            match (e.kind, e.status) {
                (FailureKind::ConnectFailed, Some(404)) => Err(ValidationError::InvalidUrl),
                (FailureKind::ConnectFailed, _) => Err(ValidationError::CannotConnect),
                (FailureKind::InvalidResponse, _) => Err(ValidationError::Unknown),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::traits::{Endpoint, Payload};
    use async_trait::async_trait;

    struct FailingClient {
        error: FetchError,
        endpoints: Vec<Endpoint>,
    }

    impl FailingClient {
        fn new(error: FetchError) -> Self {
            Self {
                error,
                endpoints: vec![Endpoint::json("today", "/today")],
            }
        }
    }

    #[async_trait]
    impl ApiClient for FailingClient {
        async fn fetch_json(&self, _endpoint: &Endpoint) -> Result<Payload, FetchError> {
            Err(self.error.clone())
        }

        async fn fetch_binary(&self, _endpoint: &Endpoint) -> Result<Vec<u8>, FetchError> {
            Err(self.error.clone())
        }

        fn endpoints(&self) -> &[Endpoint] {
            &self.endpoints
        }

        fn client_name(&self) -> &'static str {
            "failing"
        }
    }

    #[tokio::test]
    async fn not_found_maps_to_invalid_url() {
        let client = FailingClient::new(FetchError::http_status(404, "http://host/today"));
        let err = validate_connection(&client).await.unwrap_err();
        assert_eq!(err.code(), "invalid_url");
    }

    #[tokio::test]
    async fn server_error_and_timeout_map_to_cannot_connect() {
        let client = FailingClient::new(FetchError::http_status(503, "http://host/today"));
        assert_eq!(
            validate_connection(&client).await,
            Err(ValidationError::CannotConnect)
        );

        let client = FailingClient::new(FetchError::connect_failed("timed out after 10s"));
        assert_eq!(
            validate_connection(&client).await,
            Err(ValidationError::CannotConnect)
        );
    }

    #[tokio::test]
    async fn invalid_body_maps_to_unknown() {
        let client = FailingClient::new(FetchError::invalid_response("Expected JSON object"));
        assert_eq!(
            validate_connection(&client).await,
            Err(ValidationError::Unknown)
        );
    }

    #[test]
    fn bad_url_is_rejected() {
        assert_eq!(validate_base_url(""), Err(ValidationError::InvalidUrl));
        assert_eq!(
            validate_base_url("cookidoo.lan:8000/").as_deref(),
            Ok("http://cookidoo.lan:8000")
        );
    }
}
