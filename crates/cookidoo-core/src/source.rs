//! Data source backed by an [`ApiClient`]
//!
//! Fetches every JSON endpoint of the client, in configuration order. A
//! single endpoint yields its object as the payload; several endpoints yield
//! an object keyed by endpoint name:
//!
//! ```text
//! { "today": { ... }, "week": { ... } }
//! ```

use crate::error::FetchError;
use crate::traits::{ApiClient, DataSource, Endpoint, EndpointKind, Payload};
use async_trait::async_trait;
use std::sync::Arc;

/// Coordinator data source that reads the client's JSON endpoints
pub struct ApiDataSource {
    client: Arc<dyn ApiClient>,
    endpoints: Vec<Endpoint>,
}

impl ApiDataSource {
    /// Create a data source over all JSON endpoints of `client`
    pub fn new(client: Arc<dyn ApiClient>) -> Self {
        let endpoints = client
            .endpoints()
            .iter()
            .filter(|e| e.kind == EndpointKind::Json)
            .cloned()
            .collect();

        Self { client, endpoints }
    }

    /// The JSON endpoints this source reads
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }
}

#[async_trait]
impl DataSource for ApiDataSource {
    async fn fetch(&self) -> Result<Payload, FetchError> {
        match self.endpoints.as_slice() {
            [] => Err(FetchError::invalid_response("No JSON endpoint configured")),
            [single] => self.client.fetch_json(single).await,
            several => {
                let mut combined = Payload::new();
                for endpoint in several {
                    let payload = self.client.fetch_json(endpoint).await?;
                    combined.insert(endpoint.name.clone(), payload.into());
                }
                Ok(combined)
            }
        }
    }

    fn source_name(&self) -> &str {
        self.client.client_name()
    }
}
