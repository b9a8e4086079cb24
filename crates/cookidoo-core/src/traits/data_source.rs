// # Data Source Trait
//
// The coordinator's update method: one call, one complete payload or one
// failure. The coordinator owns scheduling, coalescing and state; a data
// source owns none of it.
//
// ## Implementations
//
// - `ApiDataSource`: fetches the JSON endpoints of an `ApiClient`
// - Custom sources for embedding (see `demos/`)

use crate::error::FetchError;
use crate::traits::Payload;
use async_trait::async_trait;

/// Trait for coordinator data sources
///
/// # Rules
///
/// - One logical fetch per call. No retries, no sleeping, no caching.
/// - A response is accepted wholesale or rejected wholesale.
/// - Never spawn tasks; the coordinator may abandon the future at any time.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Fetch a fresh payload
    async fn fetch(&self) -> Result<Payload, FetchError>;

    /// Source name (for logging/debugging)
    fn source_name(&self) -> &str;
}
