// # cookidoo-core
//
// Core library for the Cookidoo Today polling service.
//
// ## Architecture Overview
//
// This library provides everything except the HTTP transport:
// - **ApiClient**: Trait for typed GET access to the backend's endpoints
// - **DataSource**: Trait for the coordinator's update method
// - **Coordinator**: Single-flight, interval-driven refresh with failure tracking
// - **EntryRegistry**: Explicit map of set-up entries, owned by the caller
// - **projection / diagnostics / validation**: Read-only helpers around a payload
//
// ## Design Principles
//
// 1. **Transport-Free**: HTTP lives in `cookidoo-http`, behind `ApiClient`
// 2. **One Fetch At A Time**: Concurrent refresh requests share one fetch
// 3. **Stale But Available**: A failed refresh keeps the last good payload
// 4. **Library-First**: The daemon is a thin composition root over this crate

pub mod traits;
pub mod coordinator;
pub mod registry;
pub mod config;
pub mod error;
pub mod source;
pub mod projection;
pub mod diagnostics;
pub mod validation;

// Re-export core types for convenience
pub use traits::{ApiClient, DataSource, Endpoint, EndpointKind, Listener, ListenerId, Payload};
pub use coordinator::{Coordinator, SetupState, Snapshot};
pub use registry::{Entry, EntryRegistry};
pub use config::{ConnectionConfig, CookidooConfig, CoordinatorConfig, Credentials};
pub use error::{Error, FailureKind, FetchError, Result};
pub use source::ApiDataSource;
pub use diagnostics::DiagnosticsReport;
pub use validation::{ValidationError, validate_base_url, validate_connection};
