//! Core traits for the Cookidoo Today service
//!
//! This module defines the abstract interfaces at the seams of the system.
//!
//! - [`ApiClient`]: Typed GET access to the backend's endpoints
//! - [`DataSource`]: The coordinator's update method
//! - [`Listener`]: Observers notified after every refresh

pub mod api_client;
pub mod data_source;
pub mod listener;

pub use api_client::{ApiClient, Endpoint, EndpointKind, Payload};
pub use data_source::DataSource;
pub use listener::{Listener, ListenerId};
