//! Test doubles and common utilities for coordinator contract tests
//!
//! This module provides minimal test doubles that let the contract tests
//! count fetches, hold a fetch open, and script successes and failures.

#![allow(dead_code)]

use cookidoo_core::traits::{ApiClient, DataSource, Endpoint, Payload};
use cookidoo_core::{CookidooConfig, FetchError};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;

/// Build a payload from a JSON object literal
pub fn payload(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        other => panic!("payload must be a JSON object, got {other}"),
    }
}

/// A payload whose `title` is `title`
pub fn titled(title: &str) -> Payload {
    payload(json!({ "title": title }))
}

/// A data source that counts calls, replays a script and can be held open
pub struct ScriptedSource {
    /// Call counter for fetch()
    calls: AtomicUsize,
    /// Results handed out in order; `fallback` once exhausted
    script: std::sync::Mutex<VecDeque<Result<Payload, FetchError>>>,
    /// Result returned when the script is empty
    fallback: Result<Payload, FetchError>,
    /// When set, every fetch waits for a permit before returning
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedSource {
    /// A source that always succeeds with `titled("Pierogi")`
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            script: std::sync::Mutex::new(VecDeque::new()),
            fallback: Ok(titled("Pierogi")),
            gate: None,
        }
    }

    /// Queue results to be returned before the fallback
    pub fn with_script(
        self,
        script: impl IntoIterator<Item = Result<Payload, FetchError>>,
    ) -> Self {
        self.script.lock().unwrap().extend(script);
        self
    }

    /// Result returned once the script is exhausted
    pub fn with_fallback(mut self, fallback: Result<Payload, FetchError>) -> Self {
        self.fallback = fallback;
        self
    }

    /// Hold every fetch until the returned semaphore gets a permit
    pub fn gated(mut self) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        self.gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    /// Get the number of times fetch() was called
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DataSource for ScriptedSource {
    async fn fetch(&self) -> Result<Payload, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.expect("gate closed");
        }

        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }

    fn source_name(&self) -> &str {
        "scripted"
    }
}

/// An API client whose single JSON endpoint is served by a `ScriptedSource`
pub struct MockApiClient {
    source: Arc<ScriptedSource>,
    endpoints: Vec<Endpoint>,
}

impl MockApiClient {
    pub fn new(source: Arc<ScriptedSource>) -> Self {
        Self {
            source,
            endpoints: vec![Endpoint::json("today", "/today")],
        }
    }
}

#[async_trait::async_trait]
impl ApiClient for MockApiClient {
    async fn fetch_json(&self, _endpoint: &Endpoint) -> Result<Payload, FetchError> {
        self.source.fetch().await
    }

    async fn fetch_binary(&self, _endpoint: &Endpoint) -> Result<Vec<u8>, FetchError> {
        Ok(vec![0xFF, 0xD8, 0xFF])
    }

    fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    fn client_name(&self) -> &'static str {
        "mock"
    }
}

/// Coerce a concrete source into the trait object the coordinator takes
pub fn as_source(source: &Arc<ScriptedSource>) -> Arc<dyn DataSource> {
    Arc::clone(source) as Arc<dyn DataSource>
}

/// Helper to create a minimal config for testing
pub fn minimal_config() -> CookidooConfig {
    CookidooConfig::new("http://cookidoo.lan:8000")
}

/// A connectivity failure, as a 503 would produce
pub fn unavailable() -> FetchError {
    FetchError::http_status(503, "http://cookidoo.lan:8000/today")
}
