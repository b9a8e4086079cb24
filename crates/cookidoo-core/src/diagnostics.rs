//! Diagnostics dump for one entry
//!
//! A serializable snapshot of the entry configuration and coordinator health.
//! Credentials never appear: the report copies only the fields listed here.

use crate::config::CookidooConfig;
use crate::coordinator::Coordinator;
use crate::error::FetchError;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticsReport {
    pub entry: EntryDiagnostics,
    pub coordinator: CoordinatorDiagnostics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryDiagnostics {
    pub id: String,
    pub title: String,
    pub base_url: String,
    pub endpoints: Vec<String>,
    pub scan_interval_minutes: u64,
    pub has_credentials: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoordinatorDiagnostics {
    pub ready: bool,
    pub last_update_success: bool,
    pub last_update_time: Option<DateTime<Utc>>,
    pub last_exception: Option<FetchError>,
    /// Top-level keys of the last good payload, `None` before any success
    pub data_keys: Option<Vec<String>>,
}

impl DiagnosticsReport {
    /// Collect a report for `entry_id`
    pub fn collect(entry_id: &str, config: &CookidooConfig, coordinator: &Coordinator) -> Self {
        let snapshot = coordinator.snapshot();

        Self {
            entry: EntryDiagnostics {
                id: entry_id.to_string(),
                title: config.connection.title(),
                base_url: config.connection.base_url.clone(),
                endpoints: config
                    .connection
                    .endpoints()
                    .into_iter()
                    .map(|e| format!("{} {}", e.name, e.path))
                    .collect(),
                scan_interval_minutes: config.coordinator.scan_interval_minutes,
                has_credentials: config.connection.credentials.is_some(),
            },
            coordinator: CoordinatorDiagnostics {
                ready: coordinator.is_ready(),
                last_update_success: snapshot.last_update_success,
                last_update_time: snapshot.last_update_time,
                last_exception: snapshot.last_exception,
                data_keys: snapshot
                    .data
                    .map(|data| data.keys().cloned().collect()),
            },
        }
    }

    /// Pretty-printed JSON
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
