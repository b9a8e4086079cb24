//! Configuration types for the Cookidoo Today service
//!
//! One final configuration shape: a connection block (everything the API
//! client needs) and a coordinator block (refresh interval). Credentials are
//! carried through to the client untouched; the coordinator never reads them.

use crate::traits::{Endpoint, EndpointKind};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Endpoint name of the primary "today" JSON document
pub const TODAY: &str = "today";
/// Endpoint name of the optional "week" JSON document
pub const WEEK: &str = "week";
/// Endpoint name of the optional "today" JPEG snapshot
pub const TODAY_IMAGE: &str = "today_image";
/// Endpoint name of the optional "week" JPEG snapshot
pub const WEEK_IMAGE: &str = "week_image";

/// Title used when the base URL has no usable host
pub const DEFAULT_TITLE: &str = "Cookidoo Today";

/// Longest accepted refresh interval, one day
pub const MAX_SCAN_INTERVAL_MINUTES: u64 = 24 * 60;

/// Main service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CookidooConfig {
    /// Connection settings passed to the API client
    pub connection: ConnectionConfig,

    /// Optional coordinator settings
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
}

impl CookidooConfig {
    /// Create a configuration for `base_url` with defaults everywhere else
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            connection: ConnectionConfig::new(base_url),
            coordinator: CoordinatorConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.connection.validate()?;
        self.coordinator.validate()?;
        Ok(())
    }
}

/// Connection settings for the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Base URL of the backend (e.g. "http://host:8000")
    pub base_url: String,

    /// Path of the primary JSON document
    #[serde(default = "default_today_path")]
    pub today_path: String,

    /// Path of the week JSON document, if the backend serves one
    #[serde(default)]
    pub week_path: Option<String>,

    /// Path of the today JPEG snapshot, if the backend serves one
    #[serde(default)]
    pub today_image_path: Option<String>,

    /// Path of the week JPEG snapshot, if the backend serves one
    #[serde(default)]
    pub week_image_path: Option<String>,

    /// Whether TLS certificates are verified
    #[serde(default = "default_verify_ssl")]
    pub verify_ssl: bool,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Backend credentials, never serialized back out
    #[serde(default, skip_serializing)]
    pub credentials: Option<Credentials>,
}

impl ConnectionConfig {
    /// Create a connection configuration with default paths
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            today_path: default_today_path(),
            week_path: None,
            today_image_path: None,
            week_image_path: None,
            verify_ssl: default_verify_ssl(),
            timeout_secs: default_timeout_secs(),
            credentials: None,
        }
    }

    /// Override the today path
    pub fn with_today_path(mut self, path: impl Into<String>) -> Self {
        self.today_path = path.into();
        self
    }

    /// Enable the week JSON endpoint
    pub fn with_week_path(mut self, path: impl Into<String>) -> Self {
        self.week_path = Some(path.into());
        self
    }

    /// Enable both JPEG snapshot endpoints
    pub fn with_image_paths(
        mut self,
        today: impl Into<String>,
        week: impl Into<String>,
    ) -> Self {
        self.today_image_path = Some(today.into());
        self.week_image_path = Some(week.into());
        self
    }

    /// Set the TLS verification flag
    pub fn with_verify_ssl(mut self, verify_ssl: bool) -> Self {
        self.verify_ssl = verify_ssl;
        self
    }

    /// Set the request timeout in seconds
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Attach credentials
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// The multi-endpoint preset: today/week JSON plus both JPEG snapshots
    pub fn multi_endpoint(base_url: impl Into<String>) -> Self {
        Self::new(base_url)
            .with_today_path("/api/today")
            .with_week_path("/api/week")
            .with_image_paths("/api/today.jpg", "/api/week.jpg")
    }

    /// Request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Endpoint descriptors, primary JSON endpoint first
    pub fn endpoints(&self) -> Vec<Endpoint> {
        let mut endpoints = vec![Endpoint::json(TODAY, &self.today_path)];

        if let Some(path) = &self.week_path {
            endpoints.push(Endpoint::json(WEEK, path));
        }
        if let Some(path) = &self.today_image_path {
            endpoints.push(Endpoint::binary(TODAY_IMAGE, path));
        }
        if let Some(path) = &self.week_image_path {
            endpoints.push(Endpoint::binary(WEEK_IMAGE, path));
        }

        endpoints
    }

    /// Human-facing title for this entry: the base URL's host
    pub fn title(&self) -> String {
        normalize_base_url(&self.base_url)
            .ok()
            .and_then(|url| Url::parse(&url).ok())
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_else(|| DEFAULT_TITLE.to_string())
    }

    /// Validate the connection configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        normalize_base_url(&self.base_url)?;

        if self.timeout_secs == 0 {
            return Err(crate::Error::config("Timeout must be > 0"));
        }

        for endpoint in self.endpoints() {
            if endpoint.path.trim().is_empty() {
                return Err(crate::Error::config(format!(
                    "Path for endpoint '{}' cannot be empty",
                    endpoint.name
                )));
            }
        }

        Ok(())
    }
}

/// Backend credentials
///
/// Passed through to the API client as-is. The Debug implementation hides
/// the password.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    /// Account e-mail
    pub email: String,
    /// Account password
    /// ⚠️ NEVER log this value
    pub password: String,
    /// Country code of the account (e.g. "pl")
    #[serde(default)]
    pub country: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<REDACTED>")
            .field("country", &self.country)
            .finish()
    }
}

/// Coordinator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Refresh interval in minutes
    #[serde(default = "default_scan_interval_minutes")]
    pub scan_interval_minutes: u64,
}

impl CoordinatorConfig {
    /// Refresh interval
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_minutes.saturating_mul(60))
    }

    /// Validate the coordinator configuration
    ///
    /// The interval must be between 1 and [`MAX_SCAN_INTERVAL_MINUTES`].
    pub fn validate(&self) -> Result<(), crate::Error> {
        if !(1..=MAX_SCAN_INTERVAL_MINUTES).contains(&self.scan_interval_minutes) {
            return Err(crate::Error::config(format!(
                "Scan interval must be between 1 and {} minutes, got {}",
                MAX_SCAN_INTERVAL_MINUTES, self.scan_interval_minutes
            )));
        }
        Ok(())
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            scan_interval_minutes: default_scan_interval_minutes(),
        }
    }
}

/// Normalize and validate a base URL
///
/// Accepts `https://host:port`, `http://host:port`, `host:port` and `host`.
/// A missing scheme becomes `http://`; trailing slashes are dropped.
pub fn normalize_base_url(raw: &str) -> Result<String, crate::Error> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(crate::Error::config("Base URL cannot be empty"));
    }

    let with_scheme = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("http://{}", raw)
    };
    let trimmed = with_scheme.trim_end_matches('/');

    let url = Url::parse(trimmed)
        .map_err(|e| crate::Error::config(format!("Invalid base URL '{}': {}", raw, e)))?;

    if url.host_str().is_none_or(str::is_empty) {
        return Err(crate::Error::config(format!(
            "Base URL has no host: '{}'",
            raw
        )));
    }

    Ok(trimmed.to_string())
}

/// Join a base URL and a path with exactly one slash between them
pub fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn default_today_path() -> String {
    "/today".to_string()
}

fn default_verify_ssl() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_scan_interval_minutes() -> u64 {
    15
}
