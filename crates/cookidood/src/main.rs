// # cookidood - Cookidoo Today Daemon
//
// The cookidood daemon is a thin composition root:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Setting up one entry (HTTP client + coordinator) in an `EntryRegistry`
// 4. Logging every refresh until a shutdown signal arrives
//
// All polling, coalescing and failure tracking lives in cookidoo-core.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Connection
// - `COOKIDOO_BASE_URL`: Backend base URL (required, e.g. http://host:8000)
// - `COOKIDOO_TODAY_PATH`: Path of the today document (default /today)
// - `COOKIDOO_WEEK_PATH`: Path of the week document (optional)
// - `COOKIDOO_TODAY_IMAGE_PATH`: Path of the today JPEG (optional)
// - `COOKIDOO_WEEK_IMAGE_PATH`: Path of the week JPEG (optional)
// - `COOKIDOO_VERIFY_SSL`: Verify TLS certificates (default true)
// - `COOKIDOO_TIMEOUT_SECS`: Request timeout in seconds (default 10)
//
// ### Credentials (passed through to the client)
// - `COOKIDOO_EMAIL`, `COOKIDOO_PASSWORD`, `COOKIDOO_COUNTRY`
//
// ### Coordinator
// - `COOKIDOO_SCAN_INTERVAL_MINUTES`: Refresh interval (default 15)
//
// ### Logging
// - `COOKIDOO_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Signals
//
// - SIGINT / SIGTERM: unload every entry and exit
// - SIGHUP: refresh now, fetch the JPEG endpoints (byte counts at debug) and
//   dump diagnostics at debug; runs in the background so shutdown signals
//   are never held up
//
// ## Example
//
// ```bash
// export COOKIDOO_BASE_URL=http://cookidoo.lan:8000
// export COOKIDOO_SCAN_INTERVAL_MINUTES=5
//
// cookidood
// ```

use anyhow::Result;
use cookidoo_core::config::{
    ConnectionConfig, CookidooConfig, CoordinatorConfig, Credentials, MAX_SCAN_INTERVAL_MINUTES,
};
use cookidoo_core::projection::{WeekView, section, today_title};
use cookidoo_core::{
    ApiClient, Coordinator, DiagnosticsReport, EndpointKind, EntryRegistry, Snapshot,
};
use cookidoo_http::HttpApiClient;
use std::env;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or setup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum CookidoodExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or failed first refresh
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<CookidoodExitCode> for ExitCode {
    fn from(code: CookidoodExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    base_url: String,
    today_path: Option<String>,
    week_path: Option<String>,
    today_image_path: Option<String>,
    week_image_path: Option<String>,
    verify_ssl: bool,
    timeout_secs: u64,
    scan_interval_minutes: u64,
    email: Option<String>,
    password: Option<String>,
    country: Option<String>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            base_url: env::var("COOKIDOO_BASE_URL").map_err(|_| {
                anyhow::anyhow!(
                    "COOKIDOO_BASE_URL is required. \
                    Set it via: export COOKIDOO_BASE_URL=http://host:8000"
                )
            })?,
            today_path: optional_var("COOKIDOO_TODAY_PATH"),
            week_path: optional_var("COOKIDOO_WEEK_PATH"),
            today_image_path: optional_var("COOKIDOO_TODAY_IMAGE_PATH"),
            week_image_path: optional_var("COOKIDOO_WEEK_IMAGE_PATH"),
            verify_ssl: parsed_var("COOKIDOO_VERIFY_SSL", true)?,
            timeout_secs: parsed_var("COOKIDOO_TIMEOUT_SECS", 10)?,
            scan_interval_minutes: parsed_var("COOKIDOO_SCAN_INTERVAL_MINUTES", 15)?,
            email: optional_var("COOKIDOO_EMAIL"),
            password: optional_var("COOKIDOO_PASSWORD"),
            country: optional_var("COOKIDOO_COUNTRY"),
            log_level: env::var("COOKIDOO_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// Checks presence and format of the base URL, numeric ranges, the
    /// credential pair and the log level.
    fn validate(&self) -> Result<()> {
        cookidoo_core::validate_base_url(&self.base_url).map_err(|e| {
            anyhow::anyhow!(
                "COOKIDOO_BASE_URL '{}' is not usable ({}). \
                Expected http://host:port, https://host:port or host:port",
                self.base_url,
                e.code()
            )
        })?;

        if !(1..=300).contains(&self.timeout_secs) {
            anyhow::bail!(
                "COOKIDOO_TIMEOUT_SECS must be between 1 and 300 seconds. Got: {}",
                self.timeout_secs
            );
        }

        if !(1..=MAX_SCAN_INTERVAL_MINUTES).contains(&self.scan_interval_minutes) {
            anyhow::bail!(
                "COOKIDOO_SCAN_INTERVAL_MINUTES must be between 1 and {}. Got: {}",
                MAX_SCAN_INTERVAL_MINUTES,
                self.scan_interval_minutes
            );
        }

        if self.email.is_some() != self.password.is_some() {
            anyhow::bail!("COOKIDOO_EMAIL and COOKIDOO_PASSWORD must be set together");
        }

        for (name, path) in [
            ("COOKIDOO_TODAY_PATH", &self.today_path),
            ("COOKIDOO_WEEK_PATH", &self.week_path),
            ("COOKIDOO_TODAY_IMAGE_PATH", &self.today_image_path),
            ("COOKIDOO_WEEK_IMAGE_PATH", &self.week_image_path),
        ] {
            if let Some(path) = path
                && !path.starts_with('/')
            {
                anyhow::bail!("{} must start with '/'. Got: {}", name, path);
            }
        }

        if parse_level(&self.log_level).is_none() {
            anyhow::bail!(
                "COOKIDOO_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            );
        }

        Ok(())
    }

    /// Build the library configuration
    fn to_cookidoo_config(&self) -> CookidooConfig {
        let mut connection = ConnectionConfig::new(self.base_url.clone())
            .with_verify_ssl(self.verify_ssl)
            .with_timeout_secs(self.timeout_secs);

        if let Some(path) = &self.today_path {
            connection = connection.with_today_path(path);
        }
        if let Some(path) = &self.week_path {
            connection = connection.with_week_path(path);
        }
        connection.today_image_path = self.today_image_path.clone();
        connection.week_image_path = self.week_image_path.clone();

        if let (Some(email), Some(password)) = (&self.email, &self.password) {
            connection = connection.with_credentials(Credentials {
                email: email.clone(),
                password: password.clone(),
                country: self.country.clone(),
            });
        }

        CookidooConfig {
            connection,
            coordinator: CoordinatorConfig {
                scan_interval_minutes: self.scan_interval_minutes,
            },
        }
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed_var<T: FromStr>(name: &str, default: T) -> Result<T> {
    match optional_var(name) {
        Some(raw) => raw
            .parse()
            .map_err(|_| anyhow::anyhow!("{} has an invalid value: '{}'", name, raw)),
        None => Ok(default),
    }
}

fn parse_level(level: &str) -> Option<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return CookidoodExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return CookidoodExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = parse_level(&config.log_level).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return CookidoodExitCode::ConfigError.into();
    }

    info!("Starting cookidood daemon");

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return CookidoodExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run_daemon(config)).into()
}

/// Run the daemon
async fn run_daemon(config: Config) -> CookidoodExitCode {
    let cookidoo_config = config.to_cookidoo_config();
    let entry_id = match cookidoo_core::validate_base_url(&config.base_url) {
        Ok(url) => url,
        Err(e) => {
            error!("Invalid base URL: {}", e);
            return CookidoodExitCode::ConfigError;
        }
    };

    let client = match HttpApiClient::new(&cookidoo_config.connection) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Failed to create API client: {}", e);
            return CookidoodExitCode::ConfigError;
        }
    };

    info!(
        "Backend {} ({} endpoint(s), every {} min)",
        client.base_url(),
        cookidoo_config.connection.endpoints().len(),
        cookidoo_config.coordinator.scan_interval_minutes
    );

    let registry = EntryRegistry::new();
    let coordinator = match registry
        .setup_entry(entry_id.clone(), client.clone(), cookidoo_config.clone())
        .await
    {
        Ok(coordinator) => coordinator,
        Err(e) => {
            error!("Setup failed: {}", e);
            return CookidoodExitCode::ConfigError;
        }
    };

    log_update(&coordinator.snapshot());
    coordinator.subscribe(log_update);

    info!("Entry '{}' ready", cookidoo_config.connection.title());

    let exit = match serve_signals(&coordinator, &client, &entry_id, &cookidoo_config).await {
        Ok(signal) => {
            info!("Received shutdown signal: {}", signal);
            CookidoodExitCode::CleanShutdown
        }
        Err(e) => {
            error!("Daemon error: {}", e);
            CookidoodExitCode::RuntimeError
        }
    };

    info!("Shutting down daemon");
    registry.unload_all();
    exit
}

/// Listener logging each refresh outcome
fn log_update(snapshot: &Snapshot) {
    let Some(data) = snapshot.data.as_ref() else {
        warn!("No data yet");
        return;
    };

    let title = today_title(section(data, "today")).unwrap_or_else(|| "unknown".to_string());

    if snapshot.last_update_success {
        let week = WeekView::from_payload(section(data, "week"));
        info!("Today: {} ({} recipe(s) this week)", title, week.recipe_count());
    } else if let Some(e) = &snapshot.last_exception {
        warn!("Refresh failed, showing stale data ({}): {}", title, e);
    }
}

/// Run `refresh_now` in the background
#[cfg_attr(not(unix), allow(dead_code))]
fn spawn_refresh(
    coordinator: &Coordinator,
    client: &Arc<HttpApiClient>,
    entry_id: &str,
    config: &CookidooConfig,
) -> JoinHandle<()> {
    tokio::spawn(refresh_now(
        coordinator.clone(),
        Arc::clone(client),
        entry_id.to_string(),
        config.clone(),
    ))
}

/// Refresh once on request, fetch the JPEG snapshots and log a diagnostics dump
async fn refresh_now(
    coordinator: Coordinator,
    client: Arc<HttpApiClient>,
    entry_id: String,
    config: CookidooConfig,
) {
    info!("Manual refresh requested");
    if let Err(e) = coordinator.request_refresh().await {
        warn!("Manual refresh failed: {}", e);
        return;
    }

    for endpoint in client.endpoints() {
        if endpoint.kind != EndpointKind::Binary {
            continue;
        }
        match client.fetch_binary(endpoint).await {
            Ok(bytes) => debug!("{}: {} bytes from {}", endpoint.name, bytes.len(), endpoint.path),
            Err(e) => warn!("Failed to fetch {}: {}", endpoint.name, e),
        }
    }

    match DiagnosticsReport::collect(&entry_id, &config, &coordinator).to_json() {
        Ok(json) => debug!("Diagnostics:\n{}", json),
        Err(e) => debug!("Failed to render diagnostics: {}", e),
    }
}

/// Serve signals until a shutdown signal arrives
///
/// SIGHUP spawns a refresh, so SIGTERM and SIGINT are always polled;
/// they end the loop.
///
/// # Returns
///
/// Returns the name of the shutdown signal received.
#[cfg(unix)]
async fn serve_signals(
    coordinator: &Coordinator,
    client: &Arc<HttpApiClient>,
    entry_id: &str,
    config: &CookidooConfig,
) -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;
    let mut sighup = signal(SignalKind::hangup())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGHUP handler: {}", e))?;

    loop {
        tokio::select! {
            _ = sigterm.recv() => return Ok("SIGTERM"),
            _ = sigint.recv() => return Ok("SIGINT"),
            _ = sighup.recv() => {
                spawn_refresh(coordinator, client, entry_id, config);
            }
        }
    }
}

/// Wait for CTRL-C
///
/// Fallback implementation for non-Unix platforms, where manual refresh is
/// not available.
#[cfg(not(unix))]
async fn serve_signals(
    _coordinator: &Coordinator,
    _client: &Arc<HttpApiClient>,
    _entry_id: &str,
    _config: &CookidooConfig,
) -> Result<&'static str> {
    match tokio::signal::ctrl_c().await {
        Ok(()) => Ok("SIGINT"),
        Err(e) => Err(anyhow::anyhow!("Failed to wait for CTRL-C: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cookidoo_core::ApiDataSource;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const JPEG: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xD9];

    fn setup(server: &MockServer) -> (Coordinator, Arc<HttpApiClient>, CookidooConfig) {
        let connection = ConnectionConfig::new(server.uri())
            .with_image_paths("/today.jpg", "/week.jpg")
            .with_timeout_secs(30);
        let client = Arc::new(HttpApiClient::new(&connection).unwrap());
        let source = Arc::new(ApiDataSource::new(client.clone()));
        let coordinator =
            Coordinator::with_interval("test", source, Duration::from_secs(15 * 60)).unwrap();
        let config = CookidooConfig {
            connection,
            coordinator: CoordinatorConfig::default(),
        };
        (coordinator, client, config)
    }

    #[tokio::test]
    async fn manual_refresh_fetches_jpeg_endpoints() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/today"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"title": "Bigos"}"#))
            .expect(2)
            .mount(&server)
            .await;
        for jpeg in ["/today.jpg", "/week.jpg"] {
            Mock::given(method("GET"))
                .and(path(jpeg))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(JPEG.to_vec()))
                .expect(1)
                .mount(&server)
                .await;
        }

        let (coordinator, client, config) = setup(&server);
        coordinator.first_refresh().await.unwrap();

        spawn_refresh(&coordinator, &client, "test", &config)
            .await
            .unwrap();

        server.verify().await;
        coordinator.shutdown();
    }

    #[tokio::test]
    async fn shutdown_releases_pending_manual_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/today"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"title": "Bigos"}"#))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/today"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"title": "Żurek"}"#)
                    .set_delay(Duration::from_secs(20)),
            )
            .mount(&server)
            .await;

        let (coordinator, client, config) = setup(&server);
        coordinator.first_refresh().await.unwrap();

        let refresh = spawn_refresh(&coordinator, &client, "test", &config);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(coordinator.is_refreshing());
        assert!(!refresh.is_finished());

        coordinator.shutdown();
        tokio::time::timeout(Duration::from_secs(2), refresh)
            .await
            .expect("manual refresh must end on shutdown")
            .unwrap();
    }
}
