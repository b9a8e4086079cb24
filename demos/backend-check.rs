// # Backend Check Tool
//
// Runs the connection checks a setup form would run against a real
// backend, then fetches every configured endpoint once and prints a
// diagnostics report.
//
// ## Usage
//
// ```bash
// COOKIDOO_BASE_URL=http://cookidoo.lan:8000 \
// cargo run --bin backend_check
//
// # Multi-endpoint backend
// COOKIDOO_BASE_URL=http://cookidoo.lan:8000 \
// COOKIDOO_MULTI_ENDPOINT=1 \
// cargo run --bin backend_check
// ```
//
// ## Environment Variables
//
// Required:
// - `COOKIDOO_BASE_URL`: Backend base URL
//
// Optional:
// - `COOKIDOO_MULTI_ENDPOINT`: Use the /api/today, /api/week and JPEG paths
// - `COOKIDOO_VERIFY_SSL`: "false" to skip TLS verification

use cookidoo_core::config::{ConnectionConfig, CookidooConfig};
use cookidoo_core::projection::{TodayView, WeekView, section};
use cookidoo_core::traits::EndpointKind;
use cookidoo_core::{
    ApiClient, ApiDataSource, Coordinator, DiagnosticsReport, validate_base_url,
    validate_connection,
};
use cookidoo_http::HttpApiClient;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let Ok(raw_url) = env::var("COOKIDOO_BASE_URL") else {
        tracing::error!("COOKIDOO_BASE_URL environment variable is required");
        return ExitCode::from(1);
    };

    // Step 1: URL
    let base_url = match validate_base_url(&raw_url) {
        Ok(url) => url,
        Err(e) => {
            tracing::error!("Step 1 failed: {} ({})", e, e.code());
            return ExitCode::from(1);
        }
    };
    tracing::info!("Step 1: base URL {}", base_url);

    let mut connection = if env::var("COOKIDOO_MULTI_ENDPOINT").is_ok() {
        ConnectionConfig::multi_endpoint(base_url.clone())
    } else {
        ConnectionConfig::new(base_url.clone())
    };
    if env::var("COOKIDOO_VERIFY_SSL").is_ok_and(|v| v.eq_ignore_ascii_case("false")) {
        connection = connection.with_verify_ssl(false);
    }

    let client = match HttpApiClient::new(&connection) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::error!("Failed to build client: {}", e);
            return ExitCode::from(1);
        }
    };

    // Step 2: connectivity
    if let Err(e) = validate_connection(client.as_ref()).await {
        tracing::error!("Step 2 failed: {} ({})", e, e.code());
        return ExitCode::from(2);
    }
    tracing::info!("Step 2: backend reachable");

    // Step 3: binary endpoints
    for endpoint in client.endpoints() {
        if endpoint.kind != EndpointKind::Binary {
            continue;
        }
        match client.fetch_binary(endpoint).await {
            Ok(bytes) => tracing::info!("Step 3: {} -> {} bytes", endpoint.name, bytes.len()),
            Err(e) => tracing::warn!("Step 3: {} failed: {}", endpoint.name, e),
        }
    }

    // Step 4: one coordinated refresh
    let config = CookidooConfig {
        connection,
        coordinator: Default::default(),
    };
    let source = Arc::new(ApiDataSource::new(client.clone()));
    let coordinator = match Coordinator::new(base_url.clone(), source, &config.coordinator) {
        Ok(coordinator) => coordinator,
        Err(e) => {
            tracing::error!("Failed to build coordinator: {}", e);
            return ExitCode::from(1);
        }
    };

    let snapshot = match coordinator.first_refresh().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::error!("Step 4 failed: {}", e);
            return ExitCode::from(2);
        }
    };

    if let Some(data) = snapshot.data.as_ref() {
        let today = TodayView::from_payload(section(data, "today"));
        let week = WeekView::from_payload(section(data, "week"));
        tracing::info!(
            "Step 4: today {:?} ({} recipe(s)), week {} recipe(s)",
            today.title,
            today.recipes.len(),
            week.recipe_count()
        );
    }

    match DiagnosticsReport::collect(&base_url, &config, &coordinator).to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => tracing::warn!("Failed to render diagnostics: {}", e),
    }

    coordinator.shutdown();
    tracing::info!("=== Backend check passed ===");
    ExitCode::SUCCESS
}
