//! Minimal embedding example for cookidoo-core
//!
//! This example drives a `Coordinator` from a custom data source instead of
//! the HTTP client. The coordinator lifecycle is fully managed by the
//! application.

use cookidoo_core::traits::{DataSource, Payload};
use cookidoo_core::{Coordinator, FetchError, Result, Snapshot};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt;

const MENU: [&str; 3] = ["Pierogi ruskie", "Bigos", "Żurek"];

/// Custom data source cycling through a fixed menu
///
/// Every fourth fetch fails, to show stale-but-available data.
struct RotatingMenu {
    calls: AtomicUsize,
}

impl RotatingMenu {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl DataSource for RotatingMenu {
    async fn fetch(&self) -> std::result::Result<Payload, FetchError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);

        if call % 4 == 3 {
            return Err(FetchError::connect_failed("simulated outage"));
        }

        match json!({ "title": MENU[call % MENU.len()], "call": call }) {
            serde_json::Value::Object(payload) => Ok(payload),
            _ => Err(FetchError::invalid_response("Expected JSON object")),
        }
    }

    fn source_name(&self) -> &str {
        "rotating-menu"
    }
}

fn describe(snapshot: &Snapshot) -> String {
    let title = snapshot
        .data
        .as_ref()
        .and_then(cookidoo_core::projection::today_title)
        .unwrap_or_else(|| "unknown".to_string());

    match &snapshot.last_exception {
        None => format!("{} (fresh)", title),
        Some(e) => format!("{} (stale: {})", title, e),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== Embedded cookidoo-core Example ===\n");

    let coordinator = Coordinator::with_interval(
        "embedded",
        Arc::new(RotatingMenu::new()),
        Duration::from_millis(200),
    )?;

    coordinator.subscribe(|snapshot: &Snapshot| {
        println!("[Listener] {}", describe(snapshot));
    });

    let first = coordinator.first_refresh().await?;
    println!("First refresh: {}\n", describe(&first));

    // Observe a few scheduled refreshes through the watch stream
    let mut updates = coordinator.watch().skip(1).take(4);
    while let Some(snapshot) = updates.next().await {
        println!("[Stream] success={}", snapshot.last_update_success);
    }

    // A manual refresh joins or starts a fetch like any other caller
    let manual = coordinator.request_refresh().await?;
    println!("\nManual refresh: {}", describe(&manual));

    coordinator.shutdown();
    println!("\n=== Example complete ===");

    Ok(())
}
