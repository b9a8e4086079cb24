//! Contract Test: Stale But Available
//!
//! This test verifies what a failed refresh does to coordinator state.
//!
//! Constraints verified:
//! - A failure keeps the last good payload
//! - A failure sets `last_update_success = false` and records the cause
//! - A later success replaces the payload and clears the cause
//! - Listeners see failures too

mod common;

use common::*;
use cookidoo_core::{Coordinator, FailureKind, FetchError, Snapshot};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const INTERVAL: Duration = Duration::from_secs(15 * 60);

#[tokio::test]
async fn failure_keeps_previous_data() {
    let source = Arc::new(ScriptedSource::new().with_script([
        Ok(titled("Bigos")),
        Err(unavailable()),
        Ok(titled("Żurek")),
    ]));
    let coordinator = Coordinator::with_interval("test", as_source(&source), INTERVAL).unwrap();

    let ok = coordinator.first_refresh().await.unwrap();
    assert!(ok.last_update_success);
    assert_eq!(ok.last_exception, None);

    let failed = coordinator.request_refresh().await.unwrap();
    assert!(!failed.last_update_success);
    assert_eq!(failed.data, Some(titled("Bigos")), "stale data must survive");
    assert_eq!(failed.last_exception, Some(unavailable()));
    assert!(failed.last_update_time >= ok.last_update_time);

    let recovered = coordinator.request_refresh().await.unwrap();
    assert!(recovered.last_update_success);
    assert_eq!(recovered.data, Some(titled("Żurek")));
    assert_eq!(recovered.last_exception, None);

    coordinator.shutdown();
}

#[tokio::test]
async fn failure_before_any_success_has_no_data() {
    let source = Arc::new(
        ScriptedSource::new().with_fallback(Err(FetchError::invalid_response("not json"))),
    );
    let coordinator = Coordinator::with_interval("test", as_source(&source), INTERVAL).unwrap();

    let snapshot = coordinator.request_refresh().await.unwrap();

    assert_eq!(snapshot.data, None);
    assert!(!snapshot.last_update_success);
    assert!(snapshot.last_update_time.is_some());
    assert_eq!(
        snapshot.last_exception.map(|e| e.kind),
        Some(FailureKind::InvalidResponse)
    );
}

#[tokio::test]
async fn listeners_see_failures() {
    let source = Arc::new(
        ScriptedSource::new().with_script([Ok(titled("Bigos")), Err(unavailable())]),
    );
    let coordinator = Coordinator::with_interval("test", as_source(&source), INTERVAL).unwrap();

    let seen: Arc<Mutex<Vec<Snapshot>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    coordinator.subscribe(move |snapshot: &Snapshot| sink.lock().unwrap().push(snapshot.clone()));

    coordinator.request_refresh().await.unwrap();
    coordinator.request_refresh().await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(seen[0].last_update_success);
    assert!(!seen[1].last_update_success);
    assert_eq!(seen[1].data, Some(titled("Bigos")));
    assert_eq!(seen[1], coordinator.snapshot());
}
