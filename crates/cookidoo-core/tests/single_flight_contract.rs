//! Contract Test: Single Flight
//!
//! This test verifies that concurrent refresh requests are coalesced.
//!
//! Constraints verified:
//! - At most one fetch runs at a time
//! - Every caller waiting on the same fetch sees the same snapshot
//! - Listeners are notified once per fetch, not once per caller
//! - A request after completion starts a new fetch
//!
//! If this test fails, someone has added a second fetch path.

mod common;

use common::*;
use cookidoo_core::{Coordinator, Snapshot};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_stream::StreamExt;

const INTERVAL: Duration = Duration::from_secs(15 * 60);

#[tokio::test]
async fn concurrent_requests_share_one_fetch() {
    let (source, gate) = ScriptedSource::new().gated();
    let source = Arc::new(source);
    let coordinator = Coordinator::with_interval("test", as_source(&source), INTERVAL).unwrap();

    let mut waiters = Vec::new();
    for _ in 0..5 {
        let coordinator = coordinator.clone();
        waiters.push(tokio::spawn(async move { coordinator.request_refresh().await }));
    }

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(source.calls(), 1, "only one fetch may be in flight");
    assert!(coordinator.is_refreshing());

    gate.add_permits(1);

    let mut snapshots = Vec::new();
    for waiter in waiters {
        snapshots.push(waiter.await.unwrap().unwrap());
    }

    assert_eq!(source.calls(), 1);
    assert!(!coordinator.is_refreshing());
    assert!(snapshots.iter().all(|s| *s == snapshots[0]));
    assert_eq!(snapshots[0].data, Some(titled("Pierogi")));
}

#[tokio::test]
async fn listeners_are_notified_once_per_fetch() {
    let (source, gate) = ScriptedSource::new().gated();
    let source = Arc::new(source);
    let coordinator = Coordinator::with_interval("test", as_source(&source), INTERVAL).unwrap();

    let notified = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&notified);
    coordinator.subscribe(move |snapshot: &Snapshot| {
        assert!(snapshot.last_update_success);
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let first = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.request_refresh().await }
    });
    let second = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.request_refresh().await }
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    gate.add_permits(1);

    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    assert_eq!(notified.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn request_after_completion_starts_new_fetch() {
    let source = Arc::new(
        ScriptedSource::new().with_script([Ok(titled("Bigos")), Ok(titled("Żurek"))]),
    );
    let coordinator = Coordinator::with_interval("test", as_source(&source), INTERVAL).unwrap();

    let first = coordinator.request_refresh().await.unwrap();
    let second = coordinator.request_refresh().await.unwrap();

    assert_eq!(source.calls(), 2);
    assert_eq!(first.data, Some(titled("Bigos")));
    assert_eq!(second.data, Some(titled("Żurek")));
}

#[tokio::test]
async fn watch_stream_sees_published_snapshot() {
    let source = Arc::new(ScriptedSource::new());
    let coordinator = Coordinator::with_interval("test", as_source(&source), INTERVAL).unwrap();
    let mut updates = coordinator.watch();

    let initial = updates.next().await.unwrap();
    assert_eq!(initial, Snapshot::default());

    coordinator.request_refresh().await.unwrap();

    let published = tokio::time::timeout(Duration::from_secs(1), updates.next())
        .await
        .expect("snapshot published")
        .unwrap();
    assert_eq!(published, coordinator.snapshot());
    assert_eq!(published.data, Some(titled("Pierogi")));
}
