//! Refresh coordinator
//!
//! The Coordinator is responsible for:
//! - Keeping one fresh copy of a data source's payload for many observers
//! - Refreshing it on a fixed interval
//! - Coalescing concurrent refresh requests into a single in-flight fetch
//! - Remembering the last good payload and the last failure
//!
//! ## Architecture
//!
//! ```text
//!   interval tick ──┐
//!   manual refresh ─┼──► request_refresh() ──► in flight? ──yes──► join outcome
//!   first refresh ──┘                               │
//!                                                   no
//!                                                   ▼
//!                                          ┌────────────────┐
//!                                          │  fetch task    │── DataSource::fetch()
//!                                          └────────────────┘
//!                                                   │
//!         ┌─────────────────────────┬───────────────┴──────────┬──────────────────┐
//!         ▼                         ▼                          ▼                  ▼
//!  ┌─────────────┐          ┌──────────────┐           ┌─────────────┐    ┌─────────────┐
//!  │  Snapshot   │          │  next tick   │           │  Listeners  │    │   waiters   │
//!  │  (publish)  │          │ (now + ivl)  │           │  (notify)   │    │  (outcome)  │
//!  └─────────────┘          └──────────────┘           └─────────────┘    └─────────────┘
//! ```
//!
//! ## Refresh Flow
//!
//! 1. A refresh is requested (tick, manual, or first refresh)
//! 2. If a fetch is already running, the caller waits for that fetch's outcome
//! 3. Otherwise a fetch task is spawned and registered as in flight
//! 4. On completion the snapshot is published as a whole, the next tick is
//!    scheduled `interval` after completion, and listeners are notified
//! 5. All waiters receive the same snapshot

use crate::config::CoordinatorConfig;
use crate::error::{Error, FetchError, Result};
use crate::traits::{DataSource, Listener, ListenerId, Payload};
use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_stream::Stream;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Coordinator state as seen by observers
///
/// Published atomically after every refresh attempt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Last successfully fetched payload (kept across failures)
    pub data: Option<Payload>,

    /// Failure of the most recent attempt, cleared on success
    pub last_exception: Option<FetchError>,

    /// Whether the most recent attempt succeeded
    pub last_update_success: bool,

    /// Completion time of the most recent attempt
    pub last_update_time: Option<DateTime<Utc>>,
}

/// Setup lifecycle of a coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupState {
    /// First refresh not yet attempted
    Pending,
    /// First refresh running
    Initializing,
    /// First refresh succeeded, polling loop running
    Ready,
    /// First refresh failed; terminal
    Failed,
}

/// A fetch currently running, shared by every waiter
struct InFlight {
    outcome: watch::Receiver<Option<Snapshot>>,
    task: JoinHandle<()>,
}

struct Shared {
    name: String,
    source: Arc<dyn DataSource>,
    interval: Duration,
    state: watch::Sender<Snapshot>,
    next_refresh: watch::Sender<Instant>,
    in_flight: Mutex<Option<InFlight>>,
    listeners: Mutex<BTreeMap<ListenerId, Arc<dyn Listener>>>,
    next_listener_id: AtomicU64,
    setup: Mutex<SetupState>,
    poll_task: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

/// Single-flight, interval-driven refresh coordinator
///
/// Cheap to clone; all clones share one state record and one polling loop.
///
/// ## Lifecycle
///
/// 1. Create with [`Coordinator::new()`]
/// 2. Call [`Coordinator::first_refresh()`]; failure aborts setup for good
/// 3. On success the polling loop runs every `interval`
/// 4. [`Coordinator::shutdown()`] cancels the loop and abandons any fetch
///
/// Dropping every handle without calling `shutdown()` also ends the loop.
#[derive(Clone)]
pub struct Coordinator {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("name", &self.shared.name)
            .field("interval", &self.shared.interval)
            .field("setup", &self.setup_state())
            .finish()
    }
}

impl Coordinator {
    /// Create a coordinator from configuration
    ///
    /// # Parameters
    ///
    /// - `name`: Name used in logs (usually the entry id)
    /// - `source`: Data source to refresh from
    /// - `config`: Coordinator configuration
    pub fn new(
        name: impl Into<String>,
        source: Arc<dyn DataSource>,
        config: &CoordinatorConfig,
    ) -> Result<Self> {
        config.validate()?;
        Self::with_interval(name, source, config.interval())
    }

    /// Create a coordinator with an explicit refresh interval
    pub fn with_interval(
        name: impl Into<String>,
        source: Arc<dyn DataSource>,
        interval: Duration,
    ) -> Result<Self> {
        if interval.is_zero() {
            return Err(Error::config("Refresh interval must be > 0"));
        }

        let first_tick = Instant::now()
            .checked_add(interval)
            .ok_or_else(|| Error::config(format!("Refresh interval {:?} is too large", interval)))?;

        let (state, _) = watch::channel(Snapshot::default());
        let (next_refresh, _) = watch::channel(first_tick);

        Ok(Self {
            shared: Arc::new(Shared {
                name: name.into(),
                source,
                interval,
                state,
                next_refresh,
                in_flight: Mutex::new(None),
                listeners: Mutex::new(BTreeMap::new()),
                next_listener_id: AtomicU64::new(0),
                setup: Mutex::new(SetupState::Pending),
                poll_task: Mutex::new(None),
                cancel: CancellationToken::new(),
            }),
        })
    }

    /// Perform the mandatory first refresh
    ///
    /// On success the coordinator becomes ready and starts its polling loop.
    /// On failure it is marked failed for good and `Error::NotReady` is
    /// returned; later successful refreshes do not make it ready.
    pub async fn first_refresh(&self) -> Result<Snapshot> {
        {
            let mut setup = lock(&self.shared.setup);
            if *setup != SetupState::Pending {
                return Err(Error::setup(format!(
                    "{}: first refresh already performed (state: {:?})",
                    self.shared.name, *setup
                )));
            }
            *setup = SetupState::Initializing;
        }

        let snapshot = match self.request_refresh().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                *lock(&self.shared.setup) = SetupState::Failed;
                return Err(e);
            }
        };

        if !snapshot.last_update_success {
            *lock(&self.shared.setup) = SetupState::Failed;
            let cause = snapshot
                .last_exception
                .clone()
                .unwrap_or_else(|| FetchError::connect_failed("first refresh failed"));
            error!("{}: first refresh failed, setup aborted: {}", self.shared.name, cause);
            return Err(Error::NotReady(cause));
        }

        *lock(&self.shared.setup) = SetupState::Ready;
        self.start_polling();
        info!(
            "{}: ready, refreshing every {:?}",
            self.shared.name, self.shared.interval
        );

        Ok(snapshot)
    }

    /// Request a refresh
    ///
    /// Starts a fetch if none is running, otherwise joins the running one.
    /// Resolves once that (possibly shared) fetch has completed.
    ///
    /// # Returns
    ///
    /// - `Ok(Snapshot)`: state after the fetch; a failed fetch is reported
    ///   through `last_update_success`/`last_exception`, not as an error
    /// - `Err(Error::Shutdown)`: the coordinator was shut down or the fetch
    ///   was abandoned
    pub async fn request_refresh(&self) -> Result<Snapshot> {
        let mut outcome = self.join_or_start()?;

        let done = outcome
            .wait_for(Option::is_some)
            .await
            .map_err(|_| Error::shutdown(format!("{}: refresh abandoned", self.shared.name)))?;

        done.clone()
            .ok_or_else(|| Error::shutdown(format!("{}: refresh abandoned", self.shared.name)))
    }

    /// Register an observer, called after every refresh attempt
    pub fn subscribe(&self, listener: impl Listener + 'static) -> ListenerId {
        let id = ListenerId(self.shared.next_listener_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.shared.listeners).insert(id, Arc::new(listener));
        debug!("{}: listener {:?} subscribed", self.shared.name, id);
        id
    }

    /// Remove an observer
    ///
    /// Returns `false` if the id was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        lock(&self.shared.listeners).remove(&id).is_some()
    }

    /// Number of registered observers
    pub fn listener_count(&self) -> usize {
        lock(&self.shared.listeners).len()
    }

    /// Stream of published snapshots, starting with the current one
    pub fn watch(&self) -> Pin<Box<dyn Stream<Item = Snapshot> + Send + 'static>> {
        Box::pin(WatchStream::new(self.shared.state.subscribe()))
    }

    /// Current state
    pub fn snapshot(&self) -> Snapshot {
        self.shared.state.borrow().clone()
    }

    /// Last good payload, if any
    pub fn data(&self) -> Option<Payload> {
        self.shared.state.borrow().data.clone()
    }

    pub fn last_update_success(&self) -> bool {
        self.shared.state.borrow().last_update_success
    }

    pub fn last_exception(&self) -> Option<FetchError> {
        self.shared.state.borrow().last_exception.clone()
    }

    pub fn last_update_time(&self) -> Option<DateTime<Utc>> {
        self.shared.state.borrow().last_update_time
    }

    /// Whether a fetch is currently running
    pub fn is_refreshing(&self) -> bool {
        lock(&self.shared.in_flight).is_some()
    }

    pub fn setup_state(&self) -> SetupState {
        *lock(&self.shared.setup)
    }

    /// Whether the first refresh succeeded
    pub fn is_ready(&self) -> bool {
        self.setup_state() == SetupState::Ready
    }

    /// Whether `shutdown()` has been called
    pub fn is_shutdown(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn interval(&self) -> Duration {
        self.shared.interval
    }

    /// When the polling loop fires next, if it is running
    pub fn next_refresh_at(&self) -> Option<Instant> {
        if self.is_ready() && !self.is_shutdown() {
            Some(*self.shared.next_refresh.borrow())
        } else {
            None
        }
    }

    /// Stop the coordinator
    ///
    /// Cancels the polling loop and abandons any in-flight fetch without
    /// waiting for it. Callers waiting on that fetch get `Error::Shutdown`.
    /// Calling this more than once is harmless.
    pub fn shutdown(&self) {
        if self.shared.cancel.is_cancelled() {
            return;
        }
        self.shared.cancel.cancel();

        if let Some(task) = lock(&self.shared.poll_task).take() {
            task.abort();
        }
        let in_flight = lock(&self.shared.in_flight).take();
        if let Some(in_flight) = in_flight {
            debug!("{}: abandoning in-flight refresh", self.shared.name);
            in_flight.task.abort();
        }

        info!("{}: coordinator stopped", self.shared.name);
    }

    /// Join the running fetch or spawn a new one
    fn join_or_start(&self) -> Result<watch::Receiver<Option<Snapshot>>> {
        let mut in_flight = lock(&self.shared.in_flight);

        // Checked under the lock so shutdown() cannot miss a fetch started here
        if self.shared.cancel.is_cancelled() {
            return Err(Error::shutdown(format!(
                "{}: coordinator is shut down",
                self.shared.name
            )));
        }

        if let Some(current) = in_flight.as_ref() {
            debug!("{}: refresh already in flight, joining", self.shared.name);
            return Ok(current.outcome.clone());
        }

        let (tx, rx) = watch::channel(None);
        let shared = Arc::clone(&self.shared);
        let task = tokio::spawn(async move { shared.run_refresh(tx).await });

        *in_flight = Some(InFlight {
            outcome: rx.clone(),
            task,
        });

        Ok(rx)
    }

    /// Spawn the polling loop
    ///
    /// The loop holds only a weak reference between ticks, so dropping
    /// every coordinator handle ends it.
    fn start_polling(&self) {
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let cancel = self.shared.cancel.clone();
        let mut next_refresh = self.shared.next_refresh.subscribe();
        let name = self.shared.name.clone();

        let task = tokio::spawn(async move {
            loop {
                let deadline = *next_refresh.borrow_and_update();

                tokio::select! {
                    _ = cancel.cancelled() => break,

                    // Rescheduled by a completed fetch
                    changed = next_refresh.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }

                    _ = tokio::time::sleep_until(deadline) => {
                        let Some(shared) = weak.upgrade() else {
                            break;
                        };
                        debug!("{}: scheduled refresh", name);
                        let coordinator = Coordinator { shared };
                        if let Err(e) = coordinator.request_refresh().await {
                            debug!("{}: polling loop exiting: {}", name, e);
                            break;
                        }
                    }
                }
            }
            debug!("{}: polling loop stopped", name);
        });

        *lock(&self.shared.poll_task) = Some(task);
    }
}

impl Shared {
    /// Body of the fetch task
    async fn run_refresh(self: Arc<Self>, outcome: watch::Sender<Option<Snapshot>>) {
        let _release = ReleaseInFlight {
            shared: &self,
            outcome: outcome.subscribe(),
        };

        debug!("{}: fetching from {}", self.name, self.source.source_name());
        let result = match AssertUnwindSafe(self.source.fetch()).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                error!("{}: data source panicked: {}", self.name, panic_message(&*panic));
                Err(FetchError::invalid_response(format!(
                    "Data source '{}' panicked: {}",
                    self.source.source_name(),
                    panic_message(&*panic)
                )))
            }
        };

        let snapshot = {
            let mut in_flight = lock(&self.in_flight);
            if self.cancel.is_cancelled() {
                // Abandoned: dropping `outcome` releases the waiters
                return;
            }
            let snapshot = self.apply(result);
            *in_flight = None;
            let now = Instant::now();
            self.next_refresh
                .send_replace(now.checked_add(self.interval).unwrap_or(now));
            snapshot
        };

        self.notify(&snapshot);
        outcome.send_replace(Some(snapshot));
    }

    /// Publish the result of one fetch and return the new snapshot
    fn apply(&self, result: std::result::Result<Payload, FetchError>) -> Snapshot {
        let (was_success, had_update) = {
            let current = self.state.borrow();
            (current.last_update_success, current.last_update_time.is_some())
        };

        match &result {
            Ok(_) if had_update && !was_success => {
                info!("{}: fetching data recovered", self.name);
            }
            Ok(_) => debug!("{}: refresh succeeded", self.name),
            Err(e) if was_success || !had_update => {
                warn!("{}: error fetching data: {}", self.name, e);
            }
            Err(e) => debug!("{}: still failing: {}", self.name, e),
        }

        let now = Utc::now();
        self.state.send_modify(|state| {
            state.last_update_time = Some(now);
            match result {
                Ok(payload) => {
                    state.data = Some(payload);
                    state.last_update_success = true;
                    state.last_exception = None;
                }
                Err(e) => {
                    state.last_update_success = false;
                    state.last_exception = Some(e);
                }
            }
        });

        self.state.borrow().clone()
    }

    /// Invoke every listener with the new snapshot
    fn notify(&self, snapshot: &Snapshot) {
        // Listeners run outside the lock so they may (un)subscribe
        let listeners: Vec<Arc<dyn Listener>> =
            lock(&self.listeners).values().cloned().collect();

        for listener in listeners {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener.on_update(snapshot))) {
                error!("{}: listener panicked: {}", self.name, panic_message(&*panic));
            }
        }
    }
}

/// Clears `in_flight` when a fetch task ends without publishing
///
/// Only the entry registered for this task's own outcome channel is
/// cleared; a newer fetch started in the meantime is left alone.
struct ReleaseInFlight<'a> {
    shared: &'a Shared,
    outcome: watch::Receiver<Option<Snapshot>>,
}

impl Drop for ReleaseInFlight<'_> {
    fn drop(&mut self) {
        let mut in_flight = lock(&self.shared.in_flight);
        if in_flight
            .as_ref()
            .is_some_and(|current| current.outcome.same_channel(&self.outcome))
        {
            *in_flight = None;
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg
    } else {
        "unknown panic"
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StaticSource;

    #[async_trait]
    impl DataSource for StaticSource {
        async fn fetch(&self) -> std::result::Result<Payload, FetchError> {
            let mut payload = Payload::new();
            payload.insert("title".to_string(), "Pierogi".into());
            Ok(payload)
        }

        fn source_name(&self) -> &str {
            "static"
        }
    }

    #[test]
    fn zero_interval_is_rejected() {
        let result = Coordinator::with_interval("test", Arc::new(StaticSource), Duration::ZERO);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn unrepresentable_interval_is_rejected() {
        let result = Coordinator::with_interval("test", Arc::new(StaticSource), Duration::MAX);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn oversized_scan_interval_is_rejected() {
        let config = CoordinatorConfig {
            scan_interval_minutes: u64::MAX / 60,
        };
        let result = Coordinator::new("test", Arc::new(StaticSource), &config);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn initial_snapshot_is_empty() {
        let coordinator =
            Coordinator::with_interval("test", Arc::new(StaticSource), Duration::from_secs(60))
                .unwrap();
        assert_eq!(coordinator.snapshot(), Snapshot::default());
        assert_eq!(coordinator.setup_state(), SetupState::Pending);
        assert!(coordinator.next_refresh_at().is_none());
    }

    #[tokio::test]
    async fn unsubscribed_listener_is_not_called() {
        let coordinator =
            Coordinator::with_interval("test", Arc::new(StaticSource), Duration::from_secs(60))
                .unwrap();
        let calls = Arc::new(AtomicU64::new(0));

        let counter = Arc::clone(&calls);
        let id = coordinator.subscribe(move |_: &Snapshot| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        coordinator.request_refresh().await.unwrap();
        assert!(coordinator.unsubscribe(id));
        assert!(!coordinator.unsubscribe(id));
        coordinator.request_refresh().await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.listener_count(), 0);
    }
}
