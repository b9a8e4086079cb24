// # Listener Trait
//
// Observers registered on a `Coordinator`. They are invoked synchronously,
// right after each refresh attempt has been published, success or failure.
// Listeners decide on their own how to render stale or unknown state.

use crate::coordinator::Snapshot;

/// Handle returned by `Coordinator::subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);

/// Trait for coordinator observers
///
/// Keep `on_update` short: it runs on the coordinator's refresh task and
/// delays every other listener behind it.
pub trait Listener: Send + Sync {
    /// Called after every completed refresh attempt
    fn on_update(&self, snapshot: &Snapshot);
}

impl<F> Listener for F
where
    F: Fn(&Snapshot) + Send + Sync,
{
    fn on_update(&self, snapshot: &Snapshot) {
        self(snapshot)
    }
}
