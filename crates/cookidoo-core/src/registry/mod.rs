//! Entry registry
//!
//! An explicit map, owned by the composition root, from entry id to the
//! client and coordinator serving that entry. There is no global instance:
//! whoever creates the registry decides its lifetime.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cookidoo_core::{CookidooConfig, EntryRegistry};
//!
//! let registry = EntryRegistry::new();
//!
//! // Build, first-refresh and register one entry
//! let coordinator = registry.setup_entry("kitchen", client, config).await?;
//!
//! // Later, on teardown
//! registry.unload_entry("kitchen");
//! ```

use crate::config::CookidooConfig;
use crate::coordinator::Coordinator;
use crate::error::{Error, Result};
use crate::source::ApiDataSource;
use crate::traits::ApiClient;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

/// Everything the composition root keeps for one configured backend
#[derive(Clone)]
pub struct Entry {
    /// API client, also used directly by binary (camera-style) consumers
    pub client: Arc<dyn ApiClient>,

    /// Coordinator refreshing the client's JSON endpoints
    pub coordinator: Coordinator,

    /// Configuration the entry was set up with
    pub config: CookidooConfig,
}

impl std::fmt::Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry")
            .field("client", &self.client.client_name())
            .field("coordinator", &self.coordinator)
            .field("config", &self.config)
            .finish()
    }
}

/// Registry of set-up entries keyed by entry id
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes. No lock is held across an await.
#[derive(Default)]
pub struct EntryRegistry {
    entries: RwLock<HashMap<String, Entry>>,
}

impl EntryRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Set up an entry: build its coordinator, run the first refresh,
    /// and register it
    ///
    /// # Returns
    ///
    /// - `Ok(Coordinator)`: the entry is registered and polling
    /// - `Err(Error::AlreadyConfigured)`: the id is taken
    /// - `Err(Error::NotReady)`: the first refresh failed; nothing registered
    pub async fn setup_entry(
        &self,
        id: impl Into<String>,
        client: Arc<dyn ApiClient>,
        config: CookidooConfig,
    ) -> Result<Coordinator> {
        let id = id.into();
        config.validate()?;

        if self.contains(&id) {
            return Err(Error::AlreadyConfigured(id));
        }

        let source = Arc::new(ApiDataSource::new(Arc::clone(&client)));
        let coordinator = Coordinator::new(id.clone(), source, &config.coordinator)?;

        if let Err(e) = coordinator.first_refresh().await {
            coordinator.shutdown();
            return Err(e);
        }

        let entry = Entry {
            client,
            coordinator: coordinator.clone(),
            config,
        };

        if let Err(e) = self.insert(id, entry) {
            coordinator.shutdown();
            return Err(e);
        }

        Ok(coordinator)
    }

    /// Register an already set-up entry
    pub fn insert(&self, id: impl Into<String>, entry: Entry) -> Result<()> {
        let id = id.into();
        let mut entries = self.write();

        if entries.contains_key(&id) {
            return Err(Error::AlreadyConfigured(id));
        }

        info!("Registered entry {} ({})", id, entry.config.connection.title());
        entries.insert(id, entry);
        Ok(())
    }

    /// Get an entry by id
    pub fn get(&self, id: &str) -> Option<Entry> {
        self.read().get(id).cloned()
    }

    /// Get an entry's coordinator by id
    pub fn coordinator(&self, id: &str) -> Result<Coordinator> {
        self.get(id)
            .map(|entry| entry.coordinator)
            .ok_or_else(|| Error::not_found(format!("Unknown entry: {}", id)))
    }

    /// Remove an entry and shut its coordinator down
    ///
    /// Returns `false` if the id was not registered.
    pub fn unload_entry(&self, id: &str) -> bool {
        let removed = self.write().remove(id);

        match removed {
            Some(entry) => {
                entry.coordinator.shutdown();
                info!("Unloaded entry {}", id);
                true
            }
            None => {
                debug!("Unload requested for unknown entry {}", id);
                false
            }
        }
    }

    /// Unload every entry
    pub fn unload_all(&self) {
        let drained: Vec<(String, Entry)> = self.write().drain().collect();

        for (id, entry) in drained {
            entry.coordinator.shutdown();
            info!("Unloaded entry {}", id);
        }
    }

    /// List all registered entry ids, sorted
    pub fn list_entries(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Check if an entry id is registered
    pub fn contains(&self, id: &str) -> bool {
        self.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Entry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Entry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_starts_empty() {
        let registry = EntryRegistry::new();

        assert!(registry.is_empty());
        assert!(!registry.contains("kitchen"));
        assert!(!registry.unload_entry("kitchen"));
        assert!(matches!(
            registry.coordinator("kitchen"),
            Err(Error::NotFound(_))
        ));
    }
}
