//! Plugin store boundary.
//!
//! The resolver never performs I/O itself; fetching the catalog and
//! persisting the enabled set go through the [`PluginStore`] trait. The HTTP
//! transport behind it lives in the embedding application. [`MemoryStore`]
//! is the in-process implementation used by tests and embedders.

use crate::catalog::{PluginCatalog, PluginSnapshot};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

/// Body of the persistence call (`PUT`-equivalent).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistRequest {
    pub plugins: Vec<String>,
}

/// Response of the persistence call: the server-confirmed enabled set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistResponse {
    pub value: Vec<String>,
}

/// Remote plugin state, as seen by the resolver's caller.
#[async_trait]
pub trait PluginStore: Send + Sync {
    /// Fetch the catalog and the persisted enabled set.
    async fn fetch(&self) -> Result<PluginSnapshot>;

    /// Persist the enabled set; returns the set the server actually stored.
    async fn persist(&self, plugins: &[String]) -> Result<Vec<String>>;
}

/// In-memory [`PluginStore`] with server-like semantics: persisted sets are
/// filtered to known plugins and the stored value is echoed back.
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

struct MemoryState {
    all: PluginCatalog,
    enabled: Vec<String>,
}

impl MemoryStore {
    /// Create a store seeded with a snapshot.
    pub fn new(snapshot: PluginSnapshot) -> Self {
        Self {
            state: RwLock::new(MemoryState {
                all: snapshot.all,
                enabled: snapshot.enabled,
            }),
        }
    }

    /// Remove a plugin from the backing catalog, simulating a plugin whose
    /// directory vanished between loads.
    pub async fn remove_plugin(&self, id: &str) {
        let mut state = self.state.write().await;
        let mut all = PluginCatalog::new();
        for (key, info) in state.all.iter() {
            if key != id {
                all.insert(key.clone(), info.clone());
            }
        }
        state.all = all;
        state.enabled.retain(|e| e != id);
    }
}

#[async_trait]
impl PluginStore for MemoryStore {
    async fn fetch(&self) -> Result<PluginSnapshot> {
        let state = self.state.read().await;
        Ok(PluginSnapshot::new(state.enabled.clone(), state.all.clone()))
    }

    async fn persist(&self, plugins: &[String]) -> Result<Vec<String>> {
        let mut state = self.state.write().await;
        let stored: Vec<String> = plugins
            .iter()
            .filter(|id| state.all.contains(id.as_str()))
            .cloned()
            .collect();
        debug!("Memory store persisted {} plugins", stored.len());
        state.enabled = stored.clone();
        Ok(stored)
    }
}
