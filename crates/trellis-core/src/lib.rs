//! Trellis Core - Plugin enablement resolver for the Trellis admin console.
//!
//! This crate owns the in-memory view of "all known plugins" and "currently
//! enabled plugins" for a web data-management platform: it computes unmet
//! transitive dependencies (cycle-safe), derives the effective enabled set,
//! and produces a deterministically sorted presentation list. Rendering,
//! routing, and the HTTP transport stay in the embedding application.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use trellis_core::{MemoryStore, NoRoutes, PluginAdmin};
//!
//! #[tokio::main]
//! async fn main() -> trellis_core::Result<()> {
//!     let store = Arc::new(MemoryStore::new(snapshot));
//!     let mut admin = PluginAdmin::new(store, Arc::new(NoRoutes));
//!     admin.load().await?;
//!
//!     admin.set_enabled("metadata_extractor", true).await?;
//!     for entry in admin.plugins()? {
//!         println!("{}: enabled={}", entry.info.name, entry.info.enabled);
//!     }
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod error;
pub mod resolver;
pub mod routes;
pub mod session;
pub mod store;

// Re-export commonly used types
pub use catalog::{PluginCatalog, PluginInfo, PluginSnapshot};
pub use error::{Result, TrellisError};
pub use resolver::{
    apply_toggle, reconcile, reconcile_with_persisted, sort_for_display, unmet_dependencies,
    DisplayEntry, Reconciliation,
};
pub use routes::{ConfigRouteProvider, NoRoutes, RouteTable};
pub use session::{PersistPhase, ToggleSession};
pub use store::{MemoryStore, PersistRequest, PersistResponse, PluginStore};

use std::sync::Arc;
use tracing::info;

/// Caller-facing driver for the plugin admin page.
///
/// Owns the store and route collaborators plus the toggle session, and
/// serializes persistence round-trips: one call in flight at a time, with
/// coalesced toggles flushed in a follow-up round-trip.
pub struct PluginAdmin {
    store: Arc<dyn PluginStore>,
    routes: Arc<dyn ConfigRouteProvider>,
    session: Option<ToggleSession>,
}

impl PluginAdmin {
    /// Create a driver over a store and a route provider. Call
    /// [`PluginAdmin::load`] before anything else.
    pub fn new(store: Arc<dyn PluginStore>, routes: Arc<dyn ConfigRouteProvider>) -> Self {
        Self {
            store,
            routes,
            session: None,
        }
    }

    /// Fetch the catalog snapshot and build a fresh session from it.
    ///
    /// Reloading discards any unpersisted local state, including the
    /// restart-required flag.
    pub async fn load(&mut self) -> Result<()> {
        let snapshot = self.store.fetch().await?;
        self.session = Some(ToggleSession::new(snapshot, self.routes.clone()));
        Ok(())
    }

    /// Toggle a plugin and run the full persist round-trip.
    ///
    /// The toggle is applied optimistically, reconciled, then persisted; the
    /// server's response overwrites the optimistic state. On transport
    /// failure the working set is rolled back to the last confirmed state
    /// and the error is returned.
    pub async fn set_enabled(&mut self, id: &str, turn_on: bool) -> Result<()> {
        let session = self.session.as_mut().ok_or(TrellisError::NotLoaded)?;
        session.toggle(id, turn_on);
        Self::flush(session, &self.store).await
    }

    /// Persist until the session has no pending local changes.
    async fn flush(session: &mut ToggleSession, store: &Arc<dyn PluginStore>) -> Result<()> {
        while session.wants_persist() {
            let payload = session.begin_persist()?;
            match store.persist(&payload).await {
                Ok(server_set) => session.complete_persist(server_set)?,
                Err(e) => {
                    session.fail_persist()?;
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Sorted presentation list of all known plugins.
    pub fn plugins(&self) -> Result<Vec<DisplayEntry>> {
        let session = self.session.as_ref().ok_or(TrellisError::NotLoaded)?;
        Ok(session.display_list())
    }

    /// Whether a plugin is effectively enabled.
    pub fn is_enabled(&self, id: &str) -> bool {
        self.session
            .as_ref()
            .map(|s| s.is_enabled(id))
            .unwrap_or(false)
    }

    /// Whether the enabled set diverged from the running server's state.
    pub fn restart_required(&self) -> bool {
        self.session
            .as_ref()
            .map(|s| s.restart_required())
            .unwrap_or(false)
    }

    /// Access the underlying session, if loaded.
    pub fn session(&self) -> Option<&ToggleSession> {
        self.session.as_ref()
    }

    /// Log the current enablement summary (for admin-page diagnostics).
    pub fn log_summary(&self) {
        if let Some(session) = &self.session {
            info!(
                "Plugin state: {} known, {} enabled, restart_required={}",
                session.catalog().len(),
                session.enabled().len(),
                session.restart_required()
            );
        }
    }
}
