//! Toggle lifecycle state machine.
//!
//! Models the optimistic toggle-then-persist flow as explicit state:
//! `Idle → OptimisticallyApplied → Persisting → Confirmed | Reverted`.
//! The session owns the working and last-confirmed enabled sets plus the
//! `restart_required` flag, held here instead of in a process-global
//! boolean. All transitions are synchronous; the caller
//! drives the asynchronous transport between `begin_persist` and
//! `complete_persist`/`fail_persist`.

use crate::catalog::{PluginCatalog, PluginSnapshot};
use crate::error::{Result, TrellisError};
use crate::resolver::{self, DisplayEntry};
use crate::routes::ConfigRouteProvider;
use std::mem;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where the session stands in the persist round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistPhase {
    /// No local changes since the last confirmation.
    Idle,
    /// Local toggles applied, not yet sent to the server.
    OptimisticallyApplied,
    /// A persistence call is in flight.
    Persisting,
    /// The server confirmed the last write.
    Confirmed,
    /// The last write failed and local changes were rolled back.
    Reverted,
}

impl PersistPhase {
    /// Transition for a user toggle. Toggles during an in-flight persist do
    /// not leave `Persisting`; they are coalesced by the session.
    pub fn on_toggle(self) -> Self {
        match self {
            PersistPhase::Persisting => PersistPhase::Persisting,
            _ => PersistPhase::OptimisticallyApplied,
        }
    }

    /// Transition for starting a persistence call.
    pub fn on_begin_persist(self) -> Result<Self> {
        match self {
            PersistPhase::Persisting => Err(TrellisError::PersistInFlight),
            _ => Ok(PersistPhase::Persisting),
        }
    }

    /// Transition for a confirmed round-trip. `follow_up` indicates coalesced
    /// toggles are waiting, which puts the session straight back into
    /// `OptimisticallyApplied`.
    pub fn on_persist_confirmed(self, follow_up: bool) -> Result<Self> {
        match self {
            PersistPhase::Persisting if follow_up => Ok(PersistPhase::OptimisticallyApplied),
            PersistPhase::Persisting => Ok(PersistPhase::Confirmed),
            _ => Err(TrellisError::NoPersistInFlight),
        }
    }

    /// Transition for a failed round-trip.
    pub fn on_persist_failed(self) -> Result<Self> {
        match self {
            PersistPhase::Persisting => Ok(PersistPhase::Reverted),
            _ => Err(TrellisError::NoPersistInFlight),
        }
    }
}

/// Session state for the plugin admin page: catalog, working enabled set,
/// last server-confirmed set, and the persist phase.
pub struct ToggleSession {
    catalog: PluginCatalog,
    /// Working enabled set, always reconciled.
    enabled: Vec<String>,
    /// Enabled set as last confirmed by the server.
    confirmed: Vec<String>,
    /// Toggles that arrived while a persistence call was in flight.
    pending: Vec<(String, bool)>,
    phase: PersistPhase,
    /// Sticky flag: the enabled set has diverged from what the running
    /// server was started with. Cleared only by constructing a new session.
    restart_required: bool,
    routes: Arc<dyn ConfigRouteProvider>,
}

impl ToggleSession {
    /// Build a session from a fetched snapshot. The snapshot is validated
    /// and reconciled immediately; the result becomes both the working and
    /// the confirmed enabled set.
    pub fn new(snapshot: PluginSnapshot, routes: Arc<dyn ConfigRouteProvider>) -> Self {
        let snapshot = snapshot.validate();
        let reconciled = resolver::reconcile(snapshot.all, snapshot.enabled, routes.as_ref());

        info!(
            "Loaded plugin catalog: {} known, {} enabled",
            reconciled.catalog.len(),
            reconciled.enabled.len()
        );

        Self {
            catalog: reconciled.catalog,
            confirmed: reconciled.enabled.clone(),
            enabled: reconciled.enabled,
            pending: Vec::new(),
            phase: PersistPhase::Idle,
            restart_required: false,
            routes,
        }
    }

    /// Apply a user toggle optimistically and reconcile.
    ///
    /// Toggles for unknown identifiers are filtered out by reconciliation
    /// and leave the session unchanged. A toggle arriving while a persist is
    /// in flight is recorded and replayed after the round-trip completes.
    pub fn toggle(&mut self, id: &str, turn_on: bool) {
        let before = self.enabled.clone();
        let working = resolver::apply_toggle(mem::take(&mut self.enabled), id, turn_on);
        self.reapply(working);

        if self.enabled == before && self.phase != PersistPhase::Persisting {
            // No effect (unknown plugin, or already in the requested state).
            self.enabled = before;
            return;
        }
        debug!("Toggled plugin {} -> {}", id, turn_on);

        if self.phase == PersistPhase::Persisting {
            self.pending.push((id.to_string(), turn_on));
        }
        self.phase = self.phase.on_toggle();
        if self.enabled != self.confirmed {
            self.restart_required = true;
        }
    }

    /// Start a persistence round-trip and return the payload to send.
    ///
    /// Identifiers that vanished from the catalog since the last load are
    /// dropped from the payload.
    pub fn begin_persist(&mut self) -> Result<Vec<String>> {
        self.phase = self.phase.on_begin_persist()?;
        let payload =
            resolver::reconcile_with_persisted(self.enabled.clone(), &self.catalog, None);
        debug!("Persisting enabled set: {:?}", payload);
        Ok(payload)
    }

    /// Adopt the server-confirmed enabled set after a successful round-trip.
    ///
    /// The optimistic local set is discarded entirely in favor of the server
    /// value, then any toggles coalesced during the round-trip are replayed
    /// on top. If a replay changed the set the session returns to
    /// `OptimisticallyApplied` so the driver issues a follow-up persist.
    pub fn complete_persist(&mut self, server_set: Vec<String>) -> Result<()> {
        let follow_up = !self.pending.is_empty();
        self.phase = self.phase.on_persist_confirmed(follow_up)?;

        let adopted = resolver::reconcile_with_persisted(
            mem::take(&mut self.enabled),
            &self.catalog,
            Some(server_set),
        );
        self.reapply(adopted);
        self.confirmed = self.enabled.clone();

        for (id, turn_on) in mem::take(&mut self.pending) {
            let working = resolver::apply_toggle(mem::take(&mut self.enabled), &id, turn_on);
            self.reapply(working);
        }
        if self.enabled != self.confirmed {
            self.restart_required = true;
        }

        info!(
            "Server confirmed enabled set ({} plugins){}",
            self.confirmed.len(),
            if follow_up { ", replaying coalesced toggles" } else { "" }
        );
        Ok(())
    }

    /// Roll the working set back to the last confirmed state after a failed
    /// round-trip. Coalesced toggles are discarded too.
    pub fn fail_persist(&mut self) -> Result<()> {
        self.phase = self.phase.on_persist_failed()?;
        warn!("Persistence failed; reverting to last confirmed enabled set");
        self.pending.clear();
        let confirmed = self.confirmed.clone();
        self.reapply(confirmed);
        Ok(())
    }

    /// Reconcile a candidate enabled set into the session.
    fn reapply(&mut self, candidate: Vec<String>) {
        let catalog = mem::take(&mut self.catalog);
        let result = resolver::reconcile(catalog, candidate, self.routes.as_ref());
        self.catalog = result.catalog;
        self.enabled = result.enabled;
    }

    /// Current persist phase.
    pub fn phase(&self) -> PersistPhase {
        self.phase
    }

    /// True when local changes are waiting to be persisted.
    pub fn wants_persist(&self) -> bool {
        self.phase == PersistPhase::OptimisticallyApplied
    }

    /// Working enabled set (reconciled).
    pub fn enabled(&self) -> &[String] {
        &self.enabled
    }

    /// Enabled set as last confirmed by the server.
    pub fn confirmed(&self) -> &[String] {
        &self.confirmed
    }

    /// Whether a plugin is effectively enabled right now.
    pub fn is_enabled(&self, id: &str) -> bool {
        self.enabled.iter().any(|e| e == id)
    }

    /// The reconciled catalog.
    pub fn catalog(&self) -> &PluginCatalog {
        &self.catalog
    }

    /// Whether the enabled set has diverged from the state the server was
    /// started with (signals "restart required" to the caller).
    pub fn restart_required(&self) -> bool {
        self.restart_required
    }

    /// Presentation list, sorted by display name.
    pub fn display_list(&self) -> Vec<DisplayEntry> {
        resolver::sort_for_display(&self.catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{PluginCatalog, PluginInfo};
    use crate::routes::NoRoutes;

    fn session(entries: &[(&str, &[&str])], enabled: &[&str]) -> ToggleSession {
        let mut catalog = PluginCatalog::new();
        for (id, deps) in entries {
            catalog.insert(
                *id,
                PluginInfo::new(id.to_uppercase()).depends_on(deps.iter().copied()),
            );
        }
        let snapshot = PluginSnapshot::new(
            enabled.iter().map(|s| s.to_string()).collect(),
            catalog,
        );
        ToggleSession::new(snapshot, Arc::new(NoRoutes))
    }

    #[test]
    fn test_phase_transitions() {
        assert_eq!(
            PersistPhase::Idle.on_toggle(),
            PersistPhase::OptimisticallyApplied
        );
        assert_eq!(
            PersistPhase::Persisting.on_toggle(),
            PersistPhase::Persisting
        );
        assert!(PersistPhase::Persisting.on_begin_persist().is_err());
        assert!(PersistPhase::Idle.on_persist_confirmed(false).is_err());
        assert_eq!(
            PersistPhase::Persisting.on_persist_confirmed(true).unwrap(),
            PersistPhase::OptimisticallyApplied
        );
        assert_eq!(
            PersistPhase::Persisting.on_persist_failed().unwrap(),
            PersistPhase::Reverted
        );
    }

    #[test]
    fn test_full_round_trip() {
        let mut s = session(&[("a", &[]), ("b", &[])], &["a"]);
        assert_eq!(s.phase(), PersistPhase::Idle);
        assert!(!s.restart_required());

        s.toggle("b", true);
        assert_eq!(s.phase(), PersistPhase::OptimisticallyApplied);
        assert!(s.is_enabled("b"));
        assert!(s.restart_required());

        let payload = s.begin_persist().unwrap();
        assert_eq!(payload, vec!["a", "b"]);
        assert_eq!(s.phase(), PersistPhase::Persisting);

        s.complete_persist(payload).unwrap();
        assert_eq!(s.phase(), PersistPhase::Confirmed);
        assert_eq!(s.confirmed(), ["a", "b"]);
        assert!(s.restart_required());
    }

    #[test]
    fn test_server_response_overwrites_local_state() {
        let mut s = session(&[("a", &[]), ("b", &[])], &[]);
        s.toggle("a", true);
        let _ = s.begin_persist().unwrap();

        // Server disagrees entirely; its answer wins verbatim.
        s.complete_persist(vec!["b".into()]).unwrap();
        assert_eq!(s.enabled(), ["b"]);
        assert_eq!(s.confirmed(), ["b"]);
    }

    #[test]
    fn test_toggle_during_persist_is_coalesced() {
        let mut s = session(&[("a", &[]), ("b", &[])], &[]);
        s.toggle("a", true);
        let payload = s.begin_persist().unwrap();

        // User keeps clicking while the round-trip is outstanding.
        s.toggle("b", true);
        assert_eq!(s.phase(), PersistPhase::Persisting);
        assert!(s.is_enabled("b"));

        s.complete_persist(payload).unwrap();
        // The coalesced toggle survived adoption of the server set and the
        // session wants a follow-up persist carrying it.
        assert_eq!(s.phase(), PersistPhase::OptimisticallyApplied);
        assert!(s.is_enabled("b"));
        assert_eq!(s.confirmed(), ["a"]);

        let follow_up = s.begin_persist().unwrap();
        assert_eq!(follow_up, vec!["a", "b"]);
        s.complete_persist(follow_up).unwrap();
        assert_eq!(s.phase(), PersistPhase::Confirmed);
        assert_eq!(s.confirmed(), ["a", "b"]);
    }

    #[test]
    fn test_fail_persist_reverts_to_confirmed() {
        let mut s = session(&[("a", &[]), ("b", &[])], &["a"]);
        s.toggle("b", true);
        let _ = s.begin_persist().unwrap();
        s.toggle("a", false); // coalesced, then discarded by the failure

        s.fail_persist().unwrap();
        assert_eq!(s.phase(), PersistPhase::Reverted);
        assert_eq!(s.enabled(), ["a"]);
        assert!(!s.is_enabled("b"));
    }

    #[test]
    fn test_unknown_toggle_is_inert() {
        let mut s = session(&[("a", &[])], &["a"]);
        s.toggle("ghost", true);
        assert_eq!(s.phase(), PersistPhase::Idle);
        assert_eq!(s.enabled(), ["a"]);
        assert!(!s.restart_required());
    }

    #[test]
    fn test_toggle_disables_dependents() {
        // B depends on A; disabling A must drop B from the enabled set.
        let mut s = session(&[("a", &[]), ("b", &["a"])], &["a", "b"]);
        s.toggle("a", false);
        assert!(s.enabled().is_empty());
        assert_eq!(
            s.catalog().get("b").unwrap().unmet_dependencies,
            vec!["a"]
        );
    }

    #[test]
    fn test_restart_flag_is_sticky() {
        let mut s = session(&[("a", &[])], &[]);
        s.toggle("a", true);
        s.toggle("a", false); // back to the starting set
        assert!(s.restart_required());
    }

    #[test]
    fn test_display_list_sorted() {
        let mut catalog = PluginCatalog::new();
        catalog.insert("z", PluginInfo::new("Zebra"));
        catalog.insert("ap", PluginInfo::new("apple"));
        let s = ToggleSession::new(
            PluginSnapshot::new(vec![], catalog),
            Arc::new(NoRoutes),
        );

        let names: Vec<String> = s.display_list().into_iter().map(|e| e.info.name).collect();
        assert_eq!(names, vec!["apple", "Zebra"]);
    }
}
