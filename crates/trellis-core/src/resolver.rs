//! Pure reconciliation logic for plugin enablement.
//!
//! All functions here are synchronous, perform no I/O, and never fail on
//! well-formed input. The dependency walk carries an explicit on-path visited
//! set so cyclic dependency graphs terminate: a back-edge to a plugin already
//! on the current path is reported as an unmet dependency instead of
//! recursing forever.

use crate::catalog::{PluginCatalog, PluginInfo};
use crate::routes::ConfigRouteProvider;
use std::collections::HashSet;
use tracing::debug;

/// Result of a reconciliation pass: the catalog with derived fields filled
/// in, and the corrected enabled set.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub catalog: PluginCatalog,
    pub enabled: Vec<String>,
}

/// One row of the presentation list produced by [`sort_for_display`].
#[derive(Debug, Clone)]
pub struct DisplayEntry {
    pub id: String,
    pub info: PluginInfo,
}

/// Direct dependencies of `id` that cannot be satisfied.
///
/// A dependency is met iff it exists in the catalog and its own entire
/// dependency subtree is satisfiable. Declaration order is preserved and
/// duplicates in the source list are kept as-is.
///
/// Given A depends on B, B depends on C, and C is absent: A reports `["B"]`
/// and B reports `["C"]`. A plugin on a dependency cycle reports the cycle
/// member as unmet.
pub fn unmet_dependencies(id: &str, catalog: &PluginCatalog) -> Vec<String> {
    let mut path = HashSet::new();
    unmet_on_path(id, catalog, &mut path)
}

/// Recursive walk with `path` holding the identifiers currently being
/// expanded. Entries are removed on exit so shared (diamond) dependencies in
/// sibling subtrees are not mistaken for cycles.
fn unmet_on_path(id: &str, catalog: &PluginCatalog, path: &mut HashSet<String>) -> Vec<String> {
    let Some(info) = catalog.get(id) else {
        return Vec::new();
    };

    path.insert(id.to_string());
    let mut unmet = Vec::new();
    for dep in &info.dependencies {
        let met = !path.contains(dep)
            && catalog.contains(dep)
            && unmet_on_path(dep, catalog, path).is_empty();
        if !met {
            unmet.push(dep.clone());
        }
    }
    path.remove(id);

    unmet
}

/// Derive a consistent view from a catalog and a candidate enabled set.
///
/// Every plugin gets its unmet-dependency list computed; plugins with a
/// broken dependency chain are stripped from the enabled set regardless of
/// the caller's wishes. Surviving enabled plugins are marked enabled and
/// decorated with their configuration route.
///
/// Guarantees: the returned enabled set is a subset of the catalog's keys,
/// contains no duplicates, and none of its members has a non-empty
/// unmet-dependency list.
pub fn reconcile(
    mut catalog: PluginCatalog,
    enabled: Vec<String>,
    routes: &dyn ConfigRouteProvider,
) -> Reconciliation {
    let mut enabled = enabled;

    let unmet: Vec<(String, Vec<String>)> = catalog
        .ids()
        .map(|id| (id.clone(), unmet_dependencies(id, &catalog)))
        .collect();

    for (id, list) in unmet {
        if !list.is_empty() && enabled.iter().any(|e| e == &id) {
            debug!("Disabling plugin {} with unmet dependencies: {:?}", id, list);
            enabled.retain(|e| e != &id);
        }
        if let Some(info) = catalog.get_mut(&id) {
            info.unmet_dependencies = list;
            info.enabled = false;
            info.config_route = None;
        }
    }

    // Unknown identifiers are filtered silently; duplicates collapse to the
    // first occurrence.
    let mut seen = HashSet::new();
    enabled.retain(|id| catalog.contains(id) && seen.insert(id.clone()));

    for id in &enabled {
        if let Some(info) = catalog.get_mut(id) {
            info.enabled = true;
            info.config_route = routes.config_route(id);
        }
    }

    Reconciliation { catalog, enabled }
}

/// Produce the presentation list, sorted ascending by display name.
///
/// The comparison is case-insensitive with a codepoint tiebreak, so
/// "apple" sorts before "Banana" before "Zebra". Does not mutate the catalog
/// and is idempotent.
pub fn sort_for_display(catalog: &PluginCatalog) -> Vec<DisplayEntry> {
    let mut entries: Vec<DisplayEntry> = catalog
        .iter()
        .map(|(id, info)| DisplayEntry {
            id: id.clone(),
            info: info.clone(),
        })
        .collect();

    entries.sort_by(|a, b| {
        let ka = a.info.name.to_lowercase();
        let kb = b.info.name.to_lowercase();
        ka.cmp(&kb).then_with(|| a.info.name.cmp(&b.info.name))
    });

    entries
}

/// Apply a user toggle to the enabled set (the optimistic local update).
///
/// Turning a plugin on appends it unless already present; turning it off
/// removes every occurrence, which also cleans up any duplicates left behind
/// by older buggy writers.
pub fn apply_toggle(mut enabled: Vec<String>, id: &str, turn_on: bool) -> Vec<String> {
    if turn_on {
        if !enabled.iter().any(|e| e == id) {
            enabled.push(id.to_string());
        }
    } else {
        enabled.retain(|e| e != id);
    }
    enabled
}

/// Reconcile the local enabled set with the persistence round-trip.
///
/// Before the request (`persisted` = `None`): drop identifiers that vanished
/// from the catalog between loads. After a successful round-trip
/// (`persisted` = `Some`): adopt the server-confirmed set verbatim — a pure
/// overwrite, never a merge.
pub fn reconcile_with_persisted(
    local: Vec<String>,
    catalog: &PluginCatalog,
    persisted: Option<Vec<String>>,
) -> Vec<String> {
    match persisted {
        Some(server) => server,
        None => local.into_iter().filter(|id| catalog.contains(id)).collect(),
    }
}
