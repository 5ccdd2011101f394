//! Plugin catalog types and the server snapshot shape.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Metadata and derived state for one known plugin.
///
/// `enabled`, `unmet_dependencies` and `config_route` are derived during
/// reconciliation; the authoritative inputs are the catalog membership and
/// declared dependency list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginInfo {
    /// Display name, also used as the sort key for presentation.
    pub name: String,
    /// Short human-readable summary.
    #[serde(default)]
    pub description: Option<String>,
    /// Plugin version string, if the plugin declares one.
    #[serde(default)]
    pub version: Option<String>,
    /// Homepage or repository URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Identifiers of plugins this plugin requires, in declaration order.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Whether the plugin is flagged experimental in its metadata.
    #[serde(default)]
    pub experimental: bool,
    /// Derived: whether the plugin is effectively enabled.
    #[serde(default)]
    pub enabled: bool,
    /// Derived: direct dependencies that cannot be satisfied.
    #[serde(default)]
    pub unmet_dependencies: Vec<String>,
    /// Derived: route to the plugin's configuration UI, present only when
    /// enabled and a config page exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_route: Option<String>,
}

impl PluginInfo {
    /// Create a plugin entry with no dependencies.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            version: None,
            url: None,
            dependencies: Vec::new(),
            experimental: false,
            enabled: false,
            unmet_dependencies: Vec::new(),
            config_route: None,
        }
    }

    /// Set the declared dependency list.
    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }
}

/// Mapping from plugin identifier to [`PluginInfo`].
///
/// Keys are unique by construction; a plugin absent from the catalog can
/// never be considered enabled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginCatalog {
    plugins: HashMap<String, PluginInfo>,
}

impl PluginCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from an id → info mapping.
    pub fn from_map(plugins: HashMap<String, PluginInfo>) -> Self {
        Self { plugins }
    }

    /// Insert or replace a plugin entry.
    pub fn insert(&mut self, id: impl Into<String>, info: PluginInfo) {
        self.plugins.insert(id.into(), info);
    }

    /// Look up a plugin by identifier.
    pub fn get(&self, id: &str) -> Option<&PluginInfo> {
        self.plugins.get(id)
    }

    /// Mutable lookup by identifier.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut PluginInfo> {
        self.plugins.get_mut(id)
    }

    /// Check whether an identifier is a known plugin.
    pub fn contains(&self, id: &str) -> bool {
        self.plugins.contains_key(id)
    }

    /// Iterate over (id, info) pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &PluginInfo)> {
        self.plugins.iter()
    }

    /// All known plugin identifiers, in unspecified order.
    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.plugins.keys()
    }

    /// Number of known plugins.
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

/// The `{ enabled, all }` pair returned by a catalog fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginSnapshot {
    /// Persisted enabled plugin identifiers.
    pub enabled: Vec<String>,
    /// All known plugins.
    pub all: PluginCatalog,
}

impl PluginSnapshot {
    /// Create a snapshot from its parts.
    pub fn new(enabled: Vec<String>, all: PluginCatalog) -> Self {
        Self { enabled, all }
    }

    /// Decode a snapshot from the server's JSON shape.
    pub fn from_json(raw: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Drop enabled identifiers that are not catalog keys, and collapse
    /// duplicates while preserving first-occurrence order.
    ///
    /// Malformed references are excluded silently; they are not an error.
    pub fn validate(mut self) -> Self {
        let mut seen: HashSet<String> = HashSet::new();
        self.enabled.retain(|id| {
            if !self.all.contains(id) {
                warn!("Dropping enabled plugin not present in catalog: {}", id);
                return false;
            }
            seen.insert(id.clone())
        });
        self
    }
}
