//! Route-naming collaborator for plugin configuration pages.
//!
//! The resolver only decorates enabled plugins with a route string; where
//! that route leads is the embedding application's concern.

use std::collections::HashMap;

/// Maps a plugin identifier to its configuration-UI route, if one exists.
pub trait ConfigRouteProvider: Send + Sync {
    fn config_route(&self, plugin_id: &str) -> Option<String>;
}

/// Registry of configuration routes keyed by plugin identifier.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: HashMap<String, String>,
}

impl RouteTable {
    /// Create an empty route table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the config route for a plugin.
    pub fn register(&mut self, plugin_id: impl Into<String>, route: impl Into<String>) {
        self.routes.insert(plugin_id.into(), route.into());
    }

    /// Remove a plugin's config route.
    pub fn unregister(&mut self, plugin_id: &str) {
        self.routes.remove(plugin_id);
    }
}

impl ConfigRouteProvider for RouteTable {
    fn config_route(&self, plugin_id: &str) -> Option<String> {
        self.routes.get(plugin_id).cloned()
    }
}

/// Provider for callers without any plugin configuration UI.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRoutes;

impl ConfigRouteProvider for NoRoutes {
    fn config_route(&self, _plugin_id: &str) -> Option<String> {
        None
    }
}
