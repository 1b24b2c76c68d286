//! The routing table: receiver integrations plus the route tree.
//!
//! A [`RoutingTable`] is mutated only on a private copy held by the
//! reconfiguration actor and is then published as part of an immutable
//! [`RoutingSnapshot`].

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::{Config, RouteConfig, resolve_receiver};
use crate::error::{AlertmanagerError, Result};
use crate::integration::{Integration, NotifierRegistry, Template};
use crate::route::Route;

/// Receiver integrations and the route tree, always read together.
#[derive(Debug, Clone)]
pub struct RoutingTable {
    stage: HashMap<String, Arc<[Integration]>>,
    route: Arc<Route>,
}

impl RoutingTable {
    /// Creates a table with no receivers.
    #[must_use]
    pub fn new(route: Route) -> Self {
        Self {
            stage: HashMap::new(),
            route: Arc::new(route),
        }
    }

    /// Builds the table for a whole configuration.
    ///
    /// # Errors
    ///
    /// Returns the first resolver, build or route compile error.
    pub fn from_config(config: &Config, registry: &NotifierRegistry, template: &Template) -> Result<Self> {
        let mut table = Self::new(Route::new(&config.route, None)?);
        for receiver in &config.receivers {
            let resolved = resolve_receiver(receiver, &config.global)?;
            let integrations = registry.build_receiver_integrations(&resolved, template)?;
            table.add_receiver(&receiver.name, integrations)?;
        }
        Ok(table)
    }

    /// Registers a new receiver.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the name is already registered.
    pub fn add_receiver(&mut self, name: &str, integrations: Vec<Integration>) -> Result<()> {
        if self.stage.contains_key(name) {
            return Err(AlertmanagerError::Conflict {
                name: name.to_string(),
            });
        }
        debug!(receiver = %name, integrations = integrations.len(), "adding receiver to routing stage");
        self.stage.insert(name.to_string(), integrations.into());
        Ok(())
    }

    /// Removes a receiver and all its integrations.
    ///
    /// Routes still naming the receiver are left as they are.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the name is not registered.
    pub fn delete_receiver(&mut self, name: &str) -> Result<Arc<[Integration]>> {
        debug!(receiver = %name, "removing receiver from routing stage");
        self.stage
            .remove(name)
            .ok_or_else(|| AlertmanagerError::receiver_not_found(name))
    }

    /// Swaps the integrations of an existing receiver.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the name is not registered.
    pub fn replace_receiver(&mut self, name: &str, integrations: Vec<Integration>) -> Result<()> {
        self.delete_receiver(name)?;
        self.add_receiver(name, integrations)
    }

    /// Recompiles the route tree, optionally overriding the root receiver.
    ///
    /// Returns the route configuration actually compiled.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMatcher` if a route matcher does not compile.
    pub fn rebuild_route_tree(
        &mut self,
        root: &RouteConfig,
        default_receiver: Option<&str>,
    ) -> Result<RouteConfig> {
        let mut effective = root.clone();
        if let Some(name) = default_receiver {
            effective.receiver = name.to_string();
        }
        self.route = Arc::new(Route::new(&effective, None)?);
        debug!(root_receiver = %effective.receiver, "rebuilt route tree");
        Ok(effective)
    }

    /// True if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.stage.contains_key(name)
    }

    /// Integrations of a receiver.
    #[must_use]
    pub fn integrations(&self, name: &str) -> Option<&[Integration]> {
        self.stage.get(name).map(AsRef::as_ref)
    }

    /// Registered receiver names, sorted.
    #[must_use]
    pub fn receiver_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.stage.keys().cloned().collect();
        names.sort();
        names
    }

    /// The route tree.
    #[must_use]
    pub fn route(&self) -> &Route {
        &self.route
    }
}

/// An immutable, versioned routing configuration.
#[derive(Debug, Clone)]
pub struct RoutingSnapshot {
    /// Monotonic version, starting at 1.
    pub version: u64,
    /// The configuration this snapshot was built from.
    pub config: Arc<Config>,
    /// Integrations and route tree.
    pub table: RoutingTable,
}

impl RoutingSnapshot {
    /// Builds the first snapshot from a configuration.
    ///
    /// # Errors
    ///
    /// Returns the first error building the table.
    pub fn initial(config: Config, registry: &NotifierRegistry, template: &Template) -> Result<Self> {
        let table = RoutingTable::from_config(&config, registry, template)?;
        Ok(Self {
            version: 1,
            config: Arc::new(config),
            table,
        })
    }

    /// Receiver names routes `labels` to.
    #[must_use]
    pub fn receivers_for(&self, labels: &crate::labels::LabelSet) -> Vec<String> {
        self.table.route().receivers_for(labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IntegrationKind, Receiver, WebhookConfig};
    use crate::integration::LogNotifier;
    use crate::labels::LabelSet;

    fn integration(receiver: &str) -> Integration {
        Integration::new(
            Arc::new(LogNotifier::new(IntegrationKind::Webhook, "http://x/")),
            IntegrationKind::Webhook,
            0,
            receiver,
            true,
        )
    }

    fn table() -> RoutingTable {
        RoutingTable::new(Route::new(&RouteConfig::new("default"), None).unwrap())
    }

    #[test]
    fn add_then_list_once() {
        let mut t = table();
        t.add_receiver("r1", vec![integration("r1")]).unwrap();
        assert_eq!(t.receiver_names(), vec!["r1"]);
        assert_eq!(t.integrations("r1").map(<[Integration]>::len), Some(1));
    }

    #[test]
    fn add_duplicate_conflicts() {
        let mut t = table();
        t.add_receiver("r1", vec![]).unwrap();
        let err = t.add_receiver("r1", vec![]).unwrap_err();
        assert_eq!(err.to_string(), "notification config name r1 is not unique");
        assert_eq!(err.error_type(), crate::error::ErrorType::BadData);
    }

    #[test]
    fn delete_unknown_leaves_table_unchanged() {
        let mut t = table();
        t.add_receiver("r1", vec![]).unwrap();
        let err = t.delete_receiver("nope").unwrap_err();
        assert_eq!(err.error_type(), crate::error::ErrorType::NotFound);
        assert_eq!(t.receiver_names(), vec!["r1"]);
    }

    #[test]
    fn replace_requires_existing() {
        let mut t = table();
        assert!(t.replace_receiver("r2", vec![]).is_err());
        assert!(!t.contains("r2"));

        t.add_receiver("r2", vec![]).unwrap();
        t.replace_receiver("r2", vec![integration("r2"), integration("r2")]).unwrap();
        assert_eq!(t.integrations("r2").map(<[Integration]>::len), Some(2));
    }

    #[test]
    fn rebuild_overrides_default() {
        let mut t = table();
        let effective = t
            .rebuild_route_tree(&RouteConfig::new("default"), Some("new"))
            .unwrap();
        assert_eq!(effective.receiver, "new");
        assert_eq!(t.route().receivers_for(&LabelSet::new()), vec!["new"]);

        let effective = t.rebuild_route_tree(&RouteConfig::new("default"), None).unwrap();
        assert_eq!(effective.receiver, "default");
    }

    #[test]
    fn clones_are_independent() {
        let mut t = table();
        t.add_receiver("r1", vec![]).unwrap();
        let snapshot = t.clone();
        t.delete_receiver("r1").unwrap();
        assert!(snapshot.contains("r1"));
        assert!(!t.contains("r1"));
    }

    #[test]
    fn initial_snapshot_from_config() {
        let mut receiver = Receiver::new("default");
        receiver
            .webhook_configs
            .push(WebhookConfig::new(url::Url::parse("http://hook/").unwrap()));
        let config = Config {
            route: RouteConfig::new("default"),
            receivers: vec![receiver],
            ..Config::default()
        };
        let snap = RoutingSnapshot::initial(config, &NotifierRegistry::with_defaults(), &Template::default()).unwrap();
        assert_eq!(snap.version, 1);
        assert_eq!(snap.table.receiver_names(), vec!["default"]);
        assert_eq!(snap.receivers_for(&LabelSet::new()), vec!["default"]);
    }
}
