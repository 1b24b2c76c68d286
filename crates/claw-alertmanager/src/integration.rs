//! Notification integrations and the factory registry that builds them.
//!
//! A [`Notifier`] delivers alerts over one transport. The
//! [`NotifierRegistry`] maps each [`IntegrationKind`] to a
//! [`NotifierFactory`]; [`NotifierRegistry::build_receiver_integrations`]
//! turns a resolved [`Receiver`] into tagged [`Integration`]s, all or nothing.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::{IntegrationConfig, IntegrationKind, Receiver};
use crate::error::{AlertmanagerError, MultiError, Result};
use crate::types::Alert;

/// Delivers alerts over one transport.
#[async_trait]
pub trait Notifier: Send + Sync + fmt::Debug {
    /// Sends a batch of alerts.
    ///
    /// # Errors
    ///
    /// Returns an error if delivery failed.
    async fn notify(&self, alerts: &[Alert]) -> Result<()>;
}

/// Template-engine handle passed to factories.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Template {
    /// Public URL of this Alertmanager, used for links in notifications.
    pub external_url: Option<Url>,
}

impl Template {
    /// Creates a template handle with an external URL.
    #[must_use]
    pub const fn new(external_url: Option<Url>) -> Self {
        Self { external_url }
    }
}

/// Builds notifiers for one integration kind.
pub trait NotifierFactory: Send + Sync + fmt::Debug {
    /// Builds a notifier from a resolved config.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is unusable for this transport.
    fn build(&self, config: &dyn IntegrationConfig, template: &Template) -> Result<Arc<dyn Notifier>>;
}

/// A ready-to-use notifier bound to a receiver.
#[derive(Debug, Clone)]
pub struct Integration {
    notifier: Arc<dyn Notifier>,
    kind: IntegrationKind,
    index: usize,
    receiver: String,
    send_resolved: bool,
}

impl Integration {
    /// Tags a notifier with its receiver, kind and index within that kind.
    #[must_use]
    pub fn new(
        notifier: Arc<dyn Notifier>,
        kind: IntegrationKind,
        index: usize,
        receiver: impl Into<String>,
        send_resolved: bool,
    ) -> Self {
        Self {
            notifier,
            kind,
            index,
            receiver: receiver.into(),
            send_resolved,
        }
    }

    /// The integration kind name, e.g. `webhook`.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    /// The integration kind.
    #[must_use]
    pub const fn kind(&self) -> IntegrationKind {
        self.kind
    }

    /// Zero-based index among the receiver's integrations of the same kind.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// The owning receiver.
    #[must_use]
    pub fn receiver(&self) -> &str {
        &self.receiver
    }

    /// Whether resolved alerts are delivered.
    #[must_use]
    pub const fn send_resolved(&self) -> bool {
        self.send_resolved
    }

    /// Delivers alerts through the underlying notifier.
    ///
    /// # Errors
    ///
    /// Returns the notifier's error.
    pub async fn notify(&self, alerts: &[Alert]) -> Result<()> {
        self.notifier.notify(alerts).await
    }
}

impl fmt::Display for Integration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}[{}]", self.receiver, self.kind, self.index)
    }
}

/// Maps integration kinds to their factories.
#[derive(Debug, Clone, Default)]
pub struct NotifierRegistry {
    factories: HashMap<IntegrationKind, Arc<dyn NotifierFactory>>,
}

impl NotifierRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with [`LogNotifierFactory`] for every kind.
    #[must_use]
    pub fn with_defaults() -> Self {
        let factory: Arc<dyn NotifierFactory> = Arc::new(LogNotifierFactory);
        let mut registry = Self::new();
        for kind in IntegrationKind::ALL {
            registry.register(kind, Arc::clone(&factory));
        }
        registry
    }

    /// Registers or replaces the factory for `kind`.
    pub fn register(&mut self, kind: IntegrationKind, factory: Arc<dyn NotifierFactory>) {
        self.factories.insert(kind, factory);
    }

    /// Returns the factory for `kind`.
    #[must_use]
    pub fn get(&self, kind: IntegrationKind) -> Option<&Arc<dyn NotifierFactory>> {
        self.factories.get(&kind)
    }

    /// Builds every integration of a resolved receiver.
    ///
    /// Construction continues past failures so that all of them are
    /// reported; if any failed, nothing is returned.
    ///
    /// # Errors
    ///
    /// Returns `IntegrationBuild` carrying every per-integration failure.
    pub fn build_receiver_integrations(
        &self,
        receiver: &Receiver,
        template: &Template,
    ) -> Result<Vec<Integration>> {
        let mut errors = MultiError::new();
        let mut integrations = Vec::new();
        let mut indexes: HashMap<IntegrationKind, usize> = HashMap::new();

        for config in receiver.configs() {
            let kind = config.kind();
            let slot = indexes.entry(kind).or_insert(0);
            let index = *slot;
            *slot += 1;

            let built = self
                .get(kind)
                .ok_or_else(|| AlertmanagerError::Internal {
                    reason: format!("no notifier registered for {kind} integration"),
                })
                .and_then(|factory| factory.build(config, template));

            match built {
                Ok(notifier) => integrations.push(Integration::new(
                    notifier,
                    kind,
                    index,
                    &receiver.name,
                    config.send_resolved(),
                )),
                Err(err) => {
                    warn!(receiver = %receiver.name, integration = %kind, index, error = %err, "failed to build integration");
                    errors.add(err);
                }
            }
        }

        if !errors.is_empty() {
            return Err(AlertmanagerError::IntegrationBuild {
                receiver: receiver.name.clone(),
                errors,
            });
        }

        debug!(receiver = %receiver.name, count = integrations.len(), "built receiver integrations");
        Ok(integrations)
    }
}

/// Factory for [`LogNotifier`]s, usable for every kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifierFactory;

impl NotifierFactory for LogNotifierFactory {
    fn build(&self, config: &dyn IntegrationConfig, template: &Template) -> Result<Arc<dyn Notifier>> {
        config.validate()?;
        Ok(Arc::new(LogNotifier {
            kind: config.kind(),
            target: config.target(),
            external_url: template.external_url.clone(),
        }))
    }
}

/// A notifier that reports deliveries through `tracing`.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    kind: IntegrationKind,
    target: String,
    external_url: Option<Url>,
}

impl LogNotifier {
    /// Creates a log notifier for `kind` and `target`.
    #[must_use]
    pub fn new(kind: IntegrationKind, target: impl Into<String>) -> Self {
        Self {
            kind,
            target: target.into(),
            external_url: None,
        }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, alerts: &[Alert]) -> Result<()> {
        let now = Utc::now();
        let source = self.external_url.as_ref().map(Url::as_str).unwrap_or_default();
        for alert in alerts {
            if alert.resolved_at(now) {
                info!(
                    integration = %self.kind,
                    target = %self.target,
                    fingerprint = %alert.fingerprint(),
                    source,
                    "RESOLVED"
                );
            } else {
                error!(
                    integration = %self.kind,
                    target = %self.target,
                    fingerprint = %alert.fingerprint(),
                    labels = ?alert.labels,
                    source,
                    "ALERT"
                );
            }
        }
        Ok(())
    }
}
