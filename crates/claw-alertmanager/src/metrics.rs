//! Prometheus metrics for alert ingestion.

use std::sync::Arc;

use parking_lot::RwLock;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

const API_VERSION: &str = "v1";

/// Labels of the received-alerts counter.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ReceivedLabels {
    /// API version the alert arrived through.
    pub version: String,
    /// `firing` or `resolved`.
    pub status: String,
}

/// Labels of the invalid-alerts counter.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct VersionLabels {
    /// API version the alert arrived through.
    pub version: String,
}

/// Counters updated by alert ingestion, plus the registry that renders them.
#[derive(Clone)]
pub struct AlertMetrics {
    registry: Arc<RwLock<Registry>>,
    received: Family<ReceivedLabels, Counter>,
    invalid: Family<VersionLabels, Counter>,
}

impl std::fmt::Debug for AlertMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertMetrics")
            .field("firing", &self.firing_count())
            .field("resolved", &self.resolved_count())
            .field("invalid", &self.invalid_count())
            .finish_non_exhaustive()
    }
}

impl Default for AlertMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertMetrics {
    /// Creates the counters and registers them.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let received = Family::<ReceivedLabels, Counter>::default();
        registry.register(
            "alertmanager_alerts_received",
            "The total number of received alerts",
            received.clone(),
        );

        let invalid = Family::<VersionLabels, Counter>::default();
        registry.register(
            "alertmanager_alerts_invalid",
            "The total number of received alerts that were invalid",
            invalid.clone(),
        );

        Self {
            registry: Arc::new(RwLock::new(registry)),
            received,
            invalid,
        }
    }

    fn received_labels(status: &str) -> ReceivedLabels {
        ReceivedLabels {
            version: API_VERSION.to_string(),
            status: status.to_string(),
        }
    }

    fn version_labels() -> VersionLabels {
        VersionLabels {
            version: API_VERSION.to_string(),
        }
    }

    /// Counts a received alert that is still firing.
    pub fn inc_firing(&self) {
        self.received.get_or_create(&Self::received_labels("firing")).inc();
    }

    /// Counts a received alert that has already resolved.
    pub fn inc_resolved(&self) {
        self.received.get_or_create(&Self::received_labels("resolved")).inc();
    }

    /// Counts a received alert that failed validation.
    pub fn inc_invalid(&self) {
        self.invalid.get_or_create(&Self::version_labels()).inc();
    }

    /// Firing alerts received so far.
    #[must_use]
    pub fn firing_count(&self) -> u64 {
        self.received.get_or_create(&Self::received_labels("firing")).get()
    }

    /// Resolved alerts received so far.
    #[must_use]
    pub fn resolved_count(&self) -> u64 {
        self.received.get_or_create(&Self::received_labels("resolved")).get()
    }

    /// Invalid alerts received so far.
    #[must_use]
    pub fn invalid_count(&self) -> u64 {
        self.invalid.get_or_create(&Self::version_labels()).get()
    }

    /// Encodes all metrics in Prometheus text format.
    #[must_use]
    pub fn encode(&self) -> String {
        let registry = self.registry.read();
        let mut buffer = String::new();
        if encode(&mut buffer, &registry).is_err() {
            tracing::error!("failed to encode prometheus metrics");
            return String::new();
        }
        buffer
    }

    /// Returns the Content-Type header value for Prometheus metrics.
    #[must_use]
    pub const fn content_type() -> &'static str {
        "text/plain; version=0.0.4; charset=utf-8"
    }
}
