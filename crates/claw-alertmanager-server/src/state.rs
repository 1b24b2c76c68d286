//! Shared state for the API handlers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use claw_alertmanager::{
    AlertMetrics, AlertProvider, AlertStatusSource, ClusterPeer, ReconfigHandle, SilenceStore,
};

/// Shared state for the alertmanager API.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Reconfiguration actor and published routing snapshots.
    reconfig: ReconfigHandle,
    /// Alert storage.
    alerts: Arc<dyn AlertProvider>,
    /// Alert silenced/inhibited status.
    marker: Arc<dyn AlertStatusSource>,
    /// Silence storage.
    silences: Arc<dyn SilenceStore>,
    /// Ingestion counters.
    metrics: AlertMetrics,
    /// Cluster membership, if clustered.
    peer: Option<Arc<dyn ClusterPeer>>,
    /// Process start time.
    started_at: DateTime<Utc>,
}

impl AppState {
    /// Create a new API state.
    #[must_use]
    pub fn new(
        reconfig: ReconfigHandle,
        alerts: Arc<dyn AlertProvider>,
        marker: Arc<dyn AlertStatusSource>,
        silences: Arc<dyn SilenceStore>,
        metrics: AlertMetrics,
    ) -> Self {
        Self {
            reconfig,
            alerts,
            marker,
            silences,
            metrics,
            peer: None,
            started_at: Utc::now(),
        }
    }

    /// Attach a cluster peer for the status endpoint.
    #[must_use]
    pub fn with_peer(mut self, peer: Arc<dyn ClusterPeer>) -> Self {
        self.peer = Some(peer);
        self
    }

    /// The reconfiguration handle.
    #[must_use]
    pub const fn reconfig(&self) -> &ReconfigHandle {
        &self.reconfig
    }

    /// Alert storage.
    #[must_use]
    pub fn alerts(&self) -> &dyn AlertProvider {
        self.alerts.as_ref()
    }

    /// Alert status source.
    #[must_use]
    pub fn marker(&self) -> &dyn AlertStatusSource {
        self.marker.as_ref()
    }

    /// Silence storage.
    #[must_use]
    pub fn silences(&self) -> &dyn SilenceStore {
        self.silences.as_ref()
    }

    /// Ingestion counters.
    #[must_use]
    pub const fn metrics(&self) -> &AlertMetrics {
        &self.metrics
    }

    /// Cluster peer, if any.
    #[must_use]
    pub fn peer(&self) -> Option<&dyn ClusterPeer> {
        self.peer.as_deref()
    }

    /// Process start time.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}
