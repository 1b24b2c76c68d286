//! Process status reported by the status endpoint.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Config;
use crate::error::Result;

/// A cluster member as seen by this instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeerStatus {
    /// Peer name.
    pub name: String,
    /// Peer address.
    pub address: String,
}

/// Membership view of a clustered instance.
pub trait ClusterPeer: Send + Sync + fmt::Debug {
    /// This instance's name in the cluster.
    fn name(&self) -> String;
    /// Readiness, e.g. `ready` or `settling`.
    fn status(&self) -> String;
    /// Known peers.
    fn peers(&self) -> Vec<PeerStatus>;
}

/// Cluster section of the status response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterStatus {
    /// This instance's name in the cluster.
    pub name: String,
    /// Readiness.
    pub status: String,
    /// Known peers.
    pub peers: Vec<PeerStatus>,
}

impl ClusterStatus {
    /// Snapshots a peer; `None` when not clustered.
    #[must_use]
    pub fn of(peer: Option<&dyn ClusterPeer>) -> Option<Self> {
        peer.map(|p| Self {
            name: p.name(),
            status: p.status(),
            peers: p.peers(),
        })
    }
}

/// Build metadata.
#[must_use]
pub fn version_info() -> BTreeMap<String, String> {
    let unknown = "unknown";
    BTreeMap::from([
        ("version".to_string(), env!("CARGO_PKG_VERSION").to_string()),
        (
            "revision".to_string(),
            option_env!("GIT_REVISION").unwrap_or(unknown).to_string(),
        ),
        (
            "branch".to_string(),
            option_env!("GIT_BRANCH").unwrap_or(unknown).to_string(),
        ),
        (
            "buildUser".to_string(),
            option_env!("BUILD_USER").unwrap_or(unknown).to_string(),
        ),
        (
            "buildDate".to_string(),
            option_env!("BUILD_DATE").unwrap_or(unknown).to_string(),
        ),
        (
            "rustVersion".to_string(),
            option_env!("CARGO_PKG_RUST_VERSION").unwrap_or(unknown).to_string(),
        ),
    ])
}

/// Body of the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    /// Configuration rendered as YAML, secrets masked.
    #[serde(rename = "configYAML")]
    pub config_yaml: String,
    /// Configuration as structured JSON, secrets masked.
    #[serde(rename = "configJSON")]
    pub config_json: Config,
    /// Build metadata.
    #[serde(rename = "versionInfo")]
    pub version_info: BTreeMap<String, String>,
    /// When the process started.
    pub uptime: DateTime<Utc>,
    /// Cluster view, `null` when not clustered.
    #[serde(rename = "clusterStatus")]
    pub cluster_status: Option<ClusterStatus>,
}

impl StatusSnapshot {
    /// Captures the current status.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the config cannot be rendered.
    pub fn capture(config: &Config, uptime: DateTime<Utc>, peer: Option<&dyn ClusterPeer>) -> Result<Self> {
        Ok(Self {
            config_yaml: config.to_yaml()?,
            config_json: config.clone(),
            version_info: version_info(),
            uptime,
            cluster_status: ClusterStatus::of(peer),
        })
    }
}
