//! Live notification routing and alert/silence matching for Clawbernetes.
//!
//! `claw-alertmanager` implements the core of an Alertmanager-compatible
//! v1 API: receivers can be added, edited and deleted while the delivery
//! pipeline keeps running, and alerts and silences are queried with
//! Prometheus-style label matchers.
//!
//! # Features
//!
//! - **Matchers**: `=`, `!=`, `=~`, `!~` with the Alertmanager empty-value rules
//! - **Receivers**: nine integration kinds, defaulted from global settings
//! - **Live reconfiguration**: a single-writer actor publishes immutable
//!   routing snapshots; failed changes never touch the running pipeline
//! - **Route tree**: nested routes with `continue` semantics
//! - **Queries**: alert and silence listing with deterministic ordering
//!
//! # Matching labels
//!
//! ```rust
//! use claw_alertmanager::{LabelSet, matches_filter_labels, parse_matchers};
//!
//! let matchers = parse_matchers(r#"{alertname="HighLoad",severity=~"crit.*"}"#).unwrap();
//!
//! let mut labels = LabelSet::new();
//! labels.insert("alertname".to_string(), "HighLoad".to_string());
//! labels.insert("severity".to_string(), "critical".to_string());
//!
//! assert!(matches_filter_labels(&matchers, &labels));
//! ```
//!
//! # Reconfiguring receivers
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use claw_alertmanager::{
//!     Config, Coordinator, MemAlerts, MemMarker, MemSilences, NotifierRegistry,
//!     PipelineDispatcher, Receiver, Template,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> claw_alertmanager::Result<()> {
//! let config = Config::from_file("alertmanager.yml")?;
//! let dispatcher = Arc::new(PipelineDispatcher::new(
//!     Arc::new(MemAlerts::new()),
//!     Arc::new(MemSilences::new()),
//!     Arc::new(MemMarker::new()),
//!     Duration::from_secs(1),
//! ));
//!
//! let (handle, _task) = Coordinator::spawn(
//!     config,
//!     NotifierRegistry::with_defaults(),
//!     Template::default(),
//!     dispatcher,
//!     CancellationToken::new(),
//! )?;
//!
//! handle.add_receiver(Receiver::new("oncall")).await?;
//! assert!(handle.snapshot().table.contains("oncall"));
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod alerts;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod integration;
pub mod labels;
pub mod matchers;
pub mod metrics;
pub mod pipeline;
pub mod route;
pub mod routing;
pub mod silences;
pub mod status;
pub mod types;

// Re-export main types at crate root
pub use alerts::{
    AlertFilter, AlertProvider, AlertStatusSource, MemAlerts, MemMarker, insert_alerts,
    list_alerts,
};
pub use config::{Config, GlobalConfig, IntegrationKind, Receiver, RouteConfig, Secret};
pub use dispatch::{DEFAULT_RETENTION, PipelineDispatcher};
pub use error::{AlertmanagerError, ErrorType, MultiError, Result};
pub use integration::{Integration, Notifier, NotifierFactory, NotifierRegistry, Template};
pub use labels::{Fingerprint, LabelSet};
pub use matchers::{MatchType, Matcher, matches_filter_labels, parse_matchers};
pub use metrics::AlertMetrics;
pub use pipeline::{Coordinator, Dispatcher, PipelineState, ReconfigHandle};
pub use route::{Route, RouteOpts};
pub use routing::{RoutingSnapshot, RoutingTable};
pub use silences::{
    MemSilences, SilenceStore, create_silence, expire_silence, get_silence, list_silences,
    silenced_by,
};
pub use status::{ClusterPeer, ClusterStatus, StatusSnapshot};
pub use types::{
    Alert, AlertState, AlertStatus, AlertView, PostableAlert, Silence, SilenceState,
};
