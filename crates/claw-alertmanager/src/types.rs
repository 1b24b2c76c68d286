//! Core types shared by the query engines and the HTTP surface.
//!
//! - [`PostableAlert`]: an alert as submitted by a client
//! - [`Alert`]: an alert as held by the alert provider
//! - [`AlertStatus`]: the marker view of an alert (silenced, inhibited)
//! - [`AlertView`]: the query projection of an alert
//! - [`Silence`] and [`SilenceState`]: suppression rules and their lifecycle

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AlertmanagerError, Result};
use crate::labels::{Fingerprint, LabelSet, validate_label_names};
use crate::matchers::Matcher;

/// Unix timestamp of `0001-01-01T00:00:00Z`, which some clients send for "unset".
const ZERO_TIME_UNIX: i64 = -62_135_596_800;

fn non_zero(ts: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    ts.filter(|t| t.timestamp() != ZERO_TIME_UNIX)
}

/// An alert as submitted to the ingest endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostableAlert {
    /// Identifying labels.
    #[serde(default)]
    pub labels: LabelSet,
    /// Informational annotations.
    #[serde(default)]
    pub annotations: LabelSet,
    /// When the alert started firing, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<DateTime<Utc>>,
    /// When the alert resolves, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<DateTime<Utc>>,
    /// Link back to the alert's source.
    #[serde(default, rename = "generatorURL")]
    pub generator_url: String,
}

impl PostableAlert {
    /// Creates an alert with the given labels and no timestamps.
    #[must_use]
    pub fn new(labels: LabelSet) -> Self {
        Self {
            labels,
            ..Self::default()
        }
    }

    /// Fills in missing timestamps and produces the stored form.
    ///
    /// A missing start defaults to the end time if one was given and to
    /// `now` otherwise. A missing end defaults to `now + resolve_timeout`
    /// and marks the alert as timing out.
    #[must_use]
    pub fn into_alert(self, now: DateTime<Utc>, resolve_timeout: Duration) -> Alert {
        let ends_at = non_zero(self.ends_at);
        let starts_at = non_zero(self.starts_at).unwrap_or_else(|| ends_at.unwrap_or(now));
        let (ends_at, timeout) = match ends_at {
            Some(t) => (t, false),
            None => (now + resolve_timeout, true),
        };

        Alert {
            labels: self.labels,
            annotations: self.annotations,
            starts_at,
            ends_at,
            updated_at: now,
            generator_url: self.generator_url,
            timeout,
        }
    }
}

/// An alert as stored by the alert provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// Identifying labels.
    pub labels: LabelSet,
    /// Informational annotations.
    pub annotations: LabelSet,
    /// When the alert started firing.
    pub starts_at: DateTime<Utc>,
    /// When the alert resolves.
    pub ends_at: DateTime<Utc>,
    /// When the alert was last ingested.
    pub updated_at: DateTime<Utc>,
    /// Link back to the alert's source.
    #[serde(rename = "generatorURL")]
    pub generator_url: String,
    /// True if `ends_at` was assigned from the resolve timeout.
    pub timeout: bool,
}

impl Alert {
    /// The identity of this alert.
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(&self.labels)
    }

    /// True if the alert has resolved at `now`.
    #[must_use]
    pub fn resolved_at(&self, now: DateTime<Utc>) -> bool {
        self.ends_at <= now
    }

    /// Checks the alert is well formed.
    ///
    /// # Errors
    ///
    /// Returns `BadData` if the label set is empty, a label or annotation name
    /// is invalid, or the alert ends before it starts.
    pub fn validate(&self) -> Result<()> {
        if self.ends_at < self.starts_at {
            return Err(AlertmanagerError::bad_data("start time must be before end time"));
        }
        if self.labels.is_empty() {
            return Err(AlertmanagerError::bad_data("at least one label pair required"));
        }
        validate_label_names(&self.labels)?;
        validate_label_names(&self.annotations)
    }
}

/// Processing state of an alert as seen by the marker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertState {
    /// Not yet seen by the dispatch pipeline.
    #[default]
    Unprocessed,
    /// Being notified on.
    Active,
    /// Silenced or inhibited.
    Suppressed,
}

impl AlertState {
    /// Returns the state as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unprocessed => "unprocessed",
            Self::Active => "active",
            Self::Suppressed => "suppressed",
        }
    }
}

impl fmt::Display for AlertState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Marker status of an alert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertStatus {
    /// Processing state.
    pub state: AlertState,
    /// IDs of silences muting the alert.
    pub silenced_by: Vec<String>,
    /// Fingerprints of alerts inhibiting this one.
    pub inhibited_by: Vec<String>,
}

/// Read-only projection of an alert returned by queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertView {
    /// Identifying labels.
    pub labels: LabelSet,
    /// Informational annotations.
    pub annotations: LabelSet,
    /// When the alert started firing.
    pub starts_at: DateTime<Utc>,
    /// When the alert resolves.
    pub ends_at: DateTime<Utc>,
    /// Link back to the alert's source.
    #[serde(rename = "generatorURL")]
    pub generator_url: String,
    /// Marker status.
    pub status: AlertStatus,
    /// Receivers the route tree sends this alert to, in route order.
    pub receivers: Vec<String>,
    /// Hex fingerprint of the label set.
    pub fingerprint: String,
}

impl AlertView {
    /// Projects a stored alert.
    #[must_use]
    pub fn new(alert: &Alert, status: AlertStatus, receivers: Vec<String>) -> Self {
        Self {
            labels: alert.labels.clone(),
            annotations: alert.annotations.clone(),
            starts_at: alert.starts_at,
            ends_at: alert.ends_at,
            generator_url: alert.generator_url.clone(),
            status,
            receivers,
            fingerprint: alert.fingerprint().to_string(),
        }
    }
}

/// Lifecycle state of a silence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SilenceState {
    /// Ended.
    Expired,
    /// Currently muting alerts.
    Active,
    /// Starts in the future.
    Pending,
}

impl SilenceState {
    /// Classifies a silence window at `now`.
    ///
    /// The start is inclusive and the end exclusive.
    #[must_use]
    pub fn at(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if now < starts_at {
            Self::Pending
        } else if now < ends_at {
            Self::Active
        } else {
            Self::Expired
        }
    }

    /// Returns the state as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Expired => "expired",
            Self::Active => "active",
            Self::Pending => "pending",
        }
    }
}

impl fmt::Display for SilenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived status block of a silence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SilenceStatus {
    /// Lifecycle state at the time the silence was read.
    pub state: SilenceState,
}

/// A time-bounded suppression rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Silence {
    /// Identifier; empty for a silence not yet stored.
    #[serde(default)]
    pub id: String,
    /// Alerts matching every matcher are muted.
    pub matchers: Vec<Matcher>,
    /// Start of the window.
    pub starts_at: DateTime<Utc>,
    /// End of the window.
    pub ends_at: DateTime<Utc>,
    /// When the silence was last written.
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    /// Author.
    #[serde(default)]
    pub created_by: String,
    /// Reason.
    #[serde(default)]
    pub comment: String,
    /// Derived lifecycle state. Ignored on input.
    #[serde(default, skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub status: Option<SilenceStatus>,
}

impl Silence {
    /// Lifecycle state at `now`.
    #[must_use]
    pub fn state_at(&self, now: DateTime<Utc>) -> SilenceState {
        SilenceState::at(self.starts_at, self.ends_at, now)
    }

    /// Returns the silence with its status block filled in for `now`.
    #[must_use]
    pub fn with_status(mut self, now: DateTime<Utc>) -> Self {
        self.status = Some(SilenceStatus {
            state: self.state_at(now),
        });
        self
    }

    /// True if every matcher holds for the labels.
    #[must_use]
    pub fn mutes(&self, labels: &LabelSet) -> bool {
        !self.matchers.is_empty() && self.matchers.iter().all(|m| m.matches_labels(labels))
    }

    /// The silence's matchers viewed as a label set (name to value).
    #[must_use]
    pub fn matcher_labels(&self) -> LabelSet {
        self.matchers
            .iter()
            .map(|m| (m.name().to_string(), m.value().to_string()))
            .collect()
    }
}
