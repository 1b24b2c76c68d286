//! Alert ingestion and the alert query engine.
//!
//! Storage and status tracking are collaborators behind [`AlertProvider`] and
//! [`AlertStatusSource`]; [`MemAlerts`] and [`MemMarker`] are the in-process
//! implementations.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use parking_lot::RwLock;
use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{AlertmanagerError, MultiError, Result};
use crate::labels::{Fingerprint, remove_empty_labels};
use crate::matchers::{Matcher, matches_filter_labels};
use crate::metrics::AlertMetrics;
use crate::route::Route;
use crate::types::{Alert, AlertState, AlertStatus, AlertView, PostableAlert};

/// Stores alerts.
#[async_trait]
pub trait AlertProvider: Send + Sync + fmt::Debug {
    /// Inserts or updates alerts by fingerprint.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the alerts could not be written.
    async fn put(&self, alerts: Vec<Alert>) -> Result<()>;

    /// Streams every stored alert.
    fn pending(&self) -> BoxStream<'static, Result<Alert>>;

    /// Drops alerts that resolved at or before `now - retention` and
    /// returns their fingerprints.
    fn gc(&self, now: DateTime<Utc>, retention: Duration) -> Vec<Fingerprint>;
}

/// Reports the silenced/inhibited status of alerts.
pub trait AlertStatusSource: Send + Sync + fmt::Debug {
    /// Status of the alert with this fingerprint; unprocessed if unknown.
    fn status(&self, fingerprint: Fingerprint) -> AlertStatus;
}

/// In-memory alert store.
#[derive(Debug, Default)]
pub struct MemAlerts {
    alerts: RwLock<HashMap<Fingerprint, Alert>>,
}

impl MemAlerts {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up an alert by fingerprint.
    #[must_use]
    pub fn get(&self, fingerprint: Fingerprint) -> Option<Alert> {
        self.alerts.read().get(&fingerprint).cloned()
    }

    /// Number of stored alerts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.alerts.read().len()
    }

    /// True if no alerts are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.alerts.read().is_empty()
    }
}

#[async_trait]
impl AlertProvider for MemAlerts {
    async fn put(&self, alerts: Vec<Alert>) -> Result<()> {
        let mut stored = self.alerts.write();
        for mut alert in alerts {
            let fingerprint = alert.fingerprint();
            if let Some(existing) = stored.get(&fingerprint) {
                // An overlapping update keeps the original start time.
                if existing.ends_at >= alert.starts_at && existing.starts_at < alert.starts_at {
                    alert.starts_at = existing.starts_at;
                }
            }
            stored.insert(fingerprint, alert);
        }
        Ok(())
    }

    fn pending(&self) -> BoxStream<'static, Result<Alert>> {
        let snapshot: Vec<Alert> = self.alerts.read().values().cloned().collect();
        stream::iter(snapshot.into_iter().map(Ok)).boxed()
    }

    fn gc(&self, now: DateTime<Utc>, retention: Duration) -> Vec<Fingerprint> {
        let Some(cutoff) = now.checked_sub_signed(retention) else {
            return Vec::new();
        };
        let mut removed = Vec::new();
        self.alerts.write().retain(|fingerprint, alert| {
            let keep = alert.ends_at > cutoff;
            if !keep {
                removed.push(*fingerprint);
            }
            keep
        });
        removed
    }
}

/// In-memory alert status marker.
#[derive(Debug, Default)]
pub struct MemMarker {
    statuses: RwLock<HashMap<Fingerprint, AlertStatus>>,
}

impl MemMarker {
    /// Creates an empty marker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the silences muting an alert. An empty list un-silences it.
    pub fn set_silenced(&self, fingerprint: Fingerprint, silence_ids: Vec<String>) {
        let mut statuses = self.statuses.write();
        let status = statuses.entry(fingerprint).or_default();
        status.silenced_by = silence_ids;
        status.state = Self::derive_state(status);
    }

    /// Records the alerts inhibiting an alert. An empty list un-inhibits it.
    pub fn set_inhibited(&self, fingerprint: Fingerprint, inhibitors: Vec<String>) {
        let mut statuses = self.statuses.write();
        let status = statuses.entry(fingerprint).or_default();
        status.inhibited_by = inhibitors;
        status.state = Self::derive_state(status);
    }

    /// Marks an alert active, clearing any suppression.
    pub fn set_active(&self, fingerprint: Fingerprint) {
        self.statuses.write().insert(
            fingerprint,
            AlertStatus {
                state: AlertState::Active,
                ..AlertStatus::default()
            },
        );
    }

    /// Forgets an alert.
    pub fn delete(&self, fingerprint: Fingerprint) {
        self.statuses.write().remove(&fingerprint);
    }

    fn derive_state(status: &AlertStatus) -> AlertState {
        if status.silenced_by.is_empty() && status.inhibited_by.is_empty() {
            AlertState::Active
        } else {
            AlertState::Suppressed
        }
    }
}

impl AlertStatusSource for MemMarker {
    fn status(&self, fingerprint: Fingerprint) -> AlertStatus {
        self.statuses
            .read()
            .get(&fingerprint)
            .cloned()
            .unwrap_or_default()
    }
}

/// Which alerts a query returns.
#[derive(Debug, Clone)]
pub struct AlertFilter {
    /// Label matchers every alert must satisfy.
    pub matchers: Vec<Matcher>,
    /// Anchored pattern at least one routed receiver must match.
    pub receiver: Option<Regex>,
    /// Include active alerts.
    pub show_active: bool,
    /// Include silenced alerts.
    pub show_silenced: bool,
    /// Include inhibited alerts.
    pub show_inhibited: bool,
    /// Include unprocessed alerts.
    pub show_unprocessed: bool,
}

impl Default for AlertFilter {
    fn default() -> Self {
        Self {
            matchers: Vec::new(),
            receiver: None,
            show_active: true,
            show_silenced: true,
            show_inhibited: true,
            show_unprocessed: true,
        }
    }
}

impl AlertFilter {
    /// Sets the label matchers.
    #[must_use]
    pub fn with_matchers(mut self, matchers: Vec<Matcher>) -> Self {
        self.matchers = matchers;
        self
    }

    /// Restricts results to alerts routed to a receiver matching `pattern` in full.
    ///
    /// # Errors
    ///
    /// Returns `BadData` if the pattern does not compile.
    pub fn with_receiver_pattern(mut self, pattern: &str) -> Result<Self> {
        let anchored = format!("^(?:{pattern})$");
        let re = Regex::new(&anchored).map_err(|e| {
            AlertmanagerError::bad_data(format!("failed to parse receiver param: {e}"))
        })?;
        self.receiver = Some(re);
        Ok(self)
    }

    fn admits_receivers(&self, receivers: &[String]) -> bool {
        self.receiver
            .as_ref()
            .is_none_or(|re| receivers.iter().any(|r| re.is_match(r)))
    }

    fn admits_status(&self, status: &AlertStatus) -> bool {
        if !self.show_active && status.state == AlertState::Active {
            return false;
        }
        if !self.show_unprocessed && status.state == AlertState::Unprocessed {
            return false;
        }
        if !self.show_silenced && !status.silenced_by.is_empty() {
            return false;
        }
        if !self.show_inhibited && !status.inhibited_by.is_empty() {
            return false;
        }
        true
    }
}

/// Lists unresolved alerts matching `filter`, sorted by fingerprint.
///
/// # Errors
///
/// Returns `Cancelled` if `cancel` fires before the stream is drained, or
/// the first error yielded by the provider.
pub async fn list_alerts(
    provider: &dyn AlertProvider,
    marker: &dyn AlertStatusSource,
    route: &Route,
    filter: &AlertFilter,
    cancel: &CancellationToken,
    now: DateTime<Utc>,
) -> Result<Vec<AlertView>> {
    let mut pending = provider.pending();
    let mut views = Vec::new();

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(AlertmanagerError::Cancelled),
            next = pending.next() => next,
        };
        let Some(item) = next else { break };
        let alert = item?;

        if alert.ends_at < now {
            continue;
        }

        let receivers = route.receivers_for(&alert.labels);
        if !filter.admits_receivers(&receivers) {
            continue;
        }
        if !matches_filter_labels(&filter.matchers, &alert.labels) {
            continue;
        }

        let status = marker.status(alert.fingerprint());
        if !filter.admits_status(&status) {
            continue;
        }

        views.push(AlertView::new(&alert, status, receivers));
    }

    views.sort_by(|a, b| a.fingerprint.cmp(&b.fingerprint));
    Ok(views)
}

/// Ingests a batch of alerts.
///
/// Missing timestamps are defaulted, empty labels dropped, and every valid
/// alert is stored even if others in the batch are invalid. Returns the
/// number of alerts stored.
///
/// # Errors
///
/// Returns `Storage` if the provider fails, otherwise `InvalidAlerts` with
/// every validation failure once the valid alerts have been stored.
pub async fn insert_alerts(
    provider: &dyn AlertProvider,
    metrics: &AlertMetrics,
    alerts: Vec<PostableAlert>,
    resolve_timeout: Duration,
    now: DateTime<Utc>,
) -> Result<usize> {
    let mut valid = Vec::with_capacity(alerts.len());
    let mut errors = MultiError::new();

    for posted in alerts {
        let mut alert = posted.into_alert(now, resolve_timeout);
        if alert.ends_at > now {
            metrics.inc_firing();
        } else {
            metrics.inc_resolved();
        }

        remove_empty_labels(&mut alert.labels);
        match alert.validate() {
            Ok(()) => valid.push(alert),
            Err(err) => {
                metrics.inc_invalid();
                errors.add(err);
            }
        }
    }

    let stored = valid.len();
    provider.put(valid).await?;
    debug!(stored, "inserted alerts");

    if !errors.is_empty() {
        warn!(invalid = errors.len(), error = %errors, "dropped invalid alerts");
        return Err(AlertmanagerError::InvalidAlerts(errors));
    }
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouteConfig;
    use crate::labels::LabelSet;
    use crate::matchers::parse_matchers;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn labels(pairs: &[(&str, &str)]) -> LabelSet {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn route() -> Route {
        let mut cfg = RouteConfig::new("default");
        cfg.routes.push(RouteConfig {
            receiver: "db-team".into(),
            matchers: vec![r#"service="db""#.into()],
            ..RouteConfig::default()
        });
        Route::new(&cfg, None).unwrap()
    }

    async fn seed(store: &MemAlerts, now: DateTime<Utc>, sets: &[&[(&str, &str)]]) {
        let posted = sets.iter().map(|s| PostableAlert::new(labels(s))).collect();
        insert_alerts(store, &AlertMetrics::new(), posted, Duration::minutes(5), now)
            .await
            .unwrap();
    }

    mod insert_tests {
        use super::*;

        #[tokio::test]
        async fn defaults_timestamps() {
            let store = MemAlerts::new();
            let now = ts(10_000);
            seed(&store, now, &[&[("alertname", "X")]]).await;

            let fp = Fingerprint::of(&labels(&[("alertname", "X")]));
            let stored = store.get(fp).unwrap();
            assert_eq!(stored.starts_at, now);
            assert_eq!(stored.ends_at, now + Duration::minutes(5));
            assert!(stored.timeout);
        }

        #[tokio::test]
        async fn best_effort_batch() {
            let store = MemAlerts::new();
            let metrics = AlertMetrics::new();
            let batch = vec![
                PostableAlert::new(labels(&[("alertname", "ok")])),
                PostableAlert::new(labels(&[("bad-name", "x")])),
                PostableAlert::new(labels(&[("empty", "")])),
            ];

            let err = insert_alerts(&store, &metrics, batch, Duration::minutes(5), ts(10_000))
                .await
                .unwrap_err();
            match err {
                AlertmanagerError::InvalidAlerts(errs) => assert_eq!(errs.len(), 2),
                other => panic!("unexpected error: {other}"),
            }
            assert_eq!(store.len(), 1);
            assert_eq!(metrics.invalid_count(), 2);
            assert_eq!(metrics.firing_count(), 3);
        }

        #[tokio::test]
        async fn empty_labels_are_removed_before_storing() {
            let store = MemAlerts::new();
            seed(&store, ts(10_000), &[&[("alertname", "X"), ("team", "")]]).await;
            let fp = Fingerprint::of(&labels(&[("alertname", "X")]));
            assert!(store.get(fp).is_some());
        }

        #[tokio::test]
        async fn resolved_alerts_are_counted() {
            let store = MemAlerts::new();
            let metrics = AlertMetrics::new();
            let mut p = PostableAlert::new(labels(&[("alertname", "X")]));
            p.starts_at = Some(ts(1_000));
            p.ends_at = Some(ts(2_000));
            insert_alerts(&store, &metrics, vec![p], Duration::minutes(5), ts(10_000))
                .await
                .unwrap();
            assert_eq!(metrics.resolved_count(), 1);
            assert_eq!(metrics.firing_count(), 0);
        }

        #[tokio::test]
        async fn reingest_keeps_start_and_advances_update() {
            let store = MemAlerts::new();
            seed(&store, ts(10_000), &[&[("alertname", "X")]]).await;
            seed(&store, ts(10_060), &[&[("alertname", "X")]]).await;

            let stored = store.get(Fingerprint::of(&labels(&[("alertname", "X")]))).unwrap();
            assert_eq!(stored.starts_at, ts(10_000));
            assert_eq!(stored.updated_at, ts(10_060));
            assert_eq!(store.len(), 1);
        }

        #[tokio::test]
        async fn gc_drops_only_alerts_resolved_past_retention() {
            let store = MemAlerts::new();
            let mut old = PostableAlert::new(labels(&[("alertname", "Old")]));
            old.starts_at = Some(ts(1_000));
            old.ends_at = Some(ts(2_000));
            let mut recent = PostableAlert::new(labels(&[("alertname", "Recent")]));
            recent.starts_at = Some(ts(1_000));
            recent.ends_at = Some(ts(9_000));
            let firing = PostableAlert::new(labels(&[("alertname", "Firing")]));
            insert_alerts(
                &store,
                &AlertMetrics::new(),
                vec![old, recent, firing],
                Duration::minutes(5),
                ts(10_000),
            )
            .await
            .unwrap();

            let removed = store.gc(ts(10_000), Duration::hours(1));
            assert_eq!(removed, vec![Fingerprint::of(&labels(&[("alertname", "Old")]))]);
            assert_eq!(store.len(), 2);
            assert!(store.gc(ts(10_000), Duration::hours(1)).is_empty());
            assert!(store.gc(ts(10_000), Duration::MAX).is_empty());
        }
    }

    mod list_tests {
        use super::*;

        #[tokio::test]
        async fn sorted_by_fingerprint() {
            let store = MemAlerts::new();
            let now = ts(10_000);
            seed(
                &store,
                now,
                &[&[("alertname", "a")], &[("alertname", "b")], &[("alertname", "c")]],
            )
            .await;

            let views = list_alerts(
                &store,
                &MemMarker::new(),
                &route(),
                &AlertFilter::default(),
                &CancellationToken::new(),
                now,
            )
            .await
            .unwrap();

            assert_eq!(views.len(), 3);
            let fps: Vec<_> = views.iter().map(|v| v.fingerprint.clone()).collect();
            let mut sorted = fps.clone();
            sorted.sort();
            assert_eq!(fps, sorted);
        }

        #[tokio::test]
        async fn skips_resolved() {
            let store = MemAlerts::new();
            seed(&store, ts(10_000), &[&[("alertname", "X")]]).await;
            let views = list_alerts(
                &store,
                &MemMarker::new(),
                &route(),
                &AlertFilter::default(),
                &CancellationToken::new(),
                ts(10_000) + Duration::minutes(6),
            )
            .await
            .unwrap();
            assert!(views.is_empty());
        }

        #[tokio::test]
        async fn receivers_and_receiver_filter() {
            let store = MemAlerts::new();
            let now = ts(10_000);
            seed(
                &store,
                now,
                &[&[("alertname", "A"), ("service", "db")], &[("alertname", "B")]],
            )
            .await;

            let filter = AlertFilter::default().with_receiver_pattern("db-.*").unwrap();
            let views = list_alerts(&store, &MemMarker::new(), &route(), &filter, &CancellationToken::new(), now)
                .await
                .unwrap();
            assert_eq!(views.len(), 1);
            assert_eq!(views[0].receivers, vec!["db-team"]);

            // anchored: a partial match is not enough
            let filter = AlertFilter::default().with_receiver_pattern("db").unwrap();
            let views = list_alerts(&store, &MemMarker::new(), &route(), &filter, &CancellationToken::new(), now)
                .await
                .unwrap();
            assert!(views.is_empty());
        }

        #[test]
        fn invalid_receiver_pattern() {
            let err = AlertFilter::default().with_receiver_pattern("(").unwrap_err();
            assert_eq!(err.error_type(), crate::error::ErrorType::BadData);
        }

        #[tokio::test]
        async fn label_matchers() {
            let store = MemAlerts::new();
            let now = ts(10_000);
            seed(
                &store,
                now,
                &[&[("alertname", "A"), ("team", "x")], &[("alertname", "B")]],
            )
            .await;

            let filter = AlertFilter::default().with_matchers(parse_matchers(r#"{team=""}"#).unwrap());
            let views = list_alerts(&store, &MemMarker::new(), &route(), &filter, &CancellationToken::new(), now)
                .await
                .unwrap();
            assert_eq!(views.len(), 1);
            assert_eq!(views[0].labels.get("alertname").map(String::as_str), Some("B"));
        }

        #[tokio::test]
        async fn status_toggles() {
            let store = MemAlerts::new();
            let now = ts(10_000);
            seed(
                &store,
                now,
                &[
                    &[("alertname", "active")],
                    &[("alertname", "silenced")],
                    &[("alertname", "inhibited")],
                    &[("alertname", "unprocessed")],
                ],
            )
            .await;

            let fp = |name: &str| Fingerprint::of(&labels(&[("alertname", name)]));
            let marker = MemMarker::new();
            marker.set_active(fp("active"));
            marker.set_silenced(fp("silenced"), vec!["s1".into()]);
            marker.set_inhibited(fp("inhibited"), vec!["i1".into()]);

            let names = |views: Vec<AlertView>| -> Vec<String> {
                let mut n: Vec<_> = views
                    .into_iter()
                    .map(|v| v.labels["alertname"].clone())
                    .collect();
                n.sort();
                n
            };

            let run = |filter: AlertFilter| {
                let store = &store;
                let marker = &marker;
                async move {
                    list_alerts(store, marker, &route(), &filter, &CancellationToken::new(), now)
                        .await
                        .unwrap()
                }
            };

            let no_active = AlertFilter {
                show_active: false,
                ..AlertFilter::default()
            };
            assert_eq!(
                names(run(no_active).await),
                vec!["inhibited", "silenced", "unprocessed"]
            );

            let no_silenced = AlertFilter {
                show_silenced: false,
                ..AlertFilter::default()
            };
            assert_eq!(
                names(run(no_silenced).await),
                vec!["active", "inhibited", "unprocessed"]
            );

            let no_inhibited = AlertFilter {
                show_inhibited: false,
                ..AlertFilter::default()
            };
            assert_eq!(
                names(run(no_inhibited).await),
                vec!["active", "silenced", "unprocessed"]
            );

            let no_unprocessed = AlertFilter {
                show_unprocessed: false,
                ..AlertFilter::default()
            };
            assert_eq!(
                names(run(no_unprocessed).await),
                vec!["active", "inhibited", "silenced"]
            );
        }

        #[derive(Debug)]
        struct StalledProvider;

        #[async_trait]
        impl AlertProvider for StalledProvider {
            async fn put(&self, _: Vec<Alert>) -> Result<()> {
                Ok(())
            }

            fn pending(&self) -> BoxStream<'static, Result<Alert>> {
                stream::pending().boxed()
            }

            fn gc(&self, _: DateTime<Utc>, _: Duration) -> Vec<Fingerprint> {
                Vec::new()
            }
        }

        #[tokio::test]
        async fn cancellation_aborts_stream() {
            let cancel = CancellationToken::new();
            let trigger = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                trigger.cancel();
            });

            let err = list_alerts(
                &StalledProvider,
                &MemMarker::new(),
                &route(),
                &AlertFilter::default(),
                &cancel,
                ts(10_000),
            )
            .await
            .unwrap_err();
            assert!(matches!(err, AlertmanagerError::Cancelled));
        }

        #[derive(Debug)]
        struct FailingProvider;

        #[async_trait]
        impl AlertProvider for FailingProvider {
            async fn put(&self, _: Vec<Alert>) -> Result<()> {
                Err(AlertmanagerError::Storage {
                    reason: "disk full".into(),
                })
            }

            fn pending(&self) -> BoxStream<'static, Result<Alert>> {
                stream::iter(vec![Err(AlertmanagerError::Storage {
                    reason: "iterator broken".into(),
                })])
                .boxed()
            }

            fn gc(&self, _: DateTime<Utc>, _: Duration) -> Vec<Fingerprint> {
                Vec::new()
            }
        }

        #[tokio::test]
        async fn storage_errors_propagate() {
            let err = list_alerts(
                &FailingProvider,
                &MemMarker::new(),
                &route(),
                &AlertFilter::default(),
                &CancellationToken::new(),
                ts(10_000),
            )
            .await
            .unwrap_err();
            assert!(err.to_string().contains("iterator broken"));

            let err = insert_alerts(
                &FailingProvider,
                &AlertMetrics::new(),
                vec![PostableAlert::new(labels(&[("alertname", "X")]))],
                Duration::minutes(5),
                ts(10_000),
            )
            .await
            .unwrap_err();
            assert_eq!(err.error_type(), crate::error::ErrorType::Internal);
        }
    }

    mod marker_tests {
        use super::*;

        #[test]
        fn unknown_is_unprocessed() {
            let m = MemMarker::new();
            assert_eq!(m.status(Fingerprint::of(&LabelSet::new())).state, AlertState::Unprocessed);
        }

        #[test]
        fn silence_then_unsilence() {
            let m = MemMarker::new();
            let fp = Fingerprint::of(&labels(&[("a", "b")]));
            m.set_silenced(fp, vec!["s".into()]);
            assert_eq!(m.status(fp).state, AlertState::Suppressed);
            m.set_silenced(fp, Vec::new());
            assert_eq!(m.status(fp).state, AlertState::Active);
            m.delete(fp);
            assert_eq!(m.status(fp).state, AlertState::Unprocessed);
        }
    }
}
