//! A minimal ungrouped delivery loop.
//!
//! On every tick the dispatcher walks the stored alerts, marks silenced
//! ones, routes the rest through the installed snapshot and hands each
//! alert update to every matching integration exactly once. Alerts that
//! stay resolved past the retention window are dropped along with their
//! status and delivery records.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::alerts::{AlertProvider, MemMarker};
use crate::labels::Fingerprint;
use crate::pipeline::Dispatcher;
use crate::routing::RoutingSnapshot;
use crate::silences::{SilenceStore, silenced_by};
use crate::types::Alert;

/// How long resolved alerts are kept before garbage collection.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(120 * 60 * 60);

/// Last delivered version of an alert, per integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Delivered {
    updated_at: DateTime<Utc>,
    resolved: bool,
}

/// Delivers stored alerts to the integrations of the installed snapshot.
#[derive(Debug)]
pub struct PipelineDispatcher {
    alerts: Arc<dyn AlertProvider>,
    silences: Arc<dyn SilenceStore>,
    marker: Arc<MemMarker>,
    interval: Duration,
    retention: chrono::Duration,
    snapshot: RwLock<Option<Arc<RoutingSnapshot>>>,
    token: Mutex<CancellationToken>,
    delivered: Mutex<HashMap<(Fingerprint, String), Delivered>>,
}

impl PipelineDispatcher {
    /// Creates a dispatcher polling storage every `interval`.
    #[must_use]
    pub fn new(
        alerts: Arc<dyn AlertProvider>,
        silences: Arc<dyn SilenceStore>,
        marker: Arc<MemMarker>,
        interval: Duration,
    ) -> Self {
        Self {
            alerts,
            silences,
            marker,
            interval,
            retention: retention_window(DEFAULT_RETENTION),
            snapshot: RwLock::new(None),
            token: Mutex::new(CancellationToken::new()),
            delivered: Mutex::new(HashMap::new()),
        }
    }

    /// Sets how long resolved alerts are retained.
    #[must_use]
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention_window(retention);
        self
    }

    /// Version of the installed snapshot, if any.
    #[must_use]
    pub fn installed_version(&self) -> Option<u64> {
        self.snapshot.read().as_ref().map(|s| s.version)
    }

    /// Runs one delivery pass at `now`; returns the number of sends started.
    pub async fn dispatch_once(&self, now: DateTime<Utc>) -> usize {
        let installed = self.snapshot.read().clone();
        let Some(snapshot) = installed else {
            return 0;
        };

        let mut started = 0;
        let mut pending = self.alerts.pending();
        while let Some(item) = pending.next().await {
            let alert = match item {
                Ok(alert) => alert,
                Err(err) => {
                    warn!(error = %err, "failed to read pending alert");
                    break;
                }
            };
            started += self.dispatch_alert(&snapshot, alert, now);
        }
        started
    }

    /// Forgets alerts resolved longer than the retention window before `now`;
    /// returns how many were dropped.
    pub fn collect_garbage(&self, now: DateTime<Utc>) -> usize {
        let removed = self.alerts.gc(now, self.retention);
        if removed.is_empty() {
            return 0;
        }
        for fingerprint in &removed {
            self.marker.delete(*fingerprint);
        }
        let gone: HashSet<Fingerprint> = removed.iter().copied().collect();
        self.delivered
            .lock()
            .retain(|(fingerprint, _), _| !gone.contains(fingerprint));
        debug!(alerts = removed.len(), "collected resolved alerts");
        removed.len()
    }

    fn dispatch_alert(&self, snapshot: &RoutingSnapshot, alert: Alert, now: DateTime<Utc>) -> usize {
        let fingerprint = alert.fingerprint();
        let resolved = alert.resolved_at(now);

        match silenced_by(self.silences.as_ref(), &alert.labels, now) {
            Ok(ids) if !ids.is_empty() => {
                debug!(fingerprint = %fingerprint, silences = ?ids, "alert silenced");
                self.marker.set_silenced(fingerprint, ids);
                return 0;
            }
            Ok(_) => self.marker.set_silenced(fingerprint, Vec::new()),
            Err(err) => warn!(fingerprint = %fingerprint, error = %err, "failed to evaluate silences"),
        }

        let current = Delivered {
            updated_at: alert.updated_at,
            resolved,
        };
        let alert = Arc::new(alert);
        let mut started = 0;

        for receiver in snapshot.receivers_for(&alert.labels) {
            let Some(integrations) = snapshot.table.integrations(&receiver) else {
                debug!(receiver = %receiver, "route names an unknown receiver");
                continue;
            };
            for integration in integrations {
                if resolved && !integration.send_resolved() {
                    continue;
                }
                let key = (fingerprint, integration.to_string());
                {
                    let mut delivered = self.delivered.lock();
                    if delivered.get(&key) == Some(&current) {
                        continue;
                    }
                    delivered.insert(key, current);
                }

                let integration = integration.clone();
                let alert = Arc::clone(&alert);
                tokio::spawn(async move {
                    if let Err(err) = integration.notify(std::slice::from_ref(alert.as_ref())).await {
                        warn!(integration = %integration, error = %err, "notification failed");
                    }
                });
                started += 1;
            }
        }
        started
    }
}

fn retention_window(retention: Duration) -> chrono::Duration {
    chrono::Duration::from_std(retention).unwrap_or(chrono::Duration::MAX)
}

#[async_trait]
impl Dispatcher for PipelineDispatcher {
    async fn stop(&self) {
        self.token.lock().cancel();
    }

    fn install(&self, snapshot: Arc<RoutingSnapshot>) {
        debug!(version = snapshot.version, "installing routing snapshot");
        let live: HashSet<String> = snapshot
            .table
            .receiver_names()
            .iter()
            .filter_map(|name| snapshot.table.integrations(name))
            .flatten()
            .map(ToString::to_string)
            .collect();
        self.delivered
            .lock()
            .retain(|(_, integration), _| live.contains(integration));
        *self.snapshot.write() = Some(snapshot);
        *self.token.lock() = CancellationToken::new();
    }

    async fn run(&self) {
        let token = self.token.lock().clone();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(version = ?self.installed_version(), "dispatch loop running");

        loop {
            tokio::select! {
                biased;
                () = token.cancelled() => break,
                _ = ticker.tick() => {
                    let now = Utc::now();
                    self.collect_garbage(now);
                    let started = self.dispatch_once(now).await;
                    if started > 0 {
                        debug!(notifications = started, "dispatched alerts");
                    }
                }
            }
        }
        debug!("dispatch loop exited");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{AlertStatusSource, MemAlerts};
    use crate::config::{Config, IntegrationKind, Receiver, RouteConfig, WebhookConfig};
    use crate::error::Result;
    use crate::integration::{Integration, Notifier};
    use crate::labels::LabelSet;
    use crate::matchers::Matcher;
    use crate::routing::RoutingTable;
    use crate::route::Route;
    use crate::silences::{MemSilences, create_silence};
    use crate::types::{AlertState, PostableAlert, Silence};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct CountingNotifier {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Notifier for CountingNotifier {
        async fn notify(&self, _alerts: &[Alert]) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Fixture {
        alerts: Arc<MemAlerts>,
        silences: Arc<MemSilences>,
        marker: Arc<MemMarker>,
        dispatcher: PipelineDispatcher,
    }

    fn fixture(notifier: &Arc<CountingNotifier>, send_resolved: bool) -> Fixture {
        let mut table = RoutingTable::new(Route::new(&RouteConfig::new("team"), None).unwrap());
        let notifier: Arc<dyn Notifier> = Arc::clone(notifier) as Arc<dyn Notifier>;
        table
            .add_receiver(
                "team",
                vec![Integration::new(notifier, IntegrationKind::Webhook, 0, "team", send_resolved)],
            )
            .unwrap();
        let mut receiver = Receiver::new("team");
        receiver
            .webhook_configs
            .push(WebhookConfig::new(url::Url::parse("http://hook/").unwrap()));
        let snapshot = RoutingSnapshot {
            version: 1,
            config: Arc::new(Config {
                route: RouteConfig::new("team"),
                receivers: vec![receiver],
                ..Config::default()
            }),
            table,
        };

        let alerts = Arc::new(MemAlerts::new());
        let silences = Arc::new(MemSilences::new());
        let marker = Arc::new(MemMarker::new());
        let dispatcher = PipelineDispatcher::new(
            Arc::clone(&alerts) as Arc<dyn AlertProvider>,
            Arc::clone(&silences) as Arc<dyn SilenceStore>,
            Arc::clone(&marker),
            Duration::from_millis(10),
        );
        dispatcher.install(Arc::new(snapshot));
        Fixture {
            alerts,
            silences,
            marker,
            dispatcher,
        }
    }

    fn alert(now: DateTime<Utc>, minutes: i64) -> Alert {
        let mut labels = LabelSet::new();
        labels.insert("alertname".into(), "HighLoad".into());
        let mut postable = PostableAlert::new(labels);
        postable.starts_at = Some(now - chrono::Duration::minutes(1));
        postable.ends_at = Some(now + chrono::Duration::minutes(minutes));
        postable.into_alert(now, chrono::Duration::minutes(5))
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn delivers_each_update_once() {
        let notifier = Arc::new(CountingNotifier::default());
        let f = fixture(&notifier, true);
        let now = Utc::now();
        f.alerts.put(vec![alert(now, 10)]).await.unwrap();

        assert_eq!(f.dispatcher.dispatch_once(now).await, 1);
        assert_eq!(f.dispatcher.dispatch_once(now).await, 0);
        settle().await;
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);

        let fp = alert(now, 10).fingerprint();
        assert_eq!(f.marker.status(fp).state, AlertState::Active);
    }

    #[tokio::test]
    async fn resolution_is_a_new_update() {
        let notifier = Arc::new(CountingNotifier::default());
        let f = fixture(&notifier, true);
        let now = Utc::now();
        f.alerts.put(vec![alert(now, 10)]).await.unwrap();
        assert_eq!(f.dispatcher.dispatch_once(now).await, 1);

        let later = now + chrono::Duration::minutes(20);
        assert_eq!(f.dispatcher.dispatch_once(later).await, 1);
        assert_eq!(f.dispatcher.dispatch_once(later).await, 0);
    }

    #[tokio::test]
    async fn resolved_skipped_without_send_resolved() {
        let notifier = Arc::new(CountingNotifier::default());
        let f = fixture(&notifier, false);
        let now = Utc::now();
        f.alerts.put(vec![alert(now, 10)]).await.unwrap();

        let later = now + chrono::Duration::minutes(20);
        assert_eq!(f.dispatcher.dispatch_once(later).await, 0);
    }

    #[tokio::test]
    async fn silenced_alerts_are_marked_not_sent() {
        let notifier = Arc::new(CountingNotifier::default());
        let f = fixture(&notifier, true);
        let now = Utc::now();
        f.alerts.put(vec![alert(now, 10)]).await.unwrap();

        let silence = Silence {
            id: String::new(),
            matchers: vec![Matcher::equal("alertname", "HighLoad")],
            starts_at: now - chrono::Duration::minutes(1),
            ends_at: now + chrono::Duration::hours(1),
            updated_at: now,
            created_by: "ops".into(),
            comment: "maintenance".into(),
            status: None,
        };
        let id = create_silence(f.silences.as_ref(), &silence, now).unwrap();

        assert_eq!(f.dispatcher.dispatch_once(now).await, 0);
        let status = f.marker.status(alert(now, 10).fingerprint());
        assert_eq!(status.state, AlertState::Suppressed);
        assert_eq!(status.silenced_by, vec![id]);
    }

    #[tokio::test]
    async fn resolved_alert_is_collected_after_retention() {
        let notifier = Arc::new(CountingNotifier::default());
        let f = fixture(&notifier, true);
        let now = Utc::now();
        let fp = alert(now, 10).fingerprint();
        f.alerts.put(vec![alert(now, 10)]).await.unwrap();
        assert_eq!(f.dispatcher.dispatch_once(now).await, 1);

        let resolved = now + chrono::Duration::minutes(20);
        assert_eq!(f.dispatcher.dispatch_once(resolved).await, 1);
        assert_eq!(f.dispatcher.collect_garbage(resolved), 0);
        assert_eq!(f.alerts.len(), 1);

        let expired = now + chrono::Duration::hours(121);
        assert_eq!(f.dispatcher.collect_garbage(expired), 1);
        assert!(f.alerts.is_empty());
        assert_eq!(f.marker.status(fp).state, AlertState::Unprocessed);
        assert!(f.dispatcher.delivered.lock().is_empty());
    }

    #[tokio::test]
    async fn custom_retention_is_honored() {
        let notifier = Arc::new(CountingNotifier::default());
        let mut f = fixture(&notifier, true);
        f.dispatcher = f.dispatcher.with_retention(Duration::from_secs(60));
        let now = Utc::now();
        f.alerts.put(vec![alert(now, 10)]).await.unwrap();

        assert_eq!(f.dispatcher.collect_garbage(now + chrono::Duration::minutes(10)), 0);
        assert_eq!(f.dispatcher.collect_garbage(now + chrono::Duration::minutes(12)), 1);
    }

    #[tokio::test]
    async fn install_forgets_deliveries_to_removed_receivers() {
        let notifier = Arc::new(CountingNotifier::default());
        let f = fixture(&notifier, true);
        let now = Utc::now();
        f.alerts.put(vec![alert(now, 10)]).await.unwrap();
        assert_eq!(f.dispatcher.dispatch_once(now).await, 1);
        let original = f.dispatcher.snapshot.read().clone().unwrap();

        // Re-installing the same receivers keeps delivery state.
        f.dispatcher.install(Arc::clone(&original));
        assert_eq!(f.dispatcher.dispatch_once(now).await, 0);

        let empty = RoutingSnapshot {
            version: 2,
            config: Arc::new(Config {
                route: RouteConfig::new("team"),
                ..Config::default()
            }),
            table: RoutingTable::new(Route::new(&RouteConfig::new("team"), None).unwrap()),
        };
        f.dispatcher.install(Arc::new(empty));
        assert!(f.dispatcher.delivered.lock().is_empty());

        f.dispatcher.install(original);
        assert_eq!(f.dispatcher.dispatch_once(now).await, 1);
    }

    #[tokio::test]
    async fn nothing_installed_sends_nothing() {
        let dispatcher = PipelineDispatcher::new(
            Arc::new(MemAlerts::new()),
            Arc::new(MemSilences::new()),
            Arc::new(MemMarker::new()),
            Duration::from_millis(10),
        );
        assert_eq!(dispatcher.installed_version(), None);
        assert_eq!(dispatcher.dispatch_once(Utc::now()).await, 0);
    }

    #[tokio::test]
    async fn run_exits_on_stop() {
        let notifier = Arc::new(CountingNotifier::default());
        let f = Arc::new(fixture(&notifier, true));
        f.alerts.put(vec![alert(Utc::now(), 10)]).await.unwrap();

        let runner = Arc::clone(&f);
        let task = tokio::spawn(async move { runner.dispatcher.run().await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        f.dispatcher.stop().await;
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);
    }
}
