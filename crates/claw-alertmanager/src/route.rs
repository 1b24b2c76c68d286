//! The compiled route tree.

use std::time::Duration;

use crate::config::RouteConfig;
use crate::error::Result;
use crate::labels::LabelSet;
use crate::matchers::Matcher;

/// Options a route node passes to the notification pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteOpts {
    /// Receiver to notify.
    pub receiver: String,
    /// Labels alerts are grouped by.
    pub group_by: Vec<String>,
    /// Wait before the first notification for a group.
    pub group_wait: Duration,
    /// Wait between notifications for a changed group.
    pub group_interval: Duration,
    /// Wait before re-sending an unchanged group.
    pub repeat_interval: Duration,
}

impl Default for RouteOpts {
    fn default() -> Self {
        Self {
            receiver: String::new(),
            group_by: Vec::new(),
            group_wait: Duration::from_secs(30),
            group_interval: Duration::from_secs(5 * 60),
            repeat_interval: Duration::from_secs(4 * 60 * 60),
        }
    }
}

/// A node of the route tree.
#[derive(Debug, Clone)]
pub struct Route {
    matchers: Vec<Matcher>,
    opts: RouteOpts,
    continue_matching: bool,
    routes: Vec<Self>,
}

impl Route {
    /// Compiles a route tree, inheriting unset options from `parent`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMatcher` if any node's matchers do not compile.
    pub fn new(config: &RouteConfig, parent: Option<&RouteOpts>) -> Result<Self> {
        let base = parent.cloned().unwrap_or_default();
        let opts = RouteOpts {
            receiver: if config.receiver.is_empty() {
                base.receiver
            } else {
                config.receiver.clone()
            },
            group_by: if config.group_by.is_empty() {
                base.group_by
            } else {
                config.group_by.clone()
            },
            group_wait: config
                .group_wait_secs
                .map_or(base.group_wait, Duration::from_secs),
            group_interval: config
                .group_interval_secs
                .map_or(base.group_interval, Duration::from_secs),
            repeat_interval: config
                .repeat_interval_secs
                .map_or(base.repeat_interval, Duration::from_secs),
        };

        let routes = config
            .routes
            .iter()
            .map(|child| Self::new(child, Some(&opts)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            matchers: config.matcher_set()?,
            opts,
            continue_matching: config.continue_matching,
            routes,
        })
    }

    /// The node's effective options.
    #[must_use]
    pub const fn opts(&self) -> &RouteOpts {
        &self.opts
    }

    /// The node's matchers.
    #[must_use]
    pub fn matchers(&self) -> &[Matcher] {
        &self.matchers
    }

    /// Child nodes.
    #[must_use]
    pub fn routes(&self) -> &[Self] {
        &self.routes
    }

    /// Returns the deepest matching nodes for `labels`, depth first.
    ///
    /// Sibling evaluation stops at the first matching child unless that
    /// child sets `continue`. A node whose children all miss matches itself.
    #[must_use]
    pub fn match_labels(&self, labels: &LabelSet) -> Vec<&Self> {
        if !self.matchers.iter().all(|m| m.matches_labels(labels)) {
            return Vec::new();
        }

        let mut all = Vec::new();
        for child in &self.routes {
            let matched = child.match_labels(labels);
            let hit = !matched.is_empty();
            all.extend(matched);
            if hit && !child.continue_matching {
                break;
            }
        }

        if all.is_empty() {
            all.push(self);
        }
        all
    }

    /// Receiver names `labels` are routed to, in route order.
    #[must_use]
    pub fn receivers_for(&self, labels: &LabelSet) -> Vec<String> {
        self.match_labels(labels)
            .into_iter()
            .map(|r| r.opts.receiver.clone())
            .collect()
    }
}
