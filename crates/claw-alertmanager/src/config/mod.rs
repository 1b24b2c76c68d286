//! Alertmanager configuration.
//!
//! The configuration is loaded from YAML and consists of:
//! - [`GlobalConfig`]: defaults shared by every integration
//! - [`RouteConfig`]: the static route tree
//! - [`Receiver`]: named bundles of per-kind integration configs
//!
//! [`resolve_receiver`] merges a receiver with the global defaults before its
//! integrations are built.

mod global;
mod receiver;
mod resolve;
mod route;

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use url::Url;

use crate::error::{AlertmanagerError, Result};

pub use global::{GlobalConfig, HttpClientConfig};
pub use receiver::{
    EmailConfig, IntegrationConfig, OpsGenieConfig, PagerdutyConfig, PushoverConfig, Receiver,
    SlackConfig, SnsConfig, VictorOpsConfig, WebhookConfig, WechatConfig,
};
pub use resolve::resolve_receiver;
pub use route::RouteConfig;

const SECRET_PLACEHOLDER: &str = "<secret>";

/// A credential that is never written back out.
///
/// Deserializes from a plain string and serializes as `"<secret>"`.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wraps a credential.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// True if no credential is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The raw credential.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(SECRET_PLACEHOLDER)
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(SECRET_PLACEHOLDER)
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self)
    }
}

/// A URL carrying a credential in its path or query, such as a Slack webhook.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretUrl(Url);

impl SecretUrl {
    /// Wraps a URL.
    #[must_use]
    pub const fn new(url: Url) -> Self {
        Self(url)
    }

    /// The raw URL.
    #[must_use]
    pub const fn expose(&self) -> &Url {
        &self.0
    }
}

impl fmt::Debug for SecretUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(SECRET_PLACEHOLDER)
    }
}

impl Serialize for SecretUrl {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(SECRET_PLACEHOLDER)
    }
}

impl<'de> Deserialize<'de> for SecretUrl {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Url::deserialize(deserializer).map(Self)
    }
}

/// The notification integration kinds a receiver can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationKind {
    /// Generic HTTP webhook.
    Webhook,
    /// SMTP email.
    Email,
    /// PagerDuty events API.
    Pagerduty,
    /// OpsGenie alerts API.
    Opsgenie,
    /// WeChat work messages.
    Wechat,
    /// Slack incoming webhook.
    Slack,
    /// VictorOps REST endpoint.
    Victorops,
    /// Pushover push notifications.
    Pushover,
    /// AWS SNS.
    Sns,
}

impl IntegrationKind {
    /// Every kind, in the order integrations are built.
    pub const ALL: [Self; 9] = [
        Self::Webhook,
        Self::Email,
        Self::Pagerduty,
        Self::Opsgenie,
        Self::Wechat,
        Self::Slack,
        Self::Victorops,
        Self::Pushover,
        Self::Sns,
    ];

    /// Returns the kind as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Webhook => "webhook",
            Self::Email => "email",
            Self::Pagerduty => "pagerduty",
            Self::Opsgenie => "opsgenie",
            Self::Wechat => "wechat",
            Self::Slack => "slack",
            Self::Victorops => "victorops",
            Self::Pushover => "pushover",
            Self::Sns => "sns",
        }
    }
}

impl fmt::Display for IntegrationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The full Alertmanager configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Defaults shared by all integrations.
    #[serde(default)]
    pub global: GlobalConfig,
    /// Root of the route tree.
    pub route: RouteConfig,
    /// Configured receivers.
    #[serde(default)]
    pub receivers: Vec<Receiver>,
    /// Notification template files.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub templates: Vec<String>,
}

impl Config {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            AlertmanagerError::Config(format!(
                "failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid or the configuration is inconsistent.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| AlertmanagerError::Config(format!("invalid YAML: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if receiver names are empty or duplicated, the root
    /// route has no receiver, a route references an undefined receiver, or a
    /// route matcher does not parse.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for receiver in &self.receivers {
            if receiver.name.is_empty() {
                return Err(AlertmanagerError::Config(
                    "receiver name cannot be empty".to_string(),
                ));
            }
            if !names.insert(receiver.name.as_str()) {
                return Err(AlertmanagerError::Config(format!(
                    "notification config name {:?} is not unique",
                    receiver.name
                )));
            }
        }

        if self.route.receiver.is_empty() {
            return Err(AlertmanagerError::Config(
                "root route must specify a default receiver".to_string(),
            ));
        }

        for name in self.route.receiver_names() {
            if !names.contains(name) {
                return Err(AlertmanagerError::Config(format!(
                    "undefined receiver {name:?} used in route"
                )));
            }
        }

        self.route.validate()
    }

    /// Looks up a receiver by name.
    #[must_use]
    pub fn receiver(&self, name: &str) -> Option<&Receiver> {
        self.receivers.iter().find(|r| r.name == name)
    }

    /// Names of all receivers in configuration order.
    #[must_use]
    pub fn receiver_names(&self) -> Vec<String> {
        self.receivers.iter().map(|r| r.name.clone()).collect()
    }

    /// Renders the configuration as YAML with secrets masked.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if rendering fails.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}
