//! Receivers and their per-kind integration configs.
//!
//! Each kind implements [`IntegrationConfig`], which carries the kind's
//! defaulting rule so that receivers can be resolved by iterating their
//! configs uniformly.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use super::{GlobalConfig, HttpClientConfig, IntegrationKind, Secret, SecretUrl};
use crate::error::{AlertmanagerError, Result};

/// Behaviour shared by every integration config.
pub trait IntegrationConfig: fmt::Debug + Send + Sync {
    /// The integration kind.
    fn kind(&self) -> IntegrationKind;

    /// Whether resolved alerts are notified.
    fn send_resolved(&self) -> bool;

    /// Fills unset fields from the global defaults.
    ///
    /// Every field is visited even after a failure; the first failure is returned.
    fn apply_defaults(&mut self, global: &GlobalConfig) -> Result<()>;

    /// Checks fields that have no global default.
    fn validate(&self) -> Result<()>;

    /// Human-readable destination, used in logs.
    fn target(&self) -> String;

    /// Downcasting hook for kind-specific notifier factories.
    fn as_any(&self) -> &dyn Any;
}

/// A named bundle of integration configs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Receiver {
    /// Unique receiver name.
    pub name: String,
    /// Webhook integrations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub webhook_configs: Vec<WebhookConfig>,
    /// Email integrations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub email_configs: Vec<EmailConfig>,
    /// PagerDuty integrations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pagerduty_configs: Vec<PagerdutyConfig>,
    /// OpsGenie integrations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub opsgenie_configs: Vec<OpsGenieConfig>,
    /// WeChat integrations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub wechat_configs: Vec<WechatConfig>,
    /// Slack integrations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub slack_configs: Vec<SlackConfig>,
    /// VictorOps integrations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub victorops_configs: Vec<VictorOpsConfig>,
    /// Pushover integrations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pushover_configs: Vec<PushoverConfig>,
    /// SNS integrations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sns_configs: Vec<SnsConfig>,
}

impl Receiver {
    /// Creates a receiver with no integrations.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Every integration config, grouped by kind in [`IntegrationKind::ALL`] order.
    #[must_use]
    pub fn configs(&self) -> Vec<&dyn IntegrationConfig> {
        let mut out: Vec<&dyn IntegrationConfig> = Vec::new();
        out.extend(self.webhook_configs.iter().map(|c| c as &dyn IntegrationConfig));
        out.extend(self.email_configs.iter().map(|c| c as &dyn IntegrationConfig));
        out.extend(self.pagerduty_configs.iter().map(|c| c as &dyn IntegrationConfig));
        out.extend(self.opsgenie_configs.iter().map(|c| c as &dyn IntegrationConfig));
        out.extend(self.wechat_configs.iter().map(|c| c as &dyn IntegrationConfig));
        out.extend(self.slack_configs.iter().map(|c| c as &dyn IntegrationConfig));
        out.extend(self.victorops_configs.iter().map(|c| c as &dyn IntegrationConfig));
        out.extend(self.pushover_configs.iter().map(|c| c as &dyn IntegrationConfig));
        out.extend(self.sns_configs.iter().map(|c| c as &dyn IntegrationConfig));
        out
    }

    /// Mutable view of every integration config, in the same order as [`Self::configs`].
    pub fn configs_mut(&mut self) -> Vec<&mut dyn IntegrationConfig> {
        let mut out: Vec<&mut dyn IntegrationConfig> = Vec::new();
        out.extend(self.webhook_configs.iter_mut().map(|c| c as &mut dyn IntegrationConfig));
        out.extend(self.email_configs.iter_mut().map(|c| c as &mut dyn IntegrationConfig));
        out.extend(self.pagerduty_configs.iter_mut().map(|c| c as &mut dyn IntegrationConfig));
        out.extend(self.opsgenie_configs.iter_mut().map(|c| c as &mut dyn IntegrationConfig));
        out.extend(self.wechat_configs.iter_mut().map(|c| c as &mut dyn IntegrationConfig));
        out.extend(self.slack_configs.iter_mut().map(|c| c as &mut dyn IntegrationConfig));
        out.extend(self.victorops_configs.iter_mut().map(|c| c as &mut dyn IntegrationConfig));
        out.extend(self.pushover_configs.iter_mut().map(|c| c as &mut dyn IntegrationConfig));
        out.extend(self.sns_configs.iter_mut().map(|c| c as &mut dyn IntegrationConfig));
        out
    }

    /// Total number of integration configs.
    #[must_use]
    pub fn integration_count(&self) -> usize {
        self.configs().len()
    }
}

const fn default_true() -> bool {
    true
}

fn missing(kind: IntegrationKind, field: &'static str) -> AlertmanagerError {
    AlertmanagerError::MissingConfig { kind, field }
}

fn invalid(kind: IntegrationKind, reason: &str) -> AlertmanagerError {
    AlertmanagerError::bad_data(format!("invalid {kind} config: {reason}"))
}

fn ensure_trailing_slash(url: &mut Url) {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
}

fn default_http(slot: &mut Option<HttpClientConfig>, global: &GlobalConfig) {
    if slot.is_none() {
        *slot = Some(global.http_config.clone());
    }
}

/// Keeps the first error seen while defaulting continues.
#[derive(Default)]
struct FirstError(Option<AlertmanagerError>);

impl FirstError {
    fn record(&mut self, err: AlertmanagerError) {
        self.0.get_or_insert(err);
    }

    fn finish(self) -> Result<()> {
        self.0.map_or(Ok(()), Err)
    }
}

/// Generic HTTP webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Notify resolved alerts.
    #[serde(default = "default_true")]
    pub send_resolved: bool,
    /// HTTP client options.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_config: Option<HttpClientConfig>,
    /// Endpoint receiving the payload.
    pub url: Url,
    /// Maximum alerts per payload, 0 for unlimited.
    #[serde(default)]
    pub max_alerts: u64,
}

impl WebhookConfig {
    /// Creates a webhook config for `url`.
    #[must_use]
    pub const fn new(url: Url) -> Self {
        Self {
            send_resolved: true,
            http_config: None,
            url,
            max_alerts: 0,
        }
    }
}

impl IntegrationConfig for WebhookConfig {
    fn kind(&self) -> IntegrationKind {
        IntegrationKind::Webhook
    }

    fn send_resolved(&self) -> bool {
        self.send_resolved
    }

    fn apply_defaults(&mut self, global: &GlobalConfig) -> Result<()> {
        default_http(&mut self.http_config, global);
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        match self.url.scheme() {
            "http" | "https" => Ok(()),
            other => Err(invalid(self.kind(), &format!("unsupported scheme {other:?}"))),
        }
    }

    fn target(&self) -> String {
        self.url.to_string()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// SMTP email.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    /// Notify resolved alerts.
    pub send_resolved: bool,
    /// Recipient addresses.
    pub to: String,
    /// Sender address.
    pub from: String,
    /// HELO hostname.
    pub hello: String,
    /// `host:port` of the SMTP server.
    pub smarthost: String,
    /// Auth username.
    pub auth_username: String,
    /// Auth password.
    pub auth_password: Secret,
    /// CRAM-MD5 secret.
    pub auth_secret: Secret,
    /// Auth identity.
    pub auth_identity: String,
    /// Require STARTTLS; unset means the global default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_tls: Option<bool>,
    /// Extra headers.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl IntegrationConfig for EmailConfig {
    fn kind(&self) -> IntegrationKind {
        IntegrationKind::Email
    }

    fn send_resolved(&self) -> bool {
        self.send_resolved
    }

    fn apply_defaults(&mut self, global: &GlobalConfig) -> Result<()> {
        let mut first = FirstError::default();
        if self.smarthost.is_empty() {
            if global.smtp_smarthost.is_empty() {
                first.record(missing(self.kind(), "SMTP smarthost"));
            }
            self.smarthost.clone_from(&global.smtp_smarthost);
        }
        if self.from.is_empty() {
            if global.smtp_from.is_empty() {
                first.record(missing(self.kind(), "SMTP from"));
            }
            self.from.clone_from(&global.smtp_from);
        }
        if self.hello.is_empty() {
            self.hello.clone_from(&global.smtp_hello);
        }
        if self.auth_username.is_empty() {
            self.auth_username.clone_from(&global.smtp_auth_username);
        }
        if self.auth_password.is_empty() {
            self.auth_password = global.smtp_auth_password.clone();
        }
        if self.auth_secret.is_empty() {
            self.auth_secret = global.smtp_auth_secret.clone();
        }
        if self.auth_identity.is_empty() {
            self.auth_identity.clone_from(&global.smtp_auth_identity);
        }
        if self.require_tls.is_none() {
            self.require_tls = Some(global.smtp_require_tls);
        }
        first.finish()
    }

    fn validate(&self) -> Result<()> {
        if self.to.is_empty() {
            return Err(invalid(self.kind(), "missing to address"));
        }
        Ok(())
    }

    fn target(&self) -> String {
        self.to.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// PagerDuty events API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagerdutyConfig {
    /// Notify resolved alerts.
    pub send_resolved: bool,
    /// HTTP client options.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_config: Option<HttpClientConfig>,
    /// Events API v2 routing key.
    pub routing_key: Secret,
    /// Events API v1 service key.
    pub service_key: Secret,
    /// Events endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<Url>,
    /// Client name shown in PagerDuty.
    pub client: String,
    /// Incident severity.
    pub severity: String,
}

impl Default for PagerdutyConfig {
    fn default() -> Self {
        Self {
            send_resolved: true,
            http_config: None,
            routing_key: Secret::default(),
            service_key: Secret::default(),
            url: None,
            client: String::new(),
            severity: "error".to_string(),
        }
    }
}

impl IntegrationConfig for PagerdutyConfig {
    fn kind(&self) -> IntegrationKind {
        IntegrationKind::Pagerduty
    }

    fn send_resolved(&self) -> bool {
        self.send_resolved
    }

    fn apply_defaults(&mut self, global: &GlobalConfig) -> Result<()> {
        let mut first = FirstError::default();
        default_http(&mut self.http_config, global);
        if self.url.is_none() {
            if global.pagerduty_url.is_none() {
                first.record(missing(self.kind(), "PagerDuty URL"));
            }
            self.url.clone_from(&global.pagerduty_url);
        }
        first.finish()
    }

    fn validate(&self) -> Result<()> {
        if self.routing_key.is_empty() && self.service_key.is_empty() {
            return Err(invalid(
                self.kind(),
                "missing service or routing key",
            ));
        }
        Ok(())
    }

    fn target(&self) -> String {
        self.url.as_ref().map(ToString::to_string).unwrap_or_default()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// OpsGenie alerts API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpsGenieConfig {
    /// Notify resolved alerts.
    pub send_resolved: bool,
    /// HTTP client options.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_config: Option<HttpClientConfig>,
    /// API key.
    pub api_key: Secret,
    /// File holding the API key.
    pub api_key_file: String,
    /// API base URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<Url>,
    /// Alert message template.
    pub message: String,
    /// Alert priority.
    pub priority: String,
}

impl Default for OpsGenieConfig {
    fn default() -> Self {
        Self {
            send_resolved: true,
            http_config: None,
            api_key: Secret::default(),
            api_key_file: String::new(),
            api_url: None,
            message: String::new(),
            priority: String::new(),
        }
    }
}

impl IntegrationConfig for OpsGenieConfig {
    fn kind(&self) -> IntegrationKind {
        IntegrationKind::Opsgenie
    }

    fn send_resolved(&self) -> bool {
        self.send_resolved
    }

    fn apply_defaults(&mut self, global: &GlobalConfig) -> Result<()> {
        let mut first = FirstError::default();
        default_http(&mut self.http_config, global);
        if self.api_url.is_none() {
            if global.opsgenie_api_url.is_none() {
                first.record(missing(self.kind(), "OpsGenie URL"));
            }
            self.api_url.clone_from(&global.opsgenie_api_url);
        }
        if let Some(url) = self.api_url.as_mut() {
            ensure_trailing_slash(url);
        }
        if self.api_key.is_empty() && self.api_key_file.is_empty() {
            if global.opsgenie_api_key.is_empty() && global.opsgenie_api_key_file.is_empty() {
                first.record(missing(self.kind(), "OpsGenie API key"));
            }
            self.api_key = global.opsgenie_api_key.clone();
            self.api_key_file.clone_from(&global.opsgenie_api_key_file);
        }
        first.finish()
    }

    fn validate(&self) -> Result<()> {
        if !self.api_key.is_empty() && !self.api_key_file.is_empty() {
            return Err(invalid(
                self.kind(),
                "at most one of api_key and api_key_file must be configured",
            ));
        }
        Ok(())
    }

    fn target(&self) -> String {
        self.api_url.as_ref().map(ToString::to_string).unwrap_or_default()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// WeChat work messages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WechatConfig {
    /// Notify resolved alerts.
    pub send_resolved: bool,
    /// HTTP client options.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_config: Option<HttpClientConfig>,
    /// API secret.
    pub api_secret: Secret,
    /// API base URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<Url>,
    /// Corporation ID.
    pub corp_id: String,
    /// Target user.
    pub to_user: String,
    /// Target party.
    pub to_party: String,
    /// Target tag.
    pub to_tag: String,
    /// Agent ID.
    pub agent_id: String,
}

impl IntegrationConfig for WechatConfig {
    fn kind(&self) -> IntegrationKind {
        IntegrationKind::Wechat
    }

    fn send_resolved(&self) -> bool {
        self.send_resolved
    }

    fn apply_defaults(&mut self, global: &GlobalConfig) -> Result<()> {
        let mut first = FirstError::default();
        default_http(&mut self.http_config, global);
        if self.api_url.is_none() {
            if global.wechat_api_url.is_none() {
                first.record(missing(self.kind(), "WeChat URL"));
            }
            self.api_url.clone_from(&global.wechat_api_url);
        }
        if self.api_secret.is_empty() {
            if global.wechat_api_secret.is_empty() {
                first.record(missing(self.kind(), "WeChat API secret"));
            }
            self.api_secret = global.wechat_api_secret.clone();
        }
        if self.corp_id.is_empty() {
            if global.wechat_api_corp_id.is_empty() {
                first.record(missing(self.kind(), "WeChat corp ID"));
            }
            self.corp_id.clone_from(&global.wechat_api_corp_id);
        }
        if let Some(url) = self.api_url.as_mut() {
            ensure_trailing_slash(url);
        }
        first.finish()
    }

    fn validate(&self) -> Result<()> {
        Ok(())
    }

    fn target(&self) -> String {
        format!("{}/{}", self.corp_id, self.to_user)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Slack incoming webhook.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    /// Notify resolved alerts.
    pub send_resolved: bool,
    /// HTTP client options.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_config: Option<HttpClientConfig>,
    /// Webhook URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<SecretUrl>,
    /// File holding the webhook URL.
    pub api_url_file: String,
    /// Channel or user to post to.
    pub channel: String,
    /// Bot username.
    pub username: String,
    /// Message title template.
    pub title: String,
    /// Message text template.
    pub text: String,
}

impl IntegrationConfig for SlackConfig {
    fn kind(&self) -> IntegrationKind {
        IntegrationKind::Slack
    }

    fn send_resolved(&self) -> bool {
        self.send_resolved
    }

    fn apply_defaults(&mut self, global: &GlobalConfig) -> Result<()> {
        let mut first = FirstError::default();
        default_http(&mut self.http_config, global);
        if self.api_url.is_none() && self.api_url_file.is_empty() {
            if global.slack_api_url.is_none() && global.slack_api_url_file.is_empty() {
                first.record(missing(self.kind(), "Slack API URL"));
            }
            self.api_url.clone_from(&global.slack_api_url);
            self.api_url_file.clone_from(&global.slack_api_url_file);
        }
        first.finish()
    }

    fn validate(&self) -> Result<()> {
        if self.api_url.is_some() && !self.api_url_file.is_empty() {
            return Err(invalid(
                self.kind(),
                "at most one of api_url and api_url_file must be configured",
            ));
        }
        Ok(())
    }

    fn target(&self) -> String {
        self.channel.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// VictorOps REST endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VictorOpsConfig {
    /// Notify resolved alerts.
    pub send_resolved: bool,
    /// HTTP client options.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_config: Option<HttpClientConfig>,
    /// API key.
    pub api_key: Secret,
    /// API base URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<Url>,
    /// Routing key.
    pub routing_key: String,
    /// Message type, e.g. `CRITICAL`.
    pub message_type: String,
}

impl Default for VictorOpsConfig {
    fn default() -> Self {
        Self {
            send_resolved: true,
            http_config: None,
            api_key: Secret::default(),
            api_url: None,
            routing_key: String::new(),
            message_type: "CRITICAL".to_string(),
        }
    }
}

impl IntegrationConfig for VictorOpsConfig {
    fn kind(&self) -> IntegrationKind {
        IntegrationKind::Victorops
    }

    fn send_resolved(&self) -> bool {
        self.send_resolved
    }

    fn apply_defaults(&mut self, global: &GlobalConfig) -> Result<()> {
        let mut first = FirstError::default();
        default_http(&mut self.http_config, global);
        if self.api_url.is_none() {
            if global.victorops_api_url.is_none() {
                first.record(missing(self.kind(), "VictorOps URL"));
            }
            self.api_url.clone_from(&global.victorops_api_url);
        }
        if let Some(url) = self.api_url.as_mut() {
            ensure_trailing_slash(url);
        }
        if self.api_key.is_empty() {
            if global.victorops_api_key.is_empty() {
                first.record(missing(self.kind(), "VictorOps API key"));
            }
            self.api_key = global.victorops_api_key.clone();
        }
        first.finish()
    }

    fn validate(&self) -> Result<()> {
        if self.routing_key.is_empty() {
            return Err(invalid(self.kind(), "missing routing key"));
        }
        Ok(())
    }

    fn target(&self) -> String {
        self.routing_key.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Pushover push notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PushoverConfig {
    /// Notify resolved alerts.
    pub send_resolved: bool,
    /// HTTP client options.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_config: Option<HttpClientConfig>,
    /// Recipient user key.
    pub user_key: Secret,
    /// Application token.
    pub token: Secret,
    /// Notification title template.
    pub title: String,
    /// Notification priority.
    pub priority: String,
}

impl Default for PushoverConfig {
    fn default() -> Self {
        Self {
            send_resolved: true,
            http_config: None,
            user_key: Secret::default(),
            token: Secret::default(),
            title: String::new(),
            priority: String::new(),
        }
    }
}

impl IntegrationConfig for PushoverConfig {
    fn kind(&self) -> IntegrationKind {
        IntegrationKind::Pushover
    }

    fn send_resolved(&self) -> bool {
        self.send_resolved
    }

    fn apply_defaults(&mut self, global: &GlobalConfig) -> Result<()> {
        default_http(&mut self.http_config, global);
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.user_key.is_empty() {
            return Err(invalid(self.kind(), "missing user key"));
        }
        if self.token.is_empty() {
            return Err(invalid(self.kind(), "missing token"));
        }
        Ok(())
    }

    fn target(&self) -> String {
        "pushover".to_string()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// AWS SNS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnsConfig {
    /// Notify resolved alerts.
    pub send_resolved: bool,
    /// HTTP client options.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_config: Option<HttpClientConfig>,
    /// SNS endpoint override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<Url>,
    /// Topic to publish to.
    pub topic_arn: String,
    /// Phone number for SMS delivery.
    pub phone_number: String,
    /// Mobile endpoint ARN.
    pub target_arn: String,
    /// Message subject template.
    pub subject: String,
}

impl Default for SnsConfig {
    fn default() -> Self {
        Self {
            send_resolved: true,
            http_config: None,
            api_url: None,
            topic_arn: String::new(),
            phone_number: String::new(),
            target_arn: String::new(),
            subject: String::new(),
        }
    }
}

impl IntegrationConfig for SnsConfig {
    fn kind(&self) -> IntegrationKind {
        IntegrationKind::Sns
    }

    fn send_resolved(&self) -> bool {
        self.send_resolved
    }

    fn apply_defaults(&mut self, global: &GlobalConfig) -> Result<()> {
        default_http(&mut self.http_config, global);
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let set = [&self.topic_arn, &self.phone_number, &self.target_arn]
            .iter()
            .filter(|s| !s.is_empty())
            .count();
        if set != 1 {
            return Err(invalid(
                self.kind(),
                "exactly one of topic_arn, phone_number and target_arn must be set",
            ));
        }
        Ok(())
    }

    fn target(&self) -> String {
        [&self.topic_arn, &self.phone_number, &self.target_arn]
            .into_iter()
            .find(|s| !s.is_empty())
            .cloned()
            .unwrap_or_default()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
