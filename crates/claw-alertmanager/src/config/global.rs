//! Global defaults shared by every integration.

use serde::{Deserialize, Serialize};
use url::Url;

use super::{Secret, SecretUrl};
use crate::error::{AlertmanagerError, Result};

/// HTTP client options for webhook-style integrations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    /// Bearer token sent with every request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<Secret>,
    /// Proxy to route requests through.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<Url>,
    /// Skip TLS certificate verification.
    pub tls_insecure_skip_verify: bool,
    /// Follow HTTP redirects.
    pub follow_redirects: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            bearer_token: None,
            proxy_url: None,
            tls_insecure_skip_verify: false,
            follow_redirects: true,
        }
    }
}

fn default_url(raw: &str) -> Option<Url> {
    Url::parse(raw).ok()
}

/// Defaults applied to receivers that leave fields unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// How long an alert without an end time stays firing, in seconds.
    pub resolve_timeout_secs: u64,
    /// Default HTTP client options.
    pub http_config: HttpClientConfig,

    /// Default sender address.
    pub smtp_from: String,
    /// Hostname announced in HELO/EHLO.
    pub smtp_hello: String,
    /// Default `host:port` of the SMTP server.
    pub smtp_smarthost: String,
    /// SMTP auth username.
    pub smtp_auth_username: String,
    /// SMTP auth password.
    pub smtp_auth_password: Secret,
    /// SMTP CRAM-MD5 secret.
    pub smtp_auth_secret: Secret,
    /// SMTP auth identity.
    pub smtp_auth_identity: String,
    /// Require STARTTLS.
    pub smtp_require_tls: bool,

    /// Default Slack webhook URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slack_api_url: Option<SecretUrl>,
    /// File holding the default Slack webhook URL.
    pub slack_api_url_file: String,

    /// PagerDuty events endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagerduty_url: Option<Url>,

    /// OpsGenie API base URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opsgenie_api_url: Option<Url>,
    /// OpsGenie API key.
    pub opsgenie_api_key: Secret,
    /// File holding the OpsGenie API key.
    pub opsgenie_api_key_file: String,

    /// WeChat API base URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wechat_api_url: Option<Url>,
    /// WeChat API secret.
    pub wechat_api_secret: Secret,
    /// WeChat corporation ID.
    pub wechat_api_corp_id: String,

    /// VictorOps API base URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub victorops_api_url: Option<Url>,
    /// VictorOps API key.
    pub victorops_api_key: Secret,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            resolve_timeout_secs: 300,
            http_config: HttpClientConfig::default(),
            smtp_from: String::new(),
            smtp_hello: "localhost".to_string(),
            smtp_smarthost: String::new(),
            smtp_auth_username: String::new(),
            smtp_auth_password: Secret::default(),
            smtp_auth_secret: Secret::default(),
            smtp_auth_identity: String::new(),
            smtp_require_tls: true,
            slack_api_url: None,
            slack_api_url_file: String::new(),
            pagerduty_url: default_url("https://events.pagerduty.com/v2/enqueue"),
            opsgenie_api_url: default_url("https://api.opsgenie.com/"),
            opsgenie_api_key: Secret::default(),
            opsgenie_api_key_file: String::new(),
            wechat_api_url: default_url("https://qyapi.weixin.qq.com/cgi-bin/"),
            wechat_api_secret: Secret::default(),
            wechat_api_corp_id: String::new(),
            victorops_api_url: default_url(
                "https://alert.victorops.com/integrations/generic/20131114/alert/",
            ),
            victorops_api_key: Secret::default(),
        }
    }
}

impl GlobalConfig {
    /// The resolve timeout as a chrono duration, capped at `u32::MAX` seconds.
    #[must_use]
    pub fn resolve_timeout(&self) -> chrono::Duration {
        let secs = u32::try_from(self.resolve_timeout_secs).unwrap_or(u32::MAX);
        chrono::Duration::seconds(i64::from(secs))
    }

    /// Parses and installs a global Slack webhook URL.
    ///
    /// # Errors
    ///
    /// Returns `BadData` if the URL does not parse.
    pub fn set_slack_api_url(&mut self, raw: &str) -> Result<()> {
        let url = Url::parse(raw)
            .map_err(|e| AlertmanagerError::bad_data(format!("invalid Slack API URL: {e}")))?;
        self.slack_api_url = Some(SecretUrl::new(url));
        Ok(())
    }
}
