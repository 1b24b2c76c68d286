//! Server process configuration.

use std::net::SocketAddr;
use std::time::Duration;

use claw_alertmanager::DEFAULT_RETENTION;
use url::Url;

/// Configuration for the alertmanager HTTP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP server to.
    pub bind_addr: SocketAddr,
    /// Public URL of this instance, used in notification links.
    pub external_url: Option<Url>,
    /// How often the dispatch loop polls for alerts.
    pub dispatch_interval: Duration,
    /// How long resolved alerts are kept.
    pub alert_retention: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 9093)),
            external_url: None,
            dispatch_interval: Duration::from_secs(1),
            alert_retention: DEFAULT_RETENTION,
        }
    }
}

impl ServerConfig {
    /// Create a new configuration with the specified bind address.
    #[must_use]
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Self::default()
        }
    }

    /// Set the external URL.
    #[must_use]
    pub fn with_external_url(mut self, url: Url) -> Self {
        self.external_url = Some(url);
        self
    }

    /// Set the dispatch poll interval.
    #[must_use]
    pub const fn with_dispatch_interval(mut self, interval: Duration) -> Self {
        self.dispatch_interval = interval;
        self
    }

    /// Set the retention window for resolved alerts.
    #[must_use]
    pub const fn with_alert_retention(mut self, retention: Duration) -> Self {
        self.alert_retention = retention;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), 9093);
        assert!(config.external_url.is_none());
        assert_eq!(config.dispatch_interval, Duration::from_secs(1));
        assert_eq!(config.alert_retention, Duration::from_secs(120 * 60 * 60));
    }

    #[test]
    fn test_config_builder() {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 19093);
        let config = ServerConfig::new(addr)
            .with_external_url(Url::parse("https://alerts.example.com/").unwrap())
            .with_dispatch_interval(Duration::from_millis(250))
            .with_alert_retention(Duration::from_secs(3600));

        assert_eq!(config.bind_addr, addr);
        assert_eq!(
            config.external_url.as_ref().map(Url::as_str),
            Some("https://alerts.example.com/")
        );
        assert_eq!(config.dispatch_interval, Duration::from_millis(250));
        assert_eq!(config.alert_retention, Duration::from_secs(3600));
    }
}
