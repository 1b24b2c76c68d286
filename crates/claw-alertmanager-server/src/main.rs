//! claw-alertmanager - alert routing and notification server
//!
//! Loads a routing configuration, starts the dispatch pipeline and serves
//! the v1 HTTP API until interrupted.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use claw_alertmanager::Config;
use claw_alertmanager_server::{AlertmanagerServer, ServerConfig};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use url::Url;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "claw-alertmanager")]
#[command(about = "Clawbernetes alert routing and notification server")]
#[command(version)]
struct Cli {
    /// Path to the routing configuration
    #[arg(long, env = "ALERTMANAGER_CONFIG", default_value = "alertmanager.yml")]
    config_file: PathBuf,

    /// Address to serve the HTTP API on
    #[arg(long, default_value = "0.0.0.0:9093")]
    listen_address: SocketAddr,

    /// Public URL of this instance
    #[arg(long)]
    external_url: Option<Url>,

    /// Log output format
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,

    /// Seconds between dispatch passes
    #[arg(long, default_value_t = 1)]
    dispatch_interval_secs: u64,

    /// Hours to keep resolved alerts before dropping them
    #[arg(long, default_value_t = 120)]
    retention_hours: u64,

    /// Validate the configuration and exit
    #[arg(long)]
    check_config: bool,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(fmt::layer()).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    info!(config = %cli.config_file.display(), "loading configuration");
    let alerting = Config::from_file(&cli.config_file)?;
    info!(receivers = alerting.receivers.len(), "configuration loaded");

    if cli.check_config {
        println!("configuration is valid: {}", cli.config_file.display());
        return Ok(());
    }

    let mut config = ServerConfig::new(cli.listen_address)
        .with_dispatch_interval(Duration::from_secs(cli.dispatch_interval_secs.max(1)))
        .with_alert_retention(Duration::from_secs(cli.retention_hours.saturating_mul(3600)));
    if let Some(url) = cli.external_url {
        config = config.with_external_url(url);
    }

    let server = AlertmanagerServer::new(config, alerting)?;
    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for shutdown signal");
        }
        info!("shutdown signal received");
    };

    server
        .serve_with_shutdown(cli.listen_address, shutdown)
        .await?;
    Ok(())
}
