//! Alertmanager server implementation.

use std::net::SocketAddr;
use std::sync::Arc;

use claw_alertmanager::{
    AlertMetrics, Config, Coordinator, MemAlerts, MemMarker, MemSilences, NotifierRegistry,
    PipelineDispatcher, Template,
};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::{ApiError, ApiResult};
use crate::routes::create_router;
use crate::state::AppState;

/// Alertmanager HTTP server.
///
/// Owns the in-memory stores, the dispatch loop and the reconfiguration
/// actor, and exposes them through the v1 API.
#[derive(Debug)]
pub struct AlertmanagerServer {
    config: ServerConfig,
    state: AppState,
    shutdown: CancellationToken,
    coordinator: Mutex<Option<JoinHandle<()>>>,
}

impl AlertmanagerServer {
    /// Create a server and start its notification pipeline.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if `alerting` is invalid or one of its receivers
    /// cannot be built.
    pub fn new(config: ServerConfig, alerting: Config) -> ApiResult<Self> {
        let alerts = Arc::new(MemAlerts::new());
        let silences = Arc::new(MemSilences::new());
        let marker = Arc::new(MemMarker::new());
        let dispatcher = Arc::new(
            PipelineDispatcher::new(
                alerts.clone(),
                silences.clone(),
                marker.clone(),
                config.dispatch_interval,
            )
            .with_retention(config.alert_retention),
        );

        let shutdown = CancellationToken::new();
        let (reconfig, coordinator) = Coordinator::spawn(
            alerting,
            NotifierRegistry::with_defaults(),
            Template::new(config.external_url.clone()),
            dispatcher,
            shutdown.clone(),
        )?;

        let state = AppState::new(reconfig, alerts, marker, silences, AlertMetrics::new());
        Ok(Self {
            config,
            state,
            shutdown,
            coordinator: Mutex::new(Some(coordinator)),
        })
    }

    /// Get the API state for external access.
    #[must_use]
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Server configuration.
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Start the server on the configured address.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the address fails.
    pub async fn serve(&self) -> ApiResult<()> {
        self.serve_with_shutdown(self.config.bind_addr, std::future::pending())
            .await
    }

    /// Start the server with graceful shutdown support.
    ///
    /// When `shutdown` completes the HTTP listener drains, then the
    /// reconfiguration actor and dispatch loop are stopped.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the address fails.
    pub async fn serve_with_shutdown<F>(&self, addr: SocketAddr, shutdown: F) -> ApiResult<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ApiError::BindFailed(addr, e))?;

        info!(addr = %addr, "Alertmanager listening");

        let served = axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ApiError::Internal(e.to_string()));

        self.stop().await;
        info!("Alertmanager shut down");
        served
    }

    /// Stop the notification pipeline and wait for it to finish.
    pub async fn stop(&self) {
        self.shutdown.cancel();
        let Some(task) = self.coordinator.lock().await.take() else {
            return;
        };
        if let Err(err) = task.await {
            warn!(error = %err, "reconfiguration actor failed");
        }
    }

    /// Create the router without starting the server.
    pub fn router(&self) -> axum::Router {
        create_router(self.state.clone())
    }
}
