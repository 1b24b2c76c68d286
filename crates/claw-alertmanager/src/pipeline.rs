//! Live reconfiguration of the dispatch pipeline.
//!
//! All receiver and configuration changes go through one actor task, so
//! requests never race each other. For every request the actor
//!
//! 1. validates against the current snapshot and resolves defaults,
//! 2. builds the new integrations,
//! 3. stops the [`Dispatcher`] (`Running -> Reconfiguring`),
//! 4. publishes a new [`RoutingSnapshot`] through a `watch` channel,
//! 5. installs it and restarts the dispatcher in the background
//!    (`Reconfiguring -> Running`).
//!
//! Steps 1 and 2 touch only private copies, so any failure leaves the
//! running pipeline and the published snapshot untouched.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{Config, Receiver, resolve_receiver};
use crate::error::{AlertmanagerError, Result};
use crate::integration::{NotifierRegistry, Template};
use crate::routing::{RoutingSnapshot, RoutingTable};

const COMMAND_BUFFER: usize = 32;

/// The delivery pipeline driven by the coordinator.
#[async_trait]
pub trait Dispatcher: Send + Sync + fmt::Debug {
    /// Stops the dispatch loop. Sends already in flight may drain on their own.
    async fn stop(&self);

    /// Makes `snapshot` the routing used by the next [`Dispatcher::run`].
    fn install(&self, snapshot: Arc<RoutingSnapshot>);

    /// Runs the dispatch loop until [`Dispatcher::stop`] is called.
    async fn run(&self);
}

/// Lifecycle state of the dispatch pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    /// Delivering with the current snapshot.
    Running,
    /// Stopped while a new snapshot is installed.
    Reconfiguring,
    /// Shut down.
    Stopped,
}

impl PipelineState {
    /// Returns the state as a static string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Reconfiguring => "reconfiguring",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

enum Command {
    AddReceiver {
        receiver: Receiver,
        reply: oneshot::Sender<Result<Receiver>>,
    },
    EditReceiver {
        receiver: Receiver,
        reply: oneshot::Sender<Result<Receiver>>,
    },
    DeleteReceiver {
        name: String,
        reply: oneshot::Sender<Result<()>>,
    },
    UpdateConfig {
        config: Box<Config>,
        reply: oneshot::Sender<Result<()>>,
    },
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddReceiver { receiver, .. } => write!(f, "AddReceiver({})", receiver.name),
            Self::EditReceiver { receiver, .. } => write!(f, "EditReceiver({})", receiver.name),
            Self::DeleteReceiver { name, .. } => write!(f, "DeleteReceiver({name})"),
            Self::UpdateConfig { .. } => write!(f, "UpdateConfig"),
        }
    }
}

/// A fully validated change, ready to be swapped in.
struct Prepared {
    config: Config,
    table: RoutingTable,
}

/// Owns the published snapshot and the dispatcher lifecycle.
pub struct Coordinator {
    registry: NotifierRegistry,
    template: Template,
    dispatcher: Arc<dyn Dispatcher>,
    snapshot_tx: watch::Sender<Arc<RoutingSnapshot>>,
    state_tx: watch::Sender<PipelineState>,
    commands: mpsc::Receiver<Command>,
    shutdown: CancellationToken,
    run_task: Option<JoinHandle<()>>,
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("version", &self.snapshot_tx.borrow().version)
            .field("state", &*self.state_tx.borrow())
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    /// Builds the first snapshot, starts the dispatcher and spawns the actor.
    ///
    /// The actor stops the dispatcher and exits when `shutdown` is cancelled
    /// or every [`ReconfigHandle`] has been dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid or its receivers cannot be built.
    pub fn spawn(
        config: Config,
        registry: NotifierRegistry,
        template: Template,
        dispatcher: Arc<dyn Dispatcher>,
        shutdown: CancellationToken,
    ) -> Result<(ReconfigHandle, JoinHandle<()>)> {
        config.validate()?;
        let snapshot = Arc::new(RoutingSnapshot::initial(config, &registry, &template)?);
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::clone(&snapshot));
        let (state_tx, state_rx) = watch::channel(PipelineState::Running);
        let (commands_tx, commands) = mpsc::channel(COMMAND_BUFFER);

        dispatcher.install(snapshot);
        let run_task = Some(spawn_run(&dispatcher));
        info!(receivers = snapshot_rx.borrow().table.receiver_names().len(), "dispatch pipeline started");

        let coordinator = Self {
            registry,
            template,
            dispatcher,
            snapshot_tx,
            state_tx,
            commands,
            shutdown,
            run_task,
        };
        let task = tokio::spawn(coordinator.run());

        Ok((
            ReconfigHandle {
                commands: commands_tx,
                snapshot: snapshot_rx,
                state: state_rx,
            },
            task,
        ))
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => break,
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
            }
        }
        self.stop_dispatcher().await;
        self.state_tx.send_replace(PipelineState::Stopped);
        info!("dispatch pipeline stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::AddReceiver { receiver, reply } => {
                let result = match self.prepare_add(&receiver) {
                    Ok(prepared) => {
                        self.apply(prepared).await;
                        info!(receiver = %receiver.name, "added receiver");
                        Ok(receiver)
                    }
                    Err(err) => Err(err),
                };
                let _ = reply.send(result);
            }
            Command::EditReceiver { receiver, reply } => {
                let result = match self.prepare_edit(&receiver) {
                    Ok(prepared) => {
                        self.apply(prepared).await;
                        info!(receiver = %receiver.name, "updated receiver");
                        Ok(receiver)
                    }
                    Err(err) => Err(err),
                };
                let _ = reply.send(result);
            }
            Command::DeleteReceiver { name, reply } => {
                let result = match self.prepare_delete(&name) {
                    Ok(prepared) => {
                        self.apply(prepared).await;
                        info!(receiver = %name, "deleted receiver");
                        Ok(())
                    }
                    Err(err) => Err(err),
                };
                let _ = reply.send(result);
            }
            Command::UpdateConfig { config, reply } => {
                let result = match self.prepare_config(*config) {
                    Ok(prepared) => {
                        self.apply(prepared).await;
                        info!("applied new configuration");
                        Ok(())
                    }
                    Err(err) => Err(err),
                };
                let _ = reply.send(result);
            }
        }
    }

    fn current(&self) -> Arc<RoutingSnapshot> {
        Arc::clone(&self.snapshot_tx.borrow())
    }

    fn prepare_add(&self, receiver: &Receiver) -> Result<Prepared> {
        if receiver.name.is_empty() {
            return Err(AlertmanagerError::bad_data("receiver name must not be empty"));
        }
        let current = self.current();
        if current.table.contains(&receiver.name) {
            return Err(AlertmanagerError::Conflict {
                name: receiver.name.clone(),
            });
        }
        let resolved = resolve_receiver(receiver, &current.config.global)?;
        let integrations = self
            .registry
            .build_receiver_integrations(&resolved, &self.template)?;

        let mut table = current.table.clone();
        table.add_receiver(&receiver.name, integrations)?;

        let mut config = (*current.config).clone();
        config.receivers.push(receiver.clone());
        // An unreferenced receiver becomes reachable as the root default.
        let default_receiver = (!config.route.references(&receiver.name)).then_some(receiver.name.as_str());
        config.route = table.rebuild_route_tree(&config.route, default_receiver)?;

        Ok(Prepared { config, table })
    }

    fn prepare_edit(&self, receiver: &Receiver) -> Result<Prepared> {
        let current = self.current();
        if !current.table.contains(&receiver.name) {
            return Err(AlertmanagerError::receiver_not_found(&receiver.name));
        }
        let resolved = resolve_receiver(receiver, &current.config.global)?;
        let integrations = self
            .registry
            .build_receiver_integrations(&resolved, &self.template)?;

        let mut table = current.table.clone();
        table.replace_receiver(&receiver.name, integrations)?;

        let mut config = (*current.config).clone();
        match config.receivers.iter_mut().find(|r| r.name == receiver.name) {
            Some(slot) => *slot = receiver.clone(),
            None => config.receivers.push(receiver.clone()),
        }
        config.route = table.rebuild_route_tree(&config.route, None)?;

        Ok(Prepared { config, table })
    }

    fn prepare_delete(&self, name: &str) -> Result<Prepared> {
        let current = self.current();
        let mut table = current.table.clone();
        let removed = table.delete_receiver(name)?;
        debug!(receiver = %name, integrations = removed.len(), "dropping receiver integrations");

        let mut config = (*current.config).clone();
        config.receivers.retain(|r| r.name != name);
        if config.route.references(name) {
            warn!(receiver = %name, "deleted receiver is still referenced by routes");
        }

        Ok(Prepared { config, table })
    }

    fn prepare_config(&self, config: Config) -> Result<Prepared> {
        config.validate()?;
        let table = RoutingTable::from_config(&config, &self.registry, &self.template)?;
        Ok(Prepared { config, table })
    }

    async fn apply(&mut self, prepared: Prepared) {
        self.state_tx.send_replace(PipelineState::Reconfiguring);
        self.stop_dispatcher().await;

        let snapshot = Arc::new(RoutingSnapshot {
            version: self.snapshot_tx.borrow().version + 1,
            config: Arc::new(prepared.config),
            table: prepared.table,
        });
        self.snapshot_tx.send_replace(Arc::clone(&snapshot));
        debug!(version = snapshot.version, "published routing snapshot");

        self.dispatcher.install(snapshot);
        self.run_task = Some(spawn_run(&self.dispatcher));
        self.state_tx.send_replace(PipelineState::Running);
    }

    async fn stop_dispatcher(&mut self) {
        self.dispatcher.stop().await;
        if let Some(task) = self.run_task.take() {
            if let Err(err) = task.await {
                warn!(error = %err, "dispatch loop ended abnormally");
            }
        }
    }
}

fn spawn_run(dispatcher: &Arc<dyn Dispatcher>) -> JoinHandle<()> {
    let dispatcher = Arc::clone(dispatcher);
    tokio::spawn(async move { dispatcher.run().await })
}

/// Cloneable handle for reading snapshots and requesting changes.
#[derive(Debug, Clone)]
pub struct ReconfigHandle {
    commands: mpsc::Sender<Command>,
    snapshot: watch::Receiver<Arc<RoutingSnapshot>>,
    state: watch::Receiver<PipelineState>,
}

impl ReconfigHandle {
    /// Adds a receiver; returns it as submitted.
    ///
    /// If no route names the receiver it becomes the root route's receiver.
    ///
    /// # Errors
    ///
    /// `Conflict` for a duplicate name, `MissingConfig` if defaults cannot be
    /// resolved, `IntegrationBuild` if an integration cannot be constructed.
    pub async fn add_receiver(&self, receiver: Receiver) -> Result<Receiver> {
        self.request(|reply| Command::AddReceiver { receiver, reply }).await
    }

    /// Replaces an existing receiver; returns it as submitted.
    ///
    /// # Errors
    ///
    /// `NotFound` if no receiver has this name, otherwise as for
    /// [`ReconfigHandle::add_receiver`].
    pub async fn edit_receiver(&self, receiver: Receiver) -> Result<Receiver> {
        self.request(|reply| Command::EditReceiver { receiver, reply }).await
    }

    /// Removes a receiver. Routes naming it stop delivering.
    ///
    /// # Errors
    ///
    /// `NotFound` if no receiver has this name.
    pub async fn delete_receiver(&self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        self.request(|reply| Command::DeleteReceiver { name, reply }).await
    }

    /// Replaces the whole configuration.
    ///
    /// # Errors
    ///
    /// Returns the validation or build error; the running snapshot is kept.
    pub async fn update_config(&self, config: Config) -> Result<()> {
        let config = Box::new(config);
        self.request(|reply| Command::UpdateConfig { config, reply }).await
    }

    /// The currently published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<RoutingSnapshot> {
        Arc::clone(&self.snapshot.borrow())
    }

    /// A receiver notified whenever a new snapshot is published.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<RoutingSnapshot>> {
        self.snapshot.clone()
    }

    /// Current pipeline state.
    #[must_use]
    pub fn state(&self) -> PipelineState {
        *self.state.borrow()
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<Result<T>>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| stopped())?;
        response.await.map_err(|_| stopped())?
    }
}

fn stopped() -> AlertmanagerError {
    AlertmanagerError::Internal {
        reason: "reconfiguration actor has stopped".to_string(),
    }
}
