//! # Host Controller
//!
//! Ties the daemon's lifecycle to the hosted server.
//!
//! On start the controller selects the server from the registry, resolves its
//! configuration directory, lets the server load its connection properties
//! and spawns the supervisor. Startup never fails: problems are recorded in
//! the status slot and the supervisor is simply not started. On stop the
//! controller signals the supervisor and waits until the server is closed.

use pipehost_server_api::PipelineServer;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::HostConfig;
use crate::config_path::{ConfigPathResolver, ResourceLookup};
use crate::error::HostError;
use crate::registry::ServerRegistry;
use crate::status::{Fault, FaultKind, StatusSlot};
use crate::supervisor::{Supervisor, SupervisorHandle, SupervisorReport};

/// Directory used when the host cannot determine its data directory.
const LOCAL_FALLBACK_ROOT: &str = "connector";

/// Owns the hosted server and its supervisor for the lifetime of the process.
pub struct Controller {
    server: Option<Arc<dyn PipelineServer>>,
    server_name: Option<String>,
    config_dir: Option<PathBuf>,
    status: StatusSlot,
    supervisor: Option<SupervisorHandle>,
}

impl Controller {
    /// Start hosting.
    ///
    /// `lookup` supplies the named resource holding the shared configuration root.
    pub async fn start<L>(registry: &ServerRegistry, config: &HostConfig, lookup: L) -> Self
    where
        L: ResourceLookup + 'static,
    {
        let mut controller = Self {
            server: None,
            server_name: None,
            config_dir: None,
            status: StatusSlot::new(),
            supervisor: None,
        };

        if let Err(e) = controller.startup(registry, config, Box::new(lookup)).await {
            error!("Host failed to start properly: {}", e);
            controller.status.record(fault_kind(&e), e.to_string());
        }

        controller
    }

    async fn startup(
        &mut self,
        registry: &ServerRegistry,
        config: &HostConfig,
        lookup: Box<dyn ResourceLookup>,
    ) -> Result<(), HostError> {
        let located = registry.locate()?;
        if let Some(warning) = located.warning {
            self.status.record(FaultKind::DiscoveryAmbiguity, warning);
        }
        self.server = Some(Arc::clone(&located.server));
        self.server_name = Some(located.name);

        let fallback_root = config.fallback_root().unwrap_or_else(|e| {
            warn!("{:#}, using \"{}\" as fallback root", e, LOCAL_FALLBACK_ROOT);
            PathBuf::from(LOCAL_FALLBACK_ROOT)
        });
        let resolver = ConfigPathResolver::new(lookup, config.host.config_root_resource.as_str());
        debug!(
            "Resolving configuration directory from \"{}\" with fallback {}",
            resolver.resource_name(),
            fallback_root.display()
        );
        let config_dir = resolver.resolve(config.host.deployment_name.as_deref(), &fallback_root);
        info!("Using configuration directory: {}", config_dir.display());
        self.config_dir = Some(config_dir.clone());

        located
            .server
            .load_connection_properties(&config_dir)
            .await
            .map_err(HostError::ConfigLoad)?;

        let supervisor = Supervisor::new(
            located.server,
            config.supervisor_settings(),
            self.status.clone(),
        );
        self.supervisor = Some(supervisor.spawn(CancellationToken::new()));

        Ok(())
    }

    /// The hosted server, or `None` when discovery failed.
    pub fn server(&self) -> Option<Arc<dyn PipelineServer>> {
        self.server.clone()
    }

    /// The hosted server, failing when discovery did not select one.
    pub fn server_or_fail(&self) -> Result<Arc<dyn PipelineServer>, HostError> {
        self.server().ok_or(HostError::NoServer)
    }

    /// Registration name of the hosted server.
    pub fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }

    /// Message of the last recorded fault.
    pub fn error_message(&self) -> Option<String> {
        self.status.message()
    }

    /// The last recorded fault.
    pub fn fault(&self) -> Option<Fault> {
        self.status.current()
    }

    /// The status slot, for readers that outlive a borrow of the controller.
    pub fn status(&self) -> StatusSlot {
        self.status.clone()
    }

    /// The resolved configuration directory.
    pub fn config_dir(&self) -> Option<&Path> {
        self.config_dir.as_deref()
    }

    /// Latest supervisor report, or `None` when the supervisor never started.
    pub fn supervisor_report(&self) -> Option<SupervisorReport> {
        self.supervisor.as_ref().map(|s| s.report())
    }

    /// Subscribe to supervisor reports, or `None` when the supervisor never started.
    pub fn subscribe_supervisor(&self) -> Option<watch::Receiver<SupervisorReport>> {
        self.supervisor.as_ref().map(|s| s.subscribe())
    }

    /// Whether the supervisor task is still running.
    pub fn is_running(&self) -> bool {
        self.supervisor.as_ref().is_some_and(|s| !s.is_finished())
    }

    /// Stop the supervisor and wait until the server is closed.
    ///
    /// Calling this more than once is harmless.
    pub async fn stop(&mut self) {
        if let Some(supervisor) = self.supervisor.as_mut() {
            info!("Stopping supervisor");
            supervisor.stop().await;
        }
    }
}

fn fault_kind(error: &HostError) -> FaultKind {
    match error {
        HostError::Discovery(_) | HostError::NoServer => FaultKind::Discovery,
        HostError::ConfigLoad(_) => FaultKind::ConfigLoad,
        HostError::Lifecycle(_) => FaultKind::Lifecycle,
    }
}
