//! # pipehost-daemon
//!
//! The pipehost hosting daemon.
//!
//! This daemon is responsible for:
//! - Selecting the pipeline server compiled into the binary
//! - Resolving the directory holding the server's connection settings
//! - Opening the server and keeping it alive until shutdown
//! - Reporting the last fault to operators
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      pipehost-daemon                         │
//! │                                                              │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐      │
//! │  │    Server    │  │  Config Path │  │    Status    │      │
//! │  │   Registry   │  │   Resolver   │  │     Slot     │      │
//! │  └──────────────┘  └──────────────┘  └──────────────┘      │
//! │                                                              │
//! │  ┌────────────────────────────────────────────────────┐    │
//! │  │        Supervisor (open → poll → close → ...)       │    │
//! │  └────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//!                      ┌───────────────┐
//!                      │ Hosted server │
//!                      └───────────────┘
//! ```
//!
//! ## Configuration
//!
//! The daemon reads configuration from `$XDG_CONFIG_HOME/pipehost/config.toml`,
//! or from the file named by `PIPEHOST_CONFIG`.
//!
//! ## Running
//!
//! ```bash
//! # Start the daemon
//! cargo run --bin pipehost-daemon
//!
//! # With debug logging
//! RUST_LOG=debug cargo run --bin pipehost-daemon
//! ```

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pipehost_daemon::config::HostConfig;
use pipehost_daemon::config_path::EnvLookup;
use pipehost_daemon::controller::Controller;
use pipehost_daemon::registry::ServerRegistry;
use server_dummy::DummyServer;

#[tokio::main]
async fn main() -> Result<()> {
    let (config, config_error) = match HostConfig::load_default() {
        Ok(cfg) => (cfg, None),
        Err(e) => (HostConfig::default(), Some(e)),
    };

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.host.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!("Starting pipehost-daemon v{}", env!("CARGO_PKG_VERSION"));
    match config_error {
        None => info!("Loaded configuration"),
        Some(e) => warn!("Failed to load config, using defaults: {:#}", e),
    }

    // Register the servers compiled into this binary
    let mut registry = ServerRegistry::new();
    registry.register("dummy", || Arc::new(DummyServer::new()));
    info!(
        "Registered {} server(s): {:?}",
        registry.count(),
        registry.list()
    );

    let mut controller = Controller::start(&registry, &config, EnvLookup).await;

    match controller.server() {
        Some(server) => info!("Hosting server: {} ({})", server.name(), server.id()),
        None => warn!("No server is hosted"),
    }
    if let Some(message) = controller.error_message() {
        warn!("Host status: {}", message);
    }

    info!("Daemon startup complete");
    info!("Press Ctrl+C to stop");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutting down...");
    controller.stop().await;

    if let Some(report) = controller.supervisor_report() {
        info!("Final supervisor report: {}", serde_json::to_string(&report)?);
    }
    if let Some(fault) = controller.fault() {
        info!("Last fault: {}", serde_json::to_string(&fault)?);
    }

    info!("Daemon stopped");
    Ok(())
}
