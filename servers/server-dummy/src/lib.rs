//! # server-dummy
//!
//! A dummy pipeline server for testing and development.
//!
//! The server does not connect to anything. It keeps its settings in
//! `connection.toml` inside the directory handed to it by the host, writing a
//! default file on first start, and tracks an in-memory "connected" flag that
//! `is_alive` reports.

use pipehost_server_api::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use tracing::{debug, info};

/// File holding the dummy server's connection settings.
pub const PROPERTIES_FILE: &str = "connection.toml";

/// Connection settings persisted by the dummy server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionProperties {
    /// Endpoint the server pretends to connect to.
    pub endpoint: String,
    /// Make every `open` fail with a connection error.
    #[serde(default)]
    pub fail_open: bool,
}

impl Default for ConnectionProperties {
    fn default() -> Self {
        Self {
            endpoint: "memory://dummy".to_string(),
            fail_open: false,
        }
    }
}

/// A dummy server with an in-memory connection.
pub struct DummyServer {
    properties: RwLock<Option<ConnectionProperties>>,
    connected: AtomicBool,
}

impl DummyServer {
    /// Create a new dummy server instance.
    pub fn new() -> Self {
        Self {
            properties: RwLock::new(None),
            connected: AtomicBool::new(false),
        }
    }

    /// The loaded connection properties, if any.
    pub fn properties(&self) -> Option<ConnectionProperties> {
        self.properties.read().ok().and_then(|p| (*p).clone())
    }

    /// Drop the connection without going through `close`, as if the backend went away.
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

impl Default for DummyServer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PipelineServer for DummyServer {
    fn id(&self) -> &str {
        "dummy"
    }

    fn name(&self) -> &str {
        "Dummy Server"
    }

    async fn load_connection_properties(&self, dir: &Path) -> ServerResult<()> {
        let path = dir.join(PROPERTIES_FILE);

        if !path.exists() {
            let content = toml::to_string(&ConnectionProperties::default())
                .map_err(|e| ServerError::Properties(e.to_string()))?;
            fs::write(&path, content)?;
            info!("Wrote default connection properties to {}", path.display());
        }

        let content = fs::read_to_string(&path)?;
        let properties: ConnectionProperties = toml::from_str(&content)?;
        debug!("Loaded connection properties: {:?}", properties);

        let mut slot = self
            .properties
            .write()
            .map_err(|_| ServerError::Properties("properties lock poisoned".to_string()))?;
        *slot = Some(properties);
        Ok(())
    }

    async fn open(&self) -> ServerResult<()> {
        let properties = self
            .properties()
            .ok_or_else(|| ServerError::Properties("connection properties not loaded".to_string()))?;

        if properties.fail_open {
            return Err(ServerError::Connection(format!(
                "cannot connect to {}",
                properties.endpoint
            )));
        }

        self.connected.store(true, Ordering::SeqCst);
        info!("Dummy server connected to {}", properties.endpoint);
        Ok(())
    }

    fn is_alive(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> ServerResult<()> {
        if self.connected.swap(false, Ordering::SeqCst) {
            info!("Dummy server disconnected");
        }
        Ok(())
    }
}
