//! # Server Registry
//!
//! Holds the pipeline server implementations compiled into the binary and
//! selects the one the daemon will host.
//!
//! The hosting binary registers each implementation under a name together
//! with a constructor. Selection is permissive: with several candidates the
//! last registered one wins and a warning is returned, so packaging mistakes
//! degrade into an operator-visible warning instead of a failed startup.

use crate::error::DiscoveryError;
use pipehost_server_api::PipelineServer;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Constructor for a registered server implementation.
pub type ServerConstructor = Box<dyn Fn() -> Arc<dyn PipelineServer> + Send + Sync>;

/// The server chosen by [`ServerRegistry::locate`].
pub struct LocatedServer {
    /// Registration name of the chosen implementation.
    pub name: String,
    /// The constructed server instance.
    pub server: Arc<dyn PipelineServer>,
    /// Set when more than one implementation was registered.
    pub warning: Option<String>,
}

/// Registry of available pipeline server implementations.
///
/// # Example
///
/// ```no_run
/// use pipehost_daemon::registry::ServerRegistry;
/// use server_dummy::DummyServer;
/// use std::sync::Arc;
///
/// let mut registry = ServerRegistry::new();
/// registry.register("dummy", || Arc::new(DummyServer::new()));
///
/// let located = registry.locate().unwrap();
/// println!("Hosting server: {}", located.server.name());
/// ```
pub struct ServerRegistry {
    entries: Vec<(String, ServerConstructor)>,
}

impl ServerRegistry {
    /// Create a new empty server registry.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register a server implementation.
    ///
    /// Registering a name twice replaces the earlier constructor but keeps its
    /// position in the registration order.
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn() -> Arc<dyn PipelineServer> + Send + Sync + 'static,
    {
        let name = name.into();
        let constructor: ServerConstructor = Box::new(constructor);

        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = constructor,
            None => self.entries.push((name, constructor)),
        }
    }

    /// List registered names in registration order.
    pub fn list(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Get the number of registered implementations.
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Check if an implementation with the given name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// Select the server to host.
    ///
    /// Only the chosen implementation's constructor runs.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::NoImplementation`] when nothing is registered.
    pub fn locate(&self) -> Result<LocatedServer, DiscoveryError> {
        let Some((name, constructor)) = self.entries.last() else {
            error!("No pipeline server implementation registered");
            return Err(DiscoveryError::NoImplementation);
        };

        let warning = if self.entries.len() > 1 {
            let message = format!(
                "More than one pipeline server was found ({}), hence might be using the wrong one \"{}\"",
                self.list().join(", "),
                name
            );
            warn!("{}", message);
            Some(message)
        } else {
            None
        };

        let server = constructor();
        info!("Selected pipeline server '{}' ({})", name, server.name());

        Ok(LocatedServer {
            name: name.clone(),
            server,
            warning,
        })
    }
}

impl Default for ServerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
