//! Configuration file loading and management
//!
//! This module handles loading and parsing the daemon configuration from
//! `$XDG_CONFIG_HOME/pipehost/config.toml`. If the configuration file doesn't
//! exist, a default configuration is created with documented comments.
//!
//! The `PIPEHOST_CONFIG` environment variable points the daemon at another
//! configuration file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::supervisor::{RestartBackoff, SupervisorSettings};

/// Environment variable overriding the configuration file location.
pub const CONFIG_ENV: &str = "PIPEHOST_CONFIG";

/// Default name of the resource holding a shared configuration root.
pub const DEFAULT_CONFIG_ROOT_RESOURCE: &str = "PIPEHOST_CONFIG_ROOT";

/// Main daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct HostConfig {
    /// Host-specific configuration
    #[serde(default)]
    pub host: HostSection,
    /// Supervisor timing configuration
    #[serde(default)]
    pub supervisor: SupervisorSection,
}

/// Host configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HostSection {
    /// Log level (trace, debug, info, warn, error)
    /// Default: "info"
    pub log_level: String,
    /// Logical name of this deployment, appended to the shared configuration root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_name: Option<String>,
    /// Name of the resource (environment variable) holding the shared configuration root
    /// Default: "PIPEHOST_CONFIG_ROOT"
    pub config_root_resource: String,
    /// Directory used when no shared configuration root applies
    /// If None, uses XDG_DATA_HOME/pipehost/connector
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_root: Option<PathBuf>,
}

/// Supervisor timing configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SupervisorSection {
    /// Liveness poll interval in seconds
    /// Default: 60
    pub poll_interval_secs: u64,
    /// First restart delay after a liveness lapse, 0 restarts immediately
    /// Default: 1
    pub restart_backoff_initial_secs: u64,
    /// Upper bound of the restart delay
    /// Default: 60
    pub restart_backoff_max_secs: u64,
}

impl Default for HostSection {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            deployment_name: None,
            config_root_resource: DEFAULT_CONFIG_ROOT_RESOURCE.to_string(),
            fallback_root: None,
        }
    }
}

impl Default for SupervisorSection {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            restart_backoff_initial_secs: 1,
            restart_backoff_max_secs: 60,
        }
    }
}

impl HostConfig {
    /// Load configuration from the specified path
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    /// The parsed configuration or an error if loading/parsing fails
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: HostConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `PIPEHOST_CONFIG` or the default XDG config location
    ///
    /// If the default configuration file doesn't exist, creates a default
    /// configuration file with documented comments.
    pub fn load_default() -> Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::load(path);
        }

        let config_path = Self::default_config_path()?;

        if !config_path.exists() {
            Self::create_default_file(&config_path)?;
        }

        Self::load(&config_path)
    }

    /// Get the default configuration file path
    ///
    /// Returns `$XDG_CONFIG_HOME/pipehost/config.toml`
    pub fn default_config_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("", "raibid-labs", "pipehost")
            .context("Failed to determine project directories")?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Create a default configuration file with documented comments
    fn create_default_file(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, Self::default_config_content())
            .with_context(|| format!("Failed to write default config file: {}", path.display()))?;

        tracing::info!("Created default configuration file at: {}", path.display());
        Ok(())
    }

    /// Generate the default configuration file content with comments
    fn default_config_content() -> String {
        r#"# pipehost Daemon Configuration
# This file configures how the daemon locates and supervises its server.

[host]
# Log level: trace, debug, info, warn, error
# Default: "info"
log_level = "info"

# Logical name of this deployment. When the shared configuration root below
# is set, the server's settings live in <root>/<deployment_name>.
# deployment_name = "orders"

# Environment variable naming the shared configuration root
# Default: "PIPEHOST_CONFIG_ROOT"
config_root_resource = "PIPEHOST_CONFIG_ROOT"

# Directory used when no shared configuration root applies
# If not specified, defaults to $XDG_DATA_HOME/pipehost/connector
# fallback_root = "/path/to/connector"

[supervisor]
# How often the server's liveness is checked, in seconds
# Default: 60
poll_interval_secs = 60

# Delay before restarting a server whose liveness lapsed. The delay doubles
# on each consecutive lapse up to the maximum. 0 restarts immediately.
# Default: 1 / 60
restart_backoff_initial_secs = 1
restart_backoff_max_secs = 60
"#
        .to_string()
    }

    /// Validate the configuration
    ///
    /// Ensures all configuration values are valid and within acceptable ranges.
    pub fn validate(&self) -> Result<()> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.host.log_level.as_str()) {
            anyhow::bail!(
                "Invalid log_level: {}. Must be one of: {}",
                self.host.log_level,
                valid_log_levels.join(", ")
            );
        }

        if self.host.config_root_resource.trim().is_empty() {
            anyhow::bail!("host.config_root_resource must not be empty");
        }

        if self.supervisor.poll_interval_secs == 0 {
            anyhow::bail!("supervisor.poll_interval_secs must be greater than 0");
        }

        if self.supervisor.restart_backoff_max_secs < self.supervisor.restart_backoff_initial_secs
        {
            anyhow::bail!(
                "supervisor.restart_backoff_max_secs ({}) must not be below restart_backoff_initial_secs ({})",
                self.supervisor.restart_backoff_max_secs,
                self.supervisor.restart_backoff_initial_secs
            );
        }

        Ok(())
    }

    /// Get the fallback configuration root
    ///
    /// Returns the configured fallback root or the default XDG data directory path
    pub fn fallback_root(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.host.fallback_root {
            return Ok(path.clone());
        }

        let dirs = directories::ProjectDirs::from("", "raibid-labs", "pipehost")
            .context("Failed to determine project directories")?;

        Ok(dirs.data_dir().join("connector"))
    }

    /// Supervisor settings derived from the `[supervisor]` section
    pub fn supervisor_settings(&self) -> SupervisorSettings {
        SupervisorSettings {
            poll_interval: Duration::from_secs(self.supervisor.poll_interval_secs),
            restart_backoff: RestartBackoff {
                initial: Duration::from_secs(self.supervisor.restart_backoff_initial_secs),
                max: Duration::from_secs(self.supervisor.restart_backoff_max_secs),
            },
        }
    }
}
