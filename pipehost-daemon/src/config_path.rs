//! Resolution of the directory holding the hosted server's connection settings.
//!
//! The directory is looked up in this order:
//!
//! 1. A named resource (an environment variable by default) naming a shared
//!    configuration root. The deployment's logical name is appended to it, so
//!    several deployments can share one root.
//! 2. The fallback root shipped with the host installation.
//!
//! A resource without a usable deployment name is ignored, since the bare
//! root cannot tell deployments apart. Relative roots are anchored at the
//! working directory, so the resolved directory is always absolute. It is
//! created if it does not exist.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Lookup of named resources supplied by the hosting environment.
pub trait ResourceLookup: Send + Sync {
    /// Return the value of `name`, or `None` when it is not defined.
    fn lookup(&self, name: &str) -> Option<String>;
}

/// Looks resources up in the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvLookup;

impl ResourceLookup for EnvLookup {
    fn lookup(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Fixed set of resources, used when the host supplies values directly.
#[derive(Debug, Clone, Default)]
pub struct StaticLookup {
    values: HashMap<String, String>,
}

impl StaticLookup {
    /// Create an empty lookup.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource value.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

impl ResourceLookup for StaticLookup {
    fn lookup(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }
}

/// Resolves the configuration directory of the hosted server.
pub struct ConfigPathResolver {
    lookup: Box<dyn ResourceLookup>,
    resource_name: String,
}

impl ConfigPathResolver {
    /// Create a resolver reading the configuration root from `resource_name`.
    pub fn new(lookup: Box<dyn ResourceLookup>, resource_name: impl Into<String>) -> Self {
        Self {
            lookup,
            resource_name: resource_name.into(),
        }
    }

    /// Name of the resource consulted for the configuration root.
    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    /// Resolve the configuration directory and make sure it exists.
    ///
    /// Never fails. When the directory cannot be created the path is still
    /// returned and the server's own property load reports the problem.
    pub fn resolve(&self, deployment_name: Option<&str>, fallback_root: &Path) -> PathBuf {
        let dir = self
            .from_resource(deployment_name)
            .unwrap_or_else(|| fallback_root.to_path_buf());
        let dir = make_absolute(dir);

        ensure_dir(&dir);
        dir
    }

    fn from_resource(&self, deployment_name: Option<&str>) -> Option<PathBuf> {
        let root = match self.lookup.lookup(&self.resource_name) {
            Some(root) if !root.trim().is_empty() => root,
            _ => {
                info!(
                    "Configuration root \"{}\" not found, using the fallback directory as root for the settings",
                    self.resource_name
                );
                return None;
            }
        };

        match deployment_name.map(str::trim).filter(|name| is_usable_segment(name)) {
            Some(name) => {
                let dir = PathBuf::from(root).join(name);
                debug!("Configuration root resolved from \"{}\": {}", self.resource_name, dir.display());
                Some(dir)
            }
            None => {
                info!(
                    "Configuration root \"{}\" was found but the deployment has no usable name",
                    self.resource_name
                );
                None
            }
        }
    }
}

fn is_usable_segment(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

fn make_absolute(dir: PathBuf) -> PathBuf {
    if dir.is_absolute() {
        return dir;
    }

    match std::path::absolute(&dir) {
        Ok(absolute) => absolute,
        Err(e) => {
            warn!(
                "Cannot anchor relative config directory \"{}\" at the working directory: {}",
                dir.display(),
                e
            );
            dir
        }
    }
}

fn ensure_dir(dir: &Path) {
    if dir.is_dir() {
        return;
    }

    match fs::create_dir_all(dir) {
        Ok(()) => info!(
            "The config root directory \"{}\" does not exist - created it",
            dir.display()
        ),
        Err(e) => warn!(
            "Failed to create config root directory \"{}\": {}",
            dir.display(),
            e
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const RESOURCE: &str = "PIPEHOST_CONFIG_ROOT";

    fn resolver(lookup: StaticLookup) -> ConfigPathResolver {
        ConfigPathResolver::new(Box::new(lookup), RESOURCE)
    }

    #[test]
    fn test_resource_with_deployment_name() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("shared");
        let fallback = temp_dir.path().join("fallback");

        let resolver = resolver(StaticLookup::new().with(RESOURCE, root.to_string_lossy()));
        let dir = resolver.resolve(Some("orders"), &fallback);

        assert_eq!(dir, root.join("orders"));
        assert!(dir.is_dir());
        assert!(!fallback.exists());
    }

    #[test]
    fn test_resource_without_deployment_name_uses_fallback() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("shared");
        let fallback = temp_dir.path().join("fallback");

        let resolver = resolver(StaticLookup::new().with(RESOURCE, root.to_string_lossy()));
        let dir = resolver.resolve(None, &fallback);

        assert_eq!(dir, fallback);
        assert!(dir.is_dir());
        assert!(!root.exists());
    }

    #[test]
    fn test_unusable_deployment_names_use_fallback() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("shared");
        let fallback = temp_dir.path().join("fallback");

        let resolver = resolver(StaticLookup::new().with(RESOURCE, root.to_string_lossy()));
        for name in ["", "   ", ".", "..", "a/b", "a\\b"] {
            assert_eq!(resolver.resolve(Some(name), &fallback), fallback);
        }
    }

    #[test]
    fn test_missing_resource_uses_fallback() {
        let temp_dir = TempDir::new().unwrap();
        let fallback = temp_dir.path().join("nested").join("fallback");

        let resolver = resolver(StaticLookup::new());
        let dir = resolver.resolve(Some("orders"), &fallback);

        assert_eq!(dir, fallback);
        assert!(dir.is_dir());
    }

    #[test]
    fn test_empty_resource_uses_fallback() {
        let temp_dir = TempDir::new().unwrap();
        let fallback = temp_dir.path().join("fallback");

        let resolver = resolver(StaticLookup::new().with(RESOURCE, ""));
        assert_eq!(resolver.resolve(Some("orders"), &fallback), fallback);
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("shared");
        let fallback = temp_dir.path().join("fallback");

        let resolver = resolver(StaticLookup::new().with(RESOURCE, root.to_string_lossy()));
        let first = resolver.resolve(Some("orders"), &fallback);
        let second = resolver.resolve(Some("orders"), &fallback);

        assert_eq!(first, second);
        assert!(second.is_dir());
    }

    #[test]
    fn test_uncreatable_directory_still_returned() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("file");
        fs::write(&blocker, "not a directory").unwrap();
        let fallback = blocker.join("connector");

        let resolver = resolver(StaticLookup::new());
        let dir = resolver.resolve(None, &fallback);

        assert_eq!(dir, fallback);
        assert!(!dir.exists());
    }

    #[test]
    fn test_deployment_name_is_trimmed() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("shared");
        let fallback = temp_dir.path().join("fallback");

        let resolver = resolver(StaticLookup::new().with(RESOURCE, root.to_string_lossy()));
        let dir = resolver.resolve(Some("  orders \t"), &fallback);

        assert_eq!(dir, root.join("orders"));
        assert!(dir.is_dir());
    }

    #[test]
    fn test_relative_roots_become_absolute() {
        let cwd = std::env::current_dir().unwrap();
        let unique = format!("pipehost-relative-{}", std::process::id());
        let root = format!("target/{}/shared", unique);
        let fallback = PathBuf::from(format!("target/{}/fallback", unique));

        let with_root = resolver(StaticLookup::new().with(RESOURCE, root.as_str()));
        let dir = with_root.resolve(Some("orders"), &fallback);
        assert!(dir.is_absolute());
        assert_eq!(dir, cwd.join(&root).join("orders"));
        assert!(dir.is_dir());

        let without_root = resolver(StaticLookup::new());
        let dir = without_root.resolve(Some("orders"), &fallback);
        assert!(dir.is_absolute());
        assert_eq!(dir, cwd.join(&fallback));
        assert!(dir.is_dir());

        fs::remove_dir_all(cwd.join("target").join(&unique)).unwrap();
    }

    #[test]
    fn test_resource_name() {
        assert_eq!(resolver(StaticLookup::new()).resource_name(), RESOURCE);
    }

    #[test]
    fn test_env_lookup() {
        assert!(EnvLookup
            .lookup("PIPEHOST_TEST_SURELY_UNDEFINED_VARIABLE")
            .is_none());
    }
}
