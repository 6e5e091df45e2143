//! Test fixtures for integration tests.
//!
//! This module provides a scripted server and helper functions for testing.

#![allow(dead_code)]

use async_trait::async_trait;
use pipehost_daemon::config::HostConfig;
use pipehost_server_api::{PipelineServer, ServerError, ServerResult};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A server whose behavior is scripted by the test.
pub struct ScriptedServer {
    id: String,
    alive: Mutex<VecDeque<bool>>,
    alive_default: bool,
    fail_load: bool,
    fail_open_calls: Vec<usize>,
    loaded_from: Mutex<Option<PathBuf>>,
    opens: AtomicUsize,
    closes: AtomicUsize,
}

impl ScriptedServer {
    /// A server that stays alive until stopped.
    pub fn healthy(id: &str) -> Self {
        Self {
            id: id.to_string(),
            alive: Mutex::new(VecDeque::new()),
            alive_default: true,
            fail_load: false,
            fail_open_calls: Vec::new(),
            loaded_from: Mutex::new(None),
            opens: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
        }
    }

    /// Liveness answers returned before falling back to `default`.
    pub fn with_alive(mut self, script: &[bool], default: bool) -> Self {
        self.alive = Mutex::new(script.iter().copied().collect());
        self.alive_default = default;
        self
    }

    /// Fail `load_connection_properties`.
    pub fn failing_load(mut self) -> Self {
        self.fail_load = true;
        self
    }

    /// Fail the given (1-based) `open` calls.
    pub fn failing_open_on(mut self, calls: &[usize]) -> Self {
        self.fail_open_calls = calls.to_vec();
        self
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn loaded_from(&self) -> Option<PathBuf> {
        self.loaded_from.lock().unwrap().clone()
    }
}

#[async_trait]
impl PipelineServer for ScriptedServer {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        "Scripted Server"
    }

    async fn load_connection_properties(&self, dir: &Path) -> ServerResult<()> {
        *self.loaded_from.lock().unwrap() = Some(dir.to_path_buf());
        if self.fail_load {
            return Err(ServerError::Properties("scripted load failure".to_string()));
        }
        Ok(())
    }

    async fn open(&self) -> ServerResult<()> {
        let call = self.opens.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_open_calls.contains(&call) {
            return Err(ServerError::Connection(format!(
                "scripted open failure on call {}",
                call
            )));
        }
        Ok(())
    }

    fn is_alive(&self) -> bool {
        self.alive
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.alive_default)
    }

    async fn close(&self) -> ServerResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Wrap a shared server into a registry constructor.
pub fn constructor(
    server: &Arc<ScriptedServer>,
) -> impl Fn() -> Arc<dyn PipelineServer> + Send + Sync + 'static {
    let server = Arc::clone(server);
    move || Arc::clone(&server) as Arc<dyn PipelineServer>
}

/// A host configuration with a fallback root inside `root`.
pub fn create_test_config(root: &Path) -> HostConfig {
    let mut config = HostConfig::default();
    config.host.fallback_root = Some(root.join("connector"));
    config.supervisor.poll_interval_secs = 60;
    config.supervisor.restart_backoff_initial_secs = 1;
    config.supervisor.restart_backoff_max_secs = 8;
    config
}
