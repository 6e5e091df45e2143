//! Lifecycle supervision of the hosted server.
//!
//! This module implements the `Supervisor`, a single background task that
//! keeps the hosted server running for the lifetime of the process:
//!
//! - Opens the server and polls its liveness on a fixed interval
//! - Closes the server when liveness lapses, then restarts it
//! - Exponential backoff between restarts after consecutive lapses
//! - Graceful shutdown through a cancellation token
//! - Publishes fatal lifecycle errors to the status slot
//!
//! # State machine
//!
//! ```text
//! Stopped ──► Opening ──► Alive ──► Closing ──► Opening ──► ...
//!                                      │
//!                                      └──► Stopped   (stop signal or fatal error)
//! ```
//!
//! A liveness lapse always leads to a restart. A failing `open` or `close`
//! ends supervision for good; the error is recorded in the status slot and
//! the server is not retried.
//!
//! # Example
//!
//! ```no_run
//! use pipehost_daemon::status::StatusSlot;
//! use pipehost_daemon::supervisor::{Supervisor, SupervisorSettings};
//! use server_dummy::DummyServer;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() {
//! let server = Arc::new(DummyServer::new());
//! let supervisor = Supervisor::new(server, SupervisorSettings::default(), StatusSlot::new());
//!
//! let mut handle = supervisor.spawn(CancellationToken::new());
//!
//! // Later: shutdown gracefully
//! handle.stop().await;
//! # }
//! ```

use chrono::{DateTime, Utc};
use pipehost_server_api::PipelineServer;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::HostError;
use crate::status::{FaultKind, StatusSlot};

/// Liveness poll interval used unless configured otherwise.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

// ============================================================================
// Supervisor State Types
// ============================================================================

/// Where the supervisor is in the server's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupervisorState {
    /// Not supervising; initial and terminal state
    Stopped,
    /// `open` is in progress
    Opening,
    /// The server is open and being polled
    Alive,
    /// `close` is in progress
    Closing,
}

/// Snapshot of the supervisor's progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorReport {
    /// Current lifecycle state
    pub state: SupervisorState,
    /// Number of successful `open` calls
    pub cycles: u64,
    /// Number of restarts after a liveness lapse
    pub restarts: u64,
    /// Lapses in a row without a passing liveness check
    pub consecutive_lapses: u32,
    /// Last time `open` succeeded
    pub last_opened_at: Option<DateTime<Utc>>,
    /// Last time liveness lapsed
    pub last_lapse_at: Option<DateTime<Utc>>,
}

impl SupervisorReport {
    fn new() -> Self {
        Self {
            state: SupervisorState::Stopped,
            cycles: 0,
            restarts: 0,
            consecutive_lapses: 0,
            last_opened_at: None,
            last_lapse_at: None,
        }
    }
}

/// Delay applied before restarting a server whose liveness lapsed.
///
/// The delay doubles with each consecutive lapse, starting at `initial` and
/// capped at `max`. A zero `initial` restarts immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartBackoff {
    pub initial: Duration,
    pub max: Duration,
}

impl RestartBackoff {
    /// Restart immediately after every lapse.
    pub fn disabled() -> Self {
        Self {
            initial: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    /// Delay before the restart following `consecutive_lapses` lapses.
    pub fn delay(&self, consecutive_lapses: u32) -> Duration {
        if self.initial.is_zero() || consecutive_lapses == 0 {
            return Duration::ZERO;
        }

        let factor = 1_u32 << (consecutive_lapses - 1).min(16);
        self.initial.saturating_mul(factor).min(self.max)
    }
}

impl Default for RestartBackoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(60),
        }
    }
}

/// Timing knobs of the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorSettings {
    pub poll_interval: Duration,
    pub restart_backoff: RestartBackoff,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            restart_backoff: RestartBackoff::default(),
        }
    }
}

/// How a supervision cycle ended without a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleEnd {
    /// The stop signal was raised.
    Stopped,
    /// `is_alive` returned false. `was_alive` is set when at least one check passed.
    Lapsed { was_alive: bool },
}

// ============================================================================
// Supervisor
// ============================================================================

/// Runs the open / poll / close loop of one hosted server.
pub struct Supervisor {
    server: Arc<dyn PipelineServer>,
    settings: SupervisorSettings,
    status: StatusSlot,
    report_tx: watch::Sender<SupervisorReport>,
}

impl Supervisor {
    /// Create a supervisor for `server`.
    ///
    /// Fatal lifecycle errors are recorded in `status`.
    pub fn new(
        server: Arc<dyn PipelineServer>,
        settings: SupervisorSettings,
        status: StatusSlot,
    ) -> Self {
        let (report_tx, _report_rx) = watch::channel(SupervisorReport::new());

        Self {
            server,
            settings,
            status,
            report_tx,
        }
    }

    /// Subscribe to report updates.
    pub fn subscribe(&self) -> watch::Receiver<SupervisorReport> {
        self.report_tx.subscribe()
    }

    /// Run the supervisor on a background task until `cancel` fires.
    pub fn spawn(self, cancel: CancellationToken) -> SupervisorHandle {
        let report = self.subscribe();
        let join = tokio::spawn(self.run(cancel.clone()));

        SupervisorHandle {
            cancel,
            join: Some(join),
            report,
        }
    }

    /// Supervise the server until `cancel` fires or a fatal error occurs.
    pub async fn run(self, cancel: CancellationToken) {
        let id = self.server.id().to_string();
        info!("Supervisor for '{}' started", id);

        while !cancel.is_cancelled() {
            match self.run_cycle(&cancel).await {
                Ok(CycleEnd::Stopped) => break,
                Ok(CycleEnd::Lapsed { was_alive }) => {
                    let lapses = self.record_lapse(was_alive);
                    let delay = self.settings.restart_backoff.delay(lapses);

                    if delay.is_zero() {
                        tokio::task::yield_now().await;
                    } else {
                        warn!(
                            "Server '{}' lapsed {} time(s) in a row, next restart in {:?}",
                            id, lapses, delay
                        );
                        if !wait(&cancel, delay).await {
                            break;
                        }
                    }

                    if cancel.is_cancelled() {
                        break;
                    }

                    info!("Restarting server '{}'", id);
                    self.report_tx.send_modify(|r| r.restarts += 1);
                }
                Err(e) => {
                    error!("Supervisor for '{}' terminated permanently: {}", id, e);
                    self.status.record(FaultKind::Lifecycle, e.to_string());
                    break;
                }
            }
        }

        self.set_state(SupervisorState::Stopped);
        info!("Supervisor for '{}' stopped", id);
    }

    /// Run one open / poll / close cycle.
    ///
    /// `close` is called exactly once on every path out of this function.
    async fn run_cycle(&self, cancel: &CancellationToken) -> Result<CycleEnd, HostError> {
        let id = self.server.id();

        self.set_state(SupervisorState::Opening);
        debug!("Opening server '{}'", id);

        if let Err(e) = self.server.open().await {
            if e.is_configuration() {
                warn!("Server '{}' rejected its connection properties: {}", id, e);
            } else {
                warn!("Server '{}' failed to connect: {}", id, e);
            }
            self.set_state(SupervisorState::Closing);
            if let Err(close_err) = self.server.close().await {
                warn!("Closing server '{}' after failed open: {}", id, close_err);
            }
            return Err(HostError::Lifecycle(e));
        }

        self.report_tx.send_modify(|r| {
            r.state = SupervisorState::Alive;
            r.cycles += 1;
            r.last_opened_at = Some(Utc::now());
        });
        info!("Server '{}' is open", id);

        let mut was_alive = false;
        let stopped = loop {
            if cancel.is_cancelled() {
                break true;
            }
            if !self.server.is_alive() {
                break false;
            }
            was_alive = true;
            if !wait(cancel, self.settings.poll_interval).await {
                break true;
            }
        };

        if !stopped {
            warn!("Server '{}' is no longer alive", id);
        }

        self.set_state(SupervisorState::Closing);
        self.server.close().await.map_err(HostError::Lifecycle)?;
        info!("Server '{}' closed", id);

        Ok(if stopped {
            CycleEnd::Stopped
        } else {
            CycleEnd::Lapsed { was_alive }
        })
    }

    fn record_lapse(&self, was_alive: bool) -> u32 {
        let mut lapses = 0;
        self.report_tx.send_modify(|r| {
            r.consecutive_lapses = if was_alive { 1 } else { r.consecutive_lapses + 1 };
            r.last_lapse_at = Some(Utc::now());
            lapses = r.consecutive_lapses;
        });
        lapses
    }

    fn set_state(&self, state: SupervisorState) {
        self.report_tx.send_modify(|r| r.state = state);
    }
}

/// Sleep for `duration` unless cancelled first. Returns false when cancelled.
async fn wait(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = sleep(duration) => !cancel.is_cancelled(),
    }
}

// ============================================================================
// SupervisorHandle
// ============================================================================

/// Handle to a spawned supervisor task.
pub struct SupervisorHandle {
    cancel: CancellationToken,
    join: Option<JoinHandle<()>>,
    report: watch::Receiver<SupervisorReport>,
}

impl SupervisorHandle {
    /// Latest report published by the supervisor.
    pub fn report(&self) -> SupervisorReport {
        self.report.borrow().clone()
    }

    /// Subscribe to report updates.
    pub fn subscribe(&self) -> watch::Receiver<SupervisorReport> {
        self.report.clone()
    }

    /// Whether the supervisor task has exited.
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, |join| join.is_finished())
    }

    /// Signal the supervisor to stop and wait until it has closed the server.
    ///
    /// Calling this more than once is harmless.
    pub async fn stop(&mut self) {
        self.cancel.cancel();

        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                error!("Supervisor task failed: {}", e);
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
