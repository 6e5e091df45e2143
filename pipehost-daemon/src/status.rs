//! The status slot: the most recent fault recorded by the host.
//!
//! Startup code and the supervisor task write to the slot; anyone holding a
//! clone can read it at any time. Each write replaces the previous fault and
//! no history is kept.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

/// Category of a recorded fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaultKind {
    /// No server implementation was registered.
    Discovery,
    /// Several implementations were registered and one was picked.
    DiscoveryAmbiguity,
    /// The server failed to load its connection properties.
    ConfigLoad,
    /// `open` or `close` failed and supervision stopped.
    Lifecycle,
}

/// A recorded fault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fault {
    pub kind: FaultKind,
    pub message: String,
    pub recorded_at: DateTime<Utc>,
}

/// Shared, replace-only cell holding the last fault.
#[derive(Debug, Clone)]
pub struct StatusSlot {
    tx: Arc<watch::Sender<Option<Fault>>>,
}

impl StatusSlot {
    /// Create an empty slot.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Record a fault, replacing whatever was there.
    pub fn record(&self, kind: FaultKind, message: impl Into<String>) {
        self.tx.send_replace(Some(Fault {
            kind,
            message: message.into(),
            recorded_at: Utc::now(),
        }));
    }

    /// The last recorded fault.
    pub fn current(&self) -> Option<Fault> {
        self.tx.borrow().clone()
    }

    /// The last recorded fault message.
    pub fn message(&self) -> Option<String> {
        self.tx.borrow().as_ref().map(|f| f.message.clone())
    }

    /// Subscribe to fault updates.
    pub fn subscribe(&self) -> watch::Receiver<Option<Fault>> {
        self.tx.subscribe()
    }
}

impl Default for StatusSlot {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_slot() {
        let slot = StatusSlot::new();
        assert!(slot.current().is_none());
        assert!(slot.message().is_none());
    }

    #[test]
    fn test_last_write_wins() {
        let slot = StatusSlot::new();
        slot.record(FaultKind::DiscoveryAmbiguity, "two servers");
        slot.record(FaultKind::Lifecycle, "connection refused");

        let fault = slot.current().unwrap();
        assert_eq!(fault.kind, FaultKind::Lifecycle);
        assert_eq!(slot.message().as_deref(), Some("connection refused"));
    }

    #[test]
    fn test_clones_share_the_slot() {
        let slot = StatusSlot::new();
        let writer = slot.clone();
        writer.record(FaultKind::ConfigLoad, "bad properties");

        assert_eq!(slot.message().as_deref(), Some("bad properties"));
    }

    #[tokio::test]
    async fn test_subscribe_sees_updates() {
        let slot = StatusSlot::new();
        let mut rx = slot.subscribe();

        slot.record(FaultKind::Discovery, "nothing registered");
        rx.changed().await.unwrap();

        let fault = rx.borrow().clone().unwrap();
        assert_eq!(fault.kind, FaultKind::Discovery);
    }

    #[test]
    fn test_fault_kind_serialization() {
        let json = serde_json::to_string(&FaultKind::ConfigLoad).unwrap();
        assert_eq!(json, r#""ConfigLoad""#);
    }
}
