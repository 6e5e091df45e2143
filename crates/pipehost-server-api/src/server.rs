//! The `PipelineServer` trait.

use crate::error::ServerResult;
use async_trait::async_trait;
use std::path::Path;

/// A long-running server hosted by the pipehost daemon.
///
/// The daemon holds the server as `Arc<dyn PipelineServer>`: the supervisor
/// task is the only caller of the lifecycle methods, while the host keeps a
/// read-only handle for exposure. Implementations therefore use interior
/// mutability for their connection state.
#[async_trait]
pub trait PipelineServer: Send + Sync {
    /// Stable identifier of the implementation (e.g. `"dummy"`).
    fn id(&self) -> &str;

    /// Human readable name.
    fn name(&self) -> &str;

    /// Load the persisted connection settings from `dir`.
    ///
    /// Called once, before the first `open`. The directory exists.
    async fn load_connection_properties(&self, dir: &Path) -> ServerResult<()>;

    /// Open the server's connection.
    async fn open(&self) -> ServerResult<()>;

    /// Whether the server is still functioning. Must not block.
    fn is_alive(&self) -> bool;

    /// Close the server's connection.
    ///
    /// Idempotent; safe to call when `open` failed or was never called.
    async fn close(&self) -> ServerResult<()>;
}
