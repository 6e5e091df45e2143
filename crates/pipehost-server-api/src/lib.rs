//! # pipehost-server-api
//!
//! The capability a hosted pipeline server implements.
//!
//! A server crate depends only on this crate. The daemon discovers one
//! implementation through its registry, hands it a configuration directory,
//! and then drives it through `open` / `is_alive` / `close` for the lifetime
//! of the process.
//!
//! ## Lifecycle contract
//!
//! ```text
//! load_connection_properties(dir)
//!         │
//!         ▼
//!       open() ──► is_alive()? ──► ... ──► close() ──► open() ...
//! ```
//!
//! - `is_alive` must not block and must not fail.
//! - `close` must be safe to call even when `open` never completed.

pub mod error;
pub mod server;

pub use error::{ServerError, ServerResult};
pub use server::PipelineServer;

/// Convenience re-exports for server implementations.
pub mod prelude {
    pub use crate::error::{ServerError, ServerResult};
    pub use crate::server::PipelineServer;
    pub use async_trait::async_trait;
}
