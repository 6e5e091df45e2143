//! pipehost daemon library
//!
//! This module exports the internal components of the daemon so the binary
//! and the integration tests share them.

pub mod config;
pub mod config_path;
pub mod controller;
pub mod error;
pub mod registry;
pub mod status;
pub mod supervisor;
