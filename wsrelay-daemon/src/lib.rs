//! wsrelay daemon library
//!
//! This module re-exports the daemon's modules for integration testing.

pub mod config;
pub mod server;
pub mod sink;

pub use config::RelayConfig;
pub use server::{RelayServer, RelayState};
