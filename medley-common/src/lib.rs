//! Shared foundation for the Medley management console core
//!
//! Provides the pieces every console subsystem depends on:
//! - Common error type and `Result` alias
//! - Console configuration (TOML)
//! - RPC transport boundary (single and batched "multi" requests)
//! - Durable per-view preference storage
//! - Debounced invalidation scheduler for coalesced recomputation

pub mod config;
pub mod debounce;
pub mod error;
pub mod prefs;
pub mod rpc;

pub use config::ConsoleConfig;
pub use error::{Error, Result};
