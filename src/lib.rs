//! keysync - reactive passcode-protected key synchronization.
//!
//! This library exposes modules for use in integration tests.

pub mod adapters;
pub mod config;
pub mod error;
pub mod identity;
pub mod keysource;
pub mod protocol;
pub mod reactive;
pub mod session;
pub mod stats;
pub mod traits;
