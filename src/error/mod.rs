//! Unified error handling for keysync.
//!
//! - **Error Categories**: High-level classification for handling decisions
//! - **Domain-specific Errors**: Directory, KeySource, Protocol, Reactive and Config errors
//! - **Unified Error Type**: `KeySyncError` consolidates all error types
//! - **Error Context**: Debugging information attached to errors
//! - **Result Type Alias**: `KeySyncResult<T>` for consistent return types
//!
//! # Error Categories
//!
//! | Category | Description | Retryable |
//! |----------|-------------|-----------|
//! | Network | Directory or protocol unreachable | Yes |
//! | Auth | Directory token rejected | No |
//! | Remote | Key-protection service failure | Yes |
//! | Client | Programming errors | No |
//! | User | User action required | No |
//! | Configuration | Config issues | No |

mod category;
mod config;
mod context;
mod directory;
mod keysource;
mod keysync_error;
mod protocol;
mod result;

pub use category::ErrorCategory;
pub use config::ConfigError;
pub use context::ErrorContext;
pub use directory::DirectoryError;
pub use keysource::KeySourceError;
pub use keysync_error::KeySyncError;
pub use protocol::{ProtocolError, ReactiveError};
pub use result::{KeySyncResult, ResultExt};
