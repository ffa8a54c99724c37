//! Result type alias for keysync operations.

use super::context::ErrorContext;
use super::keysync_error::KeySyncError;

/// Type alias for Results using KeySyncError.
pub type KeySyncResult<T> = Result<T, KeySyncError>;

/// Extension trait for Result types to add context to errors.
pub trait ResultExt<T> {
    /// Add context to an error if the result is Err.
    fn context(self, ctx: ErrorContext) -> KeySyncResult<T>;

    /// Add context using a closure (only called on error).
    fn with_context<F>(self, f: F) -> KeySyncResult<T>
    where
        F: FnOnce() -> ErrorContext;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<KeySyncError>,
{
    fn context(self, ctx: ErrorContext) -> KeySyncResult<T> {
        self.map_err(|e| e.into().with_context(ctx))
    }

    fn with_context<F>(self, f: F) -> KeySyncResult<T>
    where
        F: FnOnce() -> ErrorContext,
    {
        self.map_err(|e| e.into().with_context(f()))
    }
}
