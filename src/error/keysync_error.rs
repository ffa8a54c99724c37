//! Unified error type for keysync.

use std::fmt;

use super::category::ErrorCategory;
use super::config::ConfigError;
use super::context::ErrorContext;
use super::directory::DirectoryError;
use super::keysource::KeySourceError;
use super::protocol::{ProtocolError, ReactiveError};

/// Unified error type.
///
/// Every component-internal failure converts into this type at the
/// boundary where it is logged or surfaced, so callers only ever match on
/// one enum.
#[derive(Debug)]
pub enum KeySyncError {
    Directory(DirectoryError),

    KeySource(KeySourceError),

    Protocol(ProtocolError),

    Reactive(ReactiveError),

    Config(ConfigError),

    /// Malformed JSON payload that is not a directory response.
    Decode { message: String },

    /// Wrapped error with additional context.
    WithContext {
        error: Box<KeySyncError>,
        context: ErrorContext,
    },
}

impl KeySyncError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            KeySyncError::Directory(err) => {
                if err.requires_reauth() {
                    ErrorCategory::Auth
                } else if err.is_retryable() {
                    ErrorCategory::Network
                } else {
                    ErrorCategory::Remote
                }
            }
            KeySyncError::KeySource(KeySourceError::NotInstalled) => ErrorCategory::Configuration,
            KeySyncError::KeySource(_) => ErrorCategory::Remote,
            KeySyncError::Protocol(_) => ErrorCategory::Network,
            KeySyncError::Reactive(_) => ErrorCategory::Client,
            KeySyncError::Config(_) => ErrorCategory::Configuration,
            KeySyncError::Decode { .. } => ErrorCategory::Client,
            KeySyncError::WithContext { error, .. } => error.category(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            KeySyncError::Directory(err) => err.is_retryable(),
            KeySyncError::KeySource(err) => err.is_retryable(),
            KeySyncError::Protocol(ProtocolError::Disconnected) => true,
            KeySyncError::WithContext { error, .. } => error.is_retryable(),
            _ => false,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            KeySyncError::Directory(err) => err.user_message(),
            KeySyncError::KeySource(err) => err.user_message(),
            KeySyncError::Protocol(_) => {
                "Lost contact with the key service. Please try again.".to_string()
            }
            KeySyncError::Reactive(_) | KeySyncError::Decode { .. } => {
                "An internal error occurred.".to_string()
            }
            KeySyncError::Config(err) => format!("Configuration problem: {}", err),
            KeySyncError::WithContext { error, context } => {
                format!("{}\n\nContext: {}", error.user_message(), context)
            }
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            KeySyncError::Directory(err) => err.error_code(),
            KeySyncError::KeySource(err) => err.error_code(),
            KeySyncError::Protocol(err) => err.error_code(),
            KeySyncError::Reactive(err) => err.error_code(),
            KeySyncError::Config(err) => err.error_code(),
            KeySyncError::Decode { .. } => "E_DECODE",
            KeySyncError::WithContext { error, .. } => error.error_code(),
        }
    }

    pub fn with_context(self, ctx: ErrorContext) -> Self {
        KeySyncError::WithContext {
            error: Box::new(self),
            context: ctx,
        }
    }

    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            KeySyncError::WithContext { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Get the inner error without context.
    pub fn inner(&self) -> &KeySyncError {
        match self {
            KeySyncError::WithContext { error, .. } => error.inner(),
            _ => self,
        }
    }

    pub fn recovery_hint(&self) -> &'static str {
        self.category().recovery_hint()
    }
}

impl fmt::Display for KeySyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySyncError::Directory(err) => write!(f, "{}", err),
            KeySyncError::KeySource(err) => write!(f, "{}", err),
            KeySyncError::Protocol(err) => write!(f, "{}", err),
            KeySyncError::Reactive(err) => write!(f, "{}", err),
            KeySyncError::Config(err) => write!(f, "{}", err),
            KeySyncError::Decode { message } => write!(f, "Decode error: {}", message),
            KeySyncError::WithContext { error, context } => {
                write!(f, "{} ({})", error, context)
            }
        }
    }
}

impl std::error::Error for KeySyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            KeySyncError::Directory(err) => Some(err),
            KeySyncError::KeySource(err) => Some(err),
            KeySyncError::Protocol(err) => Some(err),
            KeySyncError::Reactive(err) => Some(err),
            KeySyncError::Config(err) => Some(err),
            KeySyncError::Decode { .. } => None,
            KeySyncError::WithContext { error, .. } => error.source(),
        }
    }
}

// ============================================================================
// From implementations for automatic error conversion
// ============================================================================

impl From<DirectoryError> for KeySyncError {
    fn from(err: DirectoryError) -> Self {
        KeySyncError::Directory(err)
    }
}

impl From<KeySourceError> for KeySyncError {
    fn from(err: KeySourceError) -> Self {
        KeySyncError::KeySource(err)
    }
}

impl From<ProtocolError> for KeySyncError {
    fn from(err: ProtocolError) -> Self {
        KeySyncError::Protocol(err)
    }
}

impl From<ReactiveError> for KeySyncError {
    fn from(err: ReactiveError) -> Self {
        KeySyncError::Reactive(err)
    }
}

impl From<ConfigError> for KeySyncError {
    fn from(err: ConfigError) -> Self {
        KeySyncError::Config(err)
    }
}

impl From<serde_json::Error> for KeySyncError {
    fn from(err: serde_json::Error) -> Self {
        KeySyncError::Decode {
            message: err.to_string(),
        }
    }
}
