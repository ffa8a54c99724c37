//! Passcode error classification.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::SyncErrorKind;

/// Shortest passcode accepted for a new sync.
pub const MIN_PASSCODE_LEN: usize = 6;

/// Why the previous passcode attempt failed, shown with the next prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PasscodeError {
    #[default]
    None,
    IncorrectPasscode,
    SyncFailure,
    SyncTimeout,
    TemporaryFailure,
}

impl PasscodeError {
    pub fn is_none(self) -> bool {
        matches!(self, PasscodeError::None)
    }

    pub fn user_message(self) -> Option<&'static str> {
        match self {
            PasscodeError::None => None,
            PasscodeError::IncorrectPasscode => Some("The passcode was incorrect."),
            PasscodeError::SyncFailure => Some("Key sync failed."),
            PasscodeError::SyncTimeout => Some("Key sync timed out."),
            PasscodeError::TemporaryFailure => {
                Some("The key service is temporarily unavailable. Please try again.")
            }
        }
    }
}

impl From<SyncErrorKind> for PasscodeError {
    fn from(kind: SyncErrorKind) -> Self {
        match kind {
            SyncErrorKind::Failure => PasscodeError::SyncFailure,
            SyncErrorKind::IncorrectPasscode => PasscodeError::IncorrectPasscode,
            SyncErrorKind::Timeout => PasscodeError::SyncTimeout,
            SyncErrorKind::Unspecified => PasscodeError::None,
        }
    }
}

/// A new passcode rejected before it reaches the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PasscodeInputError {
    #[error("passcode must be at least {min} characters")]
    TooShort { min: usize },

    #[error("passcodes do not match")]
    Mismatch,
}

/// Check a newly chosen passcode and its confirmation.
///
/// Existing passcodes are never checked locally; only the remote can judge
/// them.
pub fn validate_new_passcode(passcode: &str, confirmation: &str) -> Result<(), PasscodeInputError> {
    if passcode.chars().count() < MIN_PASSCODE_LEN {
        return Err(PasscodeInputError::TooShort {
            min: MIN_PASSCODE_LEN,
        });
    }
    if passcode != confirmation {
        return Err(PasscodeInputError::Mismatch);
    }
    Ok(())
}
