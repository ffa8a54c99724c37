//! Commands the client sends to the remote sync protocol.

use std::fmt;

/// Passcode flow selected for a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncAction {
    New,
    Existing,
}

#[derive(Clone, PartialEq, Eq)]
pub enum SyncCommand {
    StartSync { action: SyncAction, passcode: String },
    ChangePasscode { passcode: String },
}

impl SyncCommand {
    /// Short name for logs and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncCommand::StartSync {
                action: SyncAction::New,
                ..
            } => "start_sync_new",
            SyncCommand::StartSync {
                action: SyncAction::Existing,
                ..
            } => "start_sync_existing",
            SyncCommand::ChangePasscode { .. } => "change_passcode",
        }
    }

    pub fn passcode(&self) -> &str {
        match self {
            SyncCommand::StartSync { passcode, .. } | SyncCommand::ChangePasscode { passcode } => {
                passcode
            }
        }
    }
}

// Keeps passcodes out of logs.
impl fmt::Debug for SyncCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncCommand::StartSync { action, .. } => f
                .debug_struct("StartSync")
                .field("action", action)
                .field("passcode", &"<redacted>")
                .finish(),
            SyncCommand::ChangePasscode { .. } => f
                .debug_struct("ChangePasscode")
                .field("passcode", &"<redacted>")
                .finish(),
        }
    }
}
