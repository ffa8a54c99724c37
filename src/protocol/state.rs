//! Remote setup/sync protocol state as seen by the client.

use serde::{Deserialize, Serialize};

/// The remote's view of key provisioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupState {
    /// Not loaded yet.
    #[default]
    Unknown,
    /// A sync attempt is in flight.
    Ongoing,
    /// Keys must be synced; a passcode is needed.
    SyncRequired,
    Success,
    Failure,
}

/// Which passcode flow the remote expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPasscodeState {
    /// No passcode exists yet; one must be created.
    New,
    /// A passcode exists and must be re-entered.
    Existing,
    /// Sync is complete; the passcode may only be changed.
    None,
    Unspecified,
}

/// Error reported by the remote for the last sync attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncErrorKind {
    #[default]
    Unspecified,
    Failure,
    IncorrectPasscode,
    Timeout,
}

/// Outcome of a change-passcode command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangePasscodeResult {
    Success,
    /// Worth re-prompting.
    TemporaryFailure,
    Failure,
}

/// Lifecycle of the host application that owns the key sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostState {
    #[default]
    Stopped,
    Starting,
    Started,
}

/// The local user's registration as reported by the remote.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LocalUserRecord {
    pub exists: bool,
    /// Zero until the user is registered.
    pub registration_id: u64,
    /// The user's own identifier in the directory.
    #[serde(default)]
    pub provider_uid: Option<String>,
}

impl LocalUserRecord {
    pub fn registered(registration_id: u64, provider_uid: impl Into<String>) -> Self {
        Self {
            exists: true,
            registration_id,
            provider_uid: Some(provider_uid.into()),
        }
    }

    /// Exists and carries a nonzero registration id.
    pub fn is_registered(&self) -> bool {
        self.exists && self.registration_id != 0
    }
}
