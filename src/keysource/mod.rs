//! Pluggable key sources.
//!
//! A key source stores and retrieves encryption keys in an external system,
//! gated by a passcode. Three providers exist:
//!
//! - [`PasscodeKeySource`]: challenge-backed; drives the remote setup/sync
//!   protocol and prompts for passcodes.
//! - [`ManagedKeySource::directory`]: waits for the directory's
//!   authenticated identifier, then runs the key-protection manager.
//! - [`ManagedKeySource::push_identity`]: the same, keyed on the push
//!   service identity.
//!
//! Exactly one is active at a time, held by a [`KeySourceRegistry`].

mod challenge;
mod managed;
mod passcode;
mod registry;

pub use challenge::PasscodeKeySource;
pub use managed::{identifier_when_started, ManagedKeySource, Readiness};
pub use passcode::{validate_new_passcode, PasscodeError, PasscodeInputError, MIN_PASSCODE_LEN};
pub use registry::KeySourceRegistry;

use serde::{Deserialize, Serialize};

use crate::error::KeySyncResult;

/// Which provider a key source is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySourceKind {
    #[default]
    Challenge,
    Directory,
    PushIdentity,
}

impl KeySourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            KeySourceKind::Challenge => "challenge",
            KeySourceKind::Directory => "directory",
            KeySourceKind::PushIdentity => "push_identity",
        }
    }
}

/// Capability set shared by every key-source provider.
///
/// `start` and `stop` must be safe to repeat; `stop` must leave no monitor
/// behind.
pub trait KeySource {
    fn kind(&self) -> KeySourceKind;

    fn start(&self) -> KeySyncResult<()>;

    fn stop(&self);

    fn change_passcode(&self);

    fn forgot_passcode(&self);

    fn retry_failed_events(&self);
}
