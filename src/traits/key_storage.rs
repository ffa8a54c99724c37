//! External key-storage subsystem.
//!
//! The cryptography behind passcode proofs lives outside this crate. Key
//! sources only construct a storage client for an identity and hand it to a
//! key-protection manager.

use std::rc::Rc;

use crate::error::KeySourceError;

/// A provider-specific key-storage client bound to one identity.
pub trait KeyStorageClient {
    /// Identity the client was created for.
    fn identifier(&self) -> &str;
}

/// Builds key-storage clients once a provider's identity is known.
pub trait KeyStorageFactory {
    fn create(&self, identifier: &str) -> Result<Box<dyn KeyStorageClient>, KeySourceError>;
}

/// Receives failures the manager detects after it started.
pub type FailureListener = Rc<dyn Fn(KeySourceError)>;

/// The generic key-protection manager run against a storage client.
pub trait KeyProtectionManager {
    fn start(
        &self,
        client: Box<dyn KeyStorageClient>,
        on_failure: FailureListener,
    ) -> Result<(), KeySourceError>;

    fn stop(&self);

    fn change_passcode(&self);

    fn forgot_passcode(&self);

    fn retry_failed_events(&self);
}
