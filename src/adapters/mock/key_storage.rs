//! Key-storage doubles.

use std::cell::RefCell;

use crate::error::KeySourceError;
use crate::traits::{FailureListener, KeyProtectionManager, KeyStorageClient, KeyStorageFactory};

#[derive(Debug)]
pub struct MockKeyStorageClient {
    identifier: String,
}

impl KeyStorageClient for MockKeyStorageClient {
    fn identifier(&self) -> &str {
        &self.identifier
    }
}

/// Factory that records the identities it was asked for.
#[derive(Debug, Default)]
pub struct MockKeyStorageFactory {
    created: RefCell<Vec<String>>,
    fail_next: RefCell<Option<KeySourceError>>,
}

impl MockKeyStorageFactory {
    pub fn created(&self) -> Vec<String> {
        self.created.borrow().clone()
    }

    pub fn fail_next(&self, error: KeySourceError) {
        *self.fail_next.borrow_mut() = Some(error);
    }
}

impl KeyStorageFactory for MockKeyStorageFactory {
    fn create(&self, identifier: &str) -> Result<Box<dyn KeyStorageClient>, KeySourceError> {
        if let Some(error) = self.fail_next.borrow_mut().take() {
            return Err(error);
        }
        self.created.borrow_mut().push(identifier.to_string());
        Ok(Box::new(MockKeyStorageClient {
            identifier: identifier.to_string(),
        }))
    }
}

/// A call received by [`MockKeyProtectionManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerCall {
    /// Started with a client for this identity
    Start(String),
    Stop,
    ChangePasscode,
    ForgotPasscode,
    RetryFailedEvents,
}

/// Manager that records calls and lets the test raise failures.
#[derive(Default)]
pub struct MockKeyProtectionManager {
    calls: RefCell<Vec<ManagerCall>>,
    listener: RefCell<Option<FailureListener>>,
}

impl MockKeyProtectionManager {
    pub fn calls(&self) -> Vec<ManagerCall> {
        self.calls.borrow().clone()
    }

    /// Deliver `error` to the listener registered at start.
    pub fn report_failure(&self, error: KeySourceError) {
        let listener = self.listener.borrow().clone();
        if let Some(listener) = listener {
            listener(error);
        }
    }
}

impl KeyProtectionManager for MockKeyProtectionManager {
    fn start(
        &self,
        client: Box<dyn KeyStorageClient>,
        on_failure: FailureListener,
    ) -> Result<(), KeySourceError> {
        self.calls
            .borrow_mut()
            .push(ManagerCall::Start(client.identifier().to_string()));
        *self.listener.borrow_mut() = Some(on_failure);
        Ok(())
    }

    fn stop(&self) {
        self.calls.borrow_mut().push(ManagerCall::Stop);
        self.listener.borrow_mut().take();
    }

    fn change_passcode(&self) {
        self.calls.borrow_mut().push(ManagerCall::ChangePasscode);
    }

    fn forgot_passcode(&self) {
        self.calls.borrow_mut().push(ManagerCall::ForgotPasscode);
    }

    fn retry_failed_events(&self) {
        self.calls.borrow_mut().push(ManagerCall::RetryFailedEvents);
    }
}
