//! Mock implementations for testing.
//!
//! This module provides test doubles for every external collaborator, so
//! the state machine and identity sync can be tested without a remote
//! protocol, a directory server or a key-protection service.
//!
//! # Available Mocks
//!
//! - [`RecordingSink`] - records commands, can reject the next one
//! - [`RecordingPasscodeProvider`] - records prompts
//! - [`InMemoryDirectory`] - paged user list with failure injection
//! - [`ManualResolver`] - registration lookups answered by the test
//! - [`MockKeyStorageFactory`] / [`MockKeyProtectionManager`] - key storage

pub mod directory;
pub mod key_storage;
pub mod protocol;
pub mod resolver;

pub use directory::InMemoryDirectory;
pub use key_storage::{
    ManagerCall, MockKeyProtectionManager, MockKeyStorageClient, MockKeyStorageFactory,
};
pub use protocol::{PasscodePrompt, PromptKind, RecordingPasscodeProvider, RecordingSink};
pub use resolver::ManualResolver;
