//! Trait abstractions for the external collaborators.
//!
//! Everything the core talks to but does not implement sits behind one of
//! these traits, so tests can inject the doubles from
//! [`crate::adapters::mock`].
//!
//! # Traits
//!
//! - [`CommandSink`] - commands to the remote sync protocol
//! - [`PasscodeProvider`] - prompts the user for a passcode
//! - [`DirectoryProvider`] - remote user directory
//! - [`RegistrationResolver`] - directory identity to registration id
//! - [`KeyStorageFactory`] / [`KeyProtectionManager`] - external key storage

pub mod command_sink;
pub mod directory;
pub mod key_storage;
pub mod passcode;
pub mod resolver;

pub use command_sink::CommandSink;
pub use directory::{DirectoryPage, DirectoryProvider, DirectoryUser};
pub use key_storage::{FailureListener, KeyProtectionManager, KeyStorageClient, KeyStorageFactory};
pub use passcode::PasscodeProvider;
pub use resolver::RegistrationResolver;
