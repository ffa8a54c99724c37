//! Concrete implementations of trait abstractions.
//!
//! # Adapters
//!
//! - [`LoopbackRemote`] - in-process remote sync protocol
//! - [`ChannelPasscodeProvider`] - passcode prompts over a tokio channel
//!
//! # Mock Implementations
//!
//! The [`mock`] submodule provides test doubles for every collaborator:
//! - [`mock::RecordingSink`] / [`mock::RecordingPasscodeProvider`]
//! - [`mock::InMemoryDirectory`] - paged directory with failure injection
//! - [`mock::ManualResolver`] - registration lookups answered by the test
//! - [`mock::MockKeyStorageFactory`] / [`mock::MockKeyProtectionManager`]

pub mod loopback;
pub mod mock;
pub mod prompt_channel;

pub use loopback::LoopbackRemote;
pub use prompt_channel::{ChannelPasscodeProvider, PromptRequest};
