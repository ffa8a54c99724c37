//! Identity synchronization.
//!
//! [`IdentitySync`] walks the remote directory, translates every remote user
//! into a local registration id through the
//! [`RegistrationResolver`](crate::traits::RegistrationResolver), and emits
//! [`UserEvent`]s. A lookup that is still `Unknown` waits in a one-shot
//! monitor instead of being retried; `Absent` users are dropped silently.
//!
//! The local user gets its own continuously active monitor: every new
//! registration id triggers one profile fetch and at most one
//! [`UserEvent::LocalUpdated`].
//!
//! [`UserRegistry`] is the usual event consumer.

mod registry;
mod sync;
mod user;

pub use registry::UserRegistry;
pub use sync::{IdentitySync, SyncOptions, SyncReport};
pub use user::{AppUser, UserEvent, UserEventListener};
