//! Remote identity to local registration id lookups.

use crate::reactive::{Observable, Tracked};

/// Translates a directory identity into a local registration id.
///
/// The returned observable starts `Unknown` while the lookup is in flight
/// and settles on `Present(registration_id)` or `Absent`. Implementations
/// may hand out the same observable for repeated lookups of one id.
pub trait RegistrationResolver {
    fn lookup(&self, remote_id: &str, force_refresh: bool) -> Observable<Tracked<u64>>;
}
