//! Passcode prompting collaborator.

use crate::keysource::PasscodeError;

/// Something that can ask the user for a passcode, typically the UI.
///
/// Invoked by the passcode state machine, never polled. The answer comes
/// back later through
/// [`PasscodeKeySource::set_passcode`](crate::keysource::PasscodeKeySource::set_passcode).
pub trait PasscodeProvider {
    /// Ask for a new passcode (and usually its confirmation).
    ///
    /// `prior_error` is the reason the previous attempt failed, if any.
    fn request_new_passcode(&self, force_reentry: bool, prior_error: PasscodeError);

    /// Ask for the passcode that already protects the keys.
    fn provide_existing_passcode(&self, force_reentry: bool, prior_error: PasscodeError);
}
