//! Command channel to the remote sync protocol.

use crate::error::ProtocolError;
use crate::protocol::SyncCommand;

/// Accepts commands for the remote setup/sync protocol.
///
/// Called from inside monitor runs on the reactive context's thread, so
/// implementations must not block. The wire format is theirs to choose.
pub trait CommandSink {
    fn send(&self, command: SyncCommand) -> Result<(), ProtocolError>;
}
