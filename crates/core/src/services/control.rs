use log::{info, warn};

use crate::error::IntrospectResult;
use crate::model::Pid;
use crate::platform::ProcessPlatform;

/// Forcible process termination.
///
/// There is no graceful-shutdown handshake and the action cannot be undone; callers confirm
/// with the user before calling [`ProcessController::terminate`].
pub struct ProcessController<'a> {
    pub platform: &'a dyn ProcessPlatform,
}

impl<'a> ProcessController<'a> {
    pub fn new(platform: &'a dyn ProcessPlatform) -> Self {
        Self { platform }
    }

    /// Kill `pid`. A refusal (privilege, vanished process, unsupported platform) comes back
    /// as an error value; nothing here panics.
    pub fn terminate(&self, pid: Pid) -> IntrospectResult<()> {
        match self.platform.terminate(pid) {
            Ok(()) => {
                info!("terminated process {pid} via {}", self.platform.name());
                Ok(())
            }
            Err(e) => {
                warn!("could not terminate process {pid}: {e}");
                Err(e)
            }
        }
    }
}
