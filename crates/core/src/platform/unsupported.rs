//! Fallback backend for targets without a process-table implementation.

use std::path::PathBuf;

use crate::error::{IntrospectError, IntrospectResult};
use crate::model::{Pid, ProcessSnapshot};
use crate::platform::{HolderStrategy, ProcessPlatform};

/// Every query reports [`IntrospectError::UnsupportedPlatform`] or an empty answer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unsupported;

impl ProcessPlatform for Unsupported {
    fn name(&self) -> &'static str {
        "unsupported"
    }

    fn list_processes(&self) -> IntrospectResult<ProcessSnapshot> {
        Err(IntrospectError::UnsupportedPlatform { feature: "process enumeration" })
    }

    fn resolve_executable_path(&self, _pid: Pid) -> Option<PathBuf> {
        None
    }

    fn process_exists(&self, _pid: Pid) -> bool {
        false
    }

    fn module_paths(&self, _pid: Pid) -> Vec<PathBuf> {
        Vec::new()
    }

    fn terminate(&self, _pid: Pid) -> IntrospectResult<()> {
        Err(IntrospectError::UnsupportedPlatform { feature: "process termination" })
    }

    fn holder_strategy(&self) -> HolderStrategy {
        HolderStrategy::Unsupported
    }
}
