use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::model::{ModuleRecord, Pid};
use crate::platform::ProcessPlatform;

/// Lists the files and shared modules a process has loaded or mapped.
pub struct ModuleLister<'a> {
    pub platform: &'a dyn ProcessPlatform,
}

impl<'a> ModuleLister<'a> {
    pub fn new(platform: &'a dyn ProcessPlatform) -> Self {
        Self { platform }
    }

    /// Unique, non-empty module paths for `pid`, sorted.
    ///
    /// A process that vanished or cannot be read yields an empty set rather than an error.
    pub fn list_paths(&self, pid: Pid) -> BTreeSet<PathBuf> {
        self.platform
            .module_paths(pid)
            .into_iter()
            .filter(|path| !path.as_os_str().is_empty())
            .collect()
    }

    pub fn list_modules(&self, pid: Pid) -> Vec<ModuleRecord> {
        self.list_paths(pid).into_iter().map(|path| ModuleRecord { pid, path }).collect()
    }
}
