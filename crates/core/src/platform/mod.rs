//! OS process-table backends.
//!
//! One [`ProcessPlatform`] implementation exists per supported target:
//! - [`procfs::ProcFs`] walks the `/proc` pseudo-filesystem (Linux).
//! - `windows::WindowsToolhelp` walks ToolHelp snapshots (Windows).
//! - [`unsupported::Unsupported`] everywhere else.
//!
//! [`native`] picks the variant for the current build target.

#[cfg(unix)]
pub mod procfs;
pub mod unsupported;
#[cfg(windows)]
pub mod windows;

use std::path::PathBuf;

use crate::config::ToolConfig;
use crate::error::IntrospectResult;
use crate::model::{Pid, ProcessSnapshot};

/// How a platform answers "which processes hold this path?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HolderStrategy {
    /// Match process executable paths against the query path. Approximate: open file
    /// handles are not inspected, only where each process's own binary lives.
    ExecutablePathHeuristic,
    /// Ask the external open-files tool (`lsof`).
    OpenFilesTool,
    /// No holder search on this platform.
    Unsupported,
}

/// Capability set every platform backend provides.
pub trait ProcessPlatform: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Walk the process table once.
    ///
    /// Per-process failures are skipped and counted in `restricted`; only a refusal to
    /// enumerate at all is an error.
    fn list_processes(&self) -> IntrospectResult<ProcessSnapshot>;

    fn resolve_executable_path(&self, pid: Pid) -> Option<PathBuf>;

    fn process_exists(&self, pid: Pid) -> bool;

    /// Raw module/mapping paths for `pid`. May contain duplicates; empty when the
    /// process is gone or unreadable.
    fn module_paths(&self, pid: Pid) -> Vec<PathBuf>;

    /// Forcibly terminate `pid`.
    fn terminate(&self, pid: Pid) -> IntrospectResult<()>;

    fn holder_strategy(&self) -> HolderStrategy;
}

/// Backend for the platform this crate was built for.
#[cfg(target_os = "linux")]
pub fn native(config: &ToolConfig) -> Box<dyn ProcessPlatform> {
    Box::new(procfs::ProcFs::new(&config.proc_root))
}

/// Backend for the platform this crate was built for.
#[cfg(windows)]
pub fn native(_config: &ToolConfig) -> Box<dyn ProcessPlatform> {
    Box::new(windows::WindowsToolhelp)
}

/// Backend for the platform this crate was built for.
#[cfg(not(any(target_os = "linux", windows)))]
pub fn native(_config: &ToolConfig) -> Box<dyn ProcessPlatform> {
    Box::new(unsupported::Unsupported)
}
