//! Process table backed by the `/proc` pseudo-filesystem.
//!
//! Each numeric directory under the proc root is one process. We read:
//! - `comm` for the short name,
//! - the `exe` symlink for the executable path,
//! - `maps` for every file mapped into the address space.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{IntrospectError, IntrospectResult};
use crate::model::{Pid, ProcessRecord, ProcessSnapshot};
use crate::platform::{HolderStrategy, ProcessPlatform};

/// Name shown for processes whose `comm` could not be read.
pub const UNKNOWN_PROCESS_NAME: &str = "unknown";

/// `/proc`-walking backend. The root is configurable so tests can fabricate a tree.
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
}

impl ProcFs {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry(&self, pid: Pid) -> PathBuf {
        self.root.join(pid.to_string())
    }

    /// Read one process directory. `None` means the process vanished mid-scan.
    fn read_process(&self, pid: Pid) -> Option<(ProcessRecord, bool)> {
        let dir = self.entry(pid);
        let mut restricted = false;

        let name = match fs::read_to_string(dir.join("comm")) {
            Ok(raw) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    UNKNOWN_PROCESS_NAME.to_string()
                } else {
                    trimmed.to_string()
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                restricted |= e.kind() == ErrorKind::PermissionDenied;
                UNKNOWN_PROCESS_NAME.to_string()
            }
        };

        let executable_path = match fs::read_link(dir.join("exe")) {
            Ok(target) => Some(target),
            Err(e) => {
                // Kernel threads have no exe link (ENOENT); other users' processes deny it.
                restricted |= e.kind() == ErrorKind::PermissionDenied;
                None
            }
        };

        Some((ProcessRecord { pid, name, executable_path }, restricted))
    }
}

impl ProcessPlatform for ProcFs {
    fn name(&self) -> &'static str {
        "procfs"
    }

    fn list_processes(&self) -> IntrospectResult<ProcessSnapshot> {
        let entries = fs::read_dir(&self.root).map_err(|e| {
            IntrospectError::SnapshotFailed(format!("cannot read {}: {e}", self.root.display()))
        })?;

        let mut snapshot = ProcessSnapshot::default();
        for entry in entries.flatten() {
            let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<Pid>().ok()) else {
                continue;
            };
            if let Some((record, restricted)) = self.read_process(pid) {
                if restricted {
                    snapshot.restricted += 1;
                }
                snapshot.processes.push(record);
            }
        }
        snapshot.processes.sort_by_key(|p| p.pid);
        debug!(
            "procfs scan of {}: {} processes, {} restricted",
            self.root.display(),
            snapshot.processes.len(),
            snapshot.restricted
        );
        Ok(snapshot)
    }

    fn resolve_executable_path(&self, pid: Pid) -> Option<PathBuf> {
        fs::read_link(self.entry(pid).join("exe")).ok()
    }

    fn process_exists(&self, pid: Pid) -> bool {
        self.entry(pid).is_dir()
    }

    fn module_paths(&self, pid: Pid) -> Vec<PathBuf> {
        match fs::read_to_string(self.entry(pid).join("maps")) {
            Ok(maps) => mapped_paths(&maps).map(PathBuf::from).collect(),
            Err(e) => {
                debug!("cannot read maps for pid {pid}: {e}");
                Vec::new()
            }
        }
    }

    fn terminate(&self, pid: Pid) -> IntrospectResult<()> {
        send_kill(pid)
    }

    fn holder_strategy(&self) -> HolderStrategy {
        HolderStrategy::OpenFilesTool
    }
}

/// Extract the file paths from a `maps` table.
///
/// Format: `address perms offset dev inode pathname`. The pathname is everything from the
/// sixth field on (paths may contain spaces). Anonymous mappings have no pathname and
/// pseudo-regions such as `[heap]`, `[stack]` and `[vdso]` are bracketed; both are skipped.
pub fn mapped_paths(maps: &str) -> impl Iterator<Item = String> + '_ {
    maps.lines().filter_map(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 6 {
            return None;
        }
        let path = fields[5..].join(" ");
        if path.is_empty() || path.starts_with('[') {
            None
        } else {
            Some(path)
        }
    })
}

fn send_kill(pid: Pid) -> IntrospectResult<()> {
    // pid 0 and values that wrap negative address process groups, never a single process.
    let raw = match libc::pid_t::try_from(pid) {
        Ok(raw) if raw > 0 => raw,
        _ => return Err(IntrospectError::NotFound { what: format!("process {pid}") }),
    };
    // SAFETY: kill(2) has no memory-safety preconditions; `raw` is a positive pid.
    let rc = unsafe { libc::kill(raw, libc::SIGKILL) };
    if rc == 0 {
        return Ok(());
    }
    let err = std::io::Error::last_os_error();
    match err.raw_os_error() {
        Some(libc::EPERM) => Err(IntrospectError::InsufficientPrivilege { pid, action: "terminate" }),
        Some(libc::ESRCH) => Err(IntrospectError::NotFound { what: format!("process {pid}") }),
        _ => Err(IntrospectError::Io(err)),
    }
}
