use std::collections::HashSet;
use std::path::Path;

use log::{debug, warn};

use crate::config::ToolConfig;
use crate::error::{IntrospectError, IntrospectResult};
use crate::model::{Pid, SearchResult, SearchRow};
use crate::platform::{HolderStrategy, ProcessPlatform};
use crate::services::tools::{ToolCommand, ToolRunner};

/// Display path used when a holder's executable link cannot be read.
pub const INACCESSIBLE_PATH: &str = "<inaccessible>";

/// Caveat attached to every result produced by the executable-path heuristic.
pub const HEURISTIC_LIMITATION: &str = "approximate match: reports processes whose own \
executable lies under (or contains) the queried path; open file handles are not inspected";

/// Finds the processes holding a filesystem path open, or plausibly associated with it.
pub struct FileHandleLocator<'a> {
    pub platform: &'a dyn ProcessPlatform,
    pub runner: &'a dyn ToolRunner,
    pub config: &'a ToolConfig,
}

impl<'a> FileHandleLocator<'a> {
    pub fn new(
        platform: &'a dyn ProcessPlatform,
        runner: &'a dyn ToolRunner,
        config: &'a ToolConfig,
    ) -> Self {
        Self { platform, runner, config }
    }

    /// Search for holders of `path` using the platform's strategy.
    ///
    /// `Ok` with zero rows means the search ran and found nothing. An unsupported platform,
    /// a missing/failed tool and a timeout are each reported as a distinct error.
    pub fn find_holders(&self, path: &Path) -> IntrospectResult<SearchResult> {
        match self.platform.holder_strategy() {
            HolderStrategy::ExecutablePathHeuristic => self.match_executable_paths(path),
            HolderStrategy::OpenFilesTool => self.query_open_files(path),
            HolderStrategy::Unsupported => {
                Err(IntrospectError::UnsupportedPlatform { feature: "holder search" })
            }
        }
    }

    /// Heuristic strategy: a process matches when its executable path and the query path
    /// contain one another, case-insensitively.
    pub fn match_executable_paths(&self, path: &Path) -> IntrospectResult<SearchResult> {
        let snapshot = self.platform.list_processes()?;
        let query = normalize(&path.to_string_lossy());

        let mut result = SearchResult {
            limitation: Some(HEURISTIC_LIMITATION.to_string()),
            ..SearchResult::default()
        };
        if query.is_empty() {
            return Ok(result);
        }

        for process in &snapshot.processes {
            let Some(exe) = &process.executable_path else {
                continue;
            };
            let exe_display = exe.to_string_lossy();
            let candidate = normalize(&exe_display);
            if candidate.is_empty() {
                continue;
            }
            if candidate.contains(&query) || query.contains(&candidate) {
                result.rows.push(SearchRow::new(&process.name, process.pid, exe_display));
            }
        }
        result.warnings.extend(snapshot.privilege_note());
        debug!("executable-path heuristic matched {} processes", result.rows.len());
        Ok(result)
    }

    /// Delegated strategy: run the open-files tool and map each holder to its executable.
    pub fn query_open_files(&self, path: &Path) -> IntrospectResult<SearchResult> {
        let target = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        let mut command =
            ToolCommand::new(&self.config.tools.lsof, self.config.timeouts.open_files());
        if target.is_dir() {
            command = command.arg("+D");
        }
        command = command.arg(&target);
        let tool = command.tool_name();

        let output = self.runner.run(&command)?;
        if output.timed_out {
            return Err(IntrospectError::ToolTimeout { tool, timeout: command.timeout });
        }

        if output.stdout.trim().is_empty() {
            if output.success() {
                return Ok(SearchResult::default());
            }
            let stderr = output.stderr.trim();
            let reason = if stderr.is_empty() {
                format!("{tool} returned code {}", output.code())
            } else {
                stderr.to_string()
            };
            return Err(IntrospectError::ToolUnavailable { tool, reason });
        }

        let mut result = SearchResult::default();
        for (name, pid) in parse_open_files(&output.stdout) {
            let exe = self
                .platform
                .resolve_executable_path(pid)
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_else(|| INACCESSIBLE_PATH.to_string());
            result.rows.push(SearchRow::new(name, pid, exe));
        }

        if !output.success() {
            let stderr = output.stderr.trim();
            let detail = if stderr.is_empty() {
                format!(
                    "{tool} returned code {} (possibly permission-restricted or FUSE mounts)",
                    output.code()
                )
            } else {
                stderr.to_string()
            };
            warn!("partial {tool} result for {}: {detail}", target.display());
            result.warnings.push(format!(
                "partial results: {detail}; information may be incomplete, re-run with \
                 elevated privileges or exclude inaccessible mount points"
            ));
        }
        Ok(result)
    }
}

/// Parse `lsof` tabular output into `(command, pid)` pairs, one per holding process.
///
/// The first line is the column header. Lines that do not carry a numeric pid in the
/// second column are skipped. A process holding several descriptors is reported once.
pub fn parse_open_files(stdout: &str) -> Vec<(String, Pid)> {
    let mut seen = HashSet::new();
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .skip(1)
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let name = fields.next()?;
            let pid = fields.next()?.parse::<Pid>().ok()?;
            Some((name.to_string(), pid))
        })
        .filter(|(_, pid)| seen.insert(*pid))
        .collect()
}

fn normalize(path: &str) -> String {
    path.replace('\\', "/").to_lowercase()
}
