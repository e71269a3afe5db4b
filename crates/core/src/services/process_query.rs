use log::debug;

use crate::error::IntrospectResult;
use crate::model::{Pid, SearchResult, SearchRow};
use crate::platform::ProcessPlatform;
use crate::services::modules::ModuleLister;

/// A parsed process search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessQuery {
    /// Exact process identifier.
    Pid(Pid),
    /// Case-insensitive substring of the process name. Empty matches every process.
    Name(String),
}

impl ProcessQuery {
    /// Input that parses fully as a non-negative integer is a pid; anything else is a name.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        match trimmed.parse::<Pid>() {
            Ok(pid) if !trimmed.starts_with('+') => ProcessQuery::Pid(pid),
            _ => ProcessQuery::Name(trimmed.to_lowercase()),
        }
    }

    pub fn matches(&self, pid: Pid, name: &str) -> bool {
        match self {
            ProcessQuery::Pid(wanted) => *wanted == pid,
            ProcessQuery::Name(needle) => name.to_lowercase().contains(needle.as_str()),
        }
    }
}

/// Finds processes by name or pid and expands each into its loaded modules.
pub struct ProcessQueryEngine<'a> {
    pub platform: &'a dyn ProcessPlatform,
}

impl<'a> ProcessQueryEngine<'a> {
    pub fn new(platform: &'a dyn ProcessPlatform) -> Self {
        Self { platform }
    }

    /// One row per (process, module). A process with no readable modules falls back to a
    /// single row for its executable, and is omitted if that cannot be resolved either.
    pub fn find_processes(&self, input: &str) -> IntrospectResult<SearchResult> {
        let query = ProcessQuery::parse(input);
        let snapshot = self.platform.list_processes()?;
        let lister = ModuleLister::new(self.platform);

        let mut result = SearchResult::default();
        let mut matched = 0usize;
        for process in snapshot.processes.iter().filter(|p| query.matches(p.pid, &p.name)) {
            matched += 1;
            let modules = lister.list_paths(process.pid);
            if modules.is_empty() {
                let exe = process
                    .executable_path
                    .clone()
                    .or_else(|| self.platform.resolve_executable_path(process.pid));
                if let Some(exe) = exe {
                    result.rows.push(SearchRow::new(
                        &process.name,
                        process.pid,
                        exe.to_string_lossy(),
                    ));
                }
                continue;
            }
            for module in modules {
                result.rows.push(SearchRow::new(
                    &process.name,
                    process.pid,
                    module.to_string_lossy(),
                ));
            }
        }

        result.warnings.extend(snapshot.privilege_note());
        debug!("query {query:?}: {matched} processes, {} rows", result.rows.len());
        Ok(result)
    }
}
