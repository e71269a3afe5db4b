//! Core data model for process, module, dependency, and symbol records.
//!
//! Every record here is an immutable value built fresh on each query. Nothing is cached
//! across calls: process identifiers may be reused by the OS once a process exits, so a
//! `ProcessRecord` is only meaningful within the snapshot that produced it.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Platform process identifier.
pub type Pid = u32;

/// A single process observed during one enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub pid: Pid,
    /// Short display name (e.g. `comm` on Linux, the image name on Windows).
    pub name: String,
    /// Absolute path of the executable, if the OS let us resolve it.
    pub executable_path: Option<PathBuf>,
}

/// Result of walking the process table once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    /// Processes ordered by pid; pids are unique within a snapshot.
    pub processes: Vec<ProcessRecord>,
    /// Number of processes whose details could not be fully read due to missing privileges.
    pub restricted: usize,
}

impl ProcessSnapshot {
    /// One-line note describing how many entries were only partially readable.
    ///
    /// Returns `None` when every process was fully readable, so callers can tell an
    /// incomplete scan apart from one that simply matched nothing.
    pub fn privilege_note(&self) -> Option<String> {
        if self.restricted == 0 {
            return None;
        }
        Some(format!(
            "insufficient privilege: details for {} process(es) could not be read; \
             results may be incomplete (re-run with elevated privileges)",
            self.restricted
        ))
    }
}

/// A file or shared module mapped into a process.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModuleRecord {
    pub pid: Pid,
    pub path: PathBuf,
}

/// One dynamic dependency reported for a binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRecord {
    /// Name as referenced by the binary (never empty).
    pub requested_name: String,
    /// Resolved location. `None` when the dynamic linker could not find the library.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_path: Option<PathBuf>,
    /// Advisory annotation, e.g. the load address or a "not found" marker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// How a dependency analysis ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyOutcome {
    /// At least one dependency was listed.
    Found,
    /// Nothing listed because the binary is statically linked / has no dynamic section.
    StaticallyLinked,
    /// Nothing listed and nothing could explain why (tool failure, unknown format).
    Unresolved,
}

/// Full output of a dependency analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyReport {
    /// Dependencies in the order the underlying tool produced them.
    pub dependencies: Vec<DependencyRecord>,
    pub statically_linked: bool,
    pub warnings: Vec<String>,
}

impl DependencyReport {
    pub fn outcome(&self) -> DependencyOutcome {
        if !self.dependencies.is_empty() {
            DependencyOutcome::Found
        } else if self.statically_linked {
            DependencyOutcome::StaticallyLinked
        } else {
            DependencyOutcome::Unresolved
        }
    }
}

/// Coarse symbol classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Data,
    Other,
}

impl SymbolKind {
    /// Classify an `nm` type letter: `T/t` are code, `D/d/B/b` are data.
    pub fn from_type_code(code: &str) -> Self {
        match code {
            "T" | "t" => SymbolKind::Function,
            "D" | "d" | "B" | "b" => SymbolKind::Data,
            _ => SymbolKind::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolRecord {
    /// Symbol name (never empty).
    pub name: String,
    pub kind: SymbolKind,
    /// The classification code exactly as the tool printed it.
    pub raw_type_code: String,
}

/// Where a symbol listing came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolSource {
    /// Dynamically exported, defined symbols only.
    DynamicExports,
    /// Full static symbol table; not limited to exports.
    AllSymbols,
    /// Export table of a PE image.
    ExportTable,
}

impl SymbolSource {
    pub fn label(&self) -> &'static str {
        match self {
            SymbolSource::DynamicExports => "dynamic symbol table (exported symbols)",
            SymbolSource::AllSymbols => "static/all symbols, not just exports",
            SymbolSource::ExportTable => "export table",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolReport {
    pub source: SymbolSource,
    pub symbols: Vec<SymbolRecord>,
    /// True when `symbols` was cut at the configured cap.
    pub truncated: bool,
    /// Number of symbols the tool reported, including any dropped by the cap.
    pub total_count: usize,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl SymbolReport {
    pub fn count_of(&self, kind: SymbolKind) -> usize {
        self.symbols.iter().filter(|s| s.kind == kind).count()
    }
}

/// Flat display row shared by the holder search and the process search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRow {
    pub process_name: String,
    pub pid: Pid,
    pub path: String,
}

impl SearchRow {
    pub fn new(process_name: impl Into<String>, pid: Pid, path: impl Into<String>) -> Self {
        Self { process_name: process_name.into(), pid, path: path.into() }
    }
}

/// Ordered rows plus any non-fatal advisories gathered while producing them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub rows: Vec<SearchRow>,
    /// Partial-result and privilege advisories. Non-empty warnings never mean failure.
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Documented limitation of the strategy that produced these rows, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limitation: Option<String>,
}

impl SearchResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_nm_type_codes() {
        assert_eq!(SymbolKind::from_type_code("T"), SymbolKind::Function);
        assert_eq!(SymbolKind::from_type_code("t"), SymbolKind::Function);
        for code in ["D", "d", "B", "b"] {
            assert_eq!(SymbolKind::from_type_code(code), SymbolKind::Data);
        }
        assert_eq!(SymbolKind::from_type_code("W"), SymbolKind::Other);
        assert_eq!(SymbolKind::from_type_code("R"), SymbolKind::Other);
    }

    #[test]
    fn dependency_outcome_distinguishes_three_end_states() {
        let mut report = DependencyReport::default();
        assert_eq!(report.outcome(), DependencyOutcome::Unresolved);
        report.statically_linked = true;
        assert_eq!(report.outcome(), DependencyOutcome::StaticallyLinked);
        report.dependencies.push(DependencyRecord {
            requested_name: "libc.so.6".into(),
            resolved_path: None,
            note: None,
        });
        assert_eq!(report.outcome(), DependencyOutcome::Found);
    }

    #[test]
    fn privilege_note_only_when_restricted() {
        let mut snapshot = ProcessSnapshot::default();
        assert!(snapshot.privilege_note().is_none());
        snapshot.restricted = 3;
        let note = snapshot.privilege_note().unwrap();
        assert!(note.contains("3 process(es)"));
    }
}
