//! Dynamic dependency listing for ELF and PE binaries.
//!
//! ELF: `ldd` first, `readelf -d` NEEDED entries as the fallback. PE: `dumpbin /dependents`.
//! Each tool gets its own bounded wait; one strategy timing out never cancels the other.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use log::{debug, warn};
use regex::Regex;

use crate::config::ToolConfig;
use crate::error::{IntrospectError, IntrospectResult};
use crate::model::{DependencyRecord, DependencyReport};
use crate::services::libpath::LibraryPathResolver;
use crate::services::tools::{ToolCommand, ToolOutput, ToolRunner};

static NEEDED_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(NEEDED\)\s+Shared library:\s*\[(.+)\]").expect("NEEDED pattern is valid")
});

pub const LIBRARY_NOT_FOUND: &str = "library not found";
pub const NOT_IN_SEARCH_PATH: &str = "not found in the standard library search path";
pub const DUMPBIN_HINT: &str = "dumpbin ships with Visual Studio C++ build tools; run from a \
Developer Command Prompt or point PROCSCOPE_DUMPBIN at it";

pub struct DependencyAnalyzer<'a> {
    pub runner: &'a dyn ToolRunner,
    pub resolver: &'a LibraryPathResolver,
    pub config: &'a ToolConfig,
}

/// Lines of one `ldd` run, classified.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct LddListing {
    pub dependencies: Vec<DependencyRecord>,
    pub statically_linked: bool,
    pub warnings: Vec<String>,
}

/// Why a strategy produced nothing. Kept so the caller gets a precise error when every
/// strategy failed the same way.
enum StrategyFailure {
    TimedOut(IntrospectError),
    Unavailable(IntrospectError),
}

impl<'a> DependencyAnalyzer<'a> {
    pub fn new(
        runner: &'a dyn ToolRunner,
        resolver: &'a LibraryPathResolver,
        config: &'a ToolConfig,
    ) -> Self {
        Self { runner, resolver, config }
    }

    /// List the dynamic dependencies of `binary` using the strategy for this target.
    pub fn analyze(&self, binary: &Path) -> IntrospectResult<DependencyReport> {
        if !binary.is_file() {
            return Err(IntrospectError::NotFound { what: binary.display().to_string() });
        }
        if cfg!(windows) {
            self.analyze_with_dumpbin(binary)
        } else {
            self.analyze_with_ldd(binary)
        }
    }

    /// `ldd`, then `readelf -d` when `ldd` listed nothing and the binary is not static.
    pub fn analyze_with_ldd(&self, binary: &Path) -> IntrospectResult<DependencyReport> {
        let mut report = DependencyReport::default();
        let mut failures = Vec::new();

        let ldd = ToolCommand::new(&self.config.tools.ldd, self.config.timeouts.dependencies())
            .arg(binary);
        match self.run_bounded(&ldd) {
            Ok(output) => {
                let listing = parse_ldd(&output.stdout, &output.stderr);
                report.dependencies = listing.dependencies;
                report.statically_linked = listing.statically_linked;
                report.warnings.extend(listing.warnings);
            }
            Err(failure) => {
                report.warnings.push(failure.message());
                failures.push(failure);
            }
        }

        if report.dependencies.is_empty() && !report.statically_linked {
            debug!("ldd listed nothing for {}; falling back to readelf", binary.display());
            if let Err(failure) = self.read_needed_entries(binary, &mut report) {
                report.warnings.push(failure.message());
                failures.push(failure);
            }
        }

        if report.dependencies.is_empty() && !report.statically_linked && failures.len() == 2 {
            // Every strategy failed outright; a timeout takes precedence in the report.
            let pick = failures
                .iter()
                .position(|f| matches!(f, StrategyFailure::TimedOut(_)))
                .unwrap_or(0);
            return Err(failures.swap_remove(pick).into_error());
        }
        Ok(report)
    }

    fn read_needed_entries(
        &self,
        binary: &Path,
        report: &mut DependencyReport,
    ) -> Result<(), StrategyFailure> {
        let readelf =
            ToolCommand::new(&self.config.tools.readelf, self.config.timeouts.dependencies())
                .arg("-d")
                .arg(binary);
        let output = self.run_bounded(&readelf)?;

        if output.stdout.contains("There is no dynamic section") {
            report.statically_linked = true;
        }

        let canonical = binary.canonicalize().unwrap_or_else(|_| binary.to_path_buf());
        let hints: Vec<PathBuf> = canonical.parent().map(Path::to_path_buf).into_iter().collect();

        let mut found = false;
        for name in parse_needed(&output.stdout) {
            let record = match self.resolver.resolve(&name, &hints) {
                Some(path) => DependencyRecord {
                    requested_name: name,
                    resolved_path: Some(path),
                    note: None,
                },
                None => DependencyRecord {
                    resolved_path: Some(PathBuf::from(&name)),
                    requested_name: name,
                    note: Some(NOT_IN_SEARCH_PATH.to_string()),
                },
            };
            report.dependencies.push(record);
            found = true;
        }

        if !found && report.dependencies.is_empty() {
            let stderr = output.stderr.trim();
            let stdout = output.stdout.trim();
            if !stderr.is_empty() {
                report.warnings.push(stderr.to_string());
            } else if !stdout.is_empty() && !report.statically_linked {
                report.warnings.push(format!("readelf output: {stdout}"));
            }
        }
        Ok(())
    }

    /// `dumpbin /dependents`, resolving each DLL against the binary's own directory first.
    pub fn analyze_with_dumpbin(&self, binary: &Path) -> IntrospectResult<DependencyReport> {
        let command =
            ToolCommand::new(&self.config.tools.dumpbin, self.config.timeouts.dependencies())
                .arg("/dependents")
                .arg(binary);
        let output = self.run_bounded(&command).map_err(|failure| match failure {
            StrategyFailure::Unavailable(IntrospectError::ToolUnavailable { tool, reason }) => {
                IntrospectError::ToolUnavailable { tool, reason: format!("{reason} ({DUMPBIN_HINT})") }
            }
            other => other.into_error(),
        })?;

        let hints: Vec<PathBuf> = binary.parent().map(Path::to_path_buf).into_iter().collect();
        let mut report = DependencyReport::default();
        for name in parse_dumpbin_dependents(&output.stdout) {
            let resolved_path = self.resolver.resolve(&name, &hints);
            let note = resolved_path.is_none().then(|| NOT_IN_SEARCH_PATH.to_string());
            report.dependencies.push(DependencyRecord { requested_name: name, resolved_path, note });
        }

        if report.dependencies.is_empty() {
            if output.stdout.trim().is_empty() && !output.success() {
                let stderr = output.stderr.trim();
                let reason = if stderr.is_empty() {
                    format!("{} returned code {}", command.tool_name(), output.code())
                } else {
                    stderr.to_string()
                };
                return Err(IntrospectError::ToolUnavailable { tool: command.tool_name(), reason });
            }
            // A PE image without an import section loads no DLLs.
            report.statically_linked = output.stdout.contains("File Type:");
        }
        Ok(report)
    }

    fn run_bounded(&self, command: &ToolCommand) -> Result<ToolOutput, StrategyFailure> {
        let tool = command.tool_name();
        match self.runner.run(command) {
            Ok(output) if output.timed_out => {
                warn!("{} timed out", command.display());
                Err(StrategyFailure::TimedOut(IntrospectError::ToolTimeout {
                    tool,
                    timeout: command.timeout,
                }))
            }
            Ok(output) => Ok(output),
            Err(e) => {
                debug!("{tool} unavailable: {e}");
                Err(StrategyFailure::Unavailable(e.into()))
            }
        }
    }
}

impl StrategyFailure {
    fn message(&self) -> String {
        match self {
            StrategyFailure::TimedOut(e) | StrategyFailure::Unavailable(e) => e.to_string(),
        }
    }

    fn into_error(self) -> IntrospectError {
        match self {
            StrategyFailure::TimedOut(e) | StrategyFailure::Unavailable(e) => e,
        }
    }
}

fn is_static_marker(line: &str) -> bool {
    line.contains("not a dynamic executable") || line.contains("statically linked")
}

/// Classify `ldd` output.
///
/// Static markers set the flag and are otherwise dropped (from either stream). Lines
/// prefixed `ldd:` and any other stderr text become warnings. Everything else on stdout
/// is a dependency line, either `name => path (note)` or a bare path like the loader.
pub fn parse_ldd(stdout: &str, stderr: &str) -> LddListing {
    let mut listing = LddListing::default();

    for line in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if is_static_marker(line) {
            listing.statically_linked = true;
            continue;
        }
        if line.starts_with("ldd:") {
            listing.warnings.push(line.to_string());
            continue;
        }
        if let Some(record) = parse_ldd_line(line) {
            listing.dependencies.push(record);
        }
    }

    let mut stderr_lines = Vec::new();
    for line in stderr.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if is_static_marker(line) {
            listing.statically_linked = true;
        } else {
            stderr_lines.push(line);
        }
    }
    if !stderr_lines.is_empty() {
        listing.warnings.push(stderr_lines.join("\n"));
    }
    listing
}

fn split_note(text: &str) -> (&str, Option<String>) {
    match text.find(" (") {
        Some(idx) => (text[..idx].trim(), Some(text[idx..].trim().to_string())),
        None => (text.trim(), None),
    }
}

/// Parse a single non-empty `ldd` dependency line.
///
/// Paths after `=>` are kept exactly as `ldd` printed them. A bare line names the
/// dependency by its path, canonicalized when it exists on this host.
pub fn parse_ldd_line(line: &str) -> Option<DependencyRecord> {
    let line = line.trim();
    if let Some((left, right)) = line.split_once("=>") {
        let name = left.trim();
        if name.is_empty() {
            return None;
        }
        let (target, note) = split_note(right.trim());
        if target.eq_ignore_ascii_case("not found") {
            let note = match note {
                Some(existing) => format!("{existing}, {LIBRARY_NOT_FOUND}"),
                None => LIBRARY_NOT_FOUND.to_string(),
            };
            return Some(DependencyRecord {
                requested_name: name.to_string(),
                resolved_path: None,
                note: Some(note),
            });
        }
        let resolved_path = (!target.is_empty()).then(|| PathBuf::from(target));
        return Some(DependencyRecord { requested_name: name.to_string(), resolved_path, note });
    }

    let (target, note) = split_note(line);
    if target.is_empty() {
        return None;
    }
    // Relative names such as `linux-vdso.so.1` have no backing file.
    let raw = Path::new(target);
    let resolved_path =
        raw.is_absolute().then(|| raw.canonicalize().unwrap_or_else(|_| raw.to_path_buf()));
    Some(DependencyRecord { requested_name: target.to_string(), resolved_path, note })
}

/// Library names from the `(NEEDED)` entries of `readelf -d` output, in file order.
pub fn parse_needed(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| NEEDED_ENTRY.captures(line))
        .map(|caps| caps[1].trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

/// DLL names listed under the dependency headings of `dumpbin /dependents`.
pub fn parse_dumpbin_dependents(stdout: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut in_list = false;
    for line in stdout.lines() {
        let trimmed = line.trim();
        if trimmed.contains("has the following") && trimmed.contains("dependencies") {
            in_list = true;
            continue;
        }
        if !in_list || trimmed.is_empty() {
            continue;
        }
        if trimmed == "Summary" || trimmed.ends_with(':') {
            in_list = false;
            continue;
        }
        names.push(trimmed.to_string());
    }
    names
}
