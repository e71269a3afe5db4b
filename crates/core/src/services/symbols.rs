use std::path::Path;

use log::{debug, warn};

use crate::config::ToolConfig;
use crate::error::{IntrospectError, IntrospectResult};
use crate::model::{SymbolKind, SymbolRecord, SymbolReport, SymbolSource};
use crate::services::dependencies::DUMPBIN_HINT;
use crate::services::tools::{ToolCommand, ToolOutput, ToolRunner};

/// Raw type code recorded for entries of a PE export table.
pub const EXPORT_TYPE_CODE: &str = "export";

pub const NO_SYMBOLS: &str = "no symbol information: the file may be stripped or is not a \
valid binary";

/// Lists and classifies the symbols of a binary.
pub struct SymbolAnalyzer<'a> {
    pub runner: &'a dyn ToolRunner,
    pub config: &'a ToolConfig,
}

impl<'a> SymbolAnalyzer<'a> {
    pub fn new(runner: &'a dyn ToolRunner, config: &'a ToolConfig) -> Self {
        Self { runner, config }
    }

    pub fn analyze(&self, binary: &Path) -> IntrospectResult<SymbolReport> {
        if !binary.is_file() {
            return Err(IntrospectError::NotFound { what: binary.display().to_string() });
        }
        if cfg!(windows) {
            self.analyze_with_dumpbin(binary)
        } else {
            self.analyze_with_nm(binary)
        }
    }

    /// Dynamic exports via `nm -D --defined-only`; when that prints nothing, the full
    /// `nm` table capped at `symbol_cap` entries.
    pub fn analyze_with_nm(&self, binary: &Path) -> IntrospectResult<SymbolReport> {
        let dynamic = ToolCommand::new(&self.config.tools.nm, self.config.timeouts.symbols())
            .arg("-D")
            .arg("--defined-only")
            .arg(binary);
        let output = self.run(&dynamic)?;

        if !output.stdout.trim().is_empty() {
            let symbols = parse_nm_dynamic(&output.stdout);
            return Ok(SymbolReport {
                source: SymbolSource::DynamicExports,
                total_count: symbols.len(),
                symbols,
                truncated: false,
                warnings: stderr_warnings(&output.stderr),
            });
        }

        debug!("no dynamic symbols in {}; dumping the full table", binary.display());
        let full =
            ToolCommand::new(&self.config.tools.nm, self.config.timeouts.symbols()).arg(binary);
        let output = self.run(&full)?;

        if output.stdout.trim().is_empty() {
            if !output.success() {
                return Err(unavailable(&full, &output));
            }
            let mut warnings = vec![NO_SYMBOLS.to_string()];
            warnings.extend(stderr_warnings(&output.stderr));
            return Ok(SymbolReport {
                source: SymbolSource::AllSymbols,
                symbols: Vec::new(),
                truncated: false,
                total_count: 0,
                warnings,
            });
        }

        let mut symbols = parse_nm_full(&output.stdout);
        let total_count = symbols.len();
        let truncated = total_count > self.config.symbol_cap;
        symbols.truncate(self.config.symbol_cap);
        Ok(SymbolReport {
            source: SymbolSource::AllSymbols,
            symbols,
            truncated,
            total_count,
            warnings: stderr_warnings(&output.stderr),
        })
    }

    /// Export table via `dumpbin /exports`.
    pub fn analyze_with_dumpbin(&self, binary: &Path) -> IntrospectResult<SymbolReport> {
        let command = ToolCommand::new(&self.config.tools.dumpbin, self.config.timeouts.symbols())
            .arg("/exports")
            .arg(binary);
        let output = self.run(&command).map_err(|e| match e {
            IntrospectError::ToolUnavailable { tool, reason } => {
                IntrospectError::ToolUnavailable { tool, reason: format!("{reason} ({DUMPBIN_HINT})") }
            }
            other => other,
        })?;
        if output.stdout.trim().is_empty() && !output.success() {
            return Err(unavailable(&command, &output));
        }

        let symbols = parse_dumpbin_exports(&output.stdout);
        let mut warnings = Vec::new();
        if symbols.is_empty() {
            warnings.push("the file exports no functions".to_string());
        }
        Ok(SymbolReport {
            source: SymbolSource::ExportTable,
            total_count: symbols.len(),
            symbols,
            truncated: false,
            warnings,
        })
    }

    fn run(&self, command: &ToolCommand) -> IntrospectResult<ToolOutput> {
        let output = self.runner.run(command)?;
        if output.timed_out {
            warn!("{} timed out; discarding symbol output", command.display());
            return Err(IntrospectError::ToolTimeout {
                tool: command.tool_name(),
                timeout: command.timeout,
            });
        }
        Ok(output)
    }
}

fn unavailable(command: &ToolCommand, output: &ToolOutput) -> IntrospectError {
    let stderr = output.stderr.trim();
    let reason = if stderr.is_empty() {
        format!("{} returned code {}", command.tool_name(), output.code())
    } else {
        stderr.to_string()
    };
    IntrospectError::ToolUnavailable { tool: command.tool_name(), reason }
}

/// `nm` complains about objects without a symbol table; that is not worth reporting.
fn stderr_warnings(stderr: &str) -> Vec<String> {
    let text = stderr.trim();
    if text.is_empty() || text.contains("no symbols") {
        Vec::new()
    } else {
        vec![text.to_string()]
    }
}

fn record(code: &str, name: &str) -> SymbolRecord {
    SymbolRecord {
        name: name.to_string(),
        kind: SymbolKind::from_type_code(code),
        raw_type_code: code.to_string(),
    }
}

/// Parse `nm -D --defined-only` output: `value type name`. Lines without all three fields
/// are skipped.
pub fn parse_nm_dynamic(stdout: &str) -> Vec<SymbolRecord> {
    stdout
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            (parts.len() >= 3).then(|| record(parts[1], parts[2]))
        })
        .collect()
}

/// Parse a full `nm` dump. Undefined symbols have no value column (`U name`), so a
/// two-field line whose first field is a single letter is accepted as `type name`.
pub fn parse_nm_full(stdout: &str) -> Vec<SymbolRecord> {
    stdout
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            match parts.as_slice() {
                [_, code, name, ..] => Some(record(code, name)),
                [code, name] if code.chars().count() == 1 => Some(record(code, name)),
                _ => None,
            }
        })
        .collect()
}

fn is_ordinal(field: &str) -> bool {
    field.parse::<u32>().is_ok()
}

fn is_rva(field: &str) -> bool {
    field.len() == 8 && field.chars().all(|c| c.is_ascii_hexdigit())
}

/// Parse the `ordinal hint RVA name` table of `dumpbin /exports`.
pub fn parse_dumpbin_exports(stdout: &str) -> Vec<SymbolRecord> {
    let mut symbols = Vec::new();
    let mut in_table = false;
    for line in stdout.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("ordinal") && trimmed.ends_with("name") {
            in_table = true;
            continue;
        }
        if !in_table || trimmed.is_empty() {
            continue;
        }
        if trimmed == "Summary" {
            break;
        }
        let parts: Vec<&str> = trimmed.split_whitespace().collect();
        let name = match parts.as_slice() {
            [ordinal, _hint, rva, name, ..] if is_ordinal(ordinal) && is_rva(rva) => *name,
            // Exports forwarded to another DLL have no RVA column.
            [ordinal, _hint, name, ..] if is_ordinal(ordinal) => *name,
            _ => continue,
        };
        symbols.push(SymbolRecord {
            name: name.to_string(),
            kind: SymbolKind::Other,
            raw_type_code: EXPORT_TYPE_CODE.to_string(),
        });
    }
    symbols
}
