use anyhow::{Context, Result};
use serde::Serialize;

use procscope_core::model::{DependencyOutcome, DependencyReport, SymbolKind, SymbolReport};
use procscope_core::ScopeContext;

use crate::commands::render_warnings;
use crate::{canonicalize_or_current, BinaryIdentity};

#[derive(Debug, Serialize)]
pub struct DependencyListing {
    pub binary: BinaryIdentity,
    pub outcome: DependencyOutcome,
    #[serde(flatten)]
    pub report: DependencyReport,
}

#[derive(Debug, Serialize)]
pub struct SymbolListing {
    pub binary: BinaryIdentity,
    pub functions: usize,
    pub data: usize,
    #[serde(flatten)]
    pub report: SymbolReport,
}

/// Numbered dependency list, end-state summary, then warnings.
pub fn render_dependencies(report: &DependencyReport) -> String {
    let mut out = String::from("Dependencies:\n");
    for (index, dep) in report.dependencies.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", index + 1, dep.requested_name));
        if let Some(path) = &dep.resolved_path {
            out.push_str(&format!("   -> {}\n", path.display()));
        }
        if let Some(note) = &dep.note {
            out.push_str(&format!("   {note}\n"));
        }
    }
    let summary = match report.outcome() {
        DependencyOutcome::Found => format!("Found {} dependencies", report.dependencies.len()),
        DependencyOutcome::StaticallyLinked => {
            "No dynamic dependencies: the binary appears to be statically linked".to_string()
        }
        DependencyOutcome::Unresolved => "Could not resolve any dependencies".to_string(),
    };
    out.push_str(&summary);
    out.push('\n');
    out.push_str(&render_warnings(&report.warnings));
    out
}

/// Classified symbol lines, counts, and the truncation note when the cap applied.
pub fn render_symbols(report: &SymbolReport) -> String {
    let mut out = format!("Source: {}\n", report.source.label());
    for symbol in &report.symbols {
        let line = match symbol.kind {
            SymbolKind::Function => format!("[func] {}\n", symbol.name),
            SymbolKind::Data => format!("[data] {}\n", symbol.name),
            SymbolKind::Other => format!("[other] {} ({})\n", symbol.name, symbol.raw_type_code),
        };
        out.push_str(&line);
    }
    out.push_str(&format!(
        "Summary: {} functions, {} data symbols, {} other\n",
        report.count_of(SymbolKind::Function),
        report.count_of(SymbolKind::Data),
        report.count_of(SymbolKind::Other)
    ));
    if report.truncated {
        out.push_str(&format!(
            "({} symbols total, showing first {})\n",
            report.total_count,
            report.symbols.len()
        ));
    }
    out.push_str(&render_warnings(&report.warnings));
    out
}

/// List the dynamic dependencies of a binary.
pub fn deps_command(ctx: &ScopeContext, binary: &str, json: bool) -> Result<()> {
    let path = canonicalize_or_current(binary)?;
    let identity = BinaryIdentity::inspect(&path)?;
    let report = ctx
        .dependencies()
        .analyze(&path)
        .with_context(|| format!("Dependency analysis of {} failed", path.display()))?;

    if json {
        let listing = DependencyListing { binary: identity, outcome: report.outcome(), report };
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    print!("{}", identity.render());
    print!("{}", render_dependencies(&report));
    Ok(())
}

/// List and classify the symbols of a binary.
pub fn symbols_command(ctx: &ScopeContext, binary: &str, json: bool) -> Result<()> {
    let path = canonicalize_or_current(binary)?;
    let identity = BinaryIdentity::inspect(&path)?;
    let report = ctx
        .symbols()
        .analyze(&path)
        .with_context(|| format!("Symbol analysis of {} failed", path.display()))?;

    if json {
        let listing = SymbolListing {
            binary: identity,
            functions: report.count_of(SymbolKind::Function),
            data: report.count_of(SymbolKind::Data),
            report,
        };
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    print!("{}", identity.render());
    print!("{}", render_symbols(&report));
    Ok(())
}
