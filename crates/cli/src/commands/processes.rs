use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use procscope_core::model::{ModuleRecord, Pid};
use procscope_core::ScopeContext;

use crate::canonicalize_or_current;
use crate::commands::render_search_result;

/// Show the processes holding (or plausibly associated with) a filesystem path.
pub fn holders_command(ctx: &ScopeContext, path: &str, json: bool) -> Result<()> {
    let target = canonicalize_or_current(path)?;
    let result = ctx
        .holders()
        .find_holders(&target)
        .with_context(|| format!("Holder search for {} failed", target.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let status = if result.is_empty() {
        format!("No process holds {}", target.display())
    } else {
        format!("Found {} holder row(s) for {}", result.len(), target.display())
    };
    print!("{}", render_search_result(&result, &status));
    Ok(())
}

/// Find processes by name substring or exact pid, one row per loaded module.
pub fn procs_command(ctx: &ScopeContext, query: &str, json: bool) -> Result<()> {
    let result = ctx
        .processes()
        .find_processes(query)
        .with_context(|| format!("Process search for '{query}' failed"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let status = if result.is_empty() {
        format!("No matching process for '{query}'")
    } else {
        format!("Found {} row(s) for '{query}'", result.len())
    };
    print!("{}", render_search_result(&result, &status));
    Ok(())
}

/// Render the module list of one process.
pub fn render_modules(pid: Pid, modules: &[ModuleRecord]) -> String {
    if modules.is_empty() {
        return format!("Process {pid}: no readable modules (process gone or access denied)\n");
    }
    let mut out = format!("Process {pid}: {} module(s)\n", modules.len());
    for module in modules {
        out.push_str(&format!("  {}\n", module.path.display()));
    }
    out
}

/// List the files and shared modules mapped by one process.
pub fn modules_command(ctx: &ScopeContext, pid: Pid, json: bool) -> Result<()> {
    let modules = ctx.modules().list_modules(pid);
    if json {
        let paths: Vec<PathBuf> = modules.into_iter().map(|m| m.path).collect();
        println!("{}", serde_json::to_string_pretty(&paths)?);
        return Ok(());
    }
    print!("{}", render_modules(pid, &modules));
    Ok(())
}

/// Forcibly terminate a process. Requires `--yes`.
pub fn kill_command(ctx: &ScopeContext, pid: Pid, yes: bool) -> Result<()> {
    if !yes {
        return Err(anyhow!(
            "Refusing to terminate process {pid} without --yes (termination is forcible and cannot be undone)"
        ));
    }
    ctx.controller()
        .terminate(pid)
        .with_context(|| format!("Failed to terminate process {pid}"))?;
    println!("Terminated process {pid}");
    Ok(())
}
