use anyhow::Result;
use serde::Serialize;

use procscope_core::services::tools::locate_tool;
use procscope_core::ToolConfig;

#[derive(Debug, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub program: String,
    /// Resolved location, `None` when the tool is not installed.
    pub location: Option<String>,
    pub timeout_ms: u64,
    pub purpose: String,
}

/// Describe every external tool the engines may invoke.
pub fn tool_inventory(config: &ToolConfig) -> Vec<ToolInfo> {
    let t = &config.tools;
    let ms = &config.timeouts;
    let entries = [
        ("lsof", &t.lsof, ms.open_files_ms, "open file holders (Unix)"),
        ("ldd", &t.ldd, ms.dependencies_ms, "dynamic dependencies (ELF)"),
        ("readelf", &t.readelf, ms.dependencies_ms, "NEEDED entries fallback (ELF)"),
        ("ldconfig", &t.ldconfig, ms.library_cache_ms, "system library cache"),
        ("nm", &t.nm, ms.symbols_ms, "symbol tables (ELF)"),
        ("dumpbin", &t.dumpbin, ms.dependencies_ms.max(ms.symbols_ms), "dependents and exports (PE)"),
    ];
    let mut tools: Vec<ToolInfo> = entries
        .into_iter()
        .map(|(name, program, timeout_ms, purpose)| ToolInfo {
            name: name.to_string(),
            program: program.clone(),
            location: locate_tool(program).map(|p| p.to_string_lossy().into_owned()),
            timeout_ms,
            purpose: purpose.to_string(),
        })
        .collect();
    tools.sort_by(|a, b| a.name.cmp(&b.name));
    tools
}

/// List configured external tools and whether they can be found.
pub fn tools_command(config: &ToolConfig, json: bool) -> Result<()> {
    let tools = tool_inventory(config);

    if json {
        println!("{}", serde_json::to_string_pretty(&tools)?);
        return Ok(());
    }

    println!("Tools:");
    for tool in tools {
        let location = tool.location.as_deref().unwrap_or("missing");
        println!("- {}: {} [{}] timeout {}ms; {}", tool.name, tool.program, location, tool.timeout_ms, tool.purpose);
    }
    Ok(())
}
