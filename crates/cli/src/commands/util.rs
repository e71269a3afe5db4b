use anyhow::{Context, Result};
use procscope_core::model::SearchResult;
use procscope_core::{ScopeContext, ToolConfig};

/// Load the tool configuration (file if given, else defaults) plus `PROCSCOPE_*` overrides.
pub fn load_config(config_path: Option<&str>) -> Result<ToolConfig> {
    let config = match config_path {
        Some(path) => ToolConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {path}"))?,
        None => ToolConfig::default(),
    };
    Ok(config.with_env_overrides())
}

/// Build the native context the commands run against.
pub fn load_context(config_path: Option<&str>) -> Result<ScopeContext> {
    Ok(ScopeContext::native(load_config(config_path)?))
}

/// Render warnings as a trailing bullet list; empty when there are none.
pub fn render_warnings(warnings: &[String]) -> String {
    if warnings.is_empty() {
        return String::new();
    }
    let mut out = String::from("Warnings:\n");
    for warning in warnings {
        out.push_str(&format!("- {warning}\n"));
    }
    out
}

/// Render search rows as aligned `name  pid  path` lines followed by a status line.
pub fn render_search_result(result: &SearchResult, status: &str) -> String {
    let mut out = String::new();
    if !result.rows.is_empty() {
        let width = result.rows.iter().map(|r| r.process_name.len()).max().unwrap_or(0).max(4);
        out.push_str(&format!("{:<width$}  {:>7}  PATH\n", "NAME", "PID"));
        for row in &result.rows {
            out.push_str(&format!("{:<width$}  {:>7}  {}\n", row.process_name, row.pid, row.path));
        }
    }
    out.push_str(status);
    out.push('\n');
    if let Some(limitation) = &result.limitation {
        out.push_str(&format!("Note: {limitation}\n"));
    }
    out.push_str(&render_warnings(&result.warnings));
    out
}
