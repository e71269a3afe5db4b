mod common;

use std::sync::Arc;

use common::{FixedTable, ScriptedRunner};
use procscope_core::platform::HolderStrategy;
use procscope_core::services::handles::HEURISTIC_LIMITATION;
use procscope_core::{ScopeContext, ToolConfig};

fn context(table: FixedTable) -> ScopeContext {
    ScopeContext::with_parts(ToolConfig::default(), Box::new(table), Arc::new(ScriptedRunner::new()))
}

fn partially_readable_table() -> FixedTable {
    FixedTable::new(3)
        .process(100, "svchost", Some(r"C:\Windows\System32\svchost.exe"), &[])
        .process(200, "editor", Some(r"C:\Tools\Editor\editor.exe"), &[
            r"C:\Tools\Editor\editor.exe",
            r"C:\Windows\System32\kernel32.dll",
        ])
        .process(300, "System", None, &[])
        .process(400, "Secure System", None, &[])
}

#[test]
fn process_query_reports_restricted_scan_once() {
    let ctx = context(partially_readable_table());
    let result = ctx.processes().find_processes("").unwrap();

    // svchost via its executable, editor via two modules; the pathless ones are omitted.
    assert_eq!(result.len(), 3);
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].starts_with("insufficient privilege"));
    assert!(result.warnings[0].contains("3 process(es)"));
}

#[test]
fn heuristic_holder_search_reports_restricted_scan_once() {
    let ctx = context(partially_readable_table());
    let result = ctx.holders().find_holders(r"c:\tools\editor".as_ref()).unwrap();

    assert_eq!(result.len(), 1);
    assert_eq!(result.rows[0].pid, 200);
    assert_eq!(result.rows[0].path, r"C:\Tools\Editor\editor.exe");
    assert_eq!(result.limitation.as_deref(), Some(HEURISTIC_LIMITATION));
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("3 process(es)"));
}

#[test]
fn unrestricted_scan_has_no_privilege_note() {
    let ctx = context(FixedTable::new(0).process(1, "init", Some("/sbin/init"), &[]));
    assert!(ctx.processes().find_processes("init").unwrap().warnings.is_empty());
    assert!(ctx.holders().match_executable_paths("/sbin".as_ref()).unwrap().warnings.is_empty());
}

#[test]
fn unsupported_holder_strategy_is_an_error() {
    let mut table = FixedTable::new(0);
    table.strategy = HolderStrategy::Unsupported;
    let err = context(table).holders().find_holders("/tmp".as_ref()).unwrap_err();
    assert!(matches!(err, procscope_core::IntrospectError::UnsupportedPlatform { .. }));
}
