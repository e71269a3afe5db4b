#![cfg(target_os = "linux")]

mod common;

use std::path::PathBuf;
use std::sync::Arc;

use common::{exited, maps_line, ok, timed_out, FakeProc, ScriptedRunner};
use procscope_core::error::IntrospectError;
use procscope_core::platform::procfs::{ProcFs, UNKNOWN_PROCESS_NAME};
use procscope_core::platform::ProcessPlatform;
use procscope_core::services::handles::{HEURISTIC_LIMITATION, INACCESSIBLE_PATH};
use procscope_core::{ScopeContext, ToolConfig};

fn context(proc: &FakeProc, runner: ScriptedRunner) -> (ScopeContext, Arc<ScriptedRunner>) {
    let runner = Arc::new(runner);
    let config = ToolConfig { proc_root: proc.root().to_path_buf(), ..ToolConfig::default() };
    let ctx = ScopeContext::with_parts(
        config,
        Box::new(ProcFs::new(proc.root())),
        runner.clone(),
    );
    (ctx, runner)
}

fn sample_tree() -> FakeProc {
    let proc = FakeProc::new();
    let maps = format!(
        "{}{}{}55d4c8b3e000-55d4c8b5f000 rw-p 00000000 00:00 0 [heap]\n\
         7f2a1c000000-7f2a1c021000 rw-p 00000000 00:00 0\n{}",
        maps_line("/usr/bin/FireFox"),
        maps_line("/usr/lib/libxul.so"),
        maps_line("/usr/bin/FireFox"),
        maps_line("/usr/lib/libc.so.6"),
    );
    proc.add(1234, "firefox", Some("/usr/bin/FireFox"), Some(&maps))
        .add(88, "Isolated Web Co", Some("/usr/bin/FireFox"), Some(&maps_line("/usr/lib/libc.so.6")))
        .add(7, "kthreadd", None, None)
        .add(4321, "bash", Some("/usr/bin/bash"), None)
        .add(12, "firefox-helper", Some("/opt/ff/helper"), Some(""));
    proc
}

#[test]
fn scan_lists_numeric_entries_in_pid_order() {
    let proc = sample_tree();
    let snapshot = ProcFs::new(proc.root()).list_processes().unwrap();
    let pids: Vec<u32> = snapshot.processes.iter().map(|p| p.pid).collect();
    assert_eq!(pids, vec![7, 12, 88, 1234, 4321]);
    assert_eq!(snapshot.restricted, 0);
    assert!(snapshot.privilege_note().is_none());

    let kthread = &snapshot.processes[0];
    assert_eq!(kthread.name, "kthreadd");
    assert_eq!(kthread.executable_path, None);
}

#[test]
fn unreadable_name_is_shown_as_unknown() {
    let proc = FakeProc::new();
    proc.add_unreadable_name(55, "/usr/sbin/daemon");
    let snapshot = ProcFs::new(proc.root()).list_processes().unwrap();
    assert_eq!(snapshot.processes.len(), 1);
    assert_eq!(snapshot.processes[0].name, UNKNOWN_PROCESS_NAME);
    assert_eq!(snapshot.processes[0].executable_path, Some(PathBuf::from("/usr/sbin/daemon")));
}

#[test]
fn missing_proc_root_is_a_snapshot_failure() {
    let proc = FakeProc::new();
    let platform = ProcFs::new(proc.root().join("absent"));
    assert!(matches!(platform.list_processes(), Err(IntrospectError::SnapshotFailed(_))));
}

#[test]
fn process_exists_and_executable_lookup() {
    let proc = sample_tree();
    let platform = ProcFs::new(proc.root());
    assert!(platform.process_exists(1234));
    assert!(!platform.process_exists(999));
    assert_eq!(platform.resolve_executable_path(4321), Some(PathBuf::from("/usr/bin/bash")));
    assert_eq!(platform.resolve_executable_path(7), None);
}

#[test]
fn module_set_has_no_duplicates_or_pseudo_regions() {
    let proc = sample_tree();
    let (ctx, _) = context(&proc, ScriptedRunner::new());
    let modules = ctx.modules().list_modules(1234);
    let paths: Vec<PathBuf> = modules.iter().map(|m| m.path.clone()).collect();
    assert_eq!(
        paths,
        vec![
            PathBuf::from("/usr/bin/FireFox"),
            PathBuf::from("/usr/lib/libc.so.6"),
            PathBuf::from("/usr/lib/libxul.so"),
        ]
    );
    assert!(modules.iter().all(|m| m.pid == 1234));
    assert!(ctx.modules().list_paths(999).is_empty());
}

#[test]
fn numeric_query_matches_only_that_pid() {
    let proc = sample_tree();
    let (ctx, _) = context(&proc, ScriptedRunner::new());
    let result = ctx.processes().find_processes("1234").unwrap();
    assert_eq!(result.len(), 3);
    assert!(result.rows.iter().all(|row| row.pid == 1234));
    assert!(result.rows.iter().all(|row| row.process_name == "firefox"));
}

#[test]
fn substring_query_is_case_insensitive() {
    let proc = sample_tree();
    let (ctx, _) = context(&proc, ScriptedRunner::new());
    let result = ctx.processes().find_processes("FIREFOX").unwrap();
    assert!(!result.is_empty());
    assert!(result.rows.iter().all(|row| row.process_name.to_lowercase().contains("firefox")));
    // "Isolated Web Co" maps FireFox libraries but its own name does not match.
    assert!(result.rows.iter().all(|row| row.pid != 88));
}

#[test]
fn process_without_modules_falls_back_to_executable() {
    let proc = sample_tree();
    let (ctx, _) = context(&proc, ScriptedRunner::new());

    let helper = ctx.processes().find_processes("helper").unwrap();
    assert_eq!(helper.len(), 1);
    assert_eq!(helper.rows[0].path, "/opt/ff/helper");

    let kthread = ctx.processes().find_processes("kthreadd").unwrap();
    assert!(kthread.is_empty(), "no modules and no executable means no row");
}

#[test]
fn unmatched_name_yields_zero_rows_not_an_error() {
    let proc = sample_tree();
    let (ctx, _) = context(&proc, ScriptedRunner::new());
    let result = ctx.processes().find_processes("nonexistent_xyz").unwrap();
    assert!(result.is_empty());
    assert!(result.warnings.is_empty());
}

#[test]
fn executable_heuristic_matches_paths_in_either_direction() {
    let proc = FakeProc::new();
    proc.add(10, "app", Some("/Opt/App/bin/app"), None)
        .add(11, "kworker", None, None)
        .add(12, "other", Some("/usr/bin/other"), None);
    let (ctx, runner) = context(&proc, ScriptedRunner::new());
    let holders = ctx.holders();

    // Query is a prefix of the executable, in a different case.
    let result = holders.match_executable_paths("/opt/app".as_ref()).unwrap();
    let pids: Vec<u32> = result.rows.iter().map(|r| r.pid).collect();
    assert_eq!(pids, vec![10]);
    assert_eq!(result.rows[0].path, "/Opt/App/bin/app");
    assert_eq!(result.limitation.as_deref(), Some(HEURISTIC_LIMITATION));
    assert!(result.warnings.is_empty());

    // Executable is contained in a longer query path.
    let result = holders.match_executable_paths("/opt/app/bin/app/extra/file".as_ref()).unwrap();
    let pids: Vec<u32> = result.rows.iter().map(|r| r.pid).collect();
    assert_eq!(pids, vec![10]);

    let result = holders.match_executable_paths("/srv/nothing".as_ref()).unwrap();
    assert!(result.is_empty());
    assert!(result.limitation.is_some());

    let result = holders.match_executable_paths("".as_ref()).unwrap();
    assert!(result.is_empty());
    assert!(result.limitation.is_some());

    assert!(runner.calls().is_empty(), "the heuristic never runs external tools");
}

const LSOF_TABLE: &str = "\
COMMAND  PID USER   FD   TYPE DEVICE SIZE/OFF    NODE NAME
myproc  1234 alice mem    REG  259,2   14480 1048602 /usr/lib/libfoo.so
";

#[test]
fn lsof_row_resolves_holder_executable() {
    let proc = FakeProc::new();
    proc.add(1234, "myproc", Some("/usr/bin/myproc"), None);
    let (ctx, runner) = context(&proc, ScriptedRunner::new().on("lsof", ok(LSOF_TABLE)));

    let result = ctx.holders().find_holders("/usr/lib/libfoo.so".as_ref()).unwrap();
    assert_eq!(result.len(), 1);
    let row = &result.rows[0];
    assert_eq!((row.process_name.as_str(), row.pid, row.path.as_str()), ("myproc", 1234, "/usr/bin/myproc"));
    assert!(result.warnings.is_empty());
    assert!(result.limitation.is_none());
    assert_eq!(runner.calls(), vec!["lsof /usr/lib/libfoo.so".to_string()]);
}

#[test]
fn holder_with_unreadable_executable_is_marked() {
    let proc = FakeProc::new();
    let (ctx, _) = context(&proc, ScriptedRunner::new().on("lsof", ok(LSOF_TABLE)));
    let result = ctx.holders().find_holders("/usr/lib/libfoo.so".as_ref()).unwrap();
    assert_eq!(result.rows[0].path, INACCESSIBLE_PATH);
}

#[test]
fn directory_queries_recurse() {
    let proc = FakeProc::new();
    let (ctx, runner) = context(&proc, ScriptedRunner::new().on("lsof", ok("")));
    let target = proc.root().to_path_buf();
    let result = ctx.holders().find_holders(&target).unwrap();
    assert!(result.is_empty());
    assert!(runner.calls()[0].starts_with("lsof +D "));
}

#[test]
fn nonzero_exit_with_rows_is_a_partial_result() {
    let proc = FakeProc::new();
    proc.add(1234, "myproc", Some("/usr/bin/myproc"), None);
    let (ctx, _) = context(&proc, ScriptedRunner::new().on("lsof", exited(1, LSOF_TABLE, "")));
    let result = ctx.holders().find_holders("/usr/lib/libfoo.so".as_ref()).unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("returned code 1"));
}

#[test]
fn empty_failed_lsof_reports_exit_code() {
    let proc = FakeProc::new();
    let (ctx, _) = context(&proc, ScriptedRunner::new().on("lsof", exited(1, "", "")));
    let err = ctx.holders().find_holders("/usr/lib/libfoo.so".as_ref()).unwrap_err();
    match err {
        IntrospectError::ToolUnavailable { tool, reason } => {
            assert_eq!(tool, "lsof");
            assert_eq!(reason, "lsof returned code 1");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn lsof_timeout_and_missing_tool_are_distinct() {
    let proc = FakeProc::new();
    let (ctx, _) = context(&proc, ScriptedRunner::new().on("lsof", timed_out()));
    let err = ctx.holders().find_holders("/usr/lib/libfoo.so".as_ref()).unwrap_err();
    assert!(err.is_timeout());
    assert!(err.to_string().contains("10000ms"));

    let (ctx, _) = context(&proc, ScriptedRunner::new().missing("lsof"));
    let err = ctx.holders().find_holders("/usr/lib/libfoo.so".as_ref()).unwrap_err();
    assert!(matches!(err, IntrospectError::ToolUnavailable { .. }));
    assert!(!err.is_timeout());
}

#[test]
fn terminate_rejects_process_group_ids() {
    let proc = FakeProc::new();
    let (ctx, _) = context(&proc, ScriptedRunner::new());
    assert!(matches!(ctx.controller().terminate(0), Err(IntrospectError::NotFound { .. })));
}

#[test]
fn terminate_kills_a_child_process() {
    let mut child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
    let ctx = ScopeContext::native(ToolConfig::default());
    ctx.controller().terminate(child.id()).unwrap();
    let status = child.wait().unwrap();
    assert!(!status.success());
}
