#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use procscope_core::error::{IntrospectError, IntrospectResult};
use procscope_core::model::{Pid, ProcessRecord, ProcessSnapshot};
use procscope_core::platform::{HolderStrategy, ProcessPlatform};
use procscope_core::services::tools::{ToolCommand, ToolError, ToolOutput, ToolRunner};

/// Tool runner that answers from a script instead of spawning processes.
///
/// Responses are keyed by a prefix of the rendered command line (`nm -D`, `ldd`, ...); the
/// first registered prefix that matches wins. Unscripted commands behave like a missing tool.
#[derive(Default)]
pub struct ScriptedRunner {
    responses: Vec<(String, Option<ToolOutput>)>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, prefix: &str, output: ToolOutput) -> Self {
        self.responses.push((prefix.to_string(), Some(output)));
        self
    }

    pub fn missing(mut self, prefix: &str) -> Self {
        self.responses.push((prefix.to_string(), None));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called(&self, prefix: &str) -> bool {
        self.calls().iter().any(|c| c.starts_with(prefix))
    }
}

impl ToolRunner for ScriptedRunner {
    fn run(&self, command: &ToolCommand) -> Result<ToolOutput, ToolError> {
        let line = command.display();
        self.calls.lock().unwrap().push(line.clone());
        let scripted = self
            .responses
            .iter()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .and_then(|(_, output)| output.clone());
        scripted.ok_or_else(|| ToolError::Spawn {
            tool: command.tool_name(),
            source: io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
        })
    }
}

pub fn ok(stdout: &str) -> ToolOutput {
    ToolOutput { stdout: stdout.to_string(), exit_code: Some(0), ..ToolOutput::default() }
}

pub fn exited(code: i32, stdout: &str, stderr: &str) -> ToolOutput {
    ToolOutput {
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
        exit_code: Some(code),
        timed_out: false,
    }
}

pub fn timed_out() -> ToolOutput {
    ToolOutput { timed_out: true, ..ToolOutput::default() }
}

/// A placeholder file standing in for the binary under analysis.
pub fn fake_binary(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"\x7fELF").unwrap();
    path
}

/// A fabricated process pseudo-filesystem rooted in a temp dir.
#[cfg(unix)]
pub struct FakeProc {
    pub dir: tempfile::TempDir,
}

#[cfg(unix)]
impl FakeProc {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        // Non-numeric entries sit beside the pid directories in a real /proc.
        std::fs::create_dir_all(dir.path().join("self")).unwrap();
        std::fs::write(dir.path().join("uptime"), "1.0 1.0\n").unwrap();
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn add(&self, pid: u32, comm: &str, exe: Option<&str>, maps: Option<&str>) -> &Self {
        let entry = self.dir.path().join(pid.to_string());
        std::fs::create_dir_all(&entry).unwrap();
        std::fs::write(entry.join("comm"), format!("{comm}\n")).unwrap();
        if let Some(target) = exe {
            std::os::unix::fs::symlink(target, entry.join("exe")).unwrap();
        }
        if let Some(maps) = maps {
            std::fs::write(entry.join("maps"), maps).unwrap();
        }
        self
    }

    /// A process whose `comm` exists but cannot be read as a file.
    pub fn add_unreadable_name(&self, pid: u32, exe: &str) -> &Self {
        let entry = self.dir.path().join(pid.to_string());
        std::fs::create_dir_all(entry.join("comm")).unwrap();
        std::os::unix::fs::symlink(exe, entry.join("exe")).unwrap();
        self
    }
}

pub fn maps_line(path: &str) -> String {
    format!("7f2a1d5e0000-7f2a1d608000 r--p 00000000 08:01 2034 {path}\n")
}

/// In-memory process table with a fixed snapshot, for behaviour that a fabricated `/proc`
/// cannot reproduce (restricted entries, Windows-style holder search).
pub struct FixedTable {
    pub snapshot: ProcessSnapshot,
    pub modules: HashMap<Pid, Vec<PathBuf>>,
    pub strategy: HolderStrategy,
}

impl FixedTable {
    pub fn new(restricted: usize) -> Self {
        Self {
            snapshot: ProcessSnapshot { processes: Vec::new(), restricted },
            modules: HashMap::new(),
            strategy: HolderStrategy::ExecutablePathHeuristic,
        }
    }

    pub fn process(mut self, pid: Pid, name: &str, exe: Option<&str>, modules: &[&str]) -> Self {
        self.snapshot.processes.push(ProcessRecord {
            pid,
            name: name.to_string(),
            executable_path: exe.map(PathBuf::from),
        });
        self.modules.insert(pid, modules.iter().map(PathBuf::from).collect());
        self
    }
}

impl ProcessPlatform for FixedTable {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn list_processes(&self) -> IntrospectResult<ProcessSnapshot> {
        Ok(self.snapshot.clone())
    }

    fn resolve_executable_path(&self, pid: Pid) -> Option<PathBuf> {
        self.snapshot.processes.iter().find(|p| p.pid == pid)?.executable_path.clone()
    }

    fn process_exists(&self, pid: Pid) -> bool {
        self.snapshot.processes.iter().any(|p| p.pid == pid)
    }

    fn module_paths(&self, pid: Pid) -> Vec<PathBuf> {
        self.modules.get(&pid).cloned().unwrap_or_default()
    }

    fn terminate(&self, pid: Pid) -> IntrospectResult<()> {
        Err(IntrospectError::InsufficientPrivilege { pid, action: "terminate" })
    }

    fn holder_strategy(&self) -> HolderStrategy {
        self.strategy
    }
}
