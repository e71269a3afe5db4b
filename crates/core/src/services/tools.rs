//! Bounded execution of external analysis tools.
//!
//! Every engine that delegates to a platform tool goes through [`ToolRunner`], so the
//! spawn / wait-with-deadline / kill-on-timeout logic exists exactly once.

use std::env;
use std::ffi::{OsStr, OsString};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};
use thiserror::Error;

use crate::error::IntrospectError;

/// A fully specified tool invocation: fixed argument vector plus its time bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<OsString>,
    pub timeout: Duration,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self { program: program.into(), args: Vec::new(), timeout }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Human-readable command line for logs and diagnostics.
    pub fn display(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }

    /// Short tool name used in user-facing messages (`/usr/bin/lsof` -> `lsof`).
    pub fn tool_name(&self) -> String {
        Path::new(&self.program)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.program)
            .to_string()
    }
}

/// Captured result of one tool run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was killed by a signal (including our own timeout kill).
    pub exit_code: Option<i32>,
    /// The bounded wait expired; stdout/stderr are discarded in that case.
    pub timed_out: bool,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    /// Exit code for messages; signal deaths render as `-1`.
    pub fn code(&self) -> i32 {
        self.exit_code.unwrap_or(-1)
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to spawn {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed while waiting for {tool}: {source}")]
    Wait {
        tool: String,
        #[source]
        source: std::io::Error,
    },
}

impl ToolError {
    pub fn tool(&self) -> &str {
        match self {
            ToolError::Spawn { tool, .. } | ToolError::Wait { tool, .. } => tool,
        }
    }
}

impl From<ToolError> for IntrospectError {
    fn from(err: ToolError) -> Self {
        IntrospectError::ToolUnavailable { tool: err.tool().to_string(), reason: err.to_string() }
    }
}

/// Trait implemented by anything able to run a [`ToolCommand`].
///
/// The engines only depend on this trait, so tests can substitute scripted output.
pub trait ToolRunner: Send + Sync {
    fn run(&self, command: &ToolCommand) -> Result<ToolOutput, ToolError>;
}

/// Runs tools as real subprocesses with captured stdio and a hard deadline.
#[derive(Debug, Clone)]
pub struct SystemToolRunner {
    poll_interval: Duration,
}

impl Default for SystemToolRunner {
    fn default() -> Self {
        Self { poll_interval: Duration::from_millis(10) }
    }
}

impl SystemToolRunner {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ToolRunner for SystemToolRunner {
    fn run(&self, command: &ToolCommand) -> Result<ToolOutput, ToolError> {
        debug!("running `{}` (timeout {}ms)", command.display(), command.timeout.as_millis());
        let mut process = Command::new(&command.program);
        process
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        isolate(&mut process);
        let mut child = process
            .spawn()
            .map_err(|source| ToolError::Spawn { tool: command.tool_name(), source })?;

        // Drain both pipes concurrently so a chatty tool never blocks on a full pipe.
        let stdout_reader = child.stdout.take().map(drain);
        let stderr_reader = child.stderr.take().map(drain);

        let deadline = Instant::now() + command.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    warn!(
                        "`{}` exceeded {}ms; killing it",
                        command.display(),
                        command.timeout.as_millis()
                    );
                    reap(&mut child);
                    // Readers finish on their own once the pipes close; output is discarded.
                    return Ok(ToolOutput { timed_out: true, ..ToolOutput::default() });
                }
                Ok(None) => thread::sleep(self.poll_interval),
                Err(source) => {
                    reap(&mut child);
                    return Err(ToolError::Wait { tool: command.tool_name(), source });
                }
            }
        };

        // The tool has exited, but anything it started may still hold the pipes open.
        let mut stdout = receive(stdout_reader.as_ref(), deadline);
        let mut stderr = receive(stderr_reader.as_ref(), deadline);
        if stdout.is_none() || stderr.is_none() {
            warn!(
                "`{}` exited but left processes holding its output; killing them",
                command.tool_name()
            );
            kill_group(&child);
            let grace = Instant::now() + STRAGGLER_GRACE;
            if stdout.is_none() {
                stdout = receive(stdout_reader.as_ref(), grace);
            }
            if stderr.is_none() {
                stderr = receive(stderr_reader.as_ref(), grace);
            }
        }
        kill_group(&child);

        let output = ToolOutput {
            stdout: lossy(stdout),
            stderr: lossy(stderr),
            exit_code: status.code(),
            timed_out: false,
        };
        debug!(
            "`{}` exited with {:?} ({} bytes stdout, {} bytes stderr)",
            command.tool_name(),
            output.exit_code,
            output.stdout.len(),
            output.stderr.len()
        );
        Ok(output)
    }
}

/// How long pipe readers get to finish after leftover processes are killed.
const STRAGGLER_GRACE: Duration = Duration::from_millis(100);

fn drain<R: Read + Send + 'static>(mut pipe: R) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        let _ = tx.send(buf);
    });
    rx
}

/// Bytes from a pipe reader, or `None` if it is still blocked at `deadline`.
fn receive(reader: Option<&Receiver<Vec<u8>>>, deadline: Instant) -> Option<Vec<u8>> {
    match reader {
        Some(rx) => rx.recv_timeout(deadline.saturating_duration_since(Instant::now())).ok(),
        None => Some(Vec::new()),
    }
}

fn lossy(bytes: Option<Vec<u8>>) -> String {
    bytes.map(|b| String::from_utf8_lossy(&b).into_owned()).unwrap_or_default()
}

fn reap(child: &mut Child) {
    kill_group(child);
    let _ = child.kill();
    let _ = child.wait();
}

/// Run the tool as the leader of a fresh process group so helpers it spawns can be
/// killed along with it.
#[cfg(unix)]
fn isolate(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    command.process_group(0);
}

#[cfg(not(unix))]
fn isolate(_command: &mut Command) {}

#[cfg(unix)]
fn kill_group(child: &Child) {
    // The tool leads its own group, so its pid is also the group id. The kernel does not
    // hand out a pid that is still in use as a group id, so this never hits a stranger.
    let Ok(pgid) = libc::pid_t::try_from(child.id()) else {
        return;
    };
    // SAFETY: killpg(2) has no memory-safety preconditions; an empty group yields ESRCH.
    unsafe { libc::killpg(pgid, libc::SIGKILL) };
}

#[cfg(not(unix))]
fn kill_group(_child: &Child) {}

/// Locate a tool the way a shell would: explicit paths are checked directly, bare names
/// are searched on `PATH`.
pub fn locate_tool(program: &str) -> Option<PathBuf> {
    let direct = Path::new(program);
    if direct.components().count() > 1 {
        return direct.is_file().then(|| direct.to_path_buf());
    }
    let names: Vec<String> = if cfg!(windows) && direct.extension().is_none() {
        vec![format!("{program}.exe"), program.to_string()]
    } else {
        vec![program.to_string()]
    };
    env::var_os("PATH").and_then(|paths| {
        env::split_paths(&paths).find_map(|dir| {
            names.iter().map(|name| dir.join(name)).find(|candidate| candidate.is_file())
        })
    })
}
