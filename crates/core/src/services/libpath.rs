//! Resolve bare shared-library names to files on disk.
//!
//! Lookup order: an existing path is canonicalized as-is; otherwise the candidate
//! directories (hints, `LD_LIBRARY_PATH`, conventional system dirs) are probed in order;
//! last, the system library cache (`ldconfig -p`) is consulted. That cache is built at most
//! once per resolver and never refreshed.

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, OnceLock};
use std::time::Duration;

use log::{debug, warn};
use regex::Regex;

use crate::config::ToolConfig;
use crate::services::tools::{ToolCommand, ToolRunner};

/// Environment variable listing extra library directories.
pub const LIBRARY_PATH_VAR: &str = "LD_LIBRARY_PATH";

#[cfg(windows)]
const SYSTEM_LIBRARY_DIRS: &[&str] = &[r"C:\Windows\System32", r"C:\Windows\SysWOW64"];

#[cfg(not(windows))]
const SYSTEM_LIBRARY_DIRS: &[&str] =
    &["/lib", "/usr/lib", "/lib64", "/usr/lib64", "/usr/local/lib", "/usr/local/lib64"];

pub struct LibraryPathResolver {
    runner: Arc<dyn ToolRunner>,
    ldconfig: String,
    cache_timeout: Duration,
    extra_paths: Vec<PathBuf>,
    cache: OnceLock<HashMap<String, PathBuf>>,
}

impl LibraryPathResolver {
    pub fn new(runner: Arc<dyn ToolRunner>, config: &ToolConfig) -> Self {
        Self {
            runner,
            ldconfig: config.tools.ldconfig.clone(),
            cache_timeout: config.timeouts.library_cache(),
            extra_paths: config.extra_library_paths.clone(),
            cache: OnceLock::new(),
        }
    }

    /// Resolve `name`, probing `hints` before any environment or system directory.
    pub fn resolve(&self, name: &str, hints: &[PathBuf]) -> Option<PathBuf> {
        if name.is_empty() {
            return None;
        }
        let direct = Path::new(name);
        if direct.exists() {
            return Some(direct.canonicalize().unwrap_or_else(|_| direct.to_path_buf()));
        }

        let found = self
            .search_dirs(hints)
            .into_iter()
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.exists());
        if let Some(path) = found {
            debug!("resolved {name} via search path: {}", path.display());
            return Some(path);
        }

        let cached = self.cache().get(name).cloned();
        if cached.is_none() {
            debug!("{name} not found in search path or library cache");
        }
        cached
    }

    /// Candidate directories in probe order, deduplicated on first appearance.
    pub fn search_dirs(&self, hints: &[PathBuf]) -> Vec<PathBuf> {
        let from_env: Vec<PathBuf> = env::var(LIBRARY_PATH_VAR)
            .map(|value| {
                value.split(':').filter(|s| !s.is_empty()).map(PathBuf::from).collect()
            })
            .unwrap_or_default();

        let mut dirs: Vec<PathBuf> = Vec::new();
        let ordered = hints
            .iter()
            .cloned()
            .chain(self.extra_paths.iter().cloned())
            .chain(from_env)
            .chain(SYSTEM_LIBRARY_DIRS.iter().map(PathBuf::from));
        for dir in ordered {
            if !dir.as_os_str().is_empty() && !dirs.contains(&dir) {
                dirs.push(dir);
            }
        }
        dirs
    }

    /// Whether the library cache has been populated yet.
    pub fn cache_loaded(&self) -> bool {
        self.cache.get().is_some()
    }

    fn cache(&self) -> &HashMap<String, PathBuf> {
        self.cache.get_or_init(|| self.load_cache())
    }

    fn load_cache(&self) -> HashMap<String, PathBuf> {
        let command = ToolCommand::new(&self.ldconfig, self.cache_timeout).arg("-p");
        match self.runner.run(&command) {
            Ok(output) if output.timed_out => {
                warn!("{} timed out; library cache left empty", command.display());
                HashMap::new()
            }
            Ok(output) => {
                let table = parse_library_cache(&output.stdout);
                debug!("library cache loaded with {} entries", table.len());
                table
            }
            Err(e) => {
                debug!("library cache unavailable: {e}");
                HashMap::new()
            }
        }
    }
}

static CACHE_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\S+)\s+\(.*\)\s+=>\s+(\S+)").expect("ldconfig pattern is valid")
});

/// Parse `ldconfig -p` output (`name (info) => path`) into a name -> path table.
///
/// When a name appears more than once the first entry wins, matching the cache's own
/// preference order.
pub fn parse_library_cache(stdout: &str) -> HashMap<String, PathBuf> {
    let mut table = HashMap::new();
    for line in stdout.lines() {
        if let Some(caps) = CACHE_ENTRY.captures(line) {
            table.entry(caps[1].to_string()).or_insert_with(|| PathBuf::from(&caps[2]));
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::tools::{ToolError, ToolOutput};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLdconfig {
        calls: AtomicUsize,
        stdout: String,
    }

    impl ToolRunner for CountingLdconfig {
        fn run(&self, _command: &ToolCommand) -> Result<ToolOutput, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ToolOutput { stdout: self.stdout.clone(), exit_code: Some(0), ..Default::default() })
        }
    }

    #[test]
    fn parses_cache_lines() {
        let out = "\
1234 libs found in cache `/etc/ld.so.cache'
\tlibz.so.1 (libc6,x86-64) => /lib/x86_64-linux-gnu/libz.so.1
\tlibz.so.1 (libc6) => /lib32/libz.so.1
\tlibm.so.6 (libc6,x86-64, OS ABI: Linux 3.2.0) => /lib/x86_64-linux-gnu/libm.so.6
Cache generated by: ldconfig (Ubuntu GLIBC 2.35) stable release version 2.35
";
        let table = parse_library_cache(out);
        assert_eq!(table.len(), 2);
        assert_eq!(table["libz.so.1"], PathBuf::from("/lib/x86_64-linux-gnu/libz.so.1"));
        assert_eq!(table["libm.so.6"], PathBuf::from("/lib/x86_64-linux-gnu/libm.so.6"));
    }

    #[test]
    fn search_dirs_start_with_hints_and_are_unique() {
        let runner = Arc::new(CountingLdconfig { calls: AtomicUsize::new(0), stdout: String::new() });
        let resolver = LibraryPathResolver::new(runner, &ToolConfig::default());
        let hint = PathBuf::from(SYSTEM_LIBRARY_DIRS[0]);
        let dirs = resolver.search_dirs(&[PathBuf::from("/opt/app/lib"), hint.clone()]);
        assert_eq!(dirs[0], PathBuf::from("/opt/app/lib"));
        assert_eq!(dirs[1], hint);
        assert_eq!(dirs.iter().filter(|d| **d == hint).count(), 1);
    }

    #[test]
    fn cache_is_built_once() {
        let runner = Arc::new(CountingLdconfig {
            calls: AtomicUsize::new(0),
            stdout: "\tlibprocscope-fake.so.9 (libc6,x86-64) => /opt/fake/libprocscope-fake.so.9\n"
                .into(),
        });
        let resolver = LibraryPathResolver::new(runner.clone(), &ToolConfig::default());
        assert!(!resolver.cache_loaded());
        let first = resolver.resolve("libprocscope-fake.so.9", &[]);
        let second = resolver.resolve("libprocscope-other.so.1", &[]);
        assert_eq!(first, Some(PathBuf::from("/opt/fake/libprocscope-fake.so.9")));
        assert_eq!(second, None);
        assert_eq!(runner.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn hint_directory_wins_over_cache() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("libhinted.so.1"), b"").unwrap();
        let runner = Arc::new(CountingLdconfig { calls: AtomicUsize::new(0), stdout: String::new() });
        let resolver = LibraryPathResolver::new(runner.clone(), &ToolConfig::default());
        let resolved = resolver.resolve("libhinted.so.1", &[dir.path().to_path_buf()]);
        assert_eq!(resolved, Some(dir.path().join("libhinted.so.1")));
        assert_eq!(runner.calls.load(Ordering::SeqCst), 0);
    }
}
