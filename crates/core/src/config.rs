use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading a [`ToolConfig`] from disk.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),
    #[error("Failed to parse config YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),
    #[error("Unsupported config format '{0}' (expected .json, .yaml or .yml)")]
    UnsupportedFormat(String),
}

/// Program names (or absolute paths) of the external tools the engines delegate to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub lsof: String,
    pub ldd: String,
    pub readelf: String,
    pub nm: String,
    pub ldconfig: String,
    pub dumpbin: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            lsof: "lsof".into(),
            ldd: "ldd".into(),
            readelf: "readelf".into(),
            nm: "nm".into(),
            ldconfig: "ldconfig".into(),
            dumpbin: "dumpbin".into(),
        }
    }
}

/// Bounded waits for each class of external tool, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolTimeouts {
    pub open_files_ms: u64,
    pub dependencies_ms: u64,
    pub symbols_ms: u64,
    pub library_cache_ms: u64,
}

impl Default for ToolTimeouts {
    fn default() -> Self {
        Self { open_files_ms: 10_000, dependencies_ms: 5_000, symbols_ms: 10_000, library_cache_ms: 2_000 }
    }
}

impl ToolTimeouts {
    pub fn open_files(&self) -> Duration {
        Duration::from_millis(self.open_files_ms)
    }

    pub fn dependencies(&self) -> Duration {
        Duration::from_millis(self.dependencies_ms)
    }

    pub fn symbols(&self) -> Duration {
        Duration::from_millis(self.symbols_ms)
    }

    pub fn library_cache(&self) -> Duration {
        Duration::from_millis(self.library_cache_ms)
    }
}

/// Serializable configuration for the introspection engines.
///
/// Every field has a default, so an empty file (or no file at all) is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub tools: ToolPaths,
    pub timeouts: ToolTimeouts,
    /// Maximum number of entries kept from a full (non-dynamic) symbol dump.
    pub symbol_cap: usize,
    /// Root of the process pseudo-filesystem.
    pub proc_root: PathBuf,
    /// Additional directories searched when resolving bare library names.
    pub extra_library_paths: Vec<PathBuf>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            tools: ToolPaths::default(),
            timeouts: ToolTimeouts::default(),
            symbol_cap: 1000,
            proc_root: PathBuf::from("/proc"),
            extra_library_paths: Vec::new(),
        }
    }
}

impl ToolConfig {
    /// Load a config file, choosing the format from its extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default().to_lowercase();
        if !matches!(ext.as_str(), "json" | "yaml" | "yml") {
            return Err(ConfigError::UnsupportedFormat(ext));
        }
        let body = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        if ext == "json" {
            Ok(serde_json::from_str(&body)?)
        } else if body.trim().is_empty() {
            Ok(Self::default())
        } else {
            Ok(serde_yaml::from_str(&body)?)
        }
    }

    /// Apply `PROCSCOPE_*` environment overrides for tool locations and the proc root.
    pub fn with_env_overrides(mut self) -> Self {
        let overrides: [(&str, &mut String); 6] = [
            ("PROCSCOPE_LSOF", &mut self.tools.lsof),
            ("PROCSCOPE_LDD", &mut self.tools.ldd),
            ("PROCSCOPE_READELF", &mut self.tools.readelf),
            ("PROCSCOPE_NM", &mut self.tools.nm),
            ("PROCSCOPE_LDCONFIG", &mut self.tools.ldconfig),
            ("PROCSCOPE_DUMPBIN", &mut self.tools.dumpbin),
        ];
        for (var, slot) in overrides {
            if let Some(value) = env::var_os(var).filter(|v| !v.is_empty()) {
                *slot = value.to_string_lossy().to_string();
            }
        }
        if let Some(root) = env::var_os("PROCSCOPE_PROC_ROOT").filter(|v| !v.is_empty()) {
            self.proc_root = PathBuf::from(root);
        }
        self
    }
}
