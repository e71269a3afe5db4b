use std::env;
use std::fs;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};

pub mod commands;

/// Canonicalize a user-supplied path if possible, falling back to the given string
/// relative to the current working directory.
pub fn canonicalize_or_current(input: &str) -> Result<PathBuf> {
    let path = Path::new(input);
    if path == Path::new(".") {
        Ok(env::current_dir().context("Failed to get current directory")?)
    } else {
        // Paths that do not exist (yet) cannot be canonicalized; anchor them at the cwd.
        match path.canonicalize() {
            Ok(p) => Ok(p),
            Err(_) if path.is_absolute() => Ok(path.to_path_buf()),
            Err(_) => {
                let cwd = env::current_dir().context("Failed to get current directory")?;
                Ok(cwd.join(path))
            }
        }
    }
}

/// Compute the SHA-256 hash of a file and return it as a hex string.
pub fn sha256_file(path: &Path) -> Result<String> {
    let file = fs::File::open(path)
        .with_context(|| format!("Failed to open binary for hashing: {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];

    loop {
        let n = reader
            .read(&mut buf)
            .with_context(|| format!("Failed to read binary for hashing: {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    let digest = hasher.finalize();
    Ok(format!("{:x}", digest))
}

/// Identifying details of an analyzed binary, printed above every analysis.
#[derive(Debug, Clone, Serialize)]
pub struct BinaryIdentity {
    pub path: PathBuf,
    pub size: u64,
    pub sha256: String,
    /// RFC 3339 timestamp of the scan.
    pub scanned_at: String,
}

impl BinaryIdentity {
    pub fn inspect(path: &Path) -> Result<Self> {
        let meta = fs::metadata(path)
            .with_context(|| format!("Binary file does not exist: {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            size: meta.len(),
            sha256: sha256_file(path)?,
            scanned_at: Utc::now().to_rfc3339(),
        })
    }

    pub fn render(&self) -> String {
        format!(
            "Binary: {}\n  Size: {} bytes\n  SHA-256: {}\n  Scanned: {}\n",
            self.path.display(),
            self.size,
            self.sha256,
            self.scanned_at
        )
    }
}
