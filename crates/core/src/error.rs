//! Error taxonomy for introspection operations.

use std::time::Duration;

use thiserror::Error;

use crate::model::Pid;

/// Errors surfaced to callers of the introspection engines.
///
/// Each variant renders a distinct message so a frontend never confuses "nothing found"
/// with "could not search". Partial results are not errors: they come back as `Ok` values
/// with warnings attached.
#[derive(Debug, Error)]
pub enum IntrospectError {
    /// The feature has no backend on this platform.
    #[error("{feature} is not supported on this platform")]
    UnsupportedPlatform { feature: &'static str },

    /// The OS denied an enumeration or termination step.
    #[error("insufficient privilege to {action} process {pid}")]
    InsufficientPrivilege { pid: Pid, action: &'static str },

    /// An external tool is missing or failed without producing usable output.
    #[error("{tool} unavailable: {reason}")]
    ToolUnavailable { tool: String, reason: String },

    /// An external tool exceeded its bounded wait and was killed.
    #[error("{tool} timed out after {}ms and was terminated", .timeout.as_millis())]
    ToolTimeout { tool: String, timeout: Duration },

    /// The query target does not exist.
    #[error("{what} not found")]
    NotFound { what: String },

    /// The OS refused to produce a process snapshot at all.
    #[error("failed to create process snapshot: {0}")]
    SnapshotFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntrospectError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, IntrospectError::ToolTimeout { .. })
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, IntrospectError::UnsupportedPlatform { .. })
    }

    pub fn is_access_denied(&self) -> bool {
        matches!(self, IntrospectError::InsufficientPrivilege { .. })
    }
}

/// Convenience result type for introspection operations.
pub type IntrospectResult<T> = Result<T, IntrospectError>;
