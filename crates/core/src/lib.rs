//! procscope-core
//!
//! Core library for point-in-time process and binary introspection.
//!
//! This crate enumerates live processes, resolves what files and shared modules they have
//! mapped, locates processes holding a filesystem path, terminates processes, and analyzes
//! an executable's dynamic dependencies and exported symbols by delegating to the platform's
//! own tooling (`lsof`, `ldd`, `readelf`, `nm`, `ldconfig`, `dumpbin`).
//!
//! All substantive logic lives here so it is fully testable and reusable from multiple
//! frontends. The `procscope` CLI is one such frontend.

pub mod config;
pub mod context;
pub mod error;
pub mod model;
pub mod platform;
pub mod services;

pub use config::ToolConfig;
pub use context::ScopeContext;
pub use error::{IntrospectError, IntrospectResult};

/// Returns the library version as encoded at compile time.
///
/// Useful for tests and for frontends to report consistent version info.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
