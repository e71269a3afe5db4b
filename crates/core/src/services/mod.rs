//! Query engines built on top of the platform backends and external tools.

pub mod control;
pub mod dependencies;
pub mod handles;
pub mod libpath;
pub mod modules;
pub mod process_query;
pub mod symbols;
pub mod tools;

pub use control::ProcessController;
pub use dependencies::DependencyAnalyzer;
pub use handles::FileHandleLocator;
pub use libpath::LibraryPathResolver;
pub use modules::ModuleLister;
pub use process_query::{ProcessQuery, ProcessQueryEngine};
pub use symbols::SymbolAnalyzer;
pub use tools::{SystemToolRunner, ToolCommand, ToolOutput, ToolRunner};
