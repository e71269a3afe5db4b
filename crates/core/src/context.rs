use std::sync::Arc;

use crate::config::ToolConfig;
use crate::platform::{self, ProcessPlatform};
use crate::services::{
    DependencyAnalyzer, FileHandleLocator, LibraryPathResolver, ModuleLister, ProcessController,
    ProcessQueryEngine, SymbolAnalyzer, SystemToolRunner, ToolRunner,
};

/// Bundles configuration, the platform backend, the tool runner and the library resolver.
///
/// The engines are cheap borrowing views built on demand; the resolver (and its library
/// cache) lives as long as the context does.
pub struct ScopeContext {
    pub config: ToolConfig,
    pub platform: Box<dyn ProcessPlatform>,
    pub runner: Arc<dyn ToolRunner>,
    pub resolver: LibraryPathResolver,
}

impl ScopeContext {
    /// Native platform backend with real subprocesses.
    pub fn native(config: ToolConfig) -> Self {
        let platform = platform::native(&config);
        Self::with_parts(config, platform, Arc::new(SystemToolRunner::new()))
    }

    /// Explicit backend and runner, e.g. a fabricated proc tree and scripted tools.
    pub fn with_parts(
        config: ToolConfig,
        platform: Box<dyn ProcessPlatform>,
        runner: Arc<dyn ToolRunner>,
    ) -> Self {
        let resolver = LibraryPathResolver::new(Arc::clone(&runner), &config);
        Self { config, platform, runner, resolver }
    }

    pub fn modules(&self) -> ModuleLister<'_> {
        ModuleLister::new(self.platform.as_ref())
    }

    pub fn holders(&self) -> FileHandleLocator<'_> {
        FileHandleLocator::new(self.platform.as_ref(), self.runner.as_ref(), &self.config)
    }

    pub fn processes(&self) -> ProcessQueryEngine<'_> {
        ProcessQueryEngine::new(self.platform.as_ref())
    }

    pub fn controller(&self) -> ProcessController<'_> {
        ProcessController::new(self.platform.as_ref())
    }

    pub fn dependencies(&self) -> DependencyAnalyzer<'_> {
        DependencyAnalyzer::new(self.runner.as_ref(), &self.resolver, &self.config)
    }

    pub fn symbols(&self) -> SymbolAnalyzer<'_> {
        SymbolAnalyzer::new(self.runner.as_ref(), &self.config)
    }
}
