use procscope_core::{version, ScopeContext, ToolConfig};

#[test]
fn version_is_non_empty() {
    let v = version();
    assert!(!v.is_empty());
}

#[test]
fn native_context_uses_configured_tools() {
    let config = ToolConfig { symbol_cap: 10, ..ToolConfig::default() };
    let ctx = ScopeContext::native(config);
    assert_eq!(ctx.config.symbol_cap, 10);
    assert!(!ctx.resolver.cache_loaded(), "library cache is built lazily");
    assert!(!ctx.platform.name().is_empty());
}

#[test]
fn config_files_load_by_extension() {
    let dir = tempfile::tempdir().unwrap();

    let yaml = dir.path().join("procscope.yaml");
    std::fs::write(&yaml, "tools:\n  lsof: /opt/lsof/bin/lsof\ntimeouts:\n  open_files_ms: 2500\n")
        .unwrap();
    let cfg = ToolConfig::load(&yaml).unwrap();
    assert_eq!(cfg.tools.lsof, "/opt/lsof/bin/lsof");
    assert_eq!(cfg.timeouts.open_files_ms, 2500);
    assert_eq!(cfg.timeouts.symbols_ms, 10_000);

    let empty = dir.path().join("empty.yml");
    std::fs::write(&empty, "").unwrap();
    assert_eq!(ToolConfig::load(&empty).unwrap(), ToolConfig::default());

    let json = dir.path().join("procscope.json");
    std::fs::write(&json, r#"{"extra_library_paths":["/opt/app/lib"]}"#).unwrap();
    let cfg = ToolConfig::load(&json).unwrap();
    assert_eq!(cfg.extra_library_paths, vec![std::path::PathBuf::from("/opt/app/lib")]);

    let toml = dir.path().join("procscope.toml");
    std::fs::write(&toml, "").unwrap();
    let err = ToolConfig::load(&toml).unwrap_err();
    assert!(err.to_string().contains("Unsupported config format"));

    let err = ToolConfig::load(dir.path().join("missing.json")).unwrap_err();
    assert!(err.to_string().contains("Failed to read config"));
}
