//! Integration tests for graph resolution, finders and layouts

use modgate_core::{
    resolve, ChainFinder, DirectoryFinder, FindError, InMemoryFinder, ModuleConfig,
    ModuleDescriptor, ModuleError, ModuleLayer, ModuleLayout, ModuleResolver, ResolutionError,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(dir: &Path, file: &str, content: &str) {
    fs::write(dir.join(file), content).unwrap();
}

fn directory_config(dir: &Path) -> ModuleConfig {
    ModuleConfig {
        search_paths: vec![dir.to_path_buf()],
        ..Default::default()
    }
}

#[test]
fn test_resolve_from_directory() {
    let temp_dir = TempDir::new().unwrap();
    write(
        temp_dir.path(),
        "java.base.json",
        r#"{ "name": "java.base", "exports": [{ "package": "java.lang" }] }"#,
    );
    write(
        temp_dir.path(),
        "m1.json",
        r#"{ "name": "m1", "requires": ["m2"], "exports": [{ "package": "p1" }] }"#,
    );
    write(
        temp_dir.path(),
        "m2.json",
        r#"{ "name": "m2", "exports": [{ "package": "p2", "to": ["m1"] }] }"#,
    );

    let config = ModuleConfig {
        base_module: Some("java.base".to_string()),
        ..directory_config(temp_dir.path())
    };
    let finder = DirectoryFinder::new(&config);
    let graph = ModuleResolver::new(&finder, &config).resolve(["m1"]).unwrap();

    assert_eq!(graph.module_names(), vec!["java.base", "m1", "m2"]);
    assert_eq!(
        graph.reads_relation(),
        vec![
            ("m1".to_string(), "java.base".to_string()),
            ("m1".to_string(), "m2".to_string()),
            ("m2".to_string(), "java.base".to_string()),
        ]
    );
    assert_eq!(
        graph.topological_order().unwrap(),
        vec!["java.base", "m2", "m1"]
    );
}

#[test]
fn test_resolution_is_deterministic() {
    let modules = || {
        vec![
            ModuleDescriptor::builder("a").requires("b").requires("c").build().unwrap(),
            ModuleDescriptor::builder("b").requires("d").build().unwrap(),
            ModuleDescriptor::builder("c").requires("d").build().unwrap(),
            ModuleDescriptor::builder("d").build().unwrap(),
        ]
    };
    let finder = InMemoryFinder::try_from_iter(modules()).unwrap();

    let first = resolve(["a"], &finder).unwrap();
    let second = resolve(["a"], &finder).unwrap();
    assert_eq!(first.reads_relation(), second.reads_relation());
    assert_eq!(first.module_names(), second.module_names());
}

#[test]
fn test_resolve_long_requires_chain() {
    const CHAIN: usize = 50_000;
    let finder = InMemoryFinder::try_from_iter((0..CHAIN).map(|i| {
        let mut builder = ModuleDescriptor::builder(format!("m{}", i));
        if i + 1 < CHAIN {
            builder = builder.requires(format!("m{}", i + 1));
        }
        builder.build().unwrap()
    }))
    .unwrap();

    let graph = resolve(["m0"], &finder).unwrap();
    assert_eq!(graph.len(), CHAIN);
    assert_eq!(graph.edge_count(), CHAIN - 1);
    assert!(graph.reads("m0", "m1"));
    assert!(!graph.reads("m0", "m2"));
}

#[test]
fn test_conflicting_in_memory_definitions_rejected() {
    let result = InMemoryFinder::try_from_iter(vec![
        ModuleDescriptor::builder("m2").exports("p2").build().unwrap(),
        ModuleDescriptor::builder("m2").conceals("p2").build().unwrap(),
    ]);
    assert!(matches!(
        result,
        Err(ResolutionError::DuplicateModule { ref name }) if name == "m2"
    ));
}

#[test]
fn test_missing_module_aborts_without_graph() {
    let temp_dir = TempDir::new().unwrap();
    write(
        temp_dir.path(),
        "m1.json",
        r#"{ "name": "m1", "requires": ["m2", "m3"] }"#,
    );
    write(temp_dir.path(), "m2.json", r#"{ "name": "m2" }"#);

    let config = directory_config(temp_dir.path());
    let finder = DirectoryFinder::new(&config);
    let err = ModuleResolver::new(&finder, &config)
        .resolve(["m1"])
        .unwrap_err();

    assert_eq!(err.to_string(), "Module m3 not found, required by m1");
}

#[test]
fn test_finder_errors_abort_resolution() {
    let temp_dir = TempDir::new().unwrap();
    write(temp_dir.path(), "m1.json", r#"{ "name": "m1", "requires": ["m2"] }"#);
    write(temp_dir.path(), "m2.json", r#"{ "name": "m2", "bogus": true }"#);

    let config = directory_config(temp_dir.path());
    let finder = DirectoryFinder::new(&config);
    let result = ModuleResolver::new(&finder, &config).resolve(["m1"]);

    assert!(matches!(
        result,
        Err(ResolutionError::Find(FindError::Parse { .. }))
    ));
}

#[test]
fn test_chain_prefers_in_memory_definitions() {
    let temp_dir = TempDir::new().unwrap();
    write(temp_dir.path(), "m2.json", r#"{ "name": "m2" }"#);

    let config = directory_config(temp_dir.path());
    let overrides = InMemoryFinder::try_from_iter(vec![
        ModuleDescriptor::builder("m1").requires("m2").build().unwrap(),
        ModuleDescriptor::builder("m2").exports("p2").build().unwrap(),
    ])
    .unwrap();
    let finder = ChainFinder::new()
        .then(overrides)
        .then(DirectoryFinder::new(&config));

    let graph = resolve(["m1"], &finder).unwrap();
    assert!(graph.descriptor("m2").unwrap().export_rule_for("p2").is_some());
}

#[test]
fn test_layout_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("layout.json");
    fs::write(
        &path,
        r#"{
            "base_module": "java.base",
            "roots": ["m1"],
            "modules": [
                { "name": "java.base", "exports": [{ "package": "java.lang" }] },
                { "name": "m1", "requires": ["m2"] },
                { "name": "m2", "exports": [{ "package": "p2", "to": ["m1", "ALL-UNNAMED"] }] }
            ],
            "loaders": { "m1": 1, "m2": 1 }
        }"#,
    )
    .unwrap();

    let layout = ModuleLayout::load(&path).unwrap();
    let layer = ModuleLayer::from_layout(&layout, &ModuleConfig::default()).unwrap();

    assert!(layer.graph().reads("m2", "java.base"));
    assert!(layer
        .graph()
        .descriptor("m2")
        .unwrap()
        .export_rule_for("p2")
        .unwrap()
        .permits_unnamed());
}

#[test]
fn test_layout_errors() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("missing.json");
    assert!(matches!(
        ModuleLayout::load(&missing),
        Err(ModuleError::Io { .. })
    ));

    let bad = temp_dir.path().join("bad.json");
    fs::write(&bad, r#"{ "modules": [{ "name": "" }] }"#).unwrap();
    assert!(matches!(
        ModuleLayout::load(&bad),
        Err(ModuleError::Parse { .. })
    ));
}
