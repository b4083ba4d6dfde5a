use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::tempdir;

const LAYOUT: &str = r#"{
    "base_module": "java.base",
    "roots": ["m1"],
    "modules": [
        { "name": "java.base", "exports": [{ "package": "java.lang" }] },
        { "name": "m1", "requires": ["m2"], "exports": [{ "package": "p1" }] },
        { "name": "m2", "exports": [{ "package": "p2" }], "concealed": ["p3"] }
    ],
    "loaders": { "m1": 1, "m2": 2 }
}"#;

fn modgate(layout: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_modgate"))
        .env("NO_COLOR", "1")
        .env("HOME", layout.parent().unwrap())
        .arg("--layout")
        .arg(layout)
        .args(args)
        .output()
        .expect("invoke modgate")
}

fn write_layout(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("layout.json");
    fs::write(&path, LAYOUT).expect("write layout");
    path
}

#[test]
fn resolve_prints_reads_graph() {
    let dir = tempdir().expect("create temp dir");
    let layout = write_layout(dir.path());

    let output = modgate(&layout, &["resolve"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Resolved 3 modules"), "got:\n{}", stdout);
    assert!(stdout.contains("reads java.base, m2"), "got:\n{}", stdout);
}

#[test]
fn resolve_json_lists_loaders() {
    let dir = tempdir().expect("create temp dir");
    let layout = write_layout(dir.path());

    let output = modgate(&layout, &["resolve", "--json"]);
    assert!(output.status.success());

    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("json output");
    let modules = report["modules"].as_array().expect("modules array");
    assert_eq!(modules.len(), 3);
    assert_eq!(modules[1]["name"], "m1");
    assert_eq!(modules[1]["loader"], 1);
    assert_eq!(report["edges"], 3);
}

#[test]
fn check_exit_status_reflects_decision() {
    let dir = tempdir().expect("create temp dir");
    let layout = write_layout(dir.path());

    let allowed = modgate(&layout, &["check", "m1/p1", "m2/p2"]);
    assert!(allowed.status.success());

    let denied = modgate(&layout, &["check", "m1/p1", "m2/p3"]);
    assert_eq!(denied.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&denied.stdout);
    assert!(
        stdout.contains("package p3 in module m2 does not export to module m1"),
        "got:\n{}",
        stdout
    );
}

#[test]
fn check_with_widening() {
    let dir = tempdir().expect("create temp dir");
    let layout = write_layout(dir.path());

    let denied = modgate(&layout, &["check", "unnamed:5/q", "m2/p3"]);
    assert_eq!(denied.status.code(), Some(1));

    let widened = modgate(
        &layout,
        &["check", "unnamed:5/q", "m2/p3", "--widen", "m2/p3"],
    );
    assert!(widened.status.success());
}

#[test]
fn check_reflect_with_widened_opens() {
    let dir = tempdir().expect("create temp dir");
    let layout = write_layout(dir.path());

    // --widen only exports, so deep reflection is still denied
    let exported = modgate(
        &layout,
        &["check", "unnamed:5/q", "m2/p3", "--reflect", "--widen", "m2/p3"],
    );
    assert_eq!(exported.status.code(), Some(1));

    let opened = modgate(
        &layout,
        &["check", "unnamed:5/q", "m2/p3", "--reflect", "--widen-opens", "m2/p3"],
    );
    assert!(opened.status.success());
}

#[test]
fn root_overrides_layout_roots() {
    let dir = tempdir().expect("create temp dir");
    let layout = write_layout(dir.path());

    let output = modgate(&layout, &["resolve", "--root", "m2"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Resolved 2 modules"), "got:
{}", stdout);
    assert!(!stdout.contains("m1"), "got:
{}", stdout);
}

#[test]
fn root_overrides_layout_from_environment() {
    let dir = tempdir().expect("create temp dir");
    let layout = write_layout(dir.path());

    let output = Command::new(env!("CARGO_BIN_EXE_modgate"))
        .env("NO_COLOR", "1")
        .env("HOME", dir.path())
        .env("MODGATE_LAYOUT", &layout)
        .args(["reads", "m1", "m2", "--root", "m2"])
        .output()
        .expect("invoke modgate");
    // m1 is no longer resolved, so it reads nothing
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn reads_and_describe() {
    let dir = tempdir().expect("create temp dir");
    let layout = write_layout(dir.path());

    assert!(modgate(&layout, &["reads", "m1", "m2"]).status.success());
    assert_eq!(
        modgate(&layout, &["reads", "m2", "m1"]).status.code(),
        Some(1)
    );

    let output = modgate(&layout, &["describe", "m2"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"name\": \"m2\""), "got:\n{}", stdout);
    assert!(stdout.contains("loader: 2"), "got:\n{}", stdout);
    assert!(stdout.contains("read by: m1"), "got:\n{}", stdout);
    assert!(stdout.contains("concealed: p3"), "got:\n{}", stdout);
}

#[test]
fn malformed_operand_is_rejected() {
    let dir = tempdir().expect("create temp dir");
    let layout = write_layout(dir.path());

    let output = modgate(&layout, &["check", "m1", "m2/p2"]);
    assert!(!output.status.success());
    assert_ne!(output.status.code(), Some(1));
}
