//! End-to-end tests that invoke the compiled `extreg` binary

use assert_cmd::Command;
use extreg_test_utils::{ExtensionDir, ManifestToml};
use predicates::prelude::*;

/// Get a Command for the extreg binary
fn extreg_cmd() -> Command {
    let mut cmd = Command::cargo_bin("extreg").expect("Failed to find extreg binary");
    cmd.env_remove("RUST_LOG").env_remove("EXTREG_CONFIG");
    cmd
}

/// An extension set with a three-level chain and one optional edge.
fn chain_dir() -> ExtensionDir {
    let dir = ExtensionDir::new();
    dir.add(ManifestToml::new("dep-1", "1.0.0"));
    dir.add(ManifestToml::new("telemetry", "0.3.0"));
    dir.add(
        ManifestToml::new("dep-2", "1.4.0")
            .dependency("dep-1", "^1.0.0")
            .optional_dependency("telemetry", "^0.3.0"),
    );
    dir.add(ManifestToml::new("main", "2.0.0").dependency("dep-2", ">=1.2.0"));
    dir
}

// ============================================================================
// General
// ============================================================================

#[test]
fn test_help_lists_commands() {
    extreg_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("load"))
        .stdout(predicate::str::contains("deps"))
        .stdout(predicate::str::contains("satisfies"));
}

#[test]
fn test_missing_subcommand_is_usage_error() {
    extreg_cmd().assert().code(2);
}

// ============================================================================
// satisfies
// ============================================================================

#[test]
fn test_satisfies_exit_codes() {
    extreg_cmd()
        .args(["satisfies", "1.5.0", ">=1.0.0, <2.0.0"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("satisfies"));

    extreg_cmd()
        .args(["satisfies", "2.0.0", "^1.2.0"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("does not satisfy"));

    extreg_cmd()
        .args(["satisfies", "1.0.0", ">=banana"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("error"));

    extreg_cmd()
        .args(["satisfies", "latest", "*"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid version"));
}

#[test]
fn test_satisfies_caret_zero_major() {
    extreg_cmd()
        .args(["satisfies", "0.3.0", "^0.2.3"])
        .assert()
        .code(1);
}

// ============================================================================
// check
// ============================================================================

#[test]
fn test_check_valid_manifests() {
    let dir = chain_dir();
    extreg_cmd()
        .arg("check")
        .arg(dir.root().join("main"))
        .arg(dir.root().join("dep-1").join("extension.toml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("main"))
        .stdout(predicate::str::contains("dep-1"));
}

#[test]
fn test_check_invalid_manifest_fails() {
    let dir = ExtensionDir::new();
    let good = dir.add(ManifestToml::new("good", "1.0.0"));
    let bad = dir.add(ManifestToml::new("bad", "1.0.0").category("widget"));

    extreg_cmd()
        .arg("check")
        .arg(&good)
        .arg(&bad)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("invalid"))
        .stdout(predicate::str::contains("widget"))
        .stderr(predicate::str::contains("1 of 2 manifests are invalid"));
}

// ============================================================================
// load
// ============================================================================

#[test]
fn test_load_table() {
    let dir = chain_dir();
    extreg_cmd()
        .arg("load")
        .arg(dir.root())
        .args(["--enable", "dep-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Extensions"))
        .stdout(predicate::str::contains("ENABLED"))
        .stdout(predicate::str::contains("4 registered, 1 enabled"));
}

#[test]
fn test_load_enable_all_json() {
    let dir = chain_dir();
    let output = extreg_cmd()
        .arg("load")
        .arg(dir.root())
        .args(["--enable-all", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["stats"]["total"], 4);
    assert_eq!(value["stats"]["enabled"], 4);
    let ids: Vec<&str> = value["extensions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["dep-1", "dep-2", "main", "telemetry"]);
}

#[test]
fn test_load_reports_rejections_and_continues() {
    let dir = chain_dir();
    dir.add(ManifestToml::new("future", "1.0.0").engine("platform", ">=2.0.0"));
    dir.add(ManifestToml::new("stale", "1.0.0").dependency("dep-1", "^2.0.0"));

    extreg_cmd()
        .arg("load")
        .arg(dir.root())
        .args(["--platform-version", "1.5.0"])
        .assert()
        .success()
        .stderr(predicate::str::contains("future"))
        .stderr(predicate::str::contains("stale"))
        .stdout(predicate::str::contains("4 registered"))
        .stdout(predicate::str::contains("2 failed"));
}

#[test]
fn test_load_with_config_file() {
    let dir = ExtensionDir::new();
    dir.add(ManifestToml::new("net", "1.0.0").permission("network"));
    dir.add(ManifestToml::new("shell", "1.0.0").permission("shell"));
    let config = dir.write_config(
        "platform_version = \"2.0.0\"\nallowed_permissions = [\"network\"]\n",
    );

    extreg_cmd()
        .arg("load")
        .arg(dir.root())
        .arg("--config")
        .arg(&config)
        .arg("--json")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"platform_version\": \"2.0.0\""))
        .stdout(predicate::str::contains("requests permission 'shell' which is not allowed"));
}

#[test]
fn test_load_missing_dir_fails() {
    let dir = ExtensionDir::new();
    extreg_cmd()
        .arg("load")
        .arg(dir.root().join("nowhere"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("is not a directory"));
}

// ============================================================================
// deps
// ============================================================================

#[test]
fn test_deps_transitive() {
    let dir = chain_dir();
    extreg_cmd()
        .arg("deps")
        .arg(dir.root())
        .arg("main")
        .assert()
        .success()
        .stdout(predicate::str::contains("dep-2"))
        .stdout(predicate::str::contains("dep-1"))
        .stdout(predicate::str::contains("telemetry").not());

    extreg_cmd()
        .arg("deps")
        .arg(dir.root())
        .arg("main")
        .arg("--include-optional")
        .assert()
        .success()
        .stdout(predicate::str::contains("telemetry"));
}

#[test]
fn test_deps_dependents() {
    let dir = chain_dir();
    extreg_cmd()
        .arg("deps")
        .arg(dir.root())
        .arg("dep-1")
        .arg("--dependents")
        .assert()
        .success()
        .stdout(predicate::str::contains("Dependents of"))
        .stdout(predicate::str::contains("dep-2"))
        .stdout(predicate::str::contains("main").not());
}

#[test]
fn test_deps_unknown_id() {
    let dir = chain_dir();
    extreg_cmd()
        .arg("deps")
        .arg(dir.root())
        .arg("ghost")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not registered"));
}

#[test]
fn test_verbose_logs_to_stderr_only() {
    let dir = chain_dir();
    let output = extreg_cmd()
        .arg("-v")
        .arg("load")
        .arg(dir.root())
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());
    // Stdout must stay parseable with debug logging on.
    serde_json::from_slice::<serde_json::Value>(&output.stdout).unwrap();
    assert!(String::from_utf8_lossy(&output.stderr).contains("registered extension"));
}
