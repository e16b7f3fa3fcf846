//! Golden-file tests over test-fixtures/
//!
//! The fixture set models a small host install: a registry config and one
//! directory per extension, including one that targets an older platform.

use std::fs;
use std::path::PathBuf;

use extreg_core::{
    DependencyGraph, ExtensionCategory, ExtensionManifest, ExtensionRegistry, ExtensionState,
    MANIFEST_FILENAME, MANIFEST_JSON_FILENAME, Permission, RegistryConfig, RegistryError,
};
use pretty_assertions::assert_eq;
use semver::Version;

/// Path to the test-fixtures directory (relative to the workspace root).
fn fixtures_dir() -> PathBuf {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    // tests/integration -> ../../test-fixtures
    manifest_dir.join("../../test-fixtures")
}

/// Every fixture manifest with its extension directory, sorted by directory.
fn load_fixture_manifests() -> Vec<(PathBuf, ExtensionManifest)> {
    let mut dirs: Vec<PathBuf> = fs::read_dir(fixtures_dir().join("extensions"))
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();

    dirs.into_iter()
        .map(|dir| {
            let toml = dir.join(MANIFEST_FILENAME);
            let path = if toml.exists() {
                toml
            } else {
                dir.join(MANIFEST_JSON_FILENAME)
            };
            let manifest = ExtensionManifest::from_path(&path)
                .unwrap_or_else(|e| panic!("Fixture {} is invalid: {}", path.display(), e));
            (dir, manifest)
        })
        .collect()
}

fn fixture_config() -> RegistryConfig {
    RegistryConfig::load(&fixtures_dir().join("registry.toml")).unwrap()
}

// ==========================================================================
// Fixture Validity Tests
// ==========================================================================

#[test]
fn test_every_fixture_manifest_is_valid() {
    let manifests = load_fixture_manifests();
    let ids: Vec<&str> = manifests.iter().map(|(_, m)| m.id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "ai-assistant",
            "core-utils",
            "http-client",
            "legacy-linter",
            "telemetry",
            "theme-dark"
        ]
    );
    for (dir, manifest) in &manifests {
        assert_eq!(
            dir.file_name().and_then(|n| n.to_str()),
            Some(manifest.id.as_str()),
            "directory name should match the extension id"
        );
    }
}

#[test]
fn test_json_fixture_parses_like_toml() {
    let manifests = load_fixture_manifests();
    let (_, theme) = manifests
        .iter()
        .find(|(_, m)| m.id == "theme-dark")
        .unwrap();
    assert_eq!(theme.category, ExtensionCategory::Theme);
    assert_eq!(theme.main, "theme.css");
    assert_eq!(theme.engines.get("platform").map(String::as_str), Some("*"));
}

#[test]
fn test_registry_config_fixture() {
    let config = fixture_config();
    assert_eq!(config.platform_version, Version::new(1, 5, 0));
    assert_eq!(config.max_extensions, Some(16));
    assert!(config.permits(Permission::Agent));
    assert!(!config.permits(Permission::Shell));
}

// ==========================================================================
// Loading the fixture set
// ==========================================================================

#[test]
fn test_fixture_dependency_order() {
    let manifests = load_fixture_manifests();
    let order = DependencyGraph::from_manifests(manifests.iter().map(|(_, m)| m))
        .topological_sort()
        .unwrap();
    assert_eq!(
        order,
        vec![
            "core-utils",
            "legacy-linter",
            "telemetry",
            "http-client",
            "ai-assistant",
            "theme-dark"
        ]
    );
}

#[test]
fn test_fixture_set_registers_except_legacy() {
    let manifests = load_fixture_manifests();
    let order = DependencyGraph::from_manifests(manifests.iter().map(|(_, m)| m))
        .topological_sort()
        .unwrap();
    let registry = ExtensionRegistry::new(fixture_config());

    let mut rejected = Vec::new();
    for id in &order {
        let (dir, manifest) = manifests.iter().find(|(_, m)| &m.id == id).unwrap();
        if let Err(e) = registry.register(manifest.clone(), dir.clone()) {
            rejected.push((id.clone(), e));
        }
    }

    assert_eq!(rejected.len(), 1);
    let (id, err) = &rejected[0];
    assert_eq!(id, "legacy-linter");
    assert!(matches!(
        err,
        RegistryError::IncompatiblePlatformVersion { constraint, .. } if constraint == "<1.0.0"
    ));

    assert_eq!(registry.len(), 5);
    assert_eq!(
        registry.get_dependencies("ai-assistant", false),
        vec!["http-client", "core-utils"]
    );
    assert_eq!(
        registry.get_dependencies("ai-assistant", true),
        vec!["http-client", "core-utils", "telemetry"]
    );
    assert_eq!(
        registry.get_dependents("core-utils"),
        vec!["ai-assistant", "http-client"]
    );
    assert!(
        registry
            .get_all()
            .iter()
            .all(|m| m.state == ExtensionState::Installed)
    );

    let install = registry.install_path("http-client").unwrap();
    assert!(install.join(MANIFEST_FILENAME).exists());
}

#[test]
fn test_fixture_snapshot_serializes() {
    let manifests = load_fixture_manifests();
    let registry = ExtensionRegistry::new(fixture_config());
    let (dir, core) = manifests.iter().find(|(_, m)| m.id == "core-utils").unwrap();
    registry.register(core.clone(), dir.clone()).unwrap();
    registry.enable("core-utils").unwrap();

    let value = serde_json::to_value(registry.get("core-utils").unwrap()).unwrap();
    assert_eq!(value["id"], "core-utils");
    assert_eq!(value["name"], "Core Utilities");
    assert_eq!(value["state"], "ENABLED");
    assert_eq!(value["category"], "utility");
    assert_eq!(value["permissions"], serde_json::json!(["storage"]));
    assert!(value.get("error").is_none());
    assert!(value["installed_at"].is_string());
}
