//! Host lifecycle scenarios
//!
//! Each test walks a registry through the sequence of calls a host makes:
//! load a directory, enable, react to runtime failures, and tear down.

use std::path::PathBuf;
use std::sync::mpsc::Receiver;

use extreg_core::{
    DependencyGraph, DependencyStatus, ExtensionManifest, ExtensionRegistry, ExtensionState,
    MANIFEST_FILENAME, Permission, RegistryConfig, RegistryError, RegistryEvent,
};
use extreg_test_utils::{ExtensionDir, ManifestToml};
use pretty_assertions::assert_eq;
use semver::Version;

// =============================================================================
// Test Infrastructure
// =============================================================================

/// Register every manifest under `dir` dependency-first; return the ids that
/// were accepted, in order.
fn load_dir(registry: &ExtensionRegistry, dir: &ExtensionDir) -> Vec<String> {
    let mut manifests: Vec<(PathBuf, ExtensionManifest)> = std::fs::read_dir(dir.root())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.join(MANIFEST_FILENAME).exists())
        .map(|path| {
            let manifest = ExtensionManifest::from_path(&path.join(MANIFEST_FILENAME)).unwrap();
            (path, manifest)
        })
        .collect();
    manifests.sort_by(|a, b| a.0.cmp(&b.0));

    let order = DependencyGraph::from_manifests(manifests.iter().map(|(_, m)| m))
        .topological_sort()
        .unwrap();

    order
        .into_iter()
        .filter(|id| {
            let (path, manifest) = manifests.iter().find(|(_, m)| &m.id == id).unwrap();
            registry.register(manifest.clone(), path.clone()).is_ok()
        })
        .collect()
}

/// An editor-like install: a three-level chain with an optional telemetry hook.
fn editor_install() -> ExtensionDir {
    let dir = ExtensionDir::new();
    dir.add(ManifestToml::new("core-utils", "1.2.0").permission("storage"));
    dir.add(
        ManifestToml::new("telemetry", "0.3.1")
            .permission("network")
            .engine("platform", ">=1.0.0"),
    );
    dir.add(
        ManifestToml::new("http-client", "2.1.0")
            .category("integration")
            .permission("network")
            .dependency("core-utils", "^1.0.0")
            .optional_dependency("telemetry", "~0.3.0"),
    );
    dir.add(
        ManifestToml::new("ai-assistant", "0.9.0")
            .category("agent")
            .permission("agent")
            .dependency("http-client", "^2.0.0"),
    );
    dir
}

fn names(rx: &Receiver<RegistryEvent>) -> Vec<String> {
    rx.try_iter().map(|e| e.to_string()).collect()
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn scenario_enable_everything_dependency_first() {
    let dir = editor_install();
    let registry = ExtensionRegistry::new(RegistryConfig::new(Version::new(1, 5, 0)));
    let order = load_dir(&registry, &dir);
    assert_eq!(
        order,
        vec!["core-utils", "telemetry", "http-client", "ai-assistant"]
    );

    // Enabling top-down fails at the first unmet requirement.
    let err = registry.enable("ai-assistant").unwrap_err();
    assert!(matches!(
        err,
        RegistryError::DependencyNotEnabled {
            state: DependencyStatus::Present(ExtensionState::Installed),
            ..
        }
    ));

    for id in &order {
        registry.enable(id).unwrap();
    }
    assert_eq!(registry.get_stats().enabled, 4);

    let enabled: Vec<String> = registry
        .get_enabled()
        .into_iter()
        .map(|m| m.manifest.id)
        .collect();
    assert_eq!(
        enabled,
        vec!["ai-assistant", "core-utils", "http-client", "telemetry"]
    );
}

#[test]
fn scenario_runtime_failure_and_recovery() {
    let dir = editor_install();
    let registry = ExtensionRegistry::new(RegistryConfig::new(Version::new(1, 5, 0)));
    for id in load_dir(&registry, &dir) {
        registry.enable(&id).unwrap();
    }
    let rx = registry.subscribe();

    // The host's loader reports a crash in http-client.
    registry
        .set_error("http-client", "TypeError: fetch is not a function")
        .unwrap();
    let meta = registry.get("http-client").unwrap();
    assert_eq!(meta.state, ExtensionState::Error);
    assert_eq!(
        meta.error.as_deref(),
        Some("TypeError: fetch is not a function")
    );

    // Dependents are left alone; the host decides what to do with them.
    assert_eq!(
        registry.get("ai-assistant").unwrap().state,
        ExtensionState::Enabled
    );

    // A failed extension can be neither enabled nor disabled until cleared.
    assert!(matches!(
        registry.enable("http-client"),
        Err(RegistryError::InErrorState { .. })
    ));
    assert!(matches!(
        registry.disable("http-client"),
        Err(RegistryError::InErrorState { .. })
    ));

    registry.clear_error("http-client").unwrap();
    registry.enable("http-client").unwrap();
    assert!(registry.get("http-client").unwrap().error.is_none());

    assert_eq!(
        names(&rx),
        vec![
            "EXTENSION_ERROR http-client: TypeError: fetch is not a function",
            "EXTENSION_STATE_CHANGED http-client: ENABLED -> ERROR",
            "EXTENSION_STATE_CHANGED http-client: ERROR -> INSTALLED",
            "EXTENSION_ENABLED http-client",
            "EXTENSION_STATE_CHANGED http-client: INSTALLED -> ENABLED",
        ]
    );
}

#[test]
fn scenario_optional_dependency_can_come_and_go() {
    let dir = editor_install();
    let registry = ExtensionRegistry::new(RegistryConfig::new(Version::new(1, 5, 0)));
    for id in load_dir(&registry, &dir) {
        registry.enable(&id).unwrap();
    }

    registry.disable("telemetry").unwrap();
    registry.unregister("telemetry").unwrap();
    assert!(!registry.has("telemetry"));

    // Still declared, so still listed, but no longer registered.
    assert_eq!(
        registry.get_dependencies("http-client", true),
        vec!["core-utils", "telemetry"]
    );
    assert_eq!(registry.get_dependents("telemetry"), vec!["http-client"]);
    assert_eq!(
        registry.get("http-client").unwrap().state,
        ExtensionState::Enabled
    );
}

#[test]
fn scenario_teardown_in_reverse_order() {
    let dir = editor_install();
    let registry = ExtensionRegistry::new(RegistryConfig::new(Version::new(1, 5, 0)));
    let order = load_dir(&registry, &dir);
    for id in &order {
        registry.enable(id).unwrap();
    }

    // Disabling or removing from the bottom is refused.
    assert!(matches!(
        registry.disable("core-utils"),
        Err(RegistryError::RequiredByEnabledDependents { .. })
    ));
    assert!(matches!(
        registry.unregister("core-utils"),
        Err(RegistryError::RequiredByDependents { .. })
    ));

    for id in order.iter().rev() {
        registry.disable(id).unwrap();
    }
    for id in order.iter().rev() {
        registry.unregister(id).unwrap();
    }
    assert!(registry.is_empty());
}

#[test]
fn scenario_restrictive_host() {
    let dir = editor_install();
    let config = RegistryConfig::new(Version::new(1, 5, 0))
        .with_allowed_permissions([Permission::Network, Permission::Storage])
        .with_max_extensions(4);
    let registry = ExtensionRegistry::new(config);

    // "agent" is not allowed, so ai-assistant is rejected; the rest fit.
    let order = load_dir(&registry, &dir);
    assert_eq!(order, vec!["core-utils", "telemetry", "http-client"]);
    let assistant =
        ExtensionManifest::from_path(&dir.root().join("ai-assistant").join(MANIFEST_FILENAME))
            .unwrap();
    assert!(matches!(
        registry.register(assistant, dir.root().join("ai-assistant")),
        Err(RegistryError::DisallowedPermission {
            permission: Permission::Agent,
            ..
        })
    ));

    // One slot left.
    for (id, expect_ok) in [("extra-1", true), ("extra-2", false)] {
        let path = dir.add(ManifestToml::new(id, "1.0.0"));
        let manifest = ExtensionManifest::from_path(&path.join(MANIFEST_FILENAME)).unwrap();
        let result = registry.register(manifest, path);
        if expect_ok {
            assert!(result.is_ok());
        } else {
            assert!(matches!(
                result,
                Err(RegistryError::MaxExtensionsExceeded { limit: 4, .. })
            ));
        }
    }
    assert_eq!(registry.len(), 4);
}

#[test]
fn scenario_upgrade_by_replacement() {
    let dir = ExtensionDir::new();
    dir.add(ManifestToml::new("core-utils", "1.2.0"));
    dir.add(ManifestToml::new("http-client", "2.1.0").dependency("core-utils", "^1.0.0"));
    let registry = ExtensionRegistry::new(RegistryConfig::new(Version::new(1, 5, 0)));
    load_dir(&registry, &dir);

    // There is no in-place update: a new version requires removing the old.
    let upgrade = ExtensionManifest::from_path(
        &ExtensionDir::new()
            .add(ManifestToml::new("core-utils", "2.0.0"))
            .join(MANIFEST_FILENAME),
    )
    .unwrap();
    assert!(matches!(
        registry.register(upgrade.clone(), "/new/core-utils"),
        Err(RegistryError::DuplicateExtension { .. })
    ));

    registry.unregister("http-client").unwrap();
    registry.unregister("core-utils").unwrap();
    registry.register(upgrade, "/new/core-utils").unwrap();

    // The old http-client no longer fits the upgraded dependency.
    let http = ExtensionManifest::from_path(&dir.root().join("http-client").join(MANIFEST_FILENAME))
        .unwrap();
    match registry.register(http, dir.root().join("http-client")) {
        Err(RegistryError::DependencyVersionMismatch { installed, .. }) => {
            assert_eq!(installed, Version::new(2, 0, 0));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}
