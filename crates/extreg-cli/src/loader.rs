//! Building a registry from an extension directory
//!
//! An extension directory holds one sub-directory per extension, each with an
//! `extension.toml` (or `extension.json`). Manifests are registered
//! dependency-first so that every dependency check sees its target.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use extreg_core::{
    DependencyGraph, ExtensionManifest, ExtensionRegistry, GraphError, MANIFEST_FILENAME,
    MANIFEST_JSON_FILENAME, RegistryConfig,
};
use semver::Version;
use serde::Serialize;

use crate::cli::LoadArgs;
use crate::error::{CliError, Result};

/// Something that went wrong for one extension while loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadFailure {
    /// Manifest file or extension id the failure concerns.
    pub source: String,
    pub error: String,
}

/// A populated registry plus the per-extension failures met on the way.
#[derive(Debug)]
pub struct Loaded {
    pub registry: ExtensionRegistry,
    /// Ids in the order they were registered.
    pub order: Vec<String>,
    pub failures: Vec<LoadFailure>,
}

impl Loaded {
    fn fail(&mut self, source: impl Into<String>, error: impl ToString) {
        let source = source.into();
        let error = error.to_string();
        tracing::warn!(source = %source, error = %error, "extension failed to load");
        self.failures.push(LoadFailure { source, error });
    }

    /// Enable `ids` in the given order, recording failures.
    pub fn enable(&mut self, ids: &[String]) {
        for id in ids {
            if let Err(e) = self.registry.enable(id) {
                self.fail(id.clone(), e);
            }
        }
    }

    /// Enable everything that registered, dependencies first.
    pub fn enable_all(&mut self) {
        let order = self.order.clone();
        self.enable(&order);
    }
}

/// Resolve a path to a manifest file.
///
/// A directory resolves to the `extension.toml` or `extension.json` inside it;
/// anything else is taken as the manifest file itself.
pub fn manifest_path(path: &Path) -> Option<PathBuf> {
    if !path.is_dir() {
        return path.exists().then(|| path.to_path_buf());
    }
    [MANIFEST_FILENAME, MANIFEST_JSON_FILENAME]
        .into_iter()
        .map(|name| path.join(name))
        .find(|candidate| candidate.is_file())
}

/// Find every manifest directly below `dir`, sorted by path.
pub fn discover(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(CliError::user(format!(
            "'{}' is not a directory",
            dir.display()
        )));
    }

    let mut found = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            if let Some(manifest) = manifest_path(&path) {
                found.push(manifest);
            }
        }
    }
    found.sort();
    tracing::debug!(dir = %dir.display(), count = found.len(), "discovered manifests");
    Ok(found)
}

/// Registry configuration from `--config` and `--platform-version`.
pub fn build_config(args: &LoadArgs) -> Result<RegistryConfig> {
    let mut config = match &args.config {
        Some(path) => RegistryConfig::load(path)?,
        None => RegistryConfig::default(),
    };
    if let Some(version) = &args.platform_version {
        config.platform_version = Version::parse(version)?;
    }
    Ok(config)
}

/// Discover, order, and register every extension under `args.dir`.
///
/// Unparseable manifests, cycle members, and rejected registrations are
/// recorded as failures; the rest still load. Extensions that depend on a
/// cycle member are still attempted and fail on the missing dependency.
pub fn load(args: &LoadArgs) -> Result<Loaded> {
    let config = build_config(args)?;
    let mut loaded = Loaded {
        registry: ExtensionRegistry::new(config),
        order: Vec::new(),
        failures: Vec::new(),
    };

    let mut manifests: Vec<(PathBuf, ExtensionManifest)> = Vec::new();
    for path in discover(&args.dir)? {
        match ExtensionManifest::from_path(&path) {
            Ok(manifest) => manifests.push((path, manifest)),
            Err(e) => loaded.fail(path.display().to_string(), e),
        }
    }

    let order = match DependencyGraph::from_manifests(manifests.iter().map(|(_, m)| m))
        .topological_sort()
    {
        Ok(order) => order,
        Err(GraphError::Cycle { participants }) => {
            let excluded: HashSet<&str> = participants.iter().map(String::as_str).collect();
            let message = GraphError::Cycle {
                participants: participants.clone(),
            };
            for id in &participants {
                loaded.fail(id.clone(), &message);
            }
            DependencyGraph::from_manifests(
                manifests
                    .iter()
                    .map(|(_, m)| m)
                    .filter(|m| !excluded.contains(m.id.as_str())),
            )
            .topological_sort()?
        }
    };

    for id in order {
        for (path, manifest) in manifests.iter().filter(|(_, m)| m.id == id) {
            let install_path = path.parent().unwrap_or(path.as_path()).to_path_buf();
            match loaded.registry.register(manifest.clone(), install_path) {
                Ok(_) => {
                    if !loaded.order.contains(&id) {
                        loaded.order.push(id.clone());
                    }
                }
                Err(e) => loaded.fail(path.display().to_string(), e),
            }
        }
    }

    Ok(loaded)
}
