//! Structural validation of extension manifests.
//!
//! Validation is pure: it looks only at the manifest itself, never at the
//! registry's contents. Cross-extension checks (installed dependencies,
//! platform version) happen in [`ExtensionRegistry::register`](crate::ExtensionRegistry::register).

use std::collections::HashSet;

use semver::Version;

use crate::error::ValidationError;
use crate::manifest::ExtensionManifest;
use crate::version::VersionConstraint;

/// Validate a manifest.
///
/// Checks, in order: required fields, id syntax, version syntax, dependency
/// list (self-reference, duplicates, constraint syntax), and engine
/// constraint syntax. The first failure is returned.
///
/// On success, returns the parsed `version`.
pub fn validate(manifest: &ExtensionManifest) -> Result<Version, ValidationError> {
    require("id", &manifest.id)?;
    require("name", &manifest.name)?;
    require("version", &manifest.version)?;
    require("main", &manifest.main)?;

    validate_id(&manifest.id)?;

    let version = Version::parse(&manifest.version).map_err(|e| ValidationError::InvalidVersion {
        version: manifest.version.clone(),
        reason: e.to_string(),
    })?;

    let mut seen = HashSet::with_capacity(manifest.dependencies.len());
    for dep in &manifest.dependencies {
        require("dependencies.id", &dep.id)?;
        if dep.id == manifest.id {
            return Err(ValidationError::SelfDependency(dep.id.clone()));
        }
        if !seen.insert(dep.id.as_str()) {
            return Err(ValidationError::DuplicateDependency(dep.id.clone()));
        }
        VersionConstraint::parse(&dep.version).map_err(|source| {
            ValidationError::InvalidConstraint {
                target: dep.id.clone(),
                source,
            }
        })?;
    }

    for (engine, constraint) in &manifest.engines {
        VersionConstraint::parse(constraint).map_err(|source| {
            ValidationError::InvalidConstraint {
                target: engine.clone(),
                source,
            }
        })?;
    }

    Ok(version)
}

fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(())
}

/// Ids start with an ASCII alphanumeric and continue with alphanumerics,
/// `-`, `_`, or `.`.
fn validate_id(id: &str) -> Result<(), ValidationError> {
    let starts_ok = id.chars().next().is_some_and(|c| c.is_ascii_alphanumeric());
    if !starts_ok {
        return Err(ValidationError::InvalidId {
            id: id.to_string(),
            reason: "extension id must start with a letter or digit".to_string(),
        });
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(ValidationError::InvalidId {
            id: id.to_string(),
            reason: "extension id must contain only alphanumeric characters, hyphens, underscores, or dots".to_string(),
        });
    }
    Ok(())
}
