use std::path::PathBuf;

use crate::manifest::Permission;
use crate::registry::ExtensionState;

/// Errors returned by registry operations.
///
/// Every rejected mutation names exactly one of these variants. None of them
/// leave the registry in a modified state.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The manifest failed structural validation.
    #[error("invalid manifest: {0}")]
    InvalidManifest(#[from] ValidationError),

    /// An extension with this id is already registered.
    #[error("extension '{id}' is already registered")]
    DuplicateExtension { id: String },

    /// The registry is at its configured capacity.
    #[error("cannot register '{id}': registry is limited to {limit} extensions")]
    MaxExtensionsExceeded { id: String, limit: usize },

    /// The manifest requests a permission outside the host allow-list.
    #[error("extension '{id}' requests permission '{permission}' which is not allowed")]
    DisallowedPermission { id: String, permission: Permission },

    /// The host platform version does not satisfy an engine constraint.
    #[error(
        "extension '{id}' requires {engine} {constraint}, but the platform version is {platform_version}"
    )]
    IncompatiblePlatformVersion {
        id: String,
        engine: String,
        constraint: String,
        platform_version: semver::Version,
    },

    /// A non-optional dependency is not registered.
    #[error("extension '{id}' depends on '{dependency}', which is not installed")]
    DependencyNotInstalled { id: String, dependency: String },

    /// A registered dependency does not satisfy the declared constraint.
    #[error(
        "extension '{id}' requires '{dependency}' {constraint}, but version {installed} is installed"
    )]
    DependencyVersionMismatch {
        id: String,
        dependency: String,
        constraint: String,
        installed: semver::Version,
    },

    /// No extension with this id is registered.
    #[error("extension '{id}' not found")]
    NotFound { id: String },

    /// Other registered extensions require this one.
    #[error("extension '{id}' is required by: {}", dependents.join(", "))]
    RequiredByDependents { id: String, dependents: Vec<String> },

    /// The extension is in the error state.
    #[error("extension '{id}' is in the error state: {message}")]
    InErrorState { id: String, message: String },

    /// A non-optional dependency is missing or not enabled.
    #[error("extension '{id}' cannot be enabled: dependency '{dependency}' is {state}")]
    DependencyNotEnabled {
        id: String,
        dependency: String,
        /// Whether the dependency is missing or in which state it sits.
        state: DependencyStatus,
    },

    /// Enabled extensions require this one.
    #[error("extension '{id}' is required by enabled extensions: {}", dependents.join(", "))]
    RequiredByEnabledDependents { id: String, dependents: Vec<String> },
}

/// Status of a dependency reported by [`RegistryError::DependencyNotEnabled`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyStatus {
    /// The dependency is not registered.
    Missing,
    /// The dependency is registered in the given state.
    Present(ExtensionState),
}

impl std::fmt::Display for DependencyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing => f.write_str("not installed"),
            Self::Present(state) => write!(f, "{state}"),
        }
    }
}

/// Reasons a manifest is rejected by the validator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The manifest document could not be parsed.
    #[error("failed to parse manifest: {0}")]
    Parse(String),

    /// A required field is empty or absent.
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    /// The extension id contains illegal characters.
    #[error("invalid extension id '{id}': {reason}")]
    InvalidId { id: String, reason: String },

    /// The version string is not valid semver.
    #[error("invalid version '{version}': {reason}")]
    InvalidVersion { version: String, reason: String },

    /// The same dependency id is listed twice.
    #[error("dependency '{0}' is declared more than once")]
    DuplicateDependency(String),

    /// The manifest lists itself as a dependency.
    #[error("extension '{0}' cannot depend on itself")]
    SelfDependency(String),

    /// The category is not one of the known categories.
    #[error("unknown category '{0}'")]
    UnknownCategory(String),

    /// The permission is not one of the known capability tokens.
    #[error("unknown permission '{0}'")]
    UnknownPermission(String),

    /// A dependency or engine constraint is malformed.
    #[error("invalid constraint for '{target}': {source}")]
    InvalidConstraint {
        target: String,
        #[source]
        source: ConstraintError,
    },
}

/// A version constraint string could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConstraintError {
    /// The constraint contains no comparators.
    #[error("empty constraint")]
    Empty,

    /// A comparator is malformed.
    #[error("malformed constraint '{constraint}': {reason}")]
    Malformed { constraint: String, reason: String },
}

/// Errors from dependency ordering over a batch of manifests.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// The batch contains a dependency cycle.
    #[error("dependency cycle between: {}", participants.join(", "))]
    Cycle { participants: Vec<String> },
}

/// Errors loading registry configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse the configuration document.
    #[error("failed to parse registry config: {0}")]
    Parse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, RegistryError>;
