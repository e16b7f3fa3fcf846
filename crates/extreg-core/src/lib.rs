//! Extension registry.
//!
//! This crate tracks installable extensions: it validates their manifests,
//! checks platform and dependency version constraints, and governs their
//! lifecycle (`INSTALLED`, `ENABLED`, `DISABLED`, `ERROR`) while keeping the
//! dependency graph consistent. It never loads or runs extension code.

pub mod config;
pub mod dependency;
pub mod error;
pub mod events;
pub mod manifest;
pub mod registry;
pub mod validator;
pub mod version;

/// The canonical filename for extension manifest files.
///
/// Extensions place a file with this name at the root of their install
/// directory. [`MANIFEST_JSON_FILENAME`] is accepted as an alternative.
pub const MANIFEST_FILENAME: &str = "extension.toml";

/// JSON alternative to [`MANIFEST_FILENAME`].
pub const MANIFEST_JSON_FILENAME: &str = "extension.json";

pub use config::RegistryConfig;
pub use dependency::DependencyGraph;
pub use error::{
    ConfigError, ConstraintError, DependencyStatus, GraphError, RegistryError, Result,
    ValidationError,
};
pub use events::{EventChannel, RegistryEvent};
pub use manifest::{DependencySpec, ExtensionCategory, ExtensionManifest, Permission};
pub use registry::{ExtensionMetadata, ExtensionRegistry, ExtensionState, RegistryStats};
pub use validator::validate;
pub use version::{VersionConstraint, satisfies};
