//! Registry configuration, fixed at construction time.

use std::collections::BTreeSet;
use std::path::Path;

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::manifest::Permission;

/// Host configuration supplied when a registry is created.
///
/// Loaded from TOML in the form:
///
/// ```toml
/// platform_version = "1.5.0"
/// max_extensions = 64
/// allowed_permissions = ["network", "storage"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryConfig {
    /// Version of the host platform, checked against manifest `engines`.
    pub platform_version: Version,
    /// Upper bound on the number of registered extensions.
    #[serde(default)]
    pub max_extensions: Option<usize>,
    /// Permissions extensions may request. `None` means unrestricted.
    #[serde(default)]
    pub allowed_permissions: Option<BTreeSet<Permission>>,
}

impl RegistryConfig {
    /// Unrestricted configuration for the given platform version.
    pub fn new(platform_version: Version) -> Self {
        Self {
            platform_version,
            max_extensions: None,
            allowed_permissions: None,
        }
    }

    /// Limit the number of registered extensions.
    pub fn with_max_extensions(mut self, max: usize) -> Self {
        self.max_extensions = Some(max);
        self
    }

    /// Restrict requested permissions to `allowed`.
    pub fn with_allowed_permissions(mut self, allowed: impl IntoIterator<Item = Permission>) -> Self {
        self.allowed_permissions = Some(allowed.into_iter().collect());
        self
    }

    /// Parse a configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Read and parse a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Whether `permission` may be granted under this configuration.
    pub fn permits(&self, permission: Permission) -> bool {
        self.allowed_permissions
            .as_ref()
            .is_none_or(|allowed| allowed.contains(&permission))
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::new(Version::new(1, 0, 0))
    }
}
