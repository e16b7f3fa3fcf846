//! Extension manifest types and parsing.
//!
//! A manifest is authored as `extension.toml` (or `extension.json`) at the
//! root of an extension's install directory. The canonical filename is
//! [`MANIFEST_FILENAME`](crate::MANIFEST_FILENAME).
//!
//! # Example TOML
//!
//! ```toml
//! id = "http-client"
//! name = "HTTP Client"
//! version = "1.4.0"
//! description = "Outbound HTTP requests for agents"
//! author = "Platform Team"
//! category = "integration"
//! main = "dist/index.js"
//! permissions = ["network"]
//!
//! [engines]
//! agent-platform = ">=1.0.0"
//!
//! [[dependencies]]
//! id = "core-utils"
//! version = "^1.0.0"
//!
//! [[dependencies]]
//! id = "telemetry"
//! version = ">=0.3.0"
//! optional = true
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// The closed set of extension categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", try_from = "String")]
pub enum ExtensionCategory {
    /// Autonomous agent behaviour.
    Agent,
    /// A callable tool.
    Tool,
    /// Bridge to a third-party service.
    Integration,
    /// Source of documents or records.
    DataSource,
    /// User interface contribution.
    Ui,
    /// Visual theme.
    Theme,
    /// Language support.
    Language,
    /// Anything else.
    Utility,
}

impl ExtensionCategory {
    /// All categories, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::Agent,
        Self::Tool,
        Self::Integration,
        Self::DataSource,
        Self::Ui,
        Self::Theme,
        Self::Language,
        Self::Utility,
    ];

    /// The kebab-case name used in manifests.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Tool => "tool",
            Self::Integration => "integration",
            Self::DataSource => "data-source",
            Self::Ui => "ui",
            Self::Theme => "theme",
            Self::Language => "language",
            Self::Utility => "utility",
        }
    }
}

impl fmt::Display for ExtensionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtensionCategory {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownCategory(s.to_string()))
    }
}

impl TryFrom<String> for ExtensionCategory {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Capability tokens an extension may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", try_from = "String")]
pub enum Permission {
    /// Outbound network access.
    Network,
    /// Read/write access to the host filesystem.
    Filesystem,
    /// Access to the extension's persistent key/value storage.
    Storage,
    /// Clipboard read/write.
    Clipboard,
    /// Desktop or in-app notifications.
    Notifications,
    /// Spawning shell commands.
    Shell,
    /// Host system information.
    System,
    /// Invoking other agents.
    Agent,
}

impl Permission {
    /// All permissions, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::Network,
        Self::Filesystem,
        Self::Storage,
        Self::Clipboard,
        Self::Notifications,
        Self::Shell,
        Self::System,
        Self::Agent,
    ];

    /// The kebab-case name used in manifests.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Filesystem => "filesystem",
            Self::Storage => "storage",
            Self::Clipboard => "clipboard",
            Self::Notifications => "notifications",
            Self::Shell => "shell",
            Self::System => "system",
            Self::Agent => "agent",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownPermission(s.to_string()))
    }
}

impl TryFrom<String> for Permission {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A dependency on another extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DependencySpec {
    /// Id of the required extension.
    pub id: String,
    /// Version constraint the installed dependency must satisfy.
    pub version: String,
    /// Optional dependencies may be absent at registration and disabled at enable time.
    #[serde(default)]
    pub optional: bool,
}

impl DependencySpec {
    /// A required dependency.
    pub fn required(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            optional: false,
        }
    }

    /// An optional dependency.
    pub fn optional(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            optional: true,
        }
    }
}

/// Complete extension manifest.
///
/// Unknown keys are rejected so that a misspelt section cannot silently drop
/// dependencies or permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtensionManifest {
    /// Unique extension id (e.g., "http-client").
    pub id: String,
    /// Display name.
    pub name: String,
    /// Semver version string.
    pub version: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Author display name.
    #[serde(default)]
    pub author: String,
    /// Extension category.
    pub category: ExtensionCategory,
    /// Entry point, opaque to the registry.
    pub main: String,
    /// Requested capabilities.
    #[serde(default)]
    pub permissions: BTreeSet<Permission>,
    /// Platform name to version constraint the host must satisfy.
    #[serde(default)]
    pub engines: BTreeMap<String, String>,
    /// Dependencies, in declaration order.
    #[serde(default)]
    pub dependencies: Vec<DependencySpec>,
}

impl ExtensionManifest {
    /// Create a manifest with the required fields and no dependencies,
    /// permissions, or engine constraints.
    pub fn new(
        id: impl Into<String>,
        version: impl Into<String>,
        category: ExtensionCategory,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            main: "index.js".to_string(),
            id,
            version: version.into(),
            description: String::new(),
            author: String::new(),
            category,
            dependencies: Vec::new(),
            permissions: BTreeSet::new(),
            engines: BTreeMap::new(),
        }
    }

    /// Add a dependency.
    pub fn with_dependency(mut self, dependency: DependencySpec) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Add a requested permission.
    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permissions.insert(permission);
        self
    }

    /// Add an engine constraint.
    pub fn with_engine(mut self, platform: impl Into<String>, constraint: impl Into<String>) -> Self {
        self.engines.insert(platform.into(), constraint.into());
        self
    }

    /// Parse and validate a manifest from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ValidationError> {
        let manifest: Self = toml::from_str(content)
            .map_err(|e| ValidationError::Parse(e.message().to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Parse and validate a manifest from a JSON string.
    pub fn from_json(content: &str) -> Result<Self, ValidationError> {
        let manifest: Self =
            serde_json::from_str(content).map_err(|e| ValidationError::Parse(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Read, parse, and validate a manifest file.
    ///
    /// Files ending in `.json` are read as JSON, everything else as TOML.
    pub fn from_path(path: &Path) -> Result<Self, ValidationError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ValidationError::Parse(format!("{}: {e}", path.display())))?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json(&content)
        } else {
            Self::from_toml(&content)
        }
    }

    /// Serialize the manifest to a TOML string.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Run the manifest validator over this manifest, returning the parsed version.
    pub fn validate(&self) -> Result<Version, ValidationError> {
        crate::validator::validate(self)
    }

    /// Look up a declared dependency by id.
    pub fn dependency(&self, id: &str) -> Option<&DependencySpec> {
        self.dependencies.iter().find(|d| d.id == id)
    }

    /// Iterate over non-optional dependencies.
    pub fn required_dependencies(&self) -> impl Iterator<Item = &DependencySpec> {
        self.dependencies.iter().filter(|d| !d.optional)
    }
}
