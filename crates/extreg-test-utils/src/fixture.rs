//! [`ExtensionDir`] builder for extension-registry test scenarios.
//!
//! Lays out a temporary directory the way a host install root looks: one
//! sub-directory per extension, each holding an `extension.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Text of an `extension.toml`, built field by field.
///
/// # Example
///
/// ```rust
/// use extreg_test_utils::ManifestToml;
///
/// let toml = ManifestToml::new("http-client", "1.0.0")
///     .category("integration")
///     .permission("network")
///     .dependency("core-utils", "^1.0.0")
///     .render();
/// assert!(toml.contains("id = \"http-client\""));
/// ```
#[derive(Debug, Clone)]
pub struct ManifestToml {
    id: String,
    version: String,
    category: String,
    main: String,
    permissions: Vec<String>,
    engines: Vec<(String, String)>,
    dependencies: Vec<(String, String, bool)>,
}

impl ManifestToml {
    /// A `utility` manifest with entry point `index.js`.
    pub fn new(id: &str, version: &str) -> Self {
        Self {
            id: id.to_string(),
            version: version.to_string(),
            category: "utility".to_string(),
            main: "index.js".to_string(),
            permissions: Vec::new(),
            engines: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    /// Set the category name, unchecked.
    pub fn category(mut self, category: &str) -> Self {
        self.category = category.to_string();
        self
    }

    /// Set the entry point.
    pub fn main(mut self, main: &str) -> Self {
        self.main = main.to_string();
        self
    }

    /// Request a permission, unchecked.
    pub fn permission(mut self, permission: &str) -> Self {
        self.permissions.push(permission.to_string());
        self
    }

    /// Add an engine constraint.
    pub fn engine(mut self, platform: &str, constraint: &str) -> Self {
        self.engines.push((platform.to_string(), constraint.to_string()));
        self
    }

    /// Add a required dependency.
    pub fn dependency(mut self, id: &str, constraint: &str) -> Self {
        self.dependencies
            .push((id.to_string(), constraint.to_string(), false));
        self
    }

    /// Add an optional dependency.
    pub fn optional_dependency(mut self, id: &str, constraint: &str) -> Self {
        self.dependencies
            .push((id.to_string(), constraint.to_string(), true));
        self
    }

    /// The extension id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Render the manifest as TOML.
    pub fn render(&self) -> String {
        let mut out = format!(
            "id = \"{id}\"\nname = \"{id}\"\nversion = \"{version}\"\ncategory = \"{category}\"\nmain = \"{main}\"\n",
            id = self.id,
            version = self.version,
            category = self.category,
            main = self.main,
        );

        let permissions = self
            .permissions
            .iter()
            .map(|p| format!("\"{p}\""))
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!("permissions = [{permissions}]\n"));

        if !self.engines.is_empty() {
            out.push_str("\n[engines]\n");
            for (platform, constraint) in &self.engines {
                out.push_str(&format!("\"{platform}\" = \"{constraint}\"\n"));
            }
        }

        for (id, constraint, optional) in &self.dependencies {
            out.push_str(&format!(
                "\n[[dependencies]]\nid = \"{id}\"\nversion = \"{constraint}\"\noptional = {optional}\n"
            ));
        }

        out
    }
}

/// A temporary install root holding one directory per extension.
///
/// # Example
///
/// ```rust
/// use extreg_test_utils::{ExtensionDir, ManifestToml};
///
/// let dir = ExtensionDir::new();
/// dir.add(ManifestToml::new("core-utils", "1.2.0"));
/// dir.assert_file_exists("core-utils/extension.toml");
/// ```
pub struct ExtensionDir {
    temp_dir: TempDir,
}

impl Default for ExtensionDir {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtensionDir {
    /// Create an empty temporary install root.
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    /// Return the root path of the temporary directory.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Write `manifest` to `<root>/<id>/extension.toml` and return the
    /// extension directory.
    pub fn add(&self, manifest: ManifestToml) -> PathBuf {
        self.add_raw(manifest.id(), &manifest.render())
    }

    /// Write arbitrary text to `<root>/<dir_name>/extension.toml`.
    pub fn add_raw(&self, dir_name: &str, content: &str) -> PathBuf {
        let dir = self.root().join(dir_name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("extension.toml"), content).unwrap();
        dir
    }

    /// Write `<root>/<dir_name>/extension.json`.
    pub fn add_json(&self, dir_name: &str, content: &str) -> PathBuf {
        let dir = self.root().join(dir_name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("extension.json"), content).unwrap();
        dir
    }

    /// Write a registry config file at the root and return its path.
    pub fn write_config(&self, content: &str) -> PathBuf {
        let path = self.root().join("registry.toml");
        fs::write(&path, content).unwrap();
        path
    }

    /// Panics if the file does not exist.
    pub fn assert_file_exists(&self, rel_path: &str) {
        let path = self.root().join(rel_path);
        assert!(path.exists(), "Expected file to exist: {}", path.display());
    }
}
