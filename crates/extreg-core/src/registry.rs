//! The extension registry: authoritative store of extension metadata and
//! lifecycle state.
//!
//! All mutations run under one exclusive lock, so the invariant checks of an
//! operation and the change they guard are atomic. Queries take the shared
//! lock and return owned snapshots. Events produced by a mutation are queued
//! on the [`EventChannel`] before the lock is released, so they reach
//! observers in commit order, and delivered after it is released.
//!
//! ```
//! use extreg_core::{
//!     DependencySpec, ExtensionCategory, ExtensionManifest, ExtensionRegistry, ExtensionState,
//!     RegistryConfig,
//! };
//! use semver::Version;
//!
//! let registry = ExtensionRegistry::new(RegistryConfig::new(Version::new(1, 5, 0)));
//! registry
//!     .register(ExtensionManifest::new("dep", "1.5.0", ExtensionCategory::Utility), "/ext/dep")
//!     .unwrap();
//! registry
//!     .register(
//!         ExtensionManifest::new("main", "1.0.0", ExtensionCategory::Tool)
//!             .with_dependency(DependencySpec::required("dep", ">=1.0.0")),
//!         "/ext/main",
//!     )
//!     .unwrap();
//!
//! assert!(registry.enable("main").is_err());
//! registry.enable("dep").unwrap();
//! registry.enable("main").unwrap();
//! assert_eq!(registry.get("main").unwrap().state, ExtensionState::Enabled);
//! ```

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};

use crate::config::RegistryConfig;
use crate::error::{DependencyStatus, RegistryError, Result, ValidationError};
use crate::events::{EventChannel, RegistryEvent};
use crate::manifest::{ExtensionManifest, Permission};
use crate::version::VersionConstraint;

/// Message stored when an extension reports an error without one.
pub const UNSPECIFIED_ERROR: &str = "extension reported an unspecified error";

/// Lifecycle state of a registered extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtensionState {
    /// Registered but never enabled.
    Installed,
    /// Active; the host should load it.
    Enabled,
    /// Deactivated by the host.
    Disabled,
    /// The extension's own code failed. Must be cleared before it can be enabled.
    Error,
}

impl ExtensionState {
    /// All states, in lifecycle order.
    pub const ALL: [Self; 4] = [Self::Installed, Self::Enabled, Self::Disabled, Self::Error];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Installed => "INSTALLED",
            Self::Enabled => "ENABLED",
            Self::Disabled => "DISABLED",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for ExtensionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registry-owned record for one extension.
///
/// Callers only ever receive clones; mutating a snapshot has no effect on the
/// registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtensionMetadata {
    /// The accepted manifest.
    #[serde(flatten)]
    pub manifest: ExtensionManifest,
    /// Parsed form of `manifest.version`.
    #[serde(skip)]
    pub version: Version,
    /// Current lifecycle state.
    pub state: ExtensionState,
    /// Directory the extension was installed into.
    pub install_path: PathBuf,
    /// When the extension was registered.
    pub installed_at: DateTime<Utc>,
    /// Error message; present exactly when `state` is `ERROR`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExtensionMetadata {
    /// The extension id.
    pub fn id(&self) -> &str {
        &self.manifest.id
    }

    /// Whether the extension requests `permission`.
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.manifest.permissions.contains(&permission)
    }

    /// Whether this extension depends on `id` without marking it optional.
    fn requires(&self, id: &str) -> bool {
        self.manifest.required_dependencies().any(|d| d.id == id)
    }
}

/// Counts of registered extensions by state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    pub total: usize,
    pub installed: usize,
    pub enabled: usize,
    pub disabled: usize,
    pub error: usize,
}

impl RegistryStats {
    /// Count for a single state.
    pub fn count(&self, state: ExtensionState) -> usize {
        match state {
            ExtensionState::Installed => self.installed,
            ExtensionState::Enabled => self.enabled,
            ExtensionState::Disabled => self.disabled,
            ExtensionState::Error => self.error,
        }
    }
}

/// Data guarded by the registry lock.
#[derive(Debug, Default)]
struct RegistryState {
    extensions: HashMap<String, ExtensionMetadata>,
    /// Dependency id -> ids of extensions whose manifest lists it.
    dependents: HashMap<String, BTreeSet<String>>,
}

impl RegistryState {
    fn insert(&mut self, metadata: ExtensionMetadata) {
        let id = metadata.manifest.id.clone();
        for dep in &metadata.manifest.dependencies {
            self.dependents
                .entry(dep.id.clone())
                .or_default()
                .insert(id.clone());
        }
        self.extensions.insert(id, metadata);
    }

    fn remove(&mut self, id: &str) -> Option<ExtensionMetadata> {
        let metadata = self.extensions.remove(id)?;
        for dep in &metadata.manifest.dependencies {
            if let Some(set) = self.dependents.get_mut(&dep.id) {
                set.remove(id);
                if set.is_empty() {
                    self.dependents.remove(&dep.id);
                }
            }
        }
        Some(metadata)
    }

    fn lookup(&self, id: &str) -> Result<&ExtensionMetadata> {
        self.extensions
            .get(id)
            .ok_or_else(|| RegistryError::NotFound { id: id.to_string() })
    }

    fn lookup_mut(&mut self, id: &str) -> Result<&mut ExtensionMetadata> {
        self.extensions
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound { id: id.to_string() })
    }

    /// Registered extensions, other than `id` itself, that non-optionally
    /// depend on `id` and match `filter`. Sorted by id.
    fn required_by(&self, id: &str, filter: impl Fn(&ExtensionMetadata) -> bool) -> Vec<String> {
        self.dependents
            .get(id)
            .into_iter()
            .flatten()
            .filter(|dependent| dependent.as_str() != id)
            .filter_map(|dependent| self.extensions.get(dependent))
            .filter(|meta| meta.requires(id) && filter(meta))
            .map(|meta| meta.manifest.id.clone())
            .collect()
    }

    fn sorted(&self, filter: impl Fn(&ExtensionMetadata) -> bool) -> Vec<ExtensionMetadata> {
        let mut list: Vec<ExtensionMetadata> = self
            .extensions
            .values()
            .filter(|meta| filter(meta))
            .cloned()
            .collect();
        list.sort_by(|a, b| a.manifest.id.cmp(&b.manifest.id));
        list
    }
}

/// In-memory registry of extension metadata and lifecycle state.
///
/// Shareable across threads behind an `Arc`; every method takes `&self`.
#[derive(Debug)]
pub struct ExtensionRegistry {
    config: RegistryConfig,
    state: RwLock<RegistryState>,
    events: EventChannel,
}

impl ExtensionRegistry {
    /// Create an empty registry.
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            state: RwLock::new(RegistryState::default()),
            events: EventChannel::new(),
        }
    }

    /// The configuration this registry was created with.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// The channel lifecycle events are published on.
    pub fn events(&self) -> &EventChannel {
        &self.events
    }

    /// Shorthand for `events().subscribe()`.
    pub fn subscribe(&self) -> Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    // The guarded state is only mutated after every check has passed, so a
    // panic while the lock is held cannot leave a partial change behind.
    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Validate and register a manifest. The new extension is `INSTALLED`.
    pub fn register(
        &self,
        manifest: ExtensionManifest,
        install_path: impl Into<PathBuf>,
    ) -> Result<ExtensionMetadata> {
        let install_path = install_path.into();
        let result = self.register_locked(manifest, install_path);
        match result {
            Ok(metadata) => {
                tracing::info!(
                    id = %metadata.manifest.id,
                    version = %metadata.manifest.version,
                    path = %metadata.install_path.display(),
                    "registered extension"
                );
                self.events.flush();
                Ok(metadata)
            }
            Err(e) => {
                tracing::warn!(error = %e, "rejected extension registration");
                Err(e)
            }
        }
    }

    fn register_locked(
        &self,
        manifest: ExtensionManifest,
        install_path: PathBuf,
    ) -> Result<ExtensionMetadata> {
        let version = manifest.validate()?;
        let id = manifest.id.clone();

        let mut state = self.write();

        if state.extensions.contains_key(&id) {
            return Err(RegistryError::DuplicateExtension { id });
        }

        if let Some(limit) = self.config.max_extensions {
            if state.extensions.len() >= limit {
                return Err(RegistryError::MaxExtensionsExceeded { id, limit });
            }
        }

        if let Some(permission) = manifest
            .permissions
            .iter()
            .copied()
            .find(|p| !self.config.permits(*p))
        {
            return Err(RegistryError::DisallowedPermission { id, permission });
        }

        for (engine, constraint) in &manifest.engines {
            let parsed = parse_constraint(engine, constraint)?;
            if !parsed.matches(&self.config.platform_version) {
                return Err(RegistryError::IncompatiblePlatformVersion {
                    id,
                    engine: engine.clone(),
                    constraint: constraint.clone(),
                    platform_version: self.config.platform_version.clone(),
                });
            }
        }

        for dep in &manifest.dependencies {
            let Some(installed) = state.extensions.get(&dep.id) else {
                if dep.optional {
                    tracing::debug!(id = %id, dependency = %dep.id, "optional dependency not installed");
                    continue;
                }
                return Err(RegistryError::DependencyNotInstalled {
                    id,
                    dependency: dep.id.clone(),
                });
            };
            if !parse_constraint(&dep.id, &dep.version)?.matches(&installed.version) {
                return Err(RegistryError::DependencyVersionMismatch {
                    id,
                    dependency: dep.id.clone(),
                    constraint: dep.version.clone(),
                    installed: installed.version.clone(),
                });
            }
        }

        let metadata = ExtensionMetadata {
            manifest,
            version,
            state: ExtensionState::Installed,
            install_path,
            installed_at: Utc::now(),
            error: None,
        };
        state.insert(metadata.clone());
        self.events.enqueue([RegistryEvent::ExtensionRegistered {
            metadata: Box::new(metadata.clone()),
        }]);
        Ok(metadata)
    }

    /// Remove an extension.
    ///
    /// Rejected while any other registered extension, in any state, lists it
    /// as a non-optional dependency.
    pub fn unregister(&self, id: &str) -> Result<()> {
        {
            let mut state = self.write();
            state.lookup(id)?;

            let dependents = state.required_by(id, |_| true);
            if !dependents.is_empty() {
                return Err(RegistryError::RequiredByDependents {
                    id: id.to_string(),
                    dependents,
                });
            }

            state.remove(id);
            self.events
                .enqueue([RegistryEvent::ExtensionUnregistered { id: id.to_string() }]);
        }

        tracing::info!(id = %id, "unregistered extension");
        self.events.flush();
        Ok(())
    }

    /// Transition an extension to `ENABLED`.
    ///
    /// Every non-optional dependency must already be enabled. Enabling an
    /// enabled extension succeeds without emitting events.
    pub fn enable(&self, id: &str) -> Result<()> {
        let old_state = {
            let mut state = self.write();
            let meta = state.lookup(id)?;

            match meta.state {
                ExtensionState::Enabled => return Ok(()),
                ExtensionState::Error => {
                    return Err(RegistryError::InErrorState {
                        id: id.to_string(),
                        message: meta.error.clone().unwrap_or_default(),
                    });
                }
                ExtensionState::Installed | ExtensionState::Disabled => {}
            }

            for dep in meta.manifest.required_dependencies() {
                let status = match state.extensions.get(&dep.id) {
                    Some(d) if d.state == ExtensionState::Enabled => continue,
                    Some(d) => DependencyStatus::Present(d.state),
                    None => DependencyStatus::Missing,
                };
                return Err(RegistryError::DependencyNotEnabled {
                    id: id.to_string(),
                    dependency: dep.id.clone(),
                    state: status,
                });
            }

            let meta = state.lookup_mut(id)?;
            let old_state = meta.state;
            meta.state = ExtensionState::Enabled;
            self.events.enqueue([
                RegistryEvent::ExtensionEnabled { id: id.to_string() },
                RegistryEvent::state_changed(id, old_state, ExtensionState::Enabled),
            ]);
            old_state
        };

        tracing::info!(id = %id, from = %old_state, "enabled extension");
        self.events.flush();
        Ok(())
    }

    /// Transition an extension to `DISABLED`.
    ///
    /// Rejected while another enabled extension non-optionally depends on it,
    /// or while it is in the error state. Disabling a disabled extension
    /// succeeds without emitting events.
    pub fn disable(&self, id: &str) -> Result<()> {
        let old_state = {
            let mut state = self.write();
            let meta = state.lookup(id)?;

            match meta.state {
                ExtensionState::Disabled => return Ok(()),
                ExtensionState::Error => {
                    return Err(RegistryError::InErrorState {
                        id: id.to_string(),
                        message: meta.error.clone().unwrap_or_default(),
                    });
                }
                ExtensionState::Installed | ExtensionState::Enabled => {}
            }

            let dependents = state.required_by(id, |d| d.state == ExtensionState::Enabled);
            if !dependents.is_empty() {
                return Err(RegistryError::RequiredByEnabledDependents {
                    id: id.to_string(),
                    dependents,
                });
            }

            let meta = state.lookup_mut(id)?;
            let old_state = meta.state;
            meta.state = ExtensionState::Disabled;
            self.events.enqueue([
                RegistryEvent::ExtensionDisabled { id: id.to_string() },
                RegistryEvent::state_changed(id, old_state, ExtensionState::Disabled),
            ]);
            old_state
        };

        tracing::info!(id = %id, from = %old_state, "disabled extension");
        self.events.flush();
        Ok(())
    }

    /// Force an extension into the error state with `message`.
    ///
    /// Performs no dependency checks: the failure originates in the
    /// extension's own code. Repeated calls replace the message.
    pub fn set_error(&self, id: &str, message: impl Into<String>) -> Result<()> {
        let mut message = message.into();
        if message.trim().is_empty() {
            message = UNSPECIFIED_ERROR.to_string();
        }

        {
            let mut state = self.write();
            let meta = state.lookup_mut(id)?;
            let old_state = meta.state;
            meta.state = ExtensionState::Error;
            meta.error = Some(message.clone());

            let mut events = vec![RegistryEvent::ExtensionError {
                id: id.to_string(),
                message: message.clone(),
            }];
            if old_state != ExtensionState::Error {
                events.push(RegistryEvent::state_changed(id, old_state, ExtensionState::Error));
            }
            self.events.enqueue(events);
        }

        tracing::warn!(id = %id, error = %message, "extension entered error state");
        self.events.flush();
        Ok(())
    }

    /// Return an extension from `ERROR` to `INSTALLED`, dropping its message.
    ///
    /// Succeeds without emitting events when the extension is not in error.
    pub fn clear_error(&self, id: &str) -> Result<()> {
        {
            let mut state = self.write();
            let meta = state.lookup_mut(id)?;
            if meta.state != ExtensionState::Error {
                return Ok(());
            }
            meta.state = ExtensionState::Installed;
            meta.error = None;
            self.events.enqueue([RegistryEvent::state_changed(
                id,
                ExtensionState::Error,
                ExtensionState::Installed,
            )]);
        }

        tracing::info!(id = %id, "cleared extension error");
        self.events.flush();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Snapshot of one extension.
    pub fn get(&self, id: &str) -> Option<ExtensionMetadata> {
        self.read().extensions.get(id).cloned()
    }

    /// Whether an extension is registered.
    pub fn has(&self, id: &str) -> bool {
        self.read().extensions.contains_key(id)
    }

    /// Number of registered extensions.
    pub fn len(&self) -> usize {
        self.read().extensions.len()
    }

    /// Whether no extensions are registered.
    pub fn is_empty(&self) -> bool {
        self.read().extensions.is_empty()
    }

    /// All extensions, sorted by id.
    pub fn get_all(&self) -> Vec<ExtensionMetadata> {
        self.read().sorted(|_| true)
    }

    /// Extensions in `state`, sorted by id.
    pub fn get_by_state(&self, state: ExtensionState) -> Vec<ExtensionMetadata> {
        self.read().sorted(|meta| meta.state == state)
    }

    /// Extensions requesting `permission`, sorted by id.
    pub fn get_by_permission(&self, permission: Permission) -> Vec<ExtensionMetadata> {
        self.read().sorted(|meta| meta.has_permission(permission))
    }

    /// Enabled extensions, sorted by id. This is what a host should load.
    pub fn get_enabled(&self) -> Vec<ExtensionMetadata> {
        self.get_by_state(ExtensionState::Enabled)
    }

    /// Ids of registered extensions that directly list `id` as a dependency,
    /// optional or not. Sorted.
    pub fn get_dependents(&self, id: &str) -> Vec<String> {
        let state = self.read();
        let dependents = state
            .dependents
            .get(id)
            .into_iter()
            .flatten()
            .filter(|dependent| state.extensions.contains_key(dependent.as_str()))
            .cloned()
            .collect();
        dependents
    }

    /// Transitive dependency ids of `id`, nearest first.
    ///
    /// With `include_optional` false, ids reachable only through an optional
    /// edge are excluded. Declared dependencies that are not registered are
    /// listed but not expanded. Each id appears once, so cyclic graphs
    /// terminate. Returns an empty list for an unknown id.
    pub fn get_dependencies(&self, id: &str, include_optional: bool) -> Vec<String> {
        let state = self.read();
        let mut visited: HashSet<&str> = HashSet::from([id]);
        let mut queue: VecDeque<&str> = VecDeque::from([id]);
        let mut result = Vec::new();

        while let Some(current) = queue.pop_front() {
            let Some(meta) = state.extensions.get(current) else {
                continue;
            };
            for dep in &meta.manifest.dependencies {
                if dep.optional && !include_optional {
                    continue;
                }
                if visited.insert(dep.id.as_str()) {
                    result.push(dep.id.clone());
                    queue.push_back(dep.id.as_str());
                }
            }
        }

        tracing::debug!(id = %id, include_optional, count = result.len(), "resolved dependencies");
        result
    }

    /// Totals by state.
    pub fn get_stats(&self) -> RegistryStats {
        let state = self.read();
        let mut stats = RegistryStats {
            total: state.extensions.len(),
            ..RegistryStats::default()
        };
        for meta in state.extensions.values() {
            match meta.state {
                ExtensionState::Installed => stats.installed += 1,
                ExtensionState::Enabled => stats.enabled += 1,
                ExtensionState::Disabled => stats.disabled += 1,
                ExtensionState::Error => stats.error += 1,
            }
        }
        stats
    }

    /// Install directory of an extension.
    pub fn install_path(&self, id: &str) -> Option<PathBuf> {
        self.read()
            .extensions
            .get(id)
            .map(|meta| meta.install_path.clone())
    }
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

/// Parse a constraint that already passed manifest validation.
fn parse_constraint(target: &str, constraint: &str) -> Result<VersionConstraint> {
    VersionConstraint::parse(constraint).map_err(|source| {
        ValidationError::InvalidConstraint {
            target: target.to_string(),
            source,
        }
        .into()
    })
}
