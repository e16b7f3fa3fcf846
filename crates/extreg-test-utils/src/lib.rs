//! Shared test utilities for the extension-registry workspace.
//!
//! This crate provides temporary extension directories so test suites do not
//! each hand-roll manifest files. It is a dev-dependency only, never
//! published.
//!
//! # Modules
//!
//! - [`fixture`]: [`ExtensionDir`] builder and [`ManifestToml`] writer

pub mod fixture;

pub use fixture::{ExtensionDir, ManifestToml};
