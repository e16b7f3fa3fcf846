//! Check command implementation

use std::path::{Path, PathBuf};

use colored::Colorize;
use extreg_core::ExtensionManifest;

use crate::error::{CliError, Result};
use crate::loader::manifest_path;

/// Outcome of checking one path.
#[derive(Debug)]
enum Checked {
    Valid(ExtensionManifest),
    Invalid(String),
}

fn check_one(path: &Path) -> Checked {
    let Some(manifest) = manifest_path(path) else {
        return Checked::Invalid("no manifest found".to_string());
    };
    match ExtensionManifest::from_path(&manifest) {
        Ok(m) => Checked::Valid(m),
        Err(e) => Checked::Invalid(e.to_string()),
    }
}

/// Run the check command
///
/// Prints one line per path. Fails when any manifest is invalid.
pub fn run_check(paths: &[PathBuf]) -> Result<()> {
    let mut invalid = 0;

    for path in paths {
        match check_one(path) {
            Checked::Valid(manifest) => {
                println!(
                    "{} {} {} ({}, {})",
                    "ok".green().bold(),
                    manifest.id.cyan(),
                    manifest.version,
                    manifest.category,
                    path.display().to_string().dimmed()
                );
            }
            Checked::Invalid(reason) => {
                invalid += 1;
                println!(
                    "{} {}: {}",
                    "invalid".red().bold(),
                    path.display(),
                    reason
                );
            }
        }
    }

    if invalid > 0 {
        return Err(CliError::user(format!(
            "{invalid} of {} manifests are invalid",
            paths.len()
        )));
    }
    Ok(())
}
