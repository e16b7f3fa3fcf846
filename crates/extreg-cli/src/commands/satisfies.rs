//! Satisfies command implementation

use colored::Colorize;
use extreg_core::VersionConstraint;
use semver::Version;

use crate::error::Result;

/// Run the satisfies command
///
/// Returns whether `version` satisfies `constraint`. Malformed input is an
/// error.
pub fn run_satisfies(version: &str, constraint: &str) -> Result<bool> {
    let parsed = Version::parse(version.trim())?;
    let constraint = VersionConstraint::parse(constraint)?;
    let satisfied = constraint.matches(&parsed);

    if satisfied {
        println!("{} {} satisfies {}", "yes".green().bold(), parsed, constraint);
    } else {
        println!(
            "{} {} does not satisfy {}",
            "no".red().bold(),
            parsed,
            constraint
        );
    }
    Ok(satisfied)
}
