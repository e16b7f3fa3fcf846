//! Load command implementation

use colored::{ColoredString, Colorize};
use extreg_core::{ExtensionMetadata, ExtensionState, RegistryStats};
use semver::Version;
use serde::Serialize;

use crate::cli::LoadArgs;
use crate::error::Result;
use crate::loader::{self, LoadFailure, Loaded};

/// JSON form of a loaded registry.
#[derive(Debug, Serialize)]
struct Snapshot<'a> {
    platform_version: &'a Version,
    stats: RegistryStats,
    extensions: Vec<ExtensionMetadata>,
    failures: &'a [LoadFailure],
}

/// Colored label for a lifecycle state.
pub fn state_label(state: ExtensionState) -> ColoredString {
    match state {
        ExtensionState::Installed => state.as_str().yellow(),
        ExtensionState::Enabled => state.as_str().green(),
        ExtensionState::Disabled => state.as_str().dimmed(),
        ExtensionState::Error => state.as_str().red(),
    }
}

/// Print load failures to stderr.
pub fn report_failures(failures: &[LoadFailure]) {
    for failure in failures {
        eprintln!(
            "{} {}: {}",
            "warning:".yellow().bold(),
            failure.source,
            failure.error
        );
    }
}

/// Run the load command
pub fn run_load(args: &LoadArgs, enable: &[String], enable_all: bool, json: bool) -> Result<()> {
    let mut loaded = loader::load(args)?;
    if enable_all {
        loaded.enable_all();
    } else {
        loaded.enable(enable);
    }

    if json {
        println!("{}", render_json(&loaded)?);
    } else {
        report_failures(&loaded.failures);
        print_table(&loaded);
    }
    Ok(())
}

fn render_json(loaded: &Loaded) -> Result<String> {
    let snapshot = Snapshot {
        platform_version: &loaded.registry.config().platform_version,
        stats: loaded.registry.get_stats(),
        extensions: loaded.registry.get_all(),
        failures: &loaded.failures,
    };
    Ok(serde_json::to_string_pretty(&snapshot)?)
}

fn print_table(loaded: &Loaded) {
    let registry = &loaded.registry;
    println!(
        "{} (platform {})",
        "Extensions".bold(),
        registry.config().platform_version
    );
    println!();

    let extensions = registry.get_all();
    if extensions.is_empty() {
        println!("  {}", "None".dimmed());
    }
    for meta in &extensions {
        println!(
            "  {:<20} {:<10} {:<10} {:<12} {}",
            meta.id().cyan(),
            meta.manifest.version,
            state_label(meta.state),
            meta.manifest.category.as_str(),
            meta.install_path.display().to_string().dimmed()
        );
        if let Some(error) = &meta.error {
            println!("  {:<20} {}", "", error.red());
        }
    }

    let stats = registry.get_stats();
    println!();
    println!(
        "{} {} registered, {} enabled, {} installed, {} disabled, {} error, {} failed",
        "Total:".dimmed(),
        stats.total,
        stats.enabled,
        stats.installed,
        stats.disabled,
        stats.error,
        loaded.failures.len()
    );
}
