//! Deps command implementation

use colored::Colorize;
use extreg_core::ExtensionRegistry;

use crate::cli::LoadArgs;
use crate::commands::load::{report_failures, state_label};
use crate::error::{CliError, Result};
use crate::loader;

/// Run the deps command
///
/// Loads `args.dir`, then lists the transitive dependencies of `id`, or its
/// direct dependents when `dependents` is set.
pub fn run_deps(args: &LoadArgs, id: &str, include_optional: bool, dependents: bool) -> Result<()> {
    let loaded = loader::load(args)?;
    report_failures(&loaded.failures);

    let registry = &loaded.registry;
    if !registry.has(id) {
        return Err(CliError::user(format!(
            "Extension '{id}' is not registered"
        )));
    }

    let (title, ids) = if dependents {
        ("Dependents of", registry.get_dependents(id))
    } else {
        ("Dependencies of", registry.get_dependencies(id, include_optional))
    };

    println!("{} {}:", title.bold(), id.cyan());
    if ids.is_empty() {
        println!("  {}", "None".dimmed());
    }
    for dep in &ids {
        println!("  {}", describe(registry, dep));
    }
    Ok(())
}

fn describe(registry: &ExtensionRegistry, id: &str) -> String {
    match registry.get(id) {
        Some(meta) => format!(
            "{} {} {}",
            id.green(),
            meta.manifest.version,
            state_label(meta.state)
        ),
        None => format!("{} {}", id.yellow(), "(not installed)".dimmed()),
    }
}
