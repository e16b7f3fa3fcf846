//! Extension registry CLI
//!
//! Validates extension manifests, loads extension directories into a
//! registry, and answers dependency and version-constraint questions.

mod cli;
mod commands;
mod error;
mod loader;
mod logging;

use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;

use cli::{Cli, Commands};
use error::Result;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("{} failed to set up logging: {}", "warning:".yellow().bold(), e);
    }

    match execute_command(cli.command) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn execute_command(cmd: Commands) -> Result<ExitCode> {
    match cmd {
        Commands::Check { paths } => commands::run_check(&paths)?,
        Commands::Load {
            load,
            enable,
            enable_all,
            json,
        } => commands::run_load(&load, &enable, enable_all, json)?,
        Commands::Deps {
            load,
            id,
            include_optional,
            dependents,
        } => commands::run_deps(&load, &id, include_optional, dependents)?,
        Commands::Satisfies {
            version,
            constraint,
        } => {
            if !commands::run_satisfies(&version, &constraint)? {
                return Ok(ExitCode::FAILURE);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
