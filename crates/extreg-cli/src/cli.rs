//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Extension registry - validate manifests and inspect extension sets
#[derive(Parser, Debug)]
#[command(name = "extreg")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by commands that build a registry from a directory.
#[derive(clap::Args, Debug, Clone, PartialEq, Eq)]
pub struct LoadArgs {
    /// Directory holding one sub-directory per extension
    pub dir: PathBuf,

    /// Registry configuration file (TOML)
    #[arg(short, long, env = "EXTREG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Host platform version, overriding the config file
    #[arg(long)]
    pub platform_version: Option<String>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Validate extension manifests
    ///
    /// Each path may be a manifest file or an extension directory.
    ///
    /// Examples:
    ///   extreg check ./extensions/http-client
    ///   extreg check a/extension.toml b/extension.json
    Check {
        /// Manifest files or extension directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Register every extension in a directory and report their state
    ///
    /// Examples:
    ///   extreg load ./extensions
    ///   extreg load ./extensions --enable-all --json
    ///   extreg load ./extensions -c registry.toml --enable http-client
    Load {
        #[command(flatten)]
        load: LoadArgs,

        /// Enable an extension after loading (repeatable)
        #[arg(short, long = "enable", value_name = "ID")]
        enable: Vec<String>,

        /// Enable every registered extension, dependencies first
        #[arg(long, conflicts_with = "enable")]
        enable_all: bool,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Show the dependencies or dependents of a loaded extension
    Deps {
        #[command(flatten)]
        load: LoadArgs,

        /// Extension id
        id: String,

        /// Follow optional dependencies too
        #[arg(long)]
        include_optional: bool,

        /// List direct dependents instead of dependencies
        #[arg(long)]
        dependents: bool,
    },

    /// Check a version against a constraint
    ///
    /// Exits 0 when satisfied, 1 when not, and 2 on malformed input.
    ///
    /// Examples:
    ///   extreg satisfies 1.5.0 ">=1.0.0, <2.0.0"
    ///   extreg satisfies 0.2.7 ^0.2.3
    Satisfies {
        /// Concrete version (e.g. 1.5.0)
        version: String,

        /// Version constraint (e.g. ^1.2.0)
        constraint: String,
    },
}
