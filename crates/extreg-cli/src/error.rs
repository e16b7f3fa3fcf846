//! Error types for extreg-cli

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Errors that can occur in CLI operations
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Malformed version constraint
    #[error(transparent)]
    Constraint(#[from] extreg_core::ConstraintError),

    /// Malformed concrete version
    #[error("invalid version: {0}")]
    Version(#[from] semver::Error),

    /// Dependency cycle in a loaded batch
    #[error(transparent)]
    Graph(#[from] extreg_core::GraphError),

    /// Registry configuration could not be loaded
    #[error(transparent)]
    Config(#[from] extreg_core::ConfigError),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON output failed
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// User-facing error with a message
    #[error("{message}")]
    User { message: String },
}

impl CliError {
    /// Create a new user error with the given message
    pub fn user(message: impl Into<String>) -> Self {
        Self::User {
            message: message.into(),
        }
    }

    /// Process exit code for this error.
    ///
    /// Malformed command input exits 2, matching clap's usage errors.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Constraint(_) | Self::Version(_) => 2,
            _ => 1,
        }
    }
}
