//! Tracing subscriber setup

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install a subscriber that writes formatted logs to stderr.
///
/// `RUST_LOG` wins when set. Otherwise the level is `warn`, or `debug` with
/// `verbose`. Stdout stays free for command output.
pub fn init(verbose: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let default_level = if verbose { "debug" } else { "warn" };

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .with_level(true)
        .compact();

    let filter_layer =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level))?;

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()?;

    tracing::debug!("Verbose mode enabled");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_init() {
        // Only the first init in a process succeeds.
        let _ = init(true);
        tracing::warn!("This is a warning message");
        assert!(init(false).is_err());
    }
}
