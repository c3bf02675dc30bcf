//! Timestamped logging setup shared by every command.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber at the requested level.
///
/// A `RUST_LOG` environment filter, when set, takes precedence over the
/// CLI-supplied level.
pub fn init(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("Invalid log level: {level}"))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    Ok(())
}
