//! Typed error hierarchy for the refit orchestrator.
//!
//! Two top-level enums cover the two subsystems:
//! - `RestartError` — restart planning and iteration pruning failures
//! - `RunError` — service supervision and optimizer delegation failures

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while preparing a restart from a previous run.
#[derive(Debug, Error)]
pub enum RestartError {
    /// Iteration completeness is not contiguous from index 0: some iteration
    /// finished while an earlier one is missing or never produced its
    /// objective. Resuming from such a history would not be reproducible.
    #[error(
        "The following output directories of the {target} could not be found:\n{}",
        format_paths(.missing)
    )]
    Inconsistent {
        target: String,
        missing: Vec<PathBuf>,
    },

    #[error("Invalid iteration search pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors from the run orchestrator itself.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(
        "The {target} target requires an evaluator server but no server \
         configuration was provided"
    )]
    MissingServerConfig { target: String },

    #[error("Failed to launch the evaluator server: {0}")]
    ServiceLaunch(#[source] std::io::Error),

    #[error("Failed to stop the evaluator server: {0}")]
    ServiceShutdown(#[source] std::io::Error),

    #[error("The optimizer exited with non-zero code {code}")]
    DelegateFailed { code: i32 },

    #[error("The optimizer was terminated by a signal")]
    DelegateTerminated,
}

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
