//! Clean-start or restart orchestration — `refit run`.
//!
//! One invocation is strictly sequential: decide between a full wipe and a
//! restart, bring up whatever backend the targets need, hand the working
//! directory to the external optimizer driver, and tear the backend down
//! again whatever the driver did.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{info, warn};

use refit::config::{OPTIMIZER_INPUT_FILE, RunConfig};
use refit::errors::RunError;
use refit::model::Optimization;
use refit::restart::{prepare_restart, remove_previous_files};
use refit::service::launch_required_services;

pub async fn cmd_run(
    config: &RunConfig,
    restart: bool,
    server_config: Option<&Path>,
) -> Result<()> {
    let optimization = Optimization::parse_file(&config.optimization_file())?;

    // A save file is the only evidence that a previous run reached a
    // checkpoint worth resuming from.
    let save_exists = config.save_file().is_file();

    if restart && save_exists {
        info!("Restarting the optimization from its previous checkpoint.");
        prepare_restart(&optimization, &config.working_dir)?;
    } else {
        // Either the caller asked for a clean slate or there is nothing to
        // resume from; wipe whatever a previous run left behind.
        remove_previous_files(&config.working_dir)?;
    }

    let mut services =
        launch_required_services(&optimization, server_config, &config.working_dir)?;

    let outcome = delegate_to_optimizer(config).await;

    // The backend must come down whether the optimizer succeeded or not,
    // and without masking the optimizer's own failure.
    if let Err(error) = services.shutdown().await {
        warn!("{error}");
    }

    outcome
}

/// Run the external optimizer driver to completion, blocking until it exits.
/// Only its exit status is interpreted here.
async fn delegate_to_optimizer(config: &RunConfig) -> Result<()> {
    info!("Handing the run over to {}.", config.optimizer_cmd);

    let status = tokio::process::Command::new(&config.optimizer_cmd)
        .arg(OPTIMIZER_INPUT_FILE)
        .current_dir(&config.working_dir)
        .status()
        .await
        .with_context(|| {
            format!("Failed to spawn the optimizer command: {}", config.optimizer_cmd)
        })?;

    if !status.success() {
        let error = match status.code() {
            Some(code) => RunError::DelegateFailed { code },
            None => RunError::DelegateTerminated,
        };
        return Err(error.into());
    }

    info!("The optimizer finished successfully.");
    Ok(())
}
