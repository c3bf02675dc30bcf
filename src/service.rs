//! Scoped supervision of the local evaluator backend service.
//!
//! Evaluator targets need a request-serving backend running for the whole
//! delegated optimization. The backend itself is an external collaborator;
//! this module only owns its process lifetime: started before the optimizer
//! is invoked, torn down on every exit path afterwards.

use crate::errors::RunError;
use crate::model::Optimization;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::info;

/// Launch configuration for the evaluator backend, supplied by the caller
/// as a JSON document and passed through to the spawned process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorServerConfig {
    /// Command used to start the server.
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Port the server should listen on, exported to the child as
    /// `EVALUATOR_SERVER_PORT`.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    8000
}

impl EvaluatorServerConfig {
    pub fn parse_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read server config at {}", path.display()))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse server config at {}", path.display()))
    }
}

/// Owns the spawned backend process for the duration of a run.
///
/// The child is spawned with `kill_on_drop`, so the service cannot outlive
/// the run even on a panic. `shutdown` performs the orderly kill-and-reap
/// and is idempotent; only the first call touches the process.
#[derive(Debug, Default)]
pub struct ServiceGuard {
    child: Option<Child>,
}

impl ServiceGuard {
    /// A guard supervising nothing, for runs with no evaluator targets.
    pub fn noop() -> Self {
        Self { child: None }
    }

    pub fn spawn(config: &EvaluatorServerConfig, working_dir: &Path) -> Result<Self, RunError> {
        let child = Command::new(&config.command)
            .args(&config.args)
            .env("EVALUATOR_SERVER_PORT", config.port.to_string())
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(RunError::ServiceLaunch)?;

        info!(
            "Launched the evaluator server: {} (port {})",
            config.command, config.port
        );

        Ok(Self { child: Some(child) })
    }

    pub fn is_running(&self) -> bool {
        self.child.is_some()
    }

    /// Stop the supervised service and reap it.
    pub async fn shutdown(&mut self) -> Result<(), RunError> {
        if let Some(mut child) = self.child.take() {
            child.kill().await.map_err(RunError::ServiceShutdown)?;
            info!("Stopped the evaluator server.");
        }

        Ok(())
    }
}

/// Start whatever services the optimization's targets require.
///
/// Recharge-only optimizations need nothing and get a no-op guard. Evaluator
/// targets without a server configuration are a fatal misconfiguration, not
/// something to limp past.
pub fn launch_required_services(
    optimization: &Optimization,
    server_config: Option<&Path>,
    working_dir: &Path,
) -> Result<ServiceGuard> {
    let Some(target) = optimization
        .targets
        .iter()
        .find(|target| target.requires_evaluator())
    else {
        return Ok(ServiceGuard::noop());
    };

    let Some(config_path) = server_config else {
        return Err(RunError::MissingServerConfig {
            target: target.id().to_string(),
        }
        .into());
    };

    let config = EvaluatorServerConfig::parse_file(config_path)?;
    Ok(ServiceGuard::spawn(&config, working_dir)?)
}
