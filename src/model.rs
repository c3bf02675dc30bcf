//! Optimization definitions consumed from `optimization.json`.
//!
//! The document is produced by the wider project tooling; this crate only
//! reads the fields the orchestrator needs.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One refitting optimization: a set of targets refit together against a
/// shared parameter vector. Immutable for the duration of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Optimization {
    pub project_id: String,
    pub study_id: String,
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub max_iterations: u32,
    pub targets: Vec<OptimizationTarget>,
}

impl Optimization {
    pub fn parse_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Whether any target needs a running evaluator backend.
    pub fn requires_evaluator(&self) -> bool {
        self.targets.iter().any(OptimizationTarget::requires_evaluator)
    }
}

/// One named objective component of an optimization.
///
/// The set of target kinds is closed; adding a new kind means adding a
/// variant here and handling it wherever the compiler points.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OptimizationTarget {
    /// Fits against physical-property data estimated on demand by an
    /// evaluator backend service.
    Evaluator {
        id: String,
        data_set_ids: Vec<String>,
    },
    /// Fits partial charges against precomputed electrostatic potentials;
    /// runs without any backing service.
    Recharge {
        id: String,
        molecule_set_ids: Vec<String>,
    },
}

impl OptimizationTarget {
    /// The target identifier, which doubles as its directory name under
    /// `optimize.tmp/`.
    pub fn id(&self) -> &str {
        match self {
            Self::Evaluator { id, .. } | Self::Recharge { id, .. } => id,
        }
    }

    pub fn requires_evaluator(&self) -> bool {
        matches!(self, Self::Evaluator { .. })
    }
}
