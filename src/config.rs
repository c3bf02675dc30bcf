//! Filesystem layout and runtime configuration for a refitting run.
//!
//! A run owns one working directory laid out as:
//!
//! ```text
//! <working-dir>/
//! ├── optimization.json    # Definition of the optimization and its targets
//! ├── optimize.in          # Input file for the optimizer driver
//! ├── optimize.sav         # Checkpoint left behind by a previous run
//! ├── optimize.tmp/        # Per-target, per-iteration optimizer output
//! │   └── <target-id>/
//! │       └── iter_0000/
//! │           └── objective.p
//! ├── optimize.bak/
//! ├── result/
//! └── working-data/
//! ```
//!
//! The names are a compatibility contract with the external optimizer driver
//! and must not change.

use std::path::PathBuf;

/// File signalling that a previous run reached at least one checkpoint.
pub const SAVE_FILE: &str = "optimize.sav";

/// Directory holding per-target, per-iteration optimizer output.
pub const TMP_DIR: &str = "optimize.tmp";

/// Backup directory maintained by the optimizer driver.
pub const BACKUP_DIR: &str = "optimize.bak";

/// Directory the optimizer driver writes its final results to.
pub const RESULT_DIR: &str = "result";

/// Scratch directory used by evaluator targets.
pub const WORKING_DATA_DIR: &str = "working-data";

/// Per-iteration marker whose presence signals a finished objective
/// evaluation. Its content is opaque to this crate.
pub const OBJECTIVE_FILE: &str = "objective.p";

/// Definition of the optimization, consumed as JSON.
pub const OPTIMIZATION_FILE: &str = "optimization.json";

/// Input file handed to the optimizer driver subprocess.
pub const OPTIMIZER_INPUT_FILE: &str = "optimize.in";

/// Immutable runtime configuration, constructed once at startup and passed
/// explicitly to every command that needs it.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub working_dir: PathBuf,
    /// Command used to invoke the optimizer driver. Overridable through the
    /// `REFIT_OPTIMIZER_CMD` environment variable.
    pub optimizer_cmd: String,
}

impl RunConfig {
    pub fn new(working_dir: PathBuf) -> Self {
        let optimizer_cmd = std::env::var("REFIT_OPTIMIZER_CMD")
            .unwrap_or_else(|_| "ForceBalance.py".to_string());

        Self {
            working_dir,
            optimizer_cmd,
        }
    }

    pub fn save_file(&self) -> PathBuf {
        self.working_dir.join(SAVE_FILE)
    }

    pub fn optimization_file(&self) -> PathBuf {
        self.working_dir.join(OPTIMIZATION_FILE)
    }

    /// Root of the iteration output tree for one target.
    pub fn target_root(&self, target_id: &str) -> PathBuf {
        self.working_dir.join(TMP_DIR).join(target_id)
    }
}

/// Directory name of one iteration, e.g. `iter_0003`.
pub fn iteration_dir_name(index: usize) -> String {
    format!("iter_{index:04}")
}
