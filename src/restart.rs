//! Restart and recovery bookkeeping for optimization runs.
//!
//! The optimizer driver writes one `iter_NNNN` directory per attempted
//! iteration under `optimize.tmp/<target-id>/`, dropping an `objective.p`
//! file into it once the objective evaluation for that iteration finished.
//! When a run is resumed, everything past the last contiguous block of
//! finished iterations is stale and has to go before the driver is invoked
//! again, otherwise it would pick up half-written output.

use crate::config::{
    BACKUP_DIR, OBJECTIVE_FILE, RESULT_DIR, SAVE_FILE, TMP_DIR, WORKING_DATA_DIR,
    iteration_dir_name,
};
use crate::errors::RestartError;
use crate::model::Optimization;
use glob::glob;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const ITERATION_PREFIX: &str = "iter_";

/// One attempted iteration discovered on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationRecord {
    /// Zero-based ordinal, parsed from the directory name.
    pub index: usize,
    pub path: PathBuf,
    /// Whether the iteration produced its objective marker.
    pub complete: bool,
}

/// Discover the iterations a target has produced so far, ordered by index.
///
/// Entries not matching the `iter_NNNN` convention are ignored. A target
/// whose root directory does not exist has simply never started and yields
/// an empty sequence. Pure read; never modifies the tree.
pub fn scan_iterations(target_root: &Path) -> Result<Vec<IterationRecord>, RestartError> {
    let pattern = target_root.join(format!("{ITERATION_PREFIX}*"));

    let mut records = Vec::new();

    for entry in glob(&pattern.to_string_lossy())? {
        let path = entry.map_err(|error| RestartError::Io(error.into_error()))?;

        if !path.is_dir() {
            continue;
        }

        let Some(index) = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(parse_iteration_index)
        else {
            continue;
        };

        let complete = path.join(OBJECTIVE_FILE).is_file();
        records.push(IterationRecord {
            index,
            path,
            complete,
        });
    }

    records.sort_by_key(|record| record.index);
    Ok(records)
}

/// Parse the ordinal out of an `iter_NNNN` directory name. The index is
/// zero-padded to at least four digits; anything shorter is not ours.
fn parse_iteration_index(name: &str) -> Option<usize> {
    let digits = name.strip_prefix(ITERATION_PREFIX)?;

    if digits.len() < 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    digits.parse().ok()
}

/// The resume point for one target and the directories standing in its way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartPlan {
    pub target: String,
    /// Number of contiguous finished iterations, counted from index 0.
    pub completed: usize,
    /// Iteration directories at index >= `completed`, to be pruned before
    /// the optimizer is handed the working directory again.
    pub stale: Vec<PathBuf>,
}

impl RestartPlan {
    /// Compute the plan for one target without touching the filesystem
    /// beyond reading it.
    ///
    /// Completeness must be contiguous from index 0. If some iteration
    /// finished while an earlier one is missing or unfinished, the history
    /// cannot be reproduced and the whole run is aborted rather than
    /// guessing a resume point.
    pub fn build(target: &str, target_root: &Path) -> Result<Self, RestartError> {
        let records = scan_iterations(target_root)?;

        let highest_complete = records
            .iter()
            .filter(|record| record.complete)
            .map(|record| record.index)
            .max();

        if let Some(highest) = highest_complete {
            let missing: Vec<PathBuf> = (0..=highest)
                .filter(|index| {
                    !records
                        .iter()
                        .any(|record| record.index == *index && record.complete)
                })
                .map(|index| target_root.join(iteration_dir_name(index)))
                .collect();

            if !missing.is_empty() {
                return Err(RestartError::Inconsistent {
                    target: target.to_string(),
                    missing,
                });
            }
        }

        let completed = highest_complete.map_or(0, |index| index + 1);

        let stale = records
            .iter()
            .filter(|record| record.index >= completed)
            .map(|record| record.path.clone())
            .collect();

        Ok(Self {
            target: target.to_string(),
            completed,
            stale,
        })
    }

    /// Prune the stale directories and report how far this target had
    /// previously progressed. Zero completed iterations is a valid state
    /// and is still reported.
    pub fn apply(&self) -> Result<(), RestartError> {
        for path in &self.stale {
            info!(
                "Removing the {} directory which was produced by an incomplete iteration.",
                path.display()
            );
            fs::remove_dir_all(path)?;
        }

        info!("{} iterations had previously been completed.", self.completed);
        Ok(())
    }
}

/// Prepare the working directory for a resumed run.
///
/// Plans are built for every target before anything is deleted, so an
/// inconsistency in a later target aborts the run with the earlier targets
/// untouched.
pub fn prepare_restart(
    optimization: &Optimization,
    working_dir: &Path,
) -> Result<(), RestartError> {
    let plans = optimization
        .targets
        .iter()
        .map(|target| {
            let target_root = working_dir.join(TMP_DIR).join(target.id());
            RestartPlan::build(target.id(), &target_root)
        })
        .collect::<Result<Vec<_>, _>>()?;

    for plan in &plans {
        plan.apply()?;
    }

    Ok(())
}

/// Wipe every artifact a previous run may have left behind.
///
/// Unconditional and irreversible; the caller decides when a clean slate is
/// wanted. Idempotent, so a fresh run over an already-clean directory is a
/// no-op.
pub fn remove_previous_files(working_dir: &Path) -> Result<(), RestartError> {
    for name in [TMP_DIR, BACKUP_DIR, RESULT_DIR, WORKING_DATA_DIR] {
        let path = working_dir.join(name);
        if path.exists() {
            fs::remove_dir_all(&path)?;
        }
    }

    let save_file = working_dir.join(SAVE_FILE);
    if save_file.exists() {
        fs::remove_file(&save_file)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OptimizationTarget;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;
    use tracing_subscriber::fmt::MakeWriter;

    /// Create `iter_NNNN` directories under `root`, dropping the objective
    /// marker into the ones flagged complete.
    fn make_iterations(root: &Path, iterations: &[(usize, bool)]) {
        for (index, complete) in iterations {
            let dir = root.join(iteration_dir_name(*index));
            fs::create_dir_all(&dir).unwrap();
            if *complete {
                fs::write(dir.join(OBJECTIVE_FILE), "").unwrap();
            }
        }
    }

    fn make_optimization(target_ids: &[&str]) -> Optimization {
        Optimization {
            project_id: "project-1".to_string(),
            study_id: "study-1".to_string(),
            id: "optimization-1".to_string(),
            name: "optimization-1".to_string(),
            description: None,
            max_iterations: 10,
            targets: target_ids
                .iter()
                .map(|id| OptimizationTarget::Recharge {
                    id: id.to_string(),
                    molecule_set_ids: vec!["molecule-set-1".to_string()],
                })
                .collect(),
        }
    }

    #[test]
    fn test_scan_missing_root_yields_empty() {
        let dir = tempdir().unwrap();
        let records = scan_iterations(&dir.path().join("never-started")).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_scan_ignores_non_matching_entries() {
        let dir = tempdir().unwrap();
        make_iterations(dir.path(), &[(0, true)]);
        fs::create_dir(dir.path().join("iter_12")).unwrap();
        fs::create_dir(dir.path().join("targets")).unwrap();
        fs::write(dir.path().join("iter_0005"), "").unwrap();

        let records = scan_iterations(dir.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].index, 0);
        assert!(records[0].complete);
    }

    #[test]
    fn test_scan_orders_by_index_and_flags_completeness() {
        let dir = tempdir().unwrap();
        make_iterations(dir.path(), &[(2, false), (0, true), (1, true)]);

        let records = scan_iterations(dir.path()).unwrap();
        let summary: Vec<_> = records.iter().map(|r| (r.index, r.complete)).collect();
        assert_eq!(summary, vec![(0, true), (1, true), (2, false)]);
    }

    #[test]
    fn test_plan_contiguous_history_has_no_stale_directories() {
        let dir = tempdir().unwrap();
        make_iterations(dir.path(), &[(0, true), (1, true), (2, true)]);

        let plan = RestartPlan::build("recharge-target", dir.path()).unwrap();
        assert_eq!(plan.completed, 3);
        assert!(plan.stale.is_empty());
    }

    #[test]
    fn test_plan_empty_history_is_a_valid_zero() {
        let dir = tempdir().unwrap();

        let plan = RestartPlan::build("recharge-target", dir.path()).unwrap();
        assert_eq!(plan.completed, 0);
        assert!(plan.stale.is_empty());
    }

    #[test]
    fn test_plan_trailing_incomplete_iterations_are_stale() {
        let dir = tempdir().unwrap();
        make_iterations(dir.path(), &[(0, true), (1, true), (2, false), (3, false)]);

        let plan = RestartPlan::build("recharge-target", dir.path()).unwrap();
        assert_eq!(plan.completed, 2);
        assert_eq!(
            plan.stale,
            vec![
                dir.path().join("iter_0002"),
                dir.path().join("iter_0003"),
            ]
        );
    }

    #[test]
    fn test_plan_gap_is_a_fatal_inconsistency() {
        let dir = tempdir().unwrap();
        make_iterations(dir.path(), &[(1, true)]);

        let error = RestartPlan::build("recharge-target", dir.path()).unwrap_err();

        let expected_missing = dir.path().join("iter_0000");
        assert_eq!(
            error.to_string(),
            format!(
                "The following output directories of the recharge-target could \
                 not be found:\n{}",
                expected_missing.display()
            )
        );
    }

    #[test]
    fn test_plan_incomplete_below_complete_counts_as_missing() {
        let dir = tempdir().unwrap();
        make_iterations(dir.path(), &[(0, true), (1, false), (3, true)]);

        let error = RestartPlan::build("recharge-target", dir.path()).unwrap_err();

        match error {
            RestartError::Inconsistent { target, missing } => {
                assert_eq!(target, "recharge-target");
                assert_eq!(
                    missing,
                    vec![dir.path().join("iter_0001"), dir.path().join("iter_0002")]
                );
            }
            other => panic!("expected an inconsistency, got {other:?}"),
        }
    }

    #[test]
    fn test_prepare_restart_prunes_each_target_independently() {
        let dir = tempdir().unwrap();
        let optimization = make_optimization(&["recharge-target-1", "recharge-target-2"]);

        let root_1 = dir.path().join(TMP_DIR).join("recharge-target-1");
        let root_2 = dir.path().join(TMP_DIR).join("recharge-target-2");
        make_iterations(&root_1, &[(0, true), (1, true), (2, false), (3, false)]);
        make_iterations(&root_2, &[(0, true), (1, false)]);

        prepare_restart(&optimization, dir.path()).unwrap();

        assert!(root_1.join("iter_0000").is_dir());
        assert!(root_1.join("iter_0001").is_dir());
        assert!(!root_1.join("iter_0002").exists());
        assert!(!root_1.join("iter_0003").exists());

        assert!(root_2.join("iter_0000").is_dir());
        assert!(!root_2.join("iter_0001").exists());
    }

    #[test]
    fn test_prepare_restart_aborts_before_pruning_on_inconsistency() {
        let dir = tempdir().unwrap();
        let optimization = make_optimization(&["recharge-target-1", "recharge-target-2"]);

        let root_1 = dir.path().join(TMP_DIR).join("recharge-target-1");
        let root_2 = dir.path().join(TMP_DIR).join("recharge-target-2");
        make_iterations(&root_1, &[(0, true), (1, false)]);
        make_iterations(&root_2, &[(1, true)]);

        let error = prepare_restart(&optimization, dir.path()).unwrap_err();
        assert!(matches!(error, RestartError::Inconsistent { .. }));

        // The first target's stale directory survives: nothing was deleted.
        assert!(root_1.join("iter_0001").is_dir());
    }

    #[test]
    fn test_remove_previous_files_wipes_every_artifact() {
        let dir = tempdir().unwrap();

        for name in [TMP_DIR, BACKUP_DIR, RESULT_DIR, WORKING_DATA_DIR] {
            fs::create_dir_all(dir.path().join(name).join("nested")).unwrap();
        }
        fs::write(dir.path().join(SAVE_FILE), "checkpoint").unwrap();

        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 5);
        remove_previous_files(dir.path()).unwrap();
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);

        // Running again over the clean directory is a no-op.
        remove_previous_files(dir.path()).unwrap();
    }

    /// MakeWriter that accumulates formatted log lines in memory.
    #[derive(Clone, Default)]
    struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

    impl CaptureWriter {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl std::io::Write for CaptureWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CaptureWriter {
        type Writer = CaptureWriter;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_prepare_restart_logs_pruned_directories_and_progress() {
        let dir = tempdir().unwrap();
        let optimization = make_optimization(&["recharge-target-1"]);

        let root = dir.path().join(TMP_DIR).join("recharge-target-1");
        make_iterations(&root, &[(0, true), (1, false)]);

        let writer = CaptureWriter::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            prepare_restart(&optimization, dir.path()).unwrap();
        });

        let output = writer.contents();
        assert!(output.contains(&format!(
            "Removing the {} directory which was produced by an incomplete iteration.",
            root.join("iter_0001").display()
        )));
        assert!(output.contains("1 iterations had previously been completed."));
    }
}
