//! Read-only progress report — `refit status`.

use anyhow::Result;
use console::style;

use refit::config::RunConfig;
use refit::errors::RestartError;
use refit::model::Optimization;
use refit::restart::RestartPlan;

/// Print each target's completed-iteration count and any stale directories,
/// without modifying the working directory. An inconsistent target is
/// reported rather than aborting the report.
pub fn cmd_status(config: &RunConfig) -> Result<()> {
    let optimization = Optimization::parse_file(&config.optimization_file())?;

    println!(
        "Optimization {} (project {}, study {})",
        style(&optimization.id).bold(),
        optimization.project_id,
        optimization.study_id
    );

    let checkpoint = if config.save_file().is_file() {
        "present"
    } else {
        "absent"
    };
    println!("Checkpoint file: {checkpoint}\n");

    for target in &optimization.targets {
        let target_root = config.target_root(target.id());

        match RestartPlan::build(target.id(), &target_root) {
            Ok(plan) => {
                println!(
                    "  {}: {}/{} iterations completed",
                    style(target.id()).bold(),
                    plan.completed,
                    optimization.max_iterations
                );
                for path in &plan.stale {
                    println!("    stale: {}", path.display());
                }
            }
            Err(RestartError::Inconsistent { missing, .. }) => {
                println!(
                    "  {}: {} ({} expected directories missing)",
                    style(target.id()).bold(),
                    style("inconsistent").red(),
                    missing.len()
                );
            }
            Err(error) => return Err(error.into()),
        }
    }

    Ok(())
}
