//! Implementation of the `indexgate check` command.

use anyhow::{Result, bail};

use super::{TargetArgs, job_manager, runtime};
use crate::output::{print_error, print_json, print_success};

pub fn cmd_check(targets: &TargetArgs, json: bool) -> Result<()> {
  let manager = job_manager(targets.job_command())?;
  let report = runtime()?.block_on(manager.check_connectivity())?;

  if json {
    print_json(&report)?;
  } else {
    for target in &report.targets {
      match &target.detail {
        None => print_success(&format!("{} reachable", target.target)),
        Some(detail) => print_error(&format!("{} unreachable: {}", target.target, detail)),
      }
    }
  }

  if !report.all_reachable() {
    bail!(
      "{} of {} target(s) unreachable",
      report.targets.len() - report.successes(),
      report.targets.len()
    );
  }
  Ok(())
}
