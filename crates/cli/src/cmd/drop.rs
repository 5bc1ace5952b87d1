//! Implementation of the `indexgate drop` command.

use anyhow::{Result, bail};

use indexgate_lib::orchestrate::BuildStatus;

use super::{TargetArgs, job_manager, runtime};
use crate::output::{print_json, print_outcome};

/// Delete the named index from every target. No version gating applies.
pub fn cmd_drop(name: &str, targets: &TargetArgs, json: bool) -> Result<()> {
  let manager = job_manager(targets.job_command())?;
  let outcomes = runtime()?.block_on(manager.drop_unit(name, None))?;

  if json {
    print_json(&outcomes)?;
  } else {
    outcomes.iter().for_each(print_outcome);
  }

  let failed = outcomes.iter().filter(|o| o.status == BuildStatus::Failed).count();
  if failed > 0 {
    bail!("drop failed on {failed} target(s)");
  }
  Ok(())
}
