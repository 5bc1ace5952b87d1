//! Implementation of the `indexgate start` and `indexgate stop` commands.

use anyhow::{Result, bail};

use indexgate_lib::executor::ExecutionControl;
use indexgate_lib::orchestrate::BuildStatus;

use super::{TargetArgs, job_manager, runtime};
use crate::output::{print_json, print_outcome};

/// Toggle background processing on every target.
///
/// Targets without a remote address report `cancelled` and do not fail the
/// command.
pub fn cmd_control(signal: ExecutionControl, targets: &TargetArgs, json: bool) -> Result<()> {
  let manager = job_manager(targets.job_command())?;
  let outcomes = runtime()?.block_on(manager.signal_execution_control(signal, None))?;

  if json {
    print_json(&outcomes)?;
  } else {
    outcomes.iter().for_each(print_outcome);
  }

  if outcomes.iter().any(|o| o.status == BuildStatus::Failed) {
    bail!("failed to {signal} processing");
  }
  Ok(())
}
