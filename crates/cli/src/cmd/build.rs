//! Implementation of the `indexgate build` command.
//!
//! Discovers index definitions and applies every unit whose version is newer
//! than the one recorded in the target's ledger.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::Args;
use tracing::warn;

use indexgate_lib::orchestrate::{BuildOutcome, ProgressFn};

use super::{TargetArgs, job_manager, runtime};
use crate::output::{print_json, print_outcome, print_success, print_summary, print_warning};

#[derive(Debug, Clone, Args)]
pub struct BuildArgs {
  #[command(flatten)]
  pub targets: TargetArgs,

  /// Definition file or directory (repeatable)
  #[arg(short = 'd', long = "definitions", value_name = "PATH", required = true)]
  pub definitions: Vec<PathBuf>,

  /// Build one unit at a time, in discovery order
  #[arg(short, long)]
  pub sequential: bool,

  /// Keep going after a failed or skipped unit in sequential mode
  #[arg(short = 'f', long)]
  pub continue_on_failure: bool,

  /// Maximum number of units built at once (parallel mode)
  #[arg(long, value_name = "N")]
  pub parallelism: Option<usize>,

  /// Root directory for per-target ledgers
  #[arg(long, value_name = "DIR")]
  pub ledger_dir: Option<PathBuf>,

  /// Per-request timeout for remote targets (e.g. "30s", "2m")
  #[arg(long, value_parser = humantime::parse_duration)]
  pub timeout: Option<Duration>,

  /// Print the report as JSON
  #[arg(long)]
  pub json: bool,
}

/// Execute the build command.
///
/// Fails when any unit on any target ends up `Failed`, so automation can act
/// on the exit code.
pub fn cmd_build(args: BuildArgs) -> Result<()> {
  let mut command = args.targets.job_command();
  command.definitions = args.definitions;
  command.sequential = args.sequential;
  command.continue_on_failure = args.continue_on_failure;
  command.parallelism = args.parallelism;
  command.ledger_dir = args.ledger_dir;
  command.request_timeout = args.timeout;

  let manager = job_manager(command)?;
  let progress: Option<ProgressFn> = if args.json {
    None
  } else {
    Some(Arc::new(|outcome: &BuildOutcome| print_outcome(outcome)))
  };

  let started = Instant::now();
  let rt = runtime()?;
  let report = rt
    .block_on(async {
      let token = manager.cancellation_token();
      tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
          warn!("interrupt received, cancelling build");
          token.cancel();
        }
      });
      manager.run(progress).await
    })
    .context("Build failed")?;

  let summary = report.summary();

  if args.json {
    print_json(&report)?;
  } else {
    print_summary(&summary, started.elapsed());
    for target in &report.skipped_targets {
      print_warning(&format!("Skipped target {target} after earlier failure"));
    }
    if !report.has_failures() {
      println!();
      print_success("Build complete");
    }
  }

  if report.has_failures() {
    bail!("{} unit(s) failed", summary.failed);
  }

  Ok(())
}
