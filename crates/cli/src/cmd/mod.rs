mod build;
mod check;
mod control;
mod drop;
mod history;

use anyhow::{Context, Result};
use clap::Args;
use indexgate_lib::job::{JobCommand, JobManager};

pub use build::{BuildArgs, cmd_build};
pub use check::cmd_check;
pub use control::cmd_control;
pub use drop::cmd_drop;
pub use history::cmd_history;

/// Stores a command talks to.
#[derive(Debug, Clone, Args)]
pub struct TargetArgs {
  /// Base URL of a remote store (repeatable)
  #[arg(short = 'c', long = "target", value_name = "URL")]
  pub targets: Vec<String>,

  /// Also use the embedded in-memory store
  #[arg(short, long)]
  pub embedded: bool,
}

impl TargetArgs {
  fn job_command(&self) -> JobCommand {
    JobCommand {
      targets: self.targets.clone(),
      use_embedded: self.embedded,
      ..JobCommand::default()
    }
  }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
  tokio::runtime::Runtime::new().context("Failed to create async runtime")
}

fn job_manager(command: JobCommand) -> Result<JobManager> {
  JobManager::new(command).context("Invalid job configuration")
}
