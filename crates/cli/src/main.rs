mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use indexgate_lib::executor::ExecutionControl;

use cmd::{BuildArgs, TargetArgs};

/// indexgate - version-gated index builds
#[derive(Parser)]
#[command(name = "indexgate")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Apply index definitions whose version is newer than the recorded one
  Build(BuildArgs),

  /// Delete an index from every target
  Drop {
    /// Index name
    name: String,

    #[command(flatten)]
    targets: TargetArgs,

    /// Print outcomes as JSON
    #[arg(long)]
    json: bool,
  },

  /// Resume background indexing on every target
  Start {
    #[command(flatten)]
    targets: TargetArgs,

    /// Print outcomes as JSON
    #[arg(long)]
    json: bool,
  },

  /// Pause background indexing on every target
  Stop {
    #[command(flatten)]
    targets: TargetArgs,

    /// Print outcomes as JSON
    #[arg(long)]
    json: bool,
  },

  /// Show recorded ledger entries
  History {
    /// Only show entries for this index
    name: Option<String>,

    /// Only show the ledger of this target URL
    #[arg(short = 'c', long = "target", value_name = "URL")]
    target: Option<String>,

    /// Root directory for per-target ledgers
    #[arg(long, value_name = "DIR")]
    ledger_dir: Option<PathBuf>,

    /// Print entries as JSON
    #[arg(long)]
    json: bool,
  },

  /// Check that every target is reachable
  Check {
    #[command(flatten)]
    targets: TargetArgs,

    /// Print results as JSON
    #[arg(long)]
    json: bool,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  // RUST_LOG wins over -v.
  let default_level = if cli.verbose { "info" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match cli.command {
    Commands::Build(args) => cmd::cmd_build(args),
    Commands::Drop { name, targets, json } => cmd::cmd_drop(&name, &targets, json),
    Commands::Start { targets, json } => cmd::cmd_control(ExecutionControl::Start, &targets, json),
    Commands::Stop { targets, json } => cmd::cmd_control(ExecutionControl::Stop, &targets, json),
    Commands::History {
      name,
      target,
      ledger_dir,
      json,
    } => cmd::cmd_history(name.as_deref(), target.as_deref(), ledger_dir, json),
    Commands::Check { targets, json } => cmd::cmd_check(&targets, json),
  }
}
