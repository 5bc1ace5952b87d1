use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;
use serde::Serialize;
use thiserror::Error;

use crate::consts::EMBEDDED_TARGET;
use crate::discovery::DiscoveryError;
use crate::ledger::{LedgerError, LedgerLockError};
use crate::orchestrate::{BuildReport, OrchestrateError, ReportSummary};

/// A store the job applies units to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobTarget {
  /// The in-process store, with an in-memory ledger.
  Embedded,
  Remote(Url),
}

impl JobTarget {
  /// Parse a target base URL. Only `http` and `https` are accepted.
  pub fn parse(target: &str) -> Result<Self, JobError> {
    let invalid = |reason: String| JobError::InvalidTarget {
      target: target.to_string(),
      reason,
    };

    let url = Url::parse(target.trim()).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
      "http" | "https" => Ok(JobTarget::Remote(url)),
      other => Err(invalid(format!("unsupported scheme '{other}'"))),
    }
  }

  pub fn is_embedded(&self) -> bool {
    matches!(self, JobTarget::Embedded)
  }
}

impl fmt::Display for JobTarget {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      JobTarget::Embedded => f.write_str(EMBEDDED_TARGET),
      JobTarget::Remote(url) => f.write_str(url.as_str().trim_end_matches('/')),
    }
  }
}

/// Inputs for one job invocation.
#[derive(Debug, Clone, Default)]
pub struct JobCommand {
  /// Base URLs of remote stores.
  pub targets: Vec<String>,
  /// Definition files or directories.
  pub definitions: Vec<PathBuf>,
  /// Also apply to the embedded store.
  pub use_embedded: bool,
  pub sequential: bool,
  pub continue_on_failure: bool,
  /// Worker limit for parallel runs; `None` uses the CPU count.
  pub parallelism: Option<usize>,
  /// Root directory for per-target ledgers; `None` uses the platform default.
  pub ledger_dir: Option<PathBuf>,
  /// Per-request timeout for remote targets; `None` uses
  /// [`DEFAULT_TIMEOUT`](crate::executor::DEFAULT_TIMEOUT).
  pub request_timeout: Option<Duration>,
}

/// Report for one target.
#[derive(Debug, Clone, Serialize)]
pub struct TargetReport {
  pub target: String,
  pub report: BuildReport,
}

/// Reports for every target the job visited, in target order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct JobReport {
  pub targets: Vec<TargetReport>,
  /// Targets not attempted because an earlier target failed.
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub skipped_targets: Vec<String>,
}

impl JobReport {
  pub fn has_failures(&self) -> bool {
    self.targets.iter().any(|t| t.report.has_failures())
  }

  /// Counts summed over every target.
  pub fn summary(&self) -> ReportSummary {
    self
      .targets
      .iter()
      .map(|t| t.report.summary())
      .fold(ReportSummary::default(), |acc, s| ReportSummary {
        total: acc.total + s.total,
        created: acc.created + s.created,
        failed: acc.failed + s.failed,
        cancelled: acc.cancelled + s.cancelled,
        deleted: acc.deleted + s.deleted,
        version_check_failed: acc.version_check_failed + s.version_check_failed,
      })
  }
}

/// Ping result for one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetConnectivity {
  pub target: String,
  pub reachable: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub detail: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConnectivityReport {
  pub targets: Vec<TargetConnectivity>,
}

impl ConnectivityReport {
  pub fn successes(&self) -> usize {
    self.targets.iter().filter(|t| t.reachable).count()
  }

  pub fn all_reachable(&self) -> bool {
    self.successes() == self.targets.len()
  }
}

#[derive(Debug, Error)]
pub enum JobError {
  #[error("no targets configured: pass --target or --embedded")]
  NoTargets,

  #[error("invalid target '{target}': {reason}")]
  InvalidTarget { target: String, reason: String },

  #[error(transparent)]
  Discovery(#[from] DiscoveryError),

  #[error(transparent)]
  Orchestrate(#[from] OrchestrateError),

  #[error(transparent)]
  Ledger(#[from] LedgerError),

  #[error(transparent)]
  Lock(#[from] LedgerLockError),

  #[error("failed to build http client: {0}")]
  Client(#[from] reqwest::Error),
}
