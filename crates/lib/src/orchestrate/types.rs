//! Types for orchestrating build runs.
//!
//! This module defines the outcome and report types, the run configuration
//! and the run-level error.

use std::fmt;
use std::sync::Arc;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::ledger::LedgerError;
use crate::unit::BuildUnit;
use crate::version::VersionTag;

/// Terminal status of one unit in one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuildStatus {
  Created,
  Failed,
  Cancelled,
  Deleted,
  /// The recorded version is not lower than the declared one; nothing to do.
  VersionCheckFailed,
}

impl BuildStatus {
  /// Whether this status stops a sequential run without continue-on-failure.
  pub fn stops_sequential_run(self) -> bool {
    matches!(self, BuildStatus::Failed | BuildStatus::VersionCheckFailed)
  }
}

impl fmt::Display for BuildStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      BuildStatus::Created => "created",
      BuildStatus::Failed => "failed",
      BuildStatus::Cancelled => "cancelled",
      BuildStatus::Deleted => "deleted",
      BuildStatus::VersionCheckFailed => "version check failed",
    };
    f.write_str(s)
  }
}

/// Result of attempting one unit (or one administrative operation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOutcome {
  pub unit_name: String,
  /// Identifier of the store connection the unit ran against.
  pub connection: String,
  pub version: Option<VersionTag>,
  pub status: BuildStatus,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub detail: Option<String>,
}

impl BuildOutcome {
  pub fn new(unit_name: &str, connection: &str, version: Option<VersionTag>, status: BuildStatus) -> Self {
    Self {
      unit_name: unit_name.to_string(),
      connection: connection.to_string(),
      version,
      status,
      detail: None,
    }
  }

  pub(crate) fn for_unit(unit: &BuildUnit, connection: &str, status: BuildStatus) -> Self {
    Self::new(unit.name(), connection, unit.version().copied(), status)
  }

  pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
    self.detail = Some(detail.into());
    self
  }
}

/// Counts derived from a [`BuildReport`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
  pub total: usize,
  pub created: usize,
  pub failed: usize,
  pub cancelled: usize,
  pub deleted: usize,
  pub version_check_failed: usize,
}

/// All outcomes of one run, in submission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
  outcomes: Vec<BuildOutcome>,
}

impl BuildReport {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, outcome: BuildOutcome) {
    self.outcomes.push(outcome);
  }

  pub fn outcomes(&self) -> &[BuildOutcome] {
    &self.outcomes
  }

  pub fn len(&self) -> usize {
    self.outcomes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.outcomes.is_empty()
  }

  pub fn count(&self, status: BuildStatus) -> usize {
    self.outcomes.iter().filter(|o| o.status == status).count()
  }

  pub fn created(&self) -> usize {
    self.count(BuildStatus::Created)
  }

  pub fn failed(&self) -> usize {
    self.count(BuildStatus::Failed)
  }

  pub fn cancelled(&self) -> usize {
    self.count(BuildStatus::Cancelled)
  }

  pub fn deleted(&self) -> usize {
    self.count(BuildStatus::Deleted)
  }

  pub fn version_check_failed(&self) -> usize {
    self.count(BuildStatus::VersionCheckFailed)
  }

  /// True when any outcome is `Failed`; the signal automation acts on.
  pub fn has_failures(&self) -> bool {
    self.failed() > 0
  }

  pub fn summary(&self) -> ReportSummary {
    self.outcomes.iter().fold(
      ReportSummary {
        total: self.outcomes.len(),
        ..ReportSummary::default()
      },
      |mut summary, outcome| {
        match outcome.status {
          BuildStatus::Created => summary.created += 1,
          BuildStatus::Failed => summary.failed += 1,
          BuildStatus::Cancelled => summary.cancelled += 1,
          BuildStatus::Deleted => summary.deleted += 1,
          BuildStatus::VersionCheckFailed => summary.version_check_failed += 1,
        }
        summary
      },
    )
  }
}

impl FromIterator<BuildOutcome> for BuildReport {
  fn from_iter<I: IntoIterator<Item = BuildOutcome>>(iter: I) -> Self {
    Self {
      outcomes: iter.into_iter().collect(),
    }
  }
}

impl Serialize for BuildReport {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut state = serializer.serialize_struct("BuildReport", 2)?;
    state.serialize_field("outcomes", &self.outcomes)?;
    state.serialize_field("summary", &self.summary())?;
    state.end()
  }
}

/// Caller-supplied progress sink, invoked once per completed unit.
pub type ProgressFn = Arc<dyn Fn(&BuildOutcome) + Send + Sync>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionMode {
  /// Dispatch every unit at once.
  #[default]
  Parallel,
  /// One unit at a time, in submission order.
  Sequential,
}

/// Configuration for a build run.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
  pub mode: ExecutionMode,

  /// Keep going after a `Failed` or `VersionCheckFailed` unit in sequential
  /// mode. Parallel runs always attempt every unit.
  pub continue_on_failure: bool,

  /// Maximum number of units executing at once in parallel mode.
  pub parallelism: usize,
}

impl OrchestratorConfig {
  pub fn sequential() -> Self {
    Self {
      mode: ExecutionMode::Sequential,
      ..Self::default()
    }
  }

  pub fn with_continue_on_failure(mut self, continue_on_failure: bool) -> Self {
    self.continue_on_failure = continue_on_failure;
    self
  }

  pub fn with_parallelism(mut self, parallelism: usize) -> Self {
    self.parallelism = parallelism;
    self
  }
}

impl Default for OrchestratorConfig {
  fn default() -> Self {
    Self {
      mode: ExecutionMode::Parallel,
      continue_on_failure: false,
      parallelism: num_cpus(),
    }
  }
}

/// Get the number of CPUs for default parallelism.
fn num_cpus() -> usize {
  std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4)
}

/// Run-level failures. Per-unit failures never surface here.
#[derive(Debug, Error)]
pub enum OrchestrateError {
  /// The ledger could not be read or written, so no safe gating decision
  /// can be made.
  #[error("ledger error: {0}")]
  Ledger(#[from] LedgerError),

  #[error("worker pool closed")]
  PoolClosed,
}
