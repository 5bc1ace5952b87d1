//! Jobs: one invocation of the tool against one or more targets.
//!
//! A [`JobManager`] resolves targets, discovers units once, and then drives a
//! [`BuildOrchestrator`] per target. Remote targets use an on-disk ledger
//! under `<ledger root>/<target slug>`, locked for the duration of a build.
//! The embedded target uses an in-memory ledger that lives as long as the
//! manager.

mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::Url;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::discovery::{DefinitionFiles, UnitSource};
use crate::executor::{BuildExecutor, DEFAULT_TIMEOUT, EmbeddedExecutor, ExecStatus, ExecutionControl, HttpExecutor};
use crate::ledger::{FileLedgerStore, LedgerError, LedgerLock, VersionLedger};
use crate::orchestrate::{BuildOrchestrator, BuildOutcome, ExecutionMode, OrchestratorConfig, ProgressFn};
use crate::platform::paths;

pub use types::{
  ConnectivityReport, JobCommand, JobError, JobReport, JobTarget, TargetConnectivity, TargetReport,
};

pub struct JobManager {
  command: JobCommand,
  targets: Vec<JobTarget>,
  embedded: Arc<EmbeddedExecutor>,
  embedded_ledger: VersionLedger,
  cancel: CancellationToken,
}

impl JobManager {
  /// Validate the command and resolve its targets.
  ///
  /// Fails with [`JobError::NoTargets`] when neither a remote target nor the
  /// embedded store was requested.
  pub fn new(command: JobCommand) -> Result<Self, JobError> {
    let mut targets = Vec::with_capacity(command.targets.len() + 1);
    if command.use_embedded {
      targets.push(JobTarget::Embedded);
    }
    for target in &command.targets {
      targets.push(JobTarget::parse(target)?);
    }

    if targets.is_empty() {
      return Err(JobError::NoTargets);
    }

    Ok(Self {
      command,
      targets,
      embedded: Arc::new(EmbeddedExecutor::new()),
      embedded_ledger: VersionLedger::in_memory(),
      cancel: CancellationToken::new(),
    })
  }

  pub fn targets(&self) -> &[JobTarget] {
    &self.targets
  }

  /// The embedded store shared by every operation of this manager.
  pub fn embedded(&self) -> &Arc<EmbeddedExecutor> {
    &self.embedded
  }

  /// Cancel every in-flight and pending unit across all targets.
  pub fn cancel(&self) {
    self.cancel.cancel();
  }

  pub fn cancellation_token(&self) -> CancellationToken {
    self.cancel.clone()
  }

  /// Root directory holding the per-target ledgers.
  pub fn ledger_root(&self) -> PathBuf {
    self.command.ledger_dir.clone().unwrap_or_else(paths::ledger_dir)
  }

  /// Ledger directory of `target`; `None` for the embedded target.
  pub fn ledger_dir_for(&self, target: &JobTarget) -> Option<PathBuf> {
    match target {
      JobTarget::Embedded => None,
      JobTarget::Remote(url) => Some(self.ledger_root().join(paths::target_slug(url.as_str()))),
    }
  }

  fn orchestrator_config(&self) -> OrchestratorConfig {
    let mut config = OrchestratorConfig {
      mode: if self.command.sequential {
        ExecutionMode::Sequential
      } else {
        ExecutionMode::Parallel
      },
      continue_on_failure: self.command.continue_on_failure,
      ..OrchestratorConfig::default()
    };
    if let Some(parallelism) = self.command.parallelism {
      config.parallelism = parallelism.max(1);
    }
    config
  }

  fn http_executor(&self, url: &Url) -> Result<HttpExecutor, JobError> {
    let timeout = self.command.request_timeout.unwrap_or(DEFAULT_TIMEOUT);
    Ok(HttpExecutor::with_timeout(url.clone(), timeout)?)
  }

  fn orchestrator(&self, target: &JobTarget) -> Result<BuildOrchestrator, JobError> {
    let (executor, ledger): (Arc<dyn BuildExecutor>, VersionLedger) = match target {
      JobTarget::Embedded => (self.embedded.clone(), self.embedded_ledger.clone()),
      JobTarget::Remote(url) => {
        let executor = self.http_executor(url)?;
        let dir = self.ledger_root().join(paths::target_slug(url.as_str()));
        (Arc::new(executor), VersionLedger::new(Arc::new(FileLedgerStore::new(dir))))
      }
    };

    let orchestrator = BuildOrchestrator::new(executor, ledger, self.orchestrator_config());
    Ok(orchestrator.with_cancellation(self.cancel.child_token()))
  }

  /// Discover units and build them on every target, in target order.
  ///
  /// In a sequential run without continue-on-failure, a target whose report
  /// contains failures stops the remaining targets.
  pub async fn run(&self, progress: Option<ProgressFn>) -> Result<JobReport, JobError> {
    let source = DefinitionFiles::new(self.command.definitions.clone());
    let units = source.list_build_units()?;

    if units.is_empty() {
      warn!("no definitions found");
    }
    info!(unit_count = units.len(), target_count = self.targets.len(), "starting job");

    let stop_on_failure = self.command.sequential && !self.command.continue_on_failure;
    let mut report = JobReport::default();

    for (index, target) in self.targets.iter().enumerate() {
      let _lock = match self.ledger_dir_for(target) {
        Some(dir) => Some(LedgerLock::acquire(&dir, &target.to_string(), "build")?),
        None => None,
      };

      let orchestrator = self.orchestrator(target)?;
      let build_report = orchestrator.run(units.clone(), progress.clone()).await?;
      let failed = build_report.has_failures();

      report.targets.push(TargetReport {
        target: target.to_string(),
        report: build_report,
      });

      if failed && stop_on_failure {
        report.skipped_targets = self.targets[index + 1..].iter().map(ToString::to_string).collect();
        if !report.skipped_targets.is_empty() {
          warn!(
            target = %target,
            skipped = report.skipped_targets.len(),
            "stopping job after failed target"
          );
        }
        break;
      }
    }

    Ok(report)
  }

  /// Delete `name` on every target.
  pub async fn drop_unit(&self, name: &str, progress: Option<&ProgressFn>) -> Result<Vec<BuildOutcome>, JobError> {
    let mut outcomes = Vec::with_capacity(self.targets.len());
    for target in &self.targets {
      outcomes.push(self.orchestrator(target)?.drop_unit(name, progress).await);
    }
    Ok(outcomes)
  }

  /// Start or stop background processing on every target.
  pub async fn signal_execution_control(
    &self,
    signal: ExecutionControl,
    progress: Option<&ProgressFn>,
  ) -> Result<Vec<BuildOutcome>, JobError> {
    let mut outcomes = Vec::with_capacity(self.targets.len());
    for target in &self.targets {
      outcomes.push(
        self
          .orchestrator(target)?
          .signal_execution_control(signal, progress)
          .await,
      );
    }
    Ok(outcomes)
  }

  /// Ping every target.
  pub async fn check_connectivity(&self) -> Result<ConnectivityReport, JobError> {
    let mut report = ConnectivityReport::default();

    for target in &self.targets {
      let status = match target {
        JobTarget::Embedded => self.embedded.ping().await,
        JobTarget::Remote(url) => self.http_executor(url)?.ping().await,
      };

      let (reachable, detail) = match status {
        ExecStatus::Success => (true, None),
        ExecStatus::Failure(detail) => (false, Some(detail)),
        ExecStatus::Cancelled => (false, Some("cancelled".to_string())),
      };
      info!(target = %target, reachable, "connectivity check");

      report.targets.push(TargetConnectivity {
        target: target.to_string(),
        reachable,
        detail,
      });
    }

    Ok(report)
  }
}

impl std::fmt::Debug for JobManager {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("JobManager")
      .field("command", &self.command)
      .field("targets", &self.targets)
      .finish_non_exhaustive()
  }
}

/// Per-target ledger directories under `root` that hold a ledger document,
/// sorted by name. A missing root yields an empty list.
pub fn recorded_ledgers(root: &Path) -> Result<Vec<(String, VersionLedger)>, LedgerError> {
  let read_dir = match std::fs::read_dir(root) {
    Ok(read_dir) => read_dir,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
    Err(e) => return Err(LedgerError::Read(e)),
  };

  let mut found = Vec::new();
  for entry in read_dir {
    let entry = entry.map_err(LedgerError::Read)?;
    if !entry.file_type().map_err(LedgerError::Read)?.is_dir() {
      continue;
    }
    let store = FileLedgerStore::new(entry.path());
    if store.has_document() {
      found.push((entry.file_name().to_string_lossy().into_owned(), store));
    }
  }
  found.sort_by(|a, b| a.0.cmp(&b.0));

  Ok(
    found
      .into_iter()
      .map(|(name, store)| (name, VersionLedger::new(Arc::new(store))))
      .collect(),
  )
}
