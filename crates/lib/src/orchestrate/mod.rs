//! Build orchestration.
//!
//! This module provides the main entry points for applying build units to a
//! store. It handles:
//! - Version gating through the [`VersionLedger`]
//! - Parallel or sequential dispatch to a [`BuildExecutor`]
//! - Stop-on-failure and continue-on-failure policies
//! - Cooperative per-unit cancellation
//! - Progress reporting and report aggregation
//!
//! Per-unit failures are always captured in that unit's outcome. Only ledger
//! failures abort a run.

mod types;

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Semaphore;
use tokio::task::{AbortHandle, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::executor::{BuildExecutor, ExecStatus, ExecutionControl};
use crate::ledger::VersionLedger;
use crate::unit::BuildUnit;

pub use types::{
  BuildOutcome, BuildReport, BuildStatus, ExecutionMode, OrchestrateError, OrchestratorConfig, ProgressFn,
  ReportSummary,
};

const NO_REMOTE_ADDRESS: &str = "no remote address configured";

/// Executing units keyed by registration id, so duplicate names stay distinct.
type Registry = Arc<Mutex<HashMap<u64, (String, CancellationToken)>>>;

/// Runs build units against one store.
///
/// The orchestrator borrows the executor and ledger for its lifetime; the
/// caller owns both stores. Clones share the executor, ledger and
/// cancellation state.
#[derive(Clone)]
pub struct BuildOrchestrator {
  executor: Arc<dyn BuildExecutor>,
  ledger: VersionLedger,
  config: OrchestratorConfig,
  root_token: CancellationToken,
  in_flight: Registry,
  next_registration: Arc<AtomicU64>,
}

impl BuildOrchestrator {
  pub fn new(executor: Arc<dyn BuildExecutor>, ledger: VersionLedger, config: OrchestratorConfig) -> Self {
    Self {
      executor,
      ledger,
      config,
      root_token: CancellationToken::new(),
      in_flight: Arc::new(Mutex::new(HashMap::new())),
      next_registration: Arc::new(AtomicU64::new(0)),
    }
  }

  /// Tie this orchestrator's cancellation to an external token. Cancelling
  /// `token` cancels every running and future unit.
  pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
    self.root_token = token;
    self
  }

  pub fn config(&self) -> &OrchestratorConfig {
    &self.config
  }

  pub fn ledger(&self) -> &VersionLedger {
    &self.ledger
  }

  /// Identifier of the store this orchestrator targets.
  pub fn connection(&self) -> &str {
    self.executor.identifier()
  }

  /// Cancel the in-flight unit named `name`. Returns false when no such unit
  /// is running. Sibling units are unaffected.
  ///
  /// Every executing unit with that name is cancelled when a run carries
  /// duplicate names.
  pub fn cancel_unit(&self, name: &str) -> bool {
    let in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
    let mut found = false;
    for token in in_flight.values().filter(|(unit, _)| unit == name).map(|(_, token)| token) {
      token.cancel();
      found = true;
    }
    if found {
      info!(unit = name, "cancelling unit");
    }
    found
  }

  /// Cancel every running and future unit of this orchestrator.
  pub fn cancel_all(&self) {
    info!("cancelling all units");
    self.root_token.cancel();
  }

  /// Run every unit and return the outcomes in submission order.
  ///
  /// `progress` is called exactly once per unit that produces an outcome.
  pub async fn run(
    &self,
    units: Vec<BuildUnit>,
    progress: Option<ProgressFn>,
  ) -> Result<BuildReport, OrchestrateError> {
    info!(
      unit_count = units.len(),
      mode = ?self.config.mode,
      continue_on_failure = self.config.continue_on_failure,
      connection = self.connection(),
      "starting build run"
    );

    let report = match self.config.mode {
      ExecutionMode::Parallel => self.run_parallel(units, progress).await?,
      ExecutionMode::Sequential => self.run_sequential(units, progress).await?,
    };

    let summary = report.summary();
    info!(
      total = summary.total,
      created = summary.created,
      failed = summary.failed,
      cancelled = summary.cancelled,
      version_check_failed = summary.version_check_failed,
      "build run complete"
    );

    Ok(report)
  }

  async fn run_sequential(
    &self,
    units: Vec<BuildUnit>,
    progress: Option<ProgressFn>,
  ) -> Result<BuildReport, OrchestrateError> {
    let mut report = BuildReport::new();
    let total = units.len();

    for (index, unit) in units.iter().enumerate() {
      let outcome = self.build_unit(unit, progress.as_ref()).await?;
      let stop = !self.config.continue_on_failure && outcome.status.stops_sequential_run();
      report.push(outcome);

      if stop {
        warn!(
          unit = unit.name(),
          skipped = total - index - 1,
          "stopping sequential run after unsuccessful unit"
        );
        break;
      }
    }

    Ok(report)
  }

  async fn run_parallel(
    &self,
    units: Vec<BuildUnit>,
    progress: Option<ProgressFn>,
  ) -> Result<BuildReport, OrchestrateError> {
    let semaphore = Arc::new(Semaphore::new(self.config.parallelism.max(1)));
    let mut join_set = JoinSet::new();
    let mut pending = HashMap::with_capacity(units.len());
    let total = units.len();

    for (index, unit) in units.into_iter().enumerate() {
      let this = self.clone();
      let semaphore = semaphore.clone();
      let progress = progress.clone();
      let task_unit = unit.clone();

      let task = join_set.spawn(async move {
        let _permit = semaphore.acquire().await.map_err(|_| OrchestrateError::PoolClosed)?;
        let outcome = this.build_unit(&task_unit, progress.as_ref()).await?;
        Ok::<_, OrchestrateError>((index, outcome))
      });
      pending.insert(task.id(), (index, unit));
    }

    let mut completed = Vec::with_capacity(total);

    while let Some(join_result) = join_set.join_next_with_id().await {
      match join_result {
        Ok((id, Ok(indexed))) => {
          pending.remove(&id);
          completed.push(indexed);
        }
        Ok((_, Err(e))) => {
          error!(error = %e, "aborting build run");
          join_set.abort_all();
          // Wait for the aborted units so none outlives the run.
          while join_set.join_next().await.is_some() {}
          return Err(e);
        }
        Err(e) => {
          let Some((index, unit)) = pending.remove(&e.id()) else {
            continue;
          };
          let detail = join_error_detail(e);
          error!(unit = unit.name(), error = %detail, "build task failed");
          let outcome = BuildOutcome::for_unit(&unit, self.connection(), BuildStatus::Failed).with_detail(detail);
          report_progress(progress.as_ref(), &outcome);
          completed.push((index, outcome));
        }
      }
    }

    completed.sort_by_key(|(index, _)| *index);
    Ok(completed.into_iter().map(|(_, outcome)| outcome).collect())
  }

  /// Gate, execute and record one unit.
  async fn build_unit(
    &self,
    unit: &BuildUnit,
    progress: Option<&ProgressFn>,
  ) -> Result<BuildOutcome, OrchestrateError> {
    let connection = self.connection();

    let outcome = if !self.ledger.is_higher_version(unit.version(), unit.name()).await? {
      warn!(
        unit = unit.name(),
        version = ?unit.version().map(ToString::to_string),
        "version check failed, skipping unit"
      );
      BuildOutcome::for_unit(unit, connection, BuildStatus::VersionCheckFailed)
    } else {
      match self.execute(unit).await {
        ExecStatus::Success => {
          self.ledger.log_update(unit.name(), unit.version()).await?;
          info!(unit = unit.name(), "unit created");
          BuildOutcome::for_unit(unit, connection, BuildStatus::Created)
        }
        ExecStatus::Cancelled => {
          warn!(unit = unit.name(), "unit cancelled");
          BuildOutcome::for_unit(unit, connection, BuildStatus::Cancelled)
        }
        ExecStatus::Failure(detail) => {
          error!(unit = unit.name(), error = %detail, "unit failed");
          BuildOutcome::for_unit(unit, connection, BuildStatus::Failed).with_detail(detail)
        }
      }
    };

    report_progress(progress, &outcome);
    Ok(outcome)
  }

  /// Run the executor for one unit, racing it against the unit's
  /// cancellation token and containing panics.
  async fn execute(&self, unit: &BuildUnit) -> ExecStatus {
    let mut registration = self.register(unit.name());
    let token = registration.token.clone();

    if token.is_cancelled() {
      return ExecStatus::Cancelled;
    }

    let executor = self.executor.clone();
    let task_unit = unit.clone();
    let task_token = token.clone();
    let mut handle = tokio::spawn(async move { executor.execute(&task_unit, &task_token).await });
    registration.task = Some(handle.abort_handle());

    tokio::select! {
      biased;
      joined = &mut handle => joined.unwrap_or_else(join_error_status),
      _ = token.cancelled() => ExecStatus::Cancelled,
    }
  }

  fn register(&self, name: &str) -> Registration {
    let id = self.next_registration.fetch_add(1, Ordering::Relaxed);
    let token = self.root_token.child_token();
    let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
    in_flight.insert(id, (name.to_string(), token.clone()));
    Registration {
      registry: self.in_flight.clone(),
      id,
      token,
      task: None,
    }
  }

  #[cfg(test)]
  fn in_flight_count(&self) -> usize {
    self.in_flight.lock().unwrap_or_else(PoisonError::into_inner).len()
  }

  /// Delete a named artifact from the store. No version gating.
  pub async fn drop_unit(&self, name: &str, progress: Option<&ProgressFn>) -> BuildOutcome {
    let executor = self.executor.clone();
    let target = name.to_string();
    let status = guarded(async move { executor.delete(&target).await }).await;

    let outcome = match status {
      ExecStatus::Success => {
        info!(unit = name, "unit deleted");
        BuildOutcome::new(name, self.connection(), None, BuildStatus::Deleted)
      }
      ExecStatus::Cancelled => BuildOutcome::new(name, self.connection(), None, BuildStatus::Cancelled),
      ExecStatus::Failure(detail) => {
        error!(unit = name, error = %detail, "delete failed");
        BuildOutcome::new(name, self.connection(), None, BuildStatus::Failed).with_detail(detail)
      }
    };

    report_progress(progress, &outcome);
    outcome
  }

  /// Start or stop the store's background processing.
  ///
  /// A store without a remote address reports `Cancelled` with an
  /// explanatory detail; this is a configuration problem, not a remote fault.
  pub async fn signal_execution_control(
    &self,
    signal: ExecutionControl,
    progress: Option<&ProgressFn>,
  ) -> BuildOutcome {
    let name = signal.operation_name();
    let connection = self.connection();

    let has_address = self.executor.remote_address().is_some_and(|a| !a.trim().is_empty());

    let outcome = if !has_address {
      warn!(operation = name, connection, "{NO_REMOTE_ADDRESS}");
      BuildOutcome::new(name, connection, None, BuildStatus::Cancelled).with_detail(NO_REMOTE_ADDRESS)
    } else {
      let executor = self.executor.clone();
      match guarded(async move { executor.control(signal).await }).await {
        ExecStatus::Success => {
          info!(operation = name, "execution control signalled");
          BuildOutcome::new(name, connection, None, BuildStatus::Created)
        }
        ExecStatus::Cancelled => BuildOutcome::new(name, connection, None, BuildStatus::Cancelled),
        ExecStatus::Failure(detail) => {
          error!(operation = name, error = %detail, "execution control failed");
          BuildOutcome::new(name, connection, None, BuildStatus::Failed).with_detail(detail)
        }
      }
    };

    report_progress(progress, &outcome);
    outcome
  }
}

impl std::fmt::Debug for BuildOrchestrator {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("BuildOrchestrator")
      .field("connection", &self.connection())
      .field("config", &self.config)
      .finish_non_exhaustive()
  }
}

/// One executing unit. Dropping it unregisters the unit and aborts its
/// executor task, also when the surrounding run is torn down mid-flight.
struct Registration {
  registry: Registry,
  id: u64,
  token: CancellationToken,
  task: Option<AbortHandle>,
}

impl Drop for Registration {
  fn drop(&mut self) {
    if let Some(task) = &self.task {
      task.abort();
    }
    self
      .registry
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .remove(&self.id);
  }
}

/// Run an executor call on its own task so a panic becomes a failure.
async fn guarded<F>(future: F) -> ExecStatus
where
  F: Future<Output = ExecStatus> + Send + 'static,
{
  tokio::spawn(future).await.unwrap_or_else(join_error_status)
}

fn join_error_status(err: JoinError) -> ExecStatus {
  if err.is_panic() {
    ExecStatus::Failure(format!("executor panicked: {}", panic_message(err.into_panic().as_ref())))
  } else {
    ExecStatus::Cancelled
  }
}

fn join_error_detail(err: JoinError) -> String {
  if err.is_panic() {
    format!("build task panicked: {}", panic_message(err.into_panic().as_ref()))
  } else {
    "build task cancelled".to_string()
  }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(s) = payload.downcast_ref::<&str>() {
    (*s).to_string()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "unknown panic".to_string()
  }
}

/// Invoke the progress sink. A panicking sink is logged and otherwise ignored.
fn report_progress(progress: Option<&ProgressFn>, outcome: &BuildOutcome) {
  let Some(progress) = progress else {
    return;
  };
  debug!(unit = %outcome.unit_name, status = %outcome.status, "reporting progress");
  if std::panic::catch_unwind(AssertUnwindSafe(|| progress(outcome))).is_err() {
    warn!(unit = %outcome.unit_name, "progress callback panicked");
  }
}
