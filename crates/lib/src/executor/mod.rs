//! Executors apply build units to a remote store.
//!
//! The orchestrator never talks to a store directly: it hands each unit to a
//! [`BuildExecutor`] and maps the returned [`ExecStatus`] into an outcome.
//!
//! - [`HttpExecutor`] speaks a small REST protocol to a remote store.
//! - [`EmbeddedExecutor`] keeps index definitions in memory, for tests and
//!   dry runs against the embedded target.

mod embedded;
mod http;

use std::fmt;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::unit::BuildUnit;

pub use embedded::EmbeddedExecutor;
pub use http::{DEFAULT_TIMEOUT, HttpExecutor};

/// Terminal state of one executor call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecStatus {
  Success,
  Failure(String),
  Cancelled,
}

impl ExecStatus {
  pub fn is_success(&self) -> bool {
    matches!(self, ExecStatus::Success)
  }
}

/// Administrative toggle for the store's background processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionControl {
  Start,
  Stop,
}

impl ExecutionControl {
  /// Name reported in outcomes for this operation.
  pub fn operation_name(self) -> &'static str {
    match self {
      ExecutionControl::Start => "StartIndexing",
      ExecutionControl::Stop => "StopIndexing",
    }
  }
}

impl fmt::Display for ExecutionControl {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ExecutionControl::Start => write!(f, "start"),
      ExecutionControl::Stop => write!(f, "stop"),
    }
  }
}

#[async_trait]
pub trait BuildExecutor: Send + Sync {
  /// Identifier of the store connection, reported on every outcome.
  fn identifier(&self) -> &str;

  /// Address used for administrative calls; `None` when the store has no
  /// remote endpoint.
  fn remote_address(&self) -> Option<&str>;

  /// Create or replace the unit's artifact on the store.
  ///
  /// Implementations should stop early and return [`ExecStatus::Cancelled`]
  /// once `cancel` fires.
  async fn execute(&self, unit: &BuildUnit, cancel: &CancellationToken) -> ExecStatus;

  /// Delete a named artifact.
  async fn delete(&self, name: &str) -> ExecStatus;

  /// Start or stop background processing.
  async fn control(&self, signal: ExecutionControl) -> ExecStatus;

  /// Check that the store is reachable.
  async fn ping(&self) -> ExecStatus;
}
