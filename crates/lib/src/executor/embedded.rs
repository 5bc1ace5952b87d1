use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use super::{BuildExecutor, ExecStatus, ExecutionControl};
use crate::consts::EMBEDDED_TARGET;
use crate::unit::BuildUnit;

/// In-memory store of index definitions.
#[derive(Debug)]
pub struct EmbeddedExecutor {
  indexes: RwLock<BTreeMap<String, serde_json::Value>>,
  processing: RwLock<bool>,
}

impl EmbeddedExecutor {
  pub fn new() -> Self {
    Self {
      indexes: RwLock::new(BTreeMap::new()),
      processing: RwLock::new(true),
    }
  }

  /// Names of the indexes currently defined.
  pub async fn index_names(&self) -> Vec<String> {
    self.indexes.read().await.keys().cloned().collect()
  }

  pub async fn index(&self, name: &str) -> Option<serde_json::Value> {
    self.indexes.read().await.get(name).cloned()
  }

  pub async fn is_processing(&self) -> bool {
    *self.processing.read().await
  }
}

impl Default for EmbeddedExecutor {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl BuildExecutor for EmbeddedExecutor {
  fn identifier(&self) -> &str {
    EMBEDDED_TARGET
  }

  fn remote_address(&self) -> Option<&str> {
    None
  }

  async fn execute(&self, unit: &BuildUnit, cancel: &CancellationToken) -> ExecStatus {
    if cancel.is_cancelled() {
      return ExecStatus::Cancelled;
    }
    self
      .indexes
      .write()
      .await
      .insert(unit.name().to_string(), unit.definition().payload());
    ExecStatus::Success
  }

  async fn delete(&self, name: &str) -> ExecStatus {
    match self.indexes.write().await.remove(name) {
      Some(_) => ExecStatus::Success,
      None => ExecStatus::Failure(format!("index '{name}' does not exist")),
    }
  }

  async fn control(&self, signal: ExecutionControl) -> ExecStatus {
    *self.processing.write().await = signal == ExecutionControl::Start;
    ExecStatus::Success
  }

  async fn ping(&self) -> ExecStatus {
    ExecStatus::Success
  }
}
