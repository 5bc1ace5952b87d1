//! End-to-end orchestration against the embedded store and an on-disk ledger.

use std::sync::Arc;

use indexgate_lib::discovery::{DefinitionFiles, UnitSource};
use indexgate_lib::executor::EmbeddedExecutor;
use indexgate_lib::ledger::{FileLedgerStore, LedgerLock, LedgerLockError, VersionLedger};
use indexgate_lib::orchestrate::{BuildOrchestrator, BuildStatus, OrchestratorConfig};
use indexgate_lib::version::VersionTag;
use tempfile::TempDir;

fn write_definitions(temp: &TempDir, version: &str) -> std::path::PathBuf {
  let dir = temp.path().join("definitions");
  std::fs::create_dir_all(&dir).unwrap();
  std::fs::write(
    dir.join("posts.json"),
    format!(r#"{{ "name": "Posts", "version": "{version}", "maps": ["from p in docs.Posts select p"] }}"#),
  )
  .unwrap();
  dir
}

fn orchestrator(ledger_dir: &std::path::Path, executor: Arc<EmbeddedExecutor>) -> BuildOrchestrator {
  let ledger = VersionLedger::new(Arc::new(FileLedgerStore::new(ledger_dir)));
  BuildOrchestrator::new(executor, ledger, OrchestratorConfig::sequential())
}

#[tokio::test]
async fn ledger_survives_across_orchestrators() {
  let temp = TempDir::new().unwrap();
  let ledger_dir = temp.path().join("ledger");
  let executor = Arc::new(EmbeddedExecutor::new());

  let source = DefinitionFiles::new(vec![write_definitions(&temp, "1.0.0")]);
  let first = orchestrator(&ledger_dir, executor.clone())
    .run(source.list_build_units().unwrap(), None)
    .await
    .unwrap();
  assert_eq!(first.created(), 1);

  // A fresh orchestrator over the same directory sees the recorded version.
  let second = orchestrator(&ledger_dir, executor.clone())
    .run(source.list_build_units().unwrap(), None)
    .await
    .unwrap();
  assert_eq!(second.outcomes()[0].status, BuildStatus::VersionCheckFailed);

  let source = DefinitionFiles::new(vec![write_definitions(&temp, "1.0.1")]);
  let third = orchestrator(&ledger_dir, executor.clone())
    .run(source.list_build_units().unwrap(), None)
    .await
    .unwrap();
  assert_eq!(third.created(), 1);

  let ledger = VersionLedger::new(Arc::new(FileLedgerStore::new(&ledger_dir)));
  assert_eq!(
    ledger.highest_recorded("Posts").await.unwrap(),
    Some(VersionTag::new(1, 0, 1))
  );
  assert_eq!(ledger.history("Posts").await.unwrap().len(), 2);
}

#[test]
fn second_lock_on_same_ledger_is_refused() {
  let temp = TempDir::new().unwrap();
  let ledger_dir = temp.path().join("ledger");

  let held = LedgerLock::acquire(&ledger_dir, "http://db.local", "build").unwrap();
  let err = LedgerLock::acquire(&ledger_dir, "http://db.local", "build").unwrap_err();
  assert!(matches!(
    err,
    LedgerLockError::Busy { .. } | LedgerLockError::BusyUnknownHolder { .. }
  ));

  drop(held);
  let again = LedgerLock::acquire(&ledger_dir, "http://db.local", "build").unwrap();
  assert_eq!(again.holder().unwrap().target, "http://db.local");
}
