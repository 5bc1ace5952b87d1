//! Version ledger: the append-only record of which version of which unit was
//! successfully applied.
//!
//! [`VersionLedger`] answers the gating question ("may this version be
//! applied?") and records successful applications. All reads and writes go
//! through a [`LedgerStore`]; the ledger never swallows or retries store
//! failures.

mod lock;
mod store;
mod types;

use std::sync::Arc;

use tracing::debug;

use crate::version::VersionTag;

pub use lock::{LedgerLock, LedgerLockError, LockHolder};
pub use store::{FileLedgerStore, LedgerStore, MemoryLedgerStore};
pub use types::{ENTRY_ID_PREFIX, LEDGER_FORMAT_VERSION, LedgerDocument, LedgerEntry, LedgerError, entry_prefix};

#[derive(Clone)]
pub struct VersionLedger {
  store: Arc<dyn LedgerStore>,
}

impl VersionLedger {
  pub fn new(store: Arc<dyn LedgerStore>) -> Self {
    Self { store }
  }

  /// Ledger backed by a fresh [`MemoryLedgerStore`].
  pub fn in_memory() -> Self {
    Self::new(Arc::new(MemoryLedgerStore::new()))
  }

  /// Whether `local_version` may be (re-)applied to `unit_name`.
  ///
  /// Unversioned units are always eligible, as is a unit with no recorded
  /// history. Otherwise the version must be strictly higher than the highest
  /// recorded one; equal versions are not eligible.
  pub async fn is_higher_version(
    &self,
    local_version: Option<&VersionTag>,
    unit_name: &str,
  ) -> Result<bool, LedgerError> {
    let Some(local_version) = local_version else {
      return Ok(true);
    };

    let highest = self.highest_recorded(unit_name).await?;

    let eligible = match &highest {
      None => true,
      Some(recorded) => local_version.is_higher_than(recorded),
    };

    debug!(
      unit = unit_name,
      local = %local_version,
      recorded = ?highest.map(|v| v.to_string()),
      eligible,
      "version gate"
    );

    Ok(eligible)
  }

  /// Highest version recorded for exactly `unit_name`, compared numerically.
  pub async fn highest_recorded(&self, unit_name: &str) -> Result<Option<VersionTag>, LedgerError> {
    let entries = self.store.find_by_name_prefix(&entry_prefix(unit_name)).await?;

    Ok(
      entries
        .into_iter()
        .filter(|e| e.unit_name == unit_name)
        .map(|e| e.version)
        .max(),
    )
  }

  /// Record that `unit_name` was successfully brought to `to_version`.
  ///
  /// No-op for unversioned units. Always appends: logging the same version
  /// twice produces two entries.
  pub async fn log_update(&self, unit_name: &str, to_version: Option<&VersionTag>) -> Result<(), LedgerError> {
    let Some(to_version) = to_version else {
      return Ok(());
    };

    debug!(unit = unit_name, version = %to_version, "recording ledger entry");
    self.store.append(LedgerEntry::new(unit_name, *to_version)).await
  }

  /// Entries recorded for exactly `unit_name`, ordered by version.
  pub async fn history(&self, unit_name: &str) -> Result<Vec<LedgerEntry>, LedgerError> {
    let mut entries: Vec<LedgerEntry> = self
      .store
      .find_by_name_prefix(&entry_prefix(unit_name))
      .await?
      .into_iter()
      .filter(|e| e.unit_name == unit_name)
      .collect();
    entries.sort_by(|a, b| a.version.cmp(&b.version).then(a.applied_at.cmp(&b.applied_at)));
    Ok(entries)
  }

  /// Every entry in the ledger, ordered by unit name then version.
  pub async fn entries(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
    let mut entries = self.store.all().await?;
    entries.sort_by(|a, b| a.unit_name.cmp(&b.unit_name).then(a.version.cmp(&b.version)));
    Ok(entries)
  }
}

impl std::fmt::Debug for VersionLedger {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("VersionLedger").finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use async_trait::async_trait;

  fn v(major: u32, minor: u32, revision: u32) -> VersionTag {
    VersionTag::new(major, minor, revision)
  }

  fn seeded(name: &str, version: VersionTag) -> VersionLedger {
    let store = MemoryLedgerStore::with_entries(vec![LedgerEntry::new(name, version)]);
    VersionLedger::new(Arc::new(store))
  }

  #[tokio::test]
  async fn unversioned_is_always_eligible() {
    let ledger = seeded("NotDefined", v(9, 9, 9));
    assert!(ledger.is_higher_version(None, "NotDefined").await.unwrap());
    assert!(ledger.is_higher_version(None, "Anything").await.unwrap());
  }

  #[tokio::test]
  async fn first_application_is_eligible() {
    let ledger = VersionLedger::in_memory();
    assert!(ledger.is_higher_version(Some(&v(0, 0, 0)), "NotDefined").await.unwrap());
  }

  #[tokio::test]
  async fn same_version_is_not_eligible() {
    let ledger = seeded("IndexWithVersion100", v(1, 0, 0));
    assert!(
      !ledger
        .is_higher_version(Some(&v(1, 0, 0)), "IndexWithVersion100")
        .await
        .unwrap()
    );
  }

  #[tokio::test]
  async fn higher_recorded_revision_blocks() {
    let ledger = seeded("IndexWithVersion101", v(1, 0, 1));
    assert!(
      !ledger
        .is_higher_version(Some(&v(1, 0, 0)), "IndexWithVersion101")
        .await
        .unwrap()
    );
  }

  #[tokio::test]
  async fn higher_recorded_minor_blocks() {
    let ledger = seeded("IndexWithVersion110", v(1, 1, 0));
    assert!(
      !ledger
        .is_higher_version(Some(&v(1, 0, 0)), "IndexWithVersion110")
        .await
        .unwrap()
    );
  }

  #[tokio::test]
  async fn higher_recorded_major_blocks() {
    let ledger = seeded("IndexWithVersion200", v(2, 0, 0));
    assert!(
      !ledger
        .is_higher_version(Some(&v(1, 0, 0)), "IndexWithVersion200")
        .await
        .unwrap()
    );
  }

  #[tokio::test]
  async fn lower_recorded_revision_allows() {
    let ledger = seeded("IndexWithVersion101", v(1, 0, 1));
    assert!(
      ledger
        .is_higher_version(Some(&v(1, 0, 2)), "IndexWithVersion101")
        .await
        .unwrap()
    );
  }

  #[tokio::test]
  async fn lower_recorded_minor_allows() {
    let ledger = seeded("IndexWithVersion110", v(1, 1, 0));
    assert!(
      ledger
        .is_higher_version(Some(&v(1, 2, 0)), "IndexWithVersion110")
        .await
        .unwrap()
    );
  }

  #[tokio::test]
  async fn lower_recorded_major_allows() {
    let ledger = seeded("IndexWithVersion100", v(1, 0, 0));
    assert!(
      ledger
        .is_higher_version(Some(&v(2, 0, 0)), "IndexWithVersion100")
        .await
        .unwrap()
    );
  }

  #[tokio::test]
  async fn idx_scenario() {
    let ledger = seeded("Idx", v(1, 0, 1));
    assert!(!ledger.is_higher_version(Some(&v(1, 0, 0)), "Idx").await.unwrap());
    assert!(ledger.is_higher_version(Some(&v(1, 0, 2)), "Idx").await.unwrap());
  }

  #[tokio::test]
  async fn highest_uses_numeric_order_not_text() {
    let store = MemoryLedgerStore::with_entries(vec![
      LedgerEntry::new("Wide", v(1, 100, 0)),
      LedgerEntry::new("Wide", v(1, 99, 0)),
    ]);
    let ledger = VersionLedger::new(Arc::new(store));

    assert_eq!(ledger.highest_recorded("Wide").await.unwrap(), Some(v(1, 100, 0)));
    assert!(!ledger.is_higher_version(Some(&v(1, 99, 5)), "Wide").await.unwrap());
  }

  #[tokio::test]
  async fn nested_names_do_not_leak_into_gate() {
    // "Idx/Sub" shares the "Idx/" id prefix but is a different unit.
    let store = MemoryLedgerStore::with_entries(vec![LedgerEntry::new("Idx/Sub", v(5, 0, 0))]);
    let ledger = VersionLedger::new(Arc::new(store));

    assert!(ledger.is_higher_version(Some(&v(1, 0, 0)), "Idx").await.unwrap());
  }

  #[tokio::test]
  async fn log_update_skips_unversioned() {
    let store = Arc::new(MemoryLedgerStore::new());
    let ledger = VersionLedger::new(store.clone());

    ledger.log_update("Unversioned", None).await.unwrap();

    assert!(store.is_empty().await);
  }

  #[tokio::test]
  async fn log_update_appends_duplicates() {
    let store = Arc::new(MemoryLedgerStore::new());
    let ledger = VersionLedger::new(store.clone());

    ledger.log_update("Idx", Some(&v(1, 0, 0))).await.unwrap();
    ledger.log_update("Idx", Some(&v(1, 0, 0))).await.unwrap();

    assert_eq!(store.len().await, 2);
    assert!(!ledger.is_higher_version(Some(&v(1, 0, 0)), "Idx").await.unwrap());
  }

  #[tokio::test]
  async fn history_is_ordered_by_version() {
    let ledger = VersionLedger::in_memory();
    ledger.log_update("Idx", Some(&v(1, 1, 0))).await.unwrap();
    ledger.log_update("Idx", Some(&v(1, 0, 0))).await.unwrap();
    ledger.log_update("Other", Some(&v(3, 0, 0))).await.unwrap();

    let history = ledger.history("Idx").await.unwrap();
    let versions: Vec<_> = history.iter().map(|e| e.version).collect();
    assert_eq!(versions, vec![v(1, 0, 0), v(1, 1, 0)]);

    assert_eq!(ledger.entries().await.unwrap().len(), 3);
  }

  struct BrokenStore;

  #[async_trait]
  impl LedgerStore for BrokenStore {
    async fn find_by_name_prefix(&self, _prefix: &str) -> Result<Vec<LedgerEntry>, LedgerError> {
      Err(LedgerError::Backend("offline".to_string()))
    }

    async fn append(&self, _entry: LedgerEntry) -> Result<(), LedgerError> {
      Err(LedgerError::Backend("offline".to_string()))
    }
  }

  #[tokio::test]
  async fn store_failures_propagate() {
    let ledger = VersionLedger::new(Arc::new(BrokenStore));

    assert!(matches!(
      ledger.is_higher_version(Some(&v(1, 0, 0)), "Idx").await,
      Err(LedgerError::Backend(_))
    ));
    assert!(matches!(
      ledger.log_update("Idx", Some(&v(1, 0, 0))).await,
      Err(LedgerError::Backend(_))
    ));
    // Unversioned calls never touch the store.
    assert!(ledger.is_higher_version(None, "Idx").await.unwrap());
    assert!(ledger.log_update("Idx", None).await.is_ok());
  }
}
