//! Ledger storage backends.
//!
//! # Storage Layout
//!
//! ```text
//! {ledger_dir}/
//! ├── .lock          # LedgerLock holder (see lock.rs)
//! └── ledger.json    # LedgerDocument: format version + append-only entries
//! ```

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::{Mutex, RwLock};

use super::types::{ENTRY_ID_PREFIX, LEDGER_FORMAT_VERSION, LedgerDocument, LedgerEntry, LedgerError};

/// Ledger file name within the ledger directory.
const LEDGER_FILENAME: &str = "ledger.json";

/// Persistent store holding ledger entries.
///
/// Implementations must tolerate concurrent calls: the orchestrator reads and
/// appends from many units at once.
#[async_trait]
pub trait LedgerStore: Send + Sync {
  /// All entries whose id starts with `prefix`, in insertion order.
  async fn find_by_name_prefix(&self, prefix: &str) -> Result<Vec<LedgerEntry>, LedgerError>;

  /// Insert a new entry. Never replaces an existing one.
  async fn append(&self, entry: LedgerEntry) -> Result<(), LedgerError>;

  /// Every entry in the store.
  async fn all(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
    self.find_by_name_prefix(ENTRY_ID_PREFIX).await
  }
}

/// In-memory ledger, used for the embedded target and in tests.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
  entries: RwLock<Vec<LedgerEntry>>,
}

impl MemoryLedgerStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Seed the store with existing entries.
  pub fn with_entries(entries: Vec<LedgerEntry>) -> Self {
    Self {
      entries: RwLock::new(entries),
    }
  }

  pub async fn len(&self) -> usize {
    self.entries.read().await.len()
  }

  pub async fn is_empty(&self) -> bool {
    self.entries.read().await.is_empty()
  }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
  async fn find_by_name_prefix(&self, prefix: &str) -> Result<Vec<LedgerEntry>, LedgerError> {
    let entries = self.entries.read().await;
    Ok(entries.iter().filter(|e| e.id.starts_with(prefix)).cloned().collect())
  }

  async fn append(&self, entry: LedgerEntry) -> Result<(), LedgerError> {
    self.entries.write().await.push(entry);
    Ok(())
  }
}

/// Ledger persisted as a single JSON document.
///
/// Writes go to a temp file which is then renamed over the ledger, so readers
/// never observe a partial document. Appends within one process are
/// serialized; use [`LedgerLock`](super::LedgerLock) across processes.
#[derive(Debug)]
pub struct FileLedgerStore {
  base_path: PathBuf,
  write_lock: Mutex<()>,
}

impl FileLedgerStore {
  pub fn new(base_path: impl Into<PathBuf>) -> Self {
    Self {
      base_path: base_path.into(),
      write_lock: Mutex::new(()),
    }
  }

  pub fn base_path(&self) -> &Path {
    &self.base_path
  }

  /// Whether a ledger document has been written under this path.
  pub fn has_document(&self) -> bool {
    self.ledger_path().is_file()
  }

  fn ledger_path(&self) -> PathBuf {
    self.base_path.join(LEDGER_FILENAME)
  }

  /// Load the ledger document.
  ///
  /// Returns an empty document if the file doesn't exist.
  pub async fn load(&self) -> Result<LedgerDocument, LedgerError> {
    let content = match fs::read_to_string(self.ledger_path()).await {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(LedgerDocument::new()),
      Err(e) => return Err(LedgerError::Read(e)),
    };

    let document: LedgerDocument = serde_json::from_str(&content).map_err(LedgerError::Parse)?;

    if document.version != LEDGER_FORMAT_VERSION {
      return Err(LedgerError::UnsupportedVersion(document.version));
    }

    Ok(document)
  }

  async fn save(&self, document: &LedgerDocument) -> Result<(), LedgerError> {
    fs::create_dir_all(&self.base_path)
      .await
      .map_err(LedgerError::CreateDir)?;

    let path = self.ledger_path();
    let temp_path = self.base_path.join(format!("{LEDGER_FILENAME}.tmp"));

    let content = serde_json::to_string_pretty(document).map_err(LedgerError::Serialize)?;
    fs::write(&temp_path, &content).await.map_err(LedgerError::Write)?;
    fs::rename(&temp_path, &path).await.map_err(LedgerError::Write)?;

    Ok(())
  }
}

#[async_trait]
impl LedgerStore for FileLedgerStore {
  async fn find_by_name_prefix(&self, prefix: &str) -> Result<Vec<LedgerEntry>, LedgerError> {
    let document = self.load().await?;
    Ok(document.entries.into_iter().filter(|e| e.id.starts_with(prefix)).collect())
  }

  async fn append(&self, entry: LedgerEntry) -> Result<(), LedgerError> {
    let _guard = self.write_lock.lock().await;

    let mut document = self.load().await?;
    document.entries.push(entry);
    self.save(&document).await
  }
}
