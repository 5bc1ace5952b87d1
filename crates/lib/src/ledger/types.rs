use std::io;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::version::VersionTag;

/// Prefix shared by every ledger entry id.
pub const ENTRY_ID_PREFIX: &str = "versioned-index-log";

/// Current on-disk ledger format version.
pub const LEDGER_FORMAT_VERSION: u32 = 1;

/// Id prefix covering every entry recorded for `unit_name`.
///
/// A prefix scan with this value can also match names that contain `/` after
/// `unit_name`, so callers must still filter on the exact name.
pub fn entry_prefix(unit_name: &str) -> String {
  format!("{ENTRY_ID_PREFIX}/{unit_name}/")
}

/// One successful application of a unit at a version. Never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
  pub id: String,
  pub unit_name: String,
  pub version: VersionTag,
  /// Unix timestamp (seconds) of the successful build.
  pub applied_at: u64,
}

impl LedgerEntry {
  pub fn new(unit_name: &str, version: VersionTag) -> Self {
    let applied_at = SystemTime::now()
      .duration_since(UNIX_EPOCH)
      .unwrap_or_default()
      .as_secs();
    Self {
      id: format!("{}{}", entry_prefix(unit_name), version),
      unit_name: unit_name.to_string(),
      version,
      applied_at,
    }
  }
}

/// On-disk ledger document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerDocument {
  pub version: u32,
  pub entries: Vec<LedgerEntry>,
}

impl LedgerDocument {
  pub fn new() -> Self {
    Self {
      version: LEDGER_FORMAT_VERSION,
      entries: Vec::new(),
    }
  }
}

#[derive(Debug, Error)]
pub enum LedgerError {
  #[error("failed to create ledger directory: {0}")]
  CreateDir(#[source] io::Error),

  #[error("failed to read ledger: {0}")]
  Read(#[source] io::Error),

  #[error("failed to write ledger: {0}")]
  Write(#[source] io::Error),

  #[error("failed to parse ledger: {0}")]
  Parse(#[source] serde_json::Error),

  #[error("failed to serialize ledger: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("unsupported ledger format version {0} (expected {LEDGER_FORMAT_VERSION})")]
  UnsupportedVersion(u32),

  /// Failure reported by a custom [`LedgerStore`](super::LedgerStore) backend.
  #[error("ledger backend error: {0}")]
  Backend(String),
}
