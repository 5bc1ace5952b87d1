//! Shared test helpers for CLI integration tests.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Get path to a fixture file.
pub fn fixture_path(name: &str) -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    .join("tests")
    .join("fixtures")
    .join(name)
}

/// Isolated test environment.
///
/// Each test gets its own temporary directory holding definitions and the
/// ledger root.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  pub fn new() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  /// Copy fixtures into a fresh definitions directory, replacing any
  /// previous content.
  pub fn with_definitions(&self, fixtures: &[&str]) -> PathBuf {
    let dir = self.definitions_path();
    if dir.exists() {
      std::fs::remove_dir_all(&dir).unwrap();
    }
    std::fs::create_dir_all(&dir).unwrap();
    for name in fixtures {
      std::fs::copy(fixture_path(name), dir.join(name)).unwrap();
    }
    dir
  }

  pub fn definitions_path(&self) -> PathBuf {
    self.temp.path().join("definitions")
  }

  /// Ledger root (isolated per test).
  pub fn ledger_path(&self) -> PathBuf {
    self.temp.path().join("ledger")
  }

  /// Ledger document written for `server`.
  pub fn ledger_file(&self, server: &mockito::Server) -> PathBuf {
    let slug = server.host_with_port().replace(':', "_");
    self.ledger_path().join(slug).join("ledger.json")
  }

  /// Get a Command for the indexgate binary with an isolated ledger root.
  pub fn cmd(&self) -> Command {
    let mut cmd = cargo_bin_cmd!("indexgate");
    cmd.env("INDEXGATE_LEDGER_DIR", self.ledger_path());
    cmd.env_remove("RUST_LOG");
    cmd
  }

  /// `indexgate build` against `target` using the current definitions.
  pub fn build(&self, target: &str) -> Command {
    let mut cmd = self.cmd();
    cmd
      .arg("build")
      .arg("-c")
      .arg(target)
      .arg("-d")
      .arg(self.definitions_path());
    cmd
  }
}

/// Number of entries in a ledger document.
pub fn ledger_entry_count(path: &Path) -> usize {
  let content = std::fs::read_to_string(path).unwrap();
  let json: serde_json::Value = serde_json::from_str(&content).unwrap();
  json["entries"].as_array().map(Vec::len).unwrap_or(0)
}
