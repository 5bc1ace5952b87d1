//! Implementation of the `indexgate history` command.
//!
//! Lists recorded ledger entries for every target ledger under the ledger
//! root, optionally narrowed to one target and one unit.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;

use indexgate_lib::job::recorded_ledgers;
use indexgate_lib::ledger::LedgerEntry;
use indexgate_lib::platform::paths;

use super::runtime;
use crate::output::{format_timestamp, print_info, print_json};

#[derive(Debug, Serialize)]
struct TargetHistory {
  target: String,
  entries: Vec<LedgerEntry>,
}

pub fn cmd_history(name: Option<&str>, target: Option<&str>, ledger_dir: Option<PathBuf>, json: bool) -> Result<()> {
  let root = ledger_dir.unwrap_or_else(paths::ledger_dir);
  let wanted = target.map(paths::target_slug);

  let ledgers = recorded_ledgers(&root).with_context(|| format!("Failed to list ledgers in {}", root.display()))?;

  let rt = runtime()?;
  let mut histories = Vec::new();
  for (slug, ledger) in ledgers {
    if wanted.as_ref().is_some_and(|w| *w != slug) {
      continue;
    }
    let entries = match name {
      Some(name) => rt.block_on(ledger.history(name)),
      None => rt.block_on(ledger.entries()),
    }
    .with_context(|| format!("Failed to read ledger for {slug}"))?;

    if !entries.is_empty() {
      histories.push(TargetHistory { target: slug, entries });
    }
  }

  if json {
    return print_json(&histories);
  }

  if histories.is_empty() {
    print_info(&format!("No ledger entries found in {}", root.display()));
    return Ok(());
  }

  for history in &histories {
    print_info(&history.target);
    for entry in &history.entries {
      println!(
        "    {} {}  {}",
        entry.unit_name,
        entry.version,
        format_timestamp(entry.applied_at)
      );
    }
  }

  Ok(())
}
