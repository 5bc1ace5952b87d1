//! CLI output formatting utilities.
//!
//! Provides consistent formatting for terminal output including colored status
//! messages, per-unit outcome lines, durations, and Unicode symbols.

use std::time::{Duration, UNIX_EPOCH};

use anyhow::Context;
use indexgate_lib::orchestrate::{BuildOutcome, BuildStatus, ReportSummary};
use owo_colors::{OwoColorize, Stream};

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  pub const SKIP: &str = "=";
  pub const REMOVE: &str = "-";
}

pub fn format_duration(duration: Duration) -> String {
  let secs = duration.as_secs();
  let millis = duration.subsec_millis();

  if secs >= 60 {
    let mins = secs / 60;
    let remaining_secs = secs % 60;
    format!("{}m {}s", mins, remaining_secs)
  } else if secs > 0 {
    format!("{}.{:02}s", secs, millis / 10)
  } else {
    format!("{}ms", millis)
  }
}

/// RFC 3339 timestamp for a unix time in seconds.
pub fn format_timestamp(unix_secs: u64) -> String {
  humantime::format_rfc3339_seconds(UNIX_EPOCH + Duration::from_secs(unix_secs)).to_string()
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

/// One line per outcome: symbol, name, version, target and any detail.
pub fn print_outcome(outcome: &BuildOutcome) {
  let symbol = match outcome.status {
    BuildStatus::Created => symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()).to_string(),
    BuildStatus::Deleted => symbols::REMOVE.if_supports_color(Stream::Stdout, |s| s.green()).to_string(),
    BuildStatus::Failed => symbols::ERROR.if_supports_color(Stream::Stdout, |s| s.red()).to_string(),
    BuildStatus::Cancelled => symbols::WARNING.if_supports_color(Stream::Stdout, |s| s.yellow()).to_string(),
    BuildStatus::VersionCheckFailed => symbols::SKIP.if_supports_color(Stream::Stdout, |s| s.dimmed()).to_string(),
  };

  let version = outcome
    .version
    .map(|v| format!(" {v}"))
    .unwrap_or_default();

  let mut line = format!(
    "{} {}{} {} {}",
    symbol,
    outcome.unit_name,
    version,
    format!("[{}]", outcome.connection).if_supports_color(Stream::Stdout, |s| s.dimmed()),
    outcome.status
  );
  if let Some(detail) = &outcome.detail {
    line.push_str(&format!(": {detail}"));
  }
  println!("{line}");
}

pub fn print_summary(summary: &ReportSummary, elapsed: Duration) {
  println!();
  print_stat("Units", &summary.total.to_string());
  print_stat("Created", &summary.created.to_string());
  print_stat("Skipped", &summary.version_check_failed.to_string());
  print_stat("Failed", &summary.failed.to_string());
  if summary.cancelled > 0 {
    print_stat("Cancelled", &summary.cancelled.to_string());
  }
  print_stat("Elapsed", &format_duration(elapsed));
}
