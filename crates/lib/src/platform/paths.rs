use crate::consts::{APP_NAME, LEDGER_DIR_ENV};
use std::path::PathBuf;

/// Returns the user's home directory
#[cfg(windows)]
pub fn home_dir() -> Option<PathBuf> {
  std::env::var_os("USERPROFILE").map(PathBuf::from)
}

/// Returns the user's home directory
#[cfg(not(windows))]
pub fn home_dir() -> Option<PathBuf> {
  std::env::var_os("HOME").map(PathBuf::from)
}

/// Returns the directory for data files for the application
#[cfg(windows)]
pub fn data_dir() -> PathBuf {
  let appdata = std::env::var_os("APPDATA")
    .map(PathBuf::from)
    .or_else(|| home_dir().map(|home| home.join("AppData").join("Roaming")))
    .unwrap_or_else(std::env::temp_dir);
  appdata.join(APP_NAME)
}

/// Returns the directory for data files for the application
#[cfg(not(windows))]
pub fn data_dir() -> PathBuf {
  let data_home = std::env::var_os("XDG_DATA_HOME")
    .filter(|v| !v.is_empty())
    .map(PathBuf::from)
    .or_else(|| home_dir().map(|home| home.join(".local").join("share")))
    .unwrap_or_else(std::env::temp_dir);
  data_home.join(APP_NAME)
}

/// Root directory for version ledgers.
///
/// `INDEXGATE_LEDGER_DIR` wins when set, otherwise `<data_dir>/ledger`.
pub fn ledger_dir() -> PathBuf {
  match std::env::var_os(LEDGER_DIR_ENV) {
    Some(dir) if !dir.is_empty() => PathBuf::from(dir),
    _ => data_dir().join("ledger"),
  }
}

/// Directory name for one target's ledger under [`ledger_dir`].
///
/// The scheme and any trailing slash are dropped, and every character outside
/// `[A-Za-z0-9.-]` becomes `_`, so `http://db.local:8080/` maps to
/// `db.local_8080`.
pub fn target_slug(target: &str) -> String {
  let trimmed = target.trim().trim_end_matches('/');
  let without_scheme = trimmed.split_once("://").map_or(trimmed, |(_, rest)| rest);

  let slug: String = without_scheme
    .chars()
    .map(|c| {
      if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
        c
      } else {
        '_'
      }
    })
    .collect();

  if slug.is_empty() { "_".to_string() } else { slug }
}
