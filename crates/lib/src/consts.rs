/// Application name, used for platform directories.
pub const APP_NAME: &str = "indexgate";

/// Environment variable overriding the ledger directory.
pub const LEDGER_DIR_ENV: &str = "INDEXGATE_LEDGER_DIR";

/// Target name reported for the embedded in-memory store.
pub const EMBEDDED_TARGET: &str = "embedded";
