//! indexgate-lib: version-gated build orchestration
//!
//! This crate applies build units (index definitions) to a store, skipping
//! any unit whose declared version is not strictly newer than the highest
//! version already recorded for it:
//! - `VersionTag`: three-part version with strict lexicographic ordering
//! - `VersionLedger`: append-only record of successful applications
//! - `BuildOrchestrator`: parallel or sequential runs with cancellation
//! - `JobManager`: one invocation across several targets

pub mod consts;
pub mod discovery;
pub mod executor;
pub mod job;
pub mod ledger;
pub mod orchestrate;
pub mod platform;
pub mod unit;
pub mod version;
