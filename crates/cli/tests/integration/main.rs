//! CLI integration tests against a mocked remote store.

mod admin_tests;
mod build_tests;
mod common;
mod history_tests;
