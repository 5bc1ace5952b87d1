//! Drop, start/stop and check integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn drop_deletes_on_target() {
  let env = TestEnv::new();
  let mut server = mockito::Server::new();
  let delete = server
    .mock("DELETE", "/indexes/Orders%2FByCustomer")
    .with_status(204)
    .create();

  env
    .cmd()
    .args(["drop", "Orders/ByCustomer", "-c"])
    .arg(server.url())
    .assert()
    .success()
    .stdout(predicate::str::contains("deleted"));

  delete.assert();
}

#[test]
fn drop_failure_exits_non_zero() {
  let env = TestEnv::new();
  let mut server = mockito::Server::new();
  let _delete = server
    .mock("DELETE", "/indexes/Missing")
    .with_status(404)
    .with_body("index not found")
    .create();

  env
    .cmd()
    .args(["drop", "Missing", "-c"])
    .arg(server.url())
    .assert()
    .failure()
    .stdout(predicate::str::contains("HTTP 404"));
}

#[test]
fn start_and_stop_post_admin_routes() {
  let env = TestEnv::new();
  let mut server = mockito::Server::new();
  let start = server.mock("POST", "/admin/startindexing").with_status(200).create();
  let stop = server.mock("POST", "/admin/stopindexing").with_status(200).create();

  env
    .cmd()
    .args(["stop", "-c"])
    .arg(server.url())
    .assert()
    .success()
    .stdout(predicate::str::contains("StopIndexing"));
  env
    .cmd()
    .args(["start", "-c"])
    .arg(server.url())
    .assert()
    .success()
    .stdout(predicate::str::contains("StartIndexing"));

  start.assert();
  stop.assert();
}

#[test]
fn check_reports_unreachable_targets() {
  let env = TestEnv::new();
  let mut server = mockito::Server::new();
  let _ping = server.mock("GET", "/build/version").with_status(200).create();

  env
    .cmd()
    .args(["check", "-c"])
    .arg(server.url())
    .args(["-c", "http://127.0.0.1:9"])
    .assert()
    .failure()
    .stdout(predicate::str::contains("reachable"))
    .stderr(predicate::str::contains("1 of 2 target(s) unreachable"));
}
