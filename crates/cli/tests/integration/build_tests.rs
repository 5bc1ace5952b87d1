//! Build command integration tests.

use mockito::Matcher;
use predicates::prelude::*;

use super::common::{TestEnv, ledger_entry_count};

fn put_any(server: &mut mockito::Server, hits: usize) -> mockito::Mock {
  server
    .mock("PUT", Matcher::Regex("^/indexes/".to_string()))
    .with_status(201)
    .expect(hits)
    .create()
}

#[test]
fn build_puts_definitions_and_records_versions() {
  let env = TestEnv::new();
  env.with_definitions(&["orders_v1.json", "blog.json"]);
  let mut server = mockito::Server::new();
  let orders = server
    .mock("PUT", "/indexes/Orders%2FByCustomer")
    .match_body(Matcher::PartialJson(serde_json::json!({
      "fields": { "Customer": { "indexing": "exact" } }
    })))
    .with_status(201)
    .create();
  let blog = server
    .mock("PUT", Matcher::Regex("^/indexes/BlogPosts".to_string()))
    .with_status(201)
    .expect(2)
    .create();

  env
    .build(&server.url())
    .assert()
    .success()
    .stdout(predicate::str::contains("Orders/ByCustomer 01.00.00"))
    .stdout(predicate::str::contains("Build complete"));

  orders.assert();
  blog.assert();
  // The unversioned search index is never recorded.
  assert_eq!(ledger_entry_count(&env.ledger_file(&server)), 2);
}

#[test]
fn rerun_skips_recorded_versions() {
  let env = TestEnv::new();
  env.with_definitions(&["orders_v1.json"]);
  let mut server = mockito::Server::new();
  let put = put_any(&mut server, 1);

  env.build(&server.url()).assert().success();
  env
    .build(&server.url())
    .assert()
    .success()
    .stdout(predicate::str::contains("version check failed"));

  put.assert();
  assert_eq!(ledger_entry_count(&env.ledger_file(&server)), 1);
}

#[test]
fn upgrade_then_downgrade() {
  let env = TestEnv::new();
  let mut server = mockito::Server::new();
  let put = put_any(&mut server, 2);

  env.with_definitions(&["orders_v1.json"]);
  env.build(&server.url()).assert().success();

  env.with_definitions(&["orders_v1_1.json"]);
  env
    .build(&server.url())
    .assert()
    .success()
    .stdout(predicate::str::contains("01.01.00 [").and(predicate::str::contains("created")));

  env.with_definitions(&["orders_v1.json"]);
  env
    .build(&server.url())
    .assert()
    .success()
    .stdout(predicate::str::contains("version check failed"));

  put.assert();
  assert_eq!(ledger_entry_count(&env.ledger_file(&server)), 2);
}

#[test]
fn failed_unit_exits_non_zero_and_is_not_recorded() {
  let env = TestEnv::new();
  env.with_definitions(&["orders_v1.json"]);
  let mut server = mockito::Server::new();
  let _put = server
    .mock("PUT", Matcher::Any)
    .with_status(400)
    .with_body("map does not compile")
    .create();

  env
    .build(&server.url())
    .assert()
    .failure()
    .stdout(predicate::str::contains("HTTP 400"))
    .stderr(predicate::str::contains("1 unit(s) failed"));

  assert!(!env.ledger_file(&server).exists());
}

#[test]
fn sequential_stops_at_first_failure() {
  let env = TestEnv::new();
  env.with_definitions(&["blog.json"]);
  let mut server = mockito::Server::new();
  let _author = server
    .mock("PUT", "/indexes/BlogPosts%2FByAuthor")
    .with_status(500)
    .create();
  let search = server
    .mock("PUT", "/indexes/BlogPosts%2FSearch")
    .with_status(201)
    .expect(0)
    .create();

  env.build(&server.url()).arg("--sequential").assert().failure();
  search.assert();
}

#[test]
fn continue_on_failure_attempts_every_unit() {
  let env = TestEnv::new();
  env.with_definitions(&["blog.json"]);
  let mut server = mockito::Server::new();
  let _author = server
    .mock("PUT", "/indexes/BlogPosts%2FByAuthor")
    .with_status(500)
    .create();
  let search = server
    .mock("PUT", "/indexes/BlogPosts%2FSearch")
    .with_status(201)
    .expect(1)
    .create();

  env
    .build(&server.url())
    .args(["-s", "-f"])
    .assert()
    .failure()
    .stdout(predicate::str::contains("BlogPosts/Search [").and(predicate::str::contains("created")));
  search.assert();
}

#[test]
fn json_report_lists_outcomes_in_discovery_order() {
  let env = TestEnv::new();
  env.with_definitions(&["blog.json", "orders_v1.json"]);
  let mut server = mockito::Server::new();
  let _put = put_any(&mut server, 3);

  let output = env.build(&server.url()).arg("--json").output().unwrap();
  assert!(output.status.success());

  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  let names: Vec<_> = json["targets"][0]["report"]["outcomes"]
    .as_array()
    .unwrap()
    .iter()
    .map(|o| o["unit_name"].as_str().unwrap().to_string())
    .collect();
  assert_eq!(names, vec!["BlogPosts/ByAuthor", "BlogPosts/Search", "Orders/ByCustomer"]);
}
