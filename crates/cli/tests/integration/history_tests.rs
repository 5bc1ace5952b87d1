//! History command integration tests.

use mockito::Matcher;
use predicates::prelude::*;

use super::common::TestEnv;

fn built_env(server: &mut mockito::Server) -> (TestEnv, mockito::Mock) {
  let env = TestEnv::new();
  let put = server
    .mock("PUT", Matcher::Regex("^/indexes/".to_string()))
    .with_status(201)
    .create();
  env.with_definitions(&["orders_v1.json", "blog.json"]);
  env.build(&server.url()).assert().success();
  (env, put)
}

#[test]
fn history_lists_recorded_entries() {
  let mut server = mockito::Server::new();
  let (env, _put) = built_env(&mut server);

  env
    .cmd()
    .arg("history")
    .assert()
    .success()
    .stdout(predicate::str::contains("Orders/ByCustomer 01.00.00"))
    .stdout(predicate::str::contains("BlogPosts/ByAuthor 02.00.01"))
    .stdout(predicate::str::contains("BlogPosts/Search").not());
}

#[test]
fn history_filters_by_name() {
  let mut server = mockito::Server::new();
  let (env, _put) = built_env(&mut server);

  let output = env
    .cmd()
    .args(["history", "BlogPosts/ByAuthor", "--json", "-c"])
    .arg(server.url())
    .output()
    .unwrap();
  assert!(output.status.success());

  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  let entries = json[0]["entries"].as_array().unwrap();
  assert_eq!(entries.len(), 1);
  assert_eq!(entries[0]["unit_name"], "BlogPosts/ByAuthor");
  assert_eq!(entries[0]["id"], "versioned-index-log/BlogPosts/ByAuthor/02.00.01");
}

#[test]
fn history_for_other_target_is_empty() {
  let mut server = mockito::Server::new();
  let (env, _put) = built_env(&mut server);

  env
    .cmd()
    .args(["history", "-c", "http://elsewhere.local"])
    .assert()
    .success()
    .stdout(predicate::str::contains("No ledger entries found"));
}
