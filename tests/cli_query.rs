use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn markdir(store: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("markdir");
    cmd.env_remove("MARKDIR_SERVER_URL")
        .env_remove("MARKDIR_STORE")
        .arg("--store")
        .arg(store);
    cmd
}

/// Import a small fixed collection and return the store path.
fn seeded_store(root: &Path) -> std::path::PathBuf {
    let store = root.join("bookmarks");
    let import = root.join("seed.json");
    fs::write(
        &import,
        r#"[
            {"url": "http://one.com", "title": "One", "tags": ["rust"],
             "created": "2020-01-01T09:00:00Z", "visit_count": 1},
            {"url": "https://docs.five.com/guide", "title": "Five", "tags": ["rust", "docs"],
             "created": "2021-06-15T18:30:00Z", "visit_count": 5},
            {"url": "http://ten.com", "title": "Ten",
             "created": "2021-03-01T00:00:00Z", "visit_count": 10},
            {"url": "http://never.com", "title": "Never"}
        ]"#,
    )
    .expect("write seed");

    markdir(&store).arg("import").arg(&import).assert().success();
    store
}

fn query_urls(store: &Path, query: &[&str]) -> Vec<String> {
    let assert = markdir(store)
        .arg("query")
        .args(query)
        .args(["--format", "json"])
        .assert()
        .success();
    let value: Value =
        serde_json::from_slice(&assert.get_output().stdout).expect("valid query json");
    value["bookmarks"]
        .as_array()
        .expect("bookmarks array")
        .iter()
        .map(|b| b["url"].as_str().expect("url").to_string())
        .collect()
}

#[test]
fn cli_query_sorts_and_limits() {
    let tmp = tempdir().expect("tempdir");
    let store = seeded_store(tmp.path());

    assert_eq!(
        query_urls(&store, &["by:most-visited", "limit:2"]),
        ["http://ten.com", "https://docs.five.com/guide"]
    );
    assert_eq!(
        query_urls(&store, &["by:least-visited"]),
        [
            "http://never.com",
            "http://one.com",
            "https://docs.five.com/guide",
            "http://ten.com"
        ]
    );
}

#[test]
fn cli_query_filters_by_date_tag_and_site() {
    let tmp = tempdir().expect("tempdir");
    let store = seeded_store(tmp.path());

    assert_eq!(
        query_urls(&store, &["created:>=2021/01/01", "created:<2022/01/01", "by:url"]),
        ["http://ten.com", "https://docs.five.com/guide"]
    );
    assert_eq!(
        query_urls(&store, &["created:2021/06/15"]),
        ["https://docs.five.com/guide"]
    );
    assert_eq!(
        query_urls(&store, &["docs"]),
        ["https://docs.five.com/guide"]
    );
    assert_eq!(
        query_urls(&store, &["site:five.com"]),
        ["https://docs.five.com/guide"]
    );
    assert_eq!(
        query_urls(&store, &["is:untagged", "by:title"]),
        ["http://never.com", "http://ten.com"]
    );
    assert!(query_urls(&store, &["visit-count:>100"]).is_empty());
}

#[test]
fn cli_query_keeps_a_quoted_relative_date_as_one_term() {
    let tmp = tempdir().expect("tempdir");
    let store = seeded_store(tmp.path());

    assert_eq!(
        query_urls(&store, &["created:<3 days ago", "by:url"]),
        ["http://one.com", "http://ten.com", "https://docs.five.com/guide"]
    );
}

#[test]
fn cli_query_json_carries_version_and_terms() {
    let tmp = tempdir().expect("tempdir");
    let store = seeded_store(tmp.path());

    let assert = markdir(&store)
        .args(["query", "tagged:rust", "--format", "json"])
        .assert()
        .success();
    let value: Value = serde_json::from_slice(&assert.get_output().stdout).expect("json");

    assert_eq!(value["version"], "1.0.0");
    assert_eq!(value["total"], 2);
    assert_eq!(
        value["terms"],
        serde_json::json!([{"action": "tagged", "arg": "rust"}])
    );
}

#[test]
fn cli_query_text_and_table_formats() {
    let tmp = tempdir().expect("tempdir");
    let store = seeded_store(tmp.path());

    markdir(&store)
        .args(["query", "tagged:rust", "by:url"])
        .assert()
        .success()
        .stdout(predicate::str::contains("http://one.com  One  [rust]"));

    markdir(&store)
        .args(["query", "by:most-visited", "--format", "table"])
        .assert()
        .success()
        .stdout(predicate::str::contains("URL"))
        .stdout(predicate::str::contains("VISITS"))
        .stdout(predicate::str::contains("2021-03-01"));
}

#[test]
fn cli_query_reports_compile_errors() {
    let tmp = tempdir().expect("tempdir");
    let store = seeded_store(tmp.path());

    markdir(&store)
        .args(["query", "starred:yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid query action 'starred'"));

    markdir(&store)
        .args(["query", "created:>=someday"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unable to convert 'someday' to a date"));

    markdir(&store)
        .args(["query", "by:random"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid sort order 'random'"));
}

#[test]
fn cli_schema_version_prints_query_result_version() {
    cargo_bin_cmd!("markdir")
        .arg("--schema-version")
        .assert()
        .success()
        .stdout(predicate::str::contains("1.0.0"));
}
