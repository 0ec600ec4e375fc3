use assert_cmd::cargo::{cargo_bin_cmd, CommandCargoExt};
use predicates::prelude::*;
use reqwest::blocking::Client;
use serde_json::{json, Value};
use std::net::TcpListener;
use std::path::Path;
use std::process::{Child, Command};
use std::thread;
use std::time::Duration;
use tempfile::{tempdir, TempDir};

struct TestDaemon {
    base_url: String,
    child: Child,
    _store_dir: TempDir,
}

impl TestDaemon {
    fn spawn() -> Self {
        // Bind an ephemeral port first so we know which port to pass
        // to `markdir serve`.
        let listener =
            TcpListener::bind("127.0.0.1:0").expect("bind ephemeral TCP listener for daemon");
        let port = listener
            .local_addr()
            .expect("local_addr for daemon listener")
            .port();
        drop(listener);

        let addr_arg = format!("127.0.0.1:{port}");
        let base_url = format!("http://{addr_arg}");

        let store_dir = tempdir().expect("tempdir");
        let store = store_dir.path().join("bookmarks");

        // Capture daemon output for debugging failed runs.
        let log_dir = std::env::temp_dir();
        let stdout_file =
            std::fs::File::create(log_dir.join(format!("markdir_daemon_{port}_stdout.log")))
                .expect("create daemon stdout log file");
        let stderr_file =
            std::fs::File::create(log_dir.join(format!("markdir_daemon_{port}_stderr.log")))
                .expect("create daemon stderr log file");

        let mut cmd = Command::cargo_bin("markdir").expect("locate markdir binary");
        cmd.env_remove("MARKDIR_SERVER_URL")
            .arg("--store")
            .arg(&store)
            .args(["serve", "--addr", &addr_arg])
            .stdout(stdout_file)
            .stderr(stderr_file);
        let child = cmd.spawn().expect("spawn markdir serve daemon");

        wait_for_health(&base_url);

        Self {
            base_url,
            child,
            _store_dir: store_dir,
        }
    }
}

impl Drop for TestDaemon {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn wait_for_health(base_url: &str) {
    let client = Client::new();
    let url = format!("{base_url}/v1/health");

    let mut last_err = None;
    for _ in 0..150 {
        match client.get(&url).send() {
            Ok(resp) if resp.status().is_success() => return,
            Ok(resp) => last_err = Some(format!("unexpected status: {}", resp.status())),
            Err(e) => last_err = Some(format!("HTTP error: {e}")),
        }
        thread::sleep(Duration::from_millis(100));
    }

    panic!(
        "markdir HTTP daemon did not become healthy in time. Last error: {}",
        last_err.unwrap_or_else(|| "unknown".to_string())
    );
}

fn local_store_cmd(store: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("markdir");
    cmd.env_remove("MARKDIR_SERVER_URL").arg("--store").arg(store);
    cmd
}

#[test]
fn cli_serve_health_endpoint_reports_ok_status() {
    let daemon = TestDaemon::spawn();
    let resp = Client::new()
        .get(format!("{}/v1/health", daemon.base_url))
        .send()
        .expect("health response");
    assert!(resp.status().is_success());

    let value: Value = resp.json().expect("valid health JSON body");
    assert_eq!(value["status"], "ok");
}

#[test]
fn cli_add_and_query_via_server() {
    let daemon = TestDaemon::spawn();
    let unused = tempdir().expect("tempdir");
    let unused_store = unused.path().join("unused");

    local_store_cmd(&unused_store)
        .args(["add", "a.com", "--tag", "rust", "--server", &daemon.base_url])
        .assert()
        .success();
    local_store_cmd(&unused_store)
        .args(["add", "b.com", "--server", &daemon.base_url])
        .assert()
        .success();
    assert!(
        !unused_store.exists(),
        "delegated writes must not touch the local store"
    );

    let assert = local_store_cmd(&unused_store)
        .args([
            "query",
            "tagged:rust",
            "--format",
            "json",
            "--server",
            &daemon.base_url,
        ])
        .assert()
        .success();
    let value: Value = serde_json::from_slice(&assert.get_output().stdout).expect("json");
    assert_eq!(value["total"], 1);
    assert_eq!(value["bookmarks"][0]["url"], "http://a.com");
}

#[test]
fn http_bookmark_lifecycle() {
    let daemon = TestDaemon::spawn();
    let client = Client::new();
    let bookmark_url = format!("{}/v1/bookmark", daemon.base_url);

    let added: Value = client
        .post(&bookmark_url)
        .json(&json!({"url": "http://old.com", "title": "Old"}))
        .send()
        .expect("add")
        .json()
        .expect("added json");
    assert!(added["created"].is_string());

    let replaced = client
        .put(&bookmark_url)
        .json(&json!({
            "replacing": "http://old.com",
            "bookmark": {"url": "http://new.com", "title": "New"}
        }))
        .send()
        .expect("replace");
    assert!(replaced.status().is_success());

    let missing = client
        .get(&bookmark_url)
        .query(&[("url", "http://old.com")])
        .send()
        .expect("get old");
    assert_eq!(missing.status().as_u16(), 404);

    let visited: Value = client
        .post(format!("{}/v1/bookmark/visit", daemon.base_url))
        .query(&[("url", "http://new.com")])
        .send()
        .expect("visit")
        .json()
        .expect("visited json");
    assert_eq!(visited["visit_count"], 1);

    let removed = client
        .delete(&bookmark_url)
        .query(&[("url", "http://new.com")])
        .send()
        .expect("delete");
    assert!(removed.status().is_success());
}

#[test]
fn http_import_then_query_terms() {
    let daemon = TestDaemon::spawn();
    let client = Client::new();

    let summary: Value = client
        .post(format!("{}/v1/import", daemon.base_url))
        .json(&json!([
            {"url": "http://v1.com", "visit_count": 1},
            {"url": "http://v5.com", "visit_count": 5},
            {"url": "http://v10.com", "visit_count": 10}
        ]))
        .send()
        .expect("import")
        .json()
        .expect("summary json");
    assert_eq!(summary["added"], 3);

    let result: Value = client
        .post(format!("{}/v1/query", daemon.base_url))
        .json(&json!({"terms": [
            {"action": "by", "arg": "most-visited"},
            {"action": "limit", "arg": "2"}
        ]}))
        .send()
        .expect("query")
        .json()
        .expect("result json");
    let urls: Vec<_> = result["bookmarks"]
        .as_array()
        .expect("bookmarks")
        .iter()
        .map(|b| b["url"].as_str().expect("url").to_string())
        .collect();
    assert_eq!(urls, ["http://v10.com", "http://v5.com"]);
}

#[test]
fn cli_query_via_server_surfaces_http_errors() {
    let daemon = TestDaemon::spawn();
    let unused = tempdir().expect("tempdir");

    local_store_cmd(&unused.path().join("unused"))
        .args(["query", "by:random", "--server", &daemon.base_url])
        .assert()
        .failure()
        .stderr(predicate::str::contains("server returned 400 Bad Request"))
        .stderr(predicate::str::contains("invalid sort order 'random'"));
}
