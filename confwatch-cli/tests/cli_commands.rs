use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::path::Path;
use std::process::Command;
use std::thread::{self, JoinHandle};

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn confwatch_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("confwatch"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env_remove("CONFWATCH_SERVER")
        .env("NO_COLOR", "1");
    cmd
}

/// Serve `responses` in order, one per connection, returning the request lines.
fn serve(responses: Vec<(u16, &'static str)>) -> (String, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    let handle = thread::spawn(move || {
        let mut seen = Vec::new();
        for (status, body) in responses {
            let (stream, _) = listener.accept().expect("accept");
            let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
            let mut request_line = String::new();
            reader.read_line(&mut request_line).expect("request line");

            let mut content_length = 0usize;
            loop {
                let mut header = String::new();
                reader.read_line(&mut header).expect("header");
                let header = header.trim_end();
                if header.is_empty() {
                    break;
                }
                if let Some((name, value)) = header.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().expect("content-length");
                    }
                }
            }
            let mut raw_body = vec![0u8; content_length];
            reader.read_exact(&mut raw_body).expect("body");

            let mut stream = stream;
            let response = format!(
                "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).expect("write response");
            stream.flush().expect("flush");
            seen.push(request_line.trim_end().to_string());
        }
        seen
    });
    (format!("http://{addr}"), handle)
}

#[test]
fn help_lists_subcommands() {
    let home = TempDir::new().expect("home");
    confwatch_cmd(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("namespace"))
        .stdout(contains("config"))
        .stdout(contains("groups"))
        .stdout(contains("data-ids"))
        .stdout(contains("watch"))
        .stdout(contains("daemon"));
}

#[test]
fn config_get_prints_content() {
    let home = TempDir::new().expect("home");
    let (server, requests) = serve(vec![(
        200,
        r#"{"dataId":"D","group":"G","tenant":"t1","content":"k=v1","type":"text"}"#,
    )]);

    confwatch_cmd(home.path())
        .args(["--server", &server, "config", "get", "-n", "t1", "-g", "G", "-d", "D"])
        .assert()
        .success()
        .stdout(contains("k=v1"));

    let requests = requests.join().expect("server");
    assert!(requests[0].contains("tenant=t1"));
    assert!(requests[0].contains("dataId=D"));
}

#[test]
fn registry_error_body_reaches_the_user() {
    let home = TempDir::new().expect("home");
    let (server, requests) = serve(vec![(500, "caused: no datasource available")]);

    confwatch_cmd(home.path())
        .args(["--server", &server, "config", "get", "-g", "G", "-d", "D"])
        .assert()
        .failure()
        .stderr(contains("failed to fetch public/G/D"))
        .stderr(contains("no datasource available"));
    requests.join().expect("server");
}

#[test]
fn unreachable_server_fails_with_context() {
    let home = TempDir::new().expect("home");
    let closed = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = closed.local_addr().expect("addr");
    drop(closed);

    confwatch_cmd(home.path())
        .args(["--server", &format!("http://{addr}"), "namespace", "list"])
        .assert()
        .failure()
        .stderr(contains("failed to list namespaces"));
}

#[test]
fn server_can_come_from_environment() {
    let home = TempDir::new().expect("home");
    let (server, requests) = serve(vec![(
        200,
        r#"{"code":200,"data":[{"namespace":"","namespaceShowName":"public","quota":200,"configCount":3},{"namespace":"t1","namespaceShowName":"orders","quota":200,"configCount":1}]}"#,
    )]);

    confwatch_cmd(home.path())
        .env("CONFWATCH_SERVER", &server)
        .args(["namespace", "list"])
        .assert()
        .success()
        .stdout(contains("orders"))
        .stdout(contains("t1"));

    let requests = requests.join().expect("server");
    assert!(requests[0].starts_with("GET /nacos/v1/console/namespaces"));
}

#[test]
fn groups_are_aggregated_across_pages() {
    let home = TempDir::new().expect("home");
    let (server, requests) = serve(vec![
        (
            200,
            r#"{"totalCount":3,"pageNumber":1,"pagesAvailable":2,"pageItems":[{"dataId":"a","group":"orders"},{"dataId":"b","group":"billing"}]}"#,
        ),
        (
            200,
            r#"{"totalCount":3,"pageNumber":2,"pagesAvailable":2,"pageItems":[{"dataId":"c","group":"orders"}]}"#,
        ),
    ]);

    let assert = confwatch_cmd(home.path())
        .args(["--server", &server, "groups", "-n", "t1", "--json"])
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8");
    let groups: Vec<String> = serde_json::from_str(&stdout).expect("json array");
    assert_eq!(groups, ["billing", "orders"]);

    let requests = requests.join().expect("server");
    assert!(requests[0].contains("pageNo=1"));
    assert!(requests[1].contains("pageNo=2"));
}

#[test]
fn publish_with_create_namespace_creates_then_publishes() {
    let home = TempDir::new().expect("home");
    let (server, requests) = serve(vec![
        (200, r#"{"code":200,"data":[{"namespace":"","namespaceShowName":"public"}]}"#),
        (200, "true"),
        (200, "true"),
    ]);

    confwatch_cmd(home.path())
        .args([
            "--server",
            &server,
            "config",
            "publish",
            "-n",
            "t1",
            "-g",
            "G",
            "-d",
            "D",
            "k=v1",
            "--create-namespace",
        ])
        .assert()
        .success()
        .stdout(contains("created namespace 't1'"))
        .stdout(contains("published t1/G/D"));

    let requests = requests.join().expect("server");
    assert!(requests[0].starts_with("GET /nacos/v1/console/namespaces"));
    assert!(requests[1].starts_with("POST /nacos/v1/console/namespaces"));
    assert!(requests[2].starts_with("POST /nacos/v1/cs/configs"));
}

#[test]
fn watch_rejects_malformed_key() {
    let home = TempDir::new().expect("home");
    confwatch_cmd(home.path())
        .args(["watch", "just-a-data-id"])
        .assert()
        .failure()
        .stderr(contains("invalid key"));
}

#[test]
fn daemon_status_reports_not_running() {
    let home = TempDir::new().expect("home");
    confwatch_cmd(home.path())
        .args(["daemon", "status"])
        .assert()
        .success()
        .stdout(contains("\"running\": false"));
}

#[test]
fn daemon_stop_without_daemon_is_not_an_error() {
    let home = TempDir::new().expect("home");
    confwatch_cmd(home.path())
        .args(["daemon", "stop"])
        .assert()
        .success()
        .stdout(contains("daemon is not running"));
}

#[test]
fn malformed_settings_file_is_reported() {
    let home = TempDir::new().expect("home");
    let dir = home.path().join(".confwatch");
    std::fs::create_dir_all(&dir).expect("dir");
    std::fs::write(dir.join("config.yaml"), "poll_interval_secs: [not a number\n")
        .expect("write settings");

    confwatch_cmd(home.path())
        .args(["groups"])
        .assert()
        .failure()
        .stderr(contains("config.yaml").and(contains("failed to load")));
}
