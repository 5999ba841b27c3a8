use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{Value, json};
use std::fs;
use tempfile::TempDir;

fn worklog(data: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("worklog").unwrap();
    cmd.env_remove("WORKLOG_DATA_DIR")
        .env("RUST_LOG", "off")
        .arg("--data-dir")
        .arg(data.path());
    cmd
}

fn stdout_json(cmd: &mut Command) -> Value {
    let output = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).unwrap()
}

#[test]
fn test_help_lists_commands() {
    Command::cargo_bin("worklog")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("track"))
        .stdout(predicate::str::contains("sessions"))
        .stdout(predicate::str::contains("store"));
}

#[test]
fn test_store_read_seeds_default() {
    let data = TempDir::new().unwrap();
    let value = stdout_json(worklog(&data).args(["store", "read", "clients", "--default", "[]"]));
    assert_eq!(value, json!([]));
    assert!(data.path().join("clients.json").exists());
}

#[test]
fn test_store_write_then_read() {
    let data = TempDir::new().unwrap();
    worklog(&data)
        .args(["store", "write", "clients"])
        .write_stdin(r#"[{"id": "c1", "name": "Acme"}]"#)
        .assert()
        .success();

    let value = stdout_json(worklog(&data).args(["store", "read", "clients"]));
    assert_eq!(value, json!([{"id": "c1", "name": "Acme"}]));
}

#[test]
fn test_store_write_rejects_bad_json() {
    let data = TempDir::new().unwrap();
    worklog(&data)
        .args(["store", "write", "clients"])
        .write_stdin("{nope")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not valid JSON"));
    assert!(!data.path().join("clients.json").exists());
}

#[test]
fn test_store_rejects_path_like_keys() {
    let data = TempDir::new().unwrap();
    worklog(&data)
        .args(["store", "write", "../escape"])
        .write_stdin("[]")
        .assert()
        .failure();
    assert!(!data.path().parent().unwrap().join("escape.json").exists());
}

#[test]
fn test_store_keys() {
    let data = TempDir::new().unwrap();
    for key in ["projects", "clients"] {
        worklog(&data)
            .args(["store", "write", key])
            .write_stdin("[]")
            .assert()
            .success();
    }
    worklog(&data)
        .args(["store", "keys"])
        .assert()
        .success()
        .stdout(predicate::str::contains("clients\n"))
        .stdout(predicate::str::contains("projects\n"));
}

#[test]
fn test_export_import_into_fresh_store() {
    let source = TempDir::new().unwrap();
    worklog(&source)
        .args(["store", "write", "invoices"])
        .write_stdin(r#"[{"id": "i1", "total": 120}]"#)
        .assert()
        .success();

    let bundle_dir = TempDir::new().unwrap();
    let bundle = bundle_dir.path().join("backup.json");
    worklog(&source)
        .args(["store", "export", "--output"])
        .arg(&bundle)
        .assert()
        .success();

    let exported: Value = serde_json::from_str(&fs::read_to_string(&bundle).unwrap()).unwrap();
    assert_eq!(exported["invoices"], json!([{"id": "i1", "total": 120}]));

    let target = TempDir::new().unwrap();
    worklog(&target)
        .args(["store", "import"])
        .arg(&bundle)
        .assert()
        .success();

    let value = stdout_json(worklog(&target).args(["store", "read", "invoices"]));
    assert_eq!(value, json!([{"id": "i1", "total": 120}]));
}

#[test]
fn test_import_rejects_non_object() {
    let data = TempDir::new().unwrap();
    worklog(&data)
        .args(["store", "import", "-"])
        .write_stdin("[1, 2, 3]")
        .assert()
        .failure()
        .stderr(predicate::str::contains("JSON object"));
}

#[test]
fn test_manual_session_then_list() {
    let data = TempDir::new().unwrap();
    let saved = stdout_json(worklog(&data).args([
        "manual",
        "--project",
        "p1",
        "--start",
        "2024-01-01T10:00:00Z",
        "--end",
        "2024-01-01T11:30:00Z",
    ]));
    assert_eq!(saved["projectId"], "p1");
    assert_eq!(saved["status"], "completed");
    assert_eq!(saved["duration"], json!(5400.0));
    assert_eq!(saved["logs"], json!([]));

    let listed = stdout_json(worklog(&data).args(["sessions", "--project", "p1", "--json"]));
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["id"], saved["id"]);

    let other = stdout_json(worklog(&data).args(["sessions", "--project", "p2", "--json"]));
    assert_eq!(other, json!([]));

    worklog(&data)
        .args(["sessions", "--project", "p1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Total: 1:30:00"));
}

#[test]
fn test_listing_sessions_leaves_settings_alone() {
    let data = TempDir::new().unwrap();
    let listed = stdout_json(worklog(&data).args(["sessions", "--project", "p1", "--json"]));
    assert_eq!(listed, json!([]));
    assert!(!data.path().join("settings.json").exists());
}

#[test]
fn test_manual_session_end_before_start() {
    let data = TempDir::new().unwrap();
    worklog(&data)
        .args([
            "manual",
            "--project",
            "p1",
            "--start",
            "2024-01-01T11:00:00Z",
            "--end",
            "2024-01-01T10:00:00Z",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("before"));

    let listed = stdout_json(worklog(&data).args(["sessions", "--project", "p1", "--json"]));
    assert_eq!(listed, json!([]));
}

#[test]
fn test_track_missing_directory_fails() {
    let data = TempDir::new().unwrap();
    worklog(&data)
        .args(["track", "--project", "p1"])
        .arg(data.path().join("does-not-exist"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to start tracking"));
}

#[test]
fn test_mirror_status_and_fetch_without_config() {
    let data = TempDir::new().unwrap();
    let status = stdout_json(worklog(&data).args(["mirror", "status"]));
    assert_eq!(status, json!({"configured": false}));

    worklog(&data)
        .args(["mirror", "fetch", "clients"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not configured"));
}
