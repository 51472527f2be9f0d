use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn reportsync(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("reportsync").expect("reportsync binary");
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env("RUST_LOG", "warn");
    cmd
}

/// Home with a config pointing at a filesystem store under `<home>/share`.
fn home_with_store() -> TempDir {
    let home = TempDir::new().unwrap();
    let root = home.path();
    fs::create_dir_all(root.join("share/data")).unwrap();
    fs::create_dir_all(root.join("share/generated")).unwrap();
    fs::create_dir_all(root.join(".reportsync")).unwrap();
    let config = format!(
        r#"remote:
  root: "{share}"
  data_folder: data
  output_folder: generated
local:
  work_dir: "{records}"
  artifact_dir: "{artifacts}"
download:
  max_attempts: 2
  base_delay_ms: 0
  poll_interval_ms: 0
  max_polls: 40
schema:
  required: ["patient.name"]
  structural: ["tumors[].name"]
  recommended: ["physician"]
"#,
        share = root.join("share").display(),
        records = root.join("records").display(),
        artifacts = root.join("artifacts").display(),
    );
    fs::write(root.join(".reportsync/config.yaml"), config).unwrap();
    home
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout is not JSON ({e}): {}",
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

#[test]
fn init_writes_config_once() {
    let home = TempDir::new().unwrap();

    reportsync(home.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote default config"));
    assert!(home.path().join(".reportsync/config.yaml").exists());

    reportsync(home.path()).arg("init").assert().failure();
    reportsync(home.path())
        .args(["init", "--force"])
        .assert()
        .success();
}

#[test]
fn sync_without_config_points_at_init() {
    let home = TempDir::new().unwrap();
    reportsync(home.path())
        .arg("sync")
        .assert()
        .failure()
        .stderr(predicate::str::contains("reportsync init"));
}

#[test]
fn sync_publishes_then_skips_unchanged_records() {
    let home = home_with_store();
    fs::write(
        home.path().join("share/data/alice.json"),
        r#"{"patient":{"name":"Alice"},"tumors":[{"name":"T1"}],"physician":"Dr. X"}"#,
    )
    .unwrap();

    let first = reportsync(home.path())
        .args(["sync", "--json"])
        .output()
        .unwrap();
    assert!(first.status.success(), "{}", String::from_utf8_lossy(&first.stderr));
    let summary = stdout_json(&first);
    assert_eq!(summary["downloaded"], 1);
    assert_eq!(summary["generated"], 1);
    assert!(home.path().join("share/generated/alice.html").exists());
    assert!(home.path().join("share/generated/alice.json").exists());

    let second = reportsync(home.path())
        .args(["sync", "--json"])
        .output()
        .unwrap();
    assert!(second.status.success());
    let summary = stdout_json(&second);
    assert_eq!(summary["skipped"], 1);
    assert_eq!(summary["downloaded"], 0);
}

#[test]
fn sync_exits_two_when_a_record_fails_validation() {
    let home = home_with_store();
    fs::write(
        home.path().join("share/data/bob.json"),
        r#"{"patient":{"age":40}}"#,
    )
    .unwrap();

    reportsync(home.path())
        .arg("sync")
        .assert()
        .code(2)
        .stdout(predicate::str::contains("bob.json"))
        .stdout(predicate::str::contains("validation"));
    assert!(!home.path().join("share/generated/bob.html").exists());
}

#[test]
fn dry_run_and_status_write_nothing() {
    let home = home_with_store();
    fs::write(
        home.path().join("share/data/carol.json"),
        r#"{"patient":{"name":"Carol"}}"#,
    )
    .unwrap();

    reportsync(home.path())
        .args(["sync", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[dry-run]"));

    let status = reportsync(home.path())
        .args(["status", "--json"])
        .output()
        .unwrap();
    assert!(status.status.success());
    let report = stdout_json(&status);
    assert_eq!(report["summary"]["download"], 1);
    assert_eq!(report["records"][0]["name"], "carol.json");
    assert_eq!(report["records"][0]["decision"]["decision"], "download");

    assert!(!home.path().join("records").exists());
    assert!(!home.path().join("share/generated/carol.html").exists());
}

#[test]
fn validate_reports_each_file() {
    let home = home_with_store();
    let good = home.path().join("good.json");
    let bad = home.path().join("bad.json");
    let broken = home.path().join("broken.json");
    fs::write(&good, r#"{"patient":{"name":"Dana"},"physician":"Dr. Y"}"#).unwrap();
    fs::write(&bad, r#"{"patient":{"name":"Eve"},"tumors":[{"size":2}]}"#).unwrap();
    fs::write(&broken, "{not json").unwrap();

    reportsync(home.path())
        .arg("validate")
        .arg(&good)
        .assert()
        .success()
        .stdout(predicate::str::contains("good.json"));

    let output = reportsync(home.path())
        .args(["validate", "--json"])
        .arg(&good)
        .arg(&bad)
        .arg(&broken)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let outcomes = stdout_json(&output);
    assert_eq!(outcomes[0]["status"], "checked");
    assert_eq!(outcomes[0]["report"]["passed"], true);
    assert_eq!(outcomes[1]["report"]["passed"], false);
    assert_eq!(outcomes[2]["status"], "unreadable");
}

#[test]
fn watch_rejects_zero_interval() {
    let home = home_with_store();
    reportsync(home.path())
        .args(["watch", "--interval", "0"])
        .assert()
        .failure();
}
