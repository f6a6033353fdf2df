//! End-to-end CLI tests for the course-offline binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const COURSE_JSON: &str = r#"{
  "id": 1,
  "title": "Intro to Rust",
  "modules": [
    {"id": 10, "title": "Ownership", "position": 0},
    {"id": 11, "title": "Borrowing", "position": 1}
  ],
  "resources": [
    {"id": 100, "module_id": 10, "title": "Slides", "url": "https://cdn.example.com/s.pdf"}
  ]
}"#;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("course.json"), COURSE_JSON).unwrap();
        Self { dir }
    }

    /// Command isolated from the user's config and database.
    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("course-offline").unwrap();
        cmd.current_dir(self.dir.path())
            .env("XDG_CONFIG_HOME", self.dir.path().join("config"))
            .env_remove("RUST_LOG")
            .arg("--database")
            .arg(self.dir.path().join("offline.db"));
        cmd
    }

    fn course(&self) -> std::path::PathBuf {
        self.dir.path().join("course.json")
    }
}

#[test]
fn test_binary_help_displays_usage() {
    let mut cmd = Command::cargo_bin("course-offline").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Offline course cache"));
}

#[test]
fn test_binary_version_displays_version() {
    let mut cmd = Command::cargo_bin("course-offline").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("course-offline"));
}

#[test]
fn test_binary_without_subcommand_fails() {
    let mut cmd = Command::cargo_bin("course-offline").unwrap();
    cmd.assert().failure().stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_download_then_status_reports_completed() {
    let ws = Workspace::new();

    ws.cmd()
        .args(["download", "--tick-ms", "1", "--step", "50", "--course"])
        .arg(ws.course())
        .assert()
        .success()
        .stdout(predicate::str::contains("course 1 is available offline"));

    ws.cmd()
        .args(["status", "--course-id", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("course 1: completed (100%)"));

    ws.cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Intro to Rust"));
}

#[test]
fn test_status_of_unknown_module_is_idle() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["status", "--course-id", "1", "--module", "10"])
        .assert()
        .success()
        .stdout(predicate::str::contains("module 10 of course 1: idle (0%)"));
}

#[test]
fn test_download_unknown_resource_fails() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["download", "--resource", "999", "--course"])
        .arg(ws.course())
        .assert()
        .failure()
        .stderr(predicate::str::contains("resource 999 is not part of course 1"));
}

#[test]
fn test_complete_module_prints_fraction() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["complete-module", "--module", "11", "--course"])
        .arg(ws.course())
        .assert()
        .success()
        .stdout(predicate::str::contains("1/2 modules completed (50%)"));
}

#[test]
fn test_sync_without_endpoint_suggests_flag() {
    let ws = Workspace::new();
    ws.cmd()
        .arg("sync")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No sync endpoint configured"));
}

#[test]
fn test_invalid_config_file_is_reported() {
    let ws = Workspace::new();
    let config_dir = ws.dir.path().join("config").join("course-offline");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(config_dir.join("config.toml"), "progress_step = 0\n").unwrap();

    ws.cmd()
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("progress_step"));
}
