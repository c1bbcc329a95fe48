//! CLI-level integration tests: invoke the `katmer` binary the way a user
//! would, on task/inventory files written to a temp directory.

use assert_cmd::Command;
use predicates::prelude::*;
use pretty_assertions::assert_eq;

fn write_temp(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

const SITE_YML: &str = r#"
tasks:
  - name: say hello
    targets: all
    debug:
      msg: "hello"
"#;

const INVENTORY_YML: &str = r#"
all:
  children:
    webservers:
      hosts:
        web1:
          connection: local
        web2:
          connection: local
    staging:
      hosts:
        web1:
"#;

#[test]
fn validate_accepts_a_well_formed_task_file() {
    let dir = tempfile::tempdir().unwrap();
    let site = write_temp(&dir, "site.yml", SITE_YML);

    Command::cargo_bin("katmer")
        .unwrap()
        .args(["validate", site.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("valid"));
}

#[test]
fn validate_rejects_a_task_with_two_module_keys() {
    let dir = tempfile::tempdir().unwrap();
    let bad = write_temp(
        &dir,
        "bad.yml",
        r#"
tasks:
  - command: "echo hi"
    shell: "echo bye"
"#,
    );

    Command::cargo_bin("katmer")
        .unwrap()
        .args(["validate", bad.to_str().unwrap()])
        .assert()
        .code(1);
}

#[test]
fn validate_reports_missing_task_file() {
    Command::cargo_bin("katmer")
        .unwrap()
        .args(["validate", "/nonexistent/site.yml"])
        .assert()
        .code(1);
}

#[test]
fn list_tasks_enumerates_every_task_with_its_module() {
    let dir = tempfile::tempdir().unwrap();
    let site = write_temp(&dir, "site.yml", SITE_YML);

    let output = Command::cargo_bin("katmer")
        .unwrap()
        .args(["list-tasks", site.to_str().unwrap()])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let stdout = String::from_utf8(output).unwrap();
    assert!(stdout.contains("say hello"));
    assert!(stdout.contains("debug"));
    assert!(stdout.contains("Total tasks: 1"));
}

#[test]
fn list_targets_resolves_a_pattern_against_the_inventory() {
    let dir = tempfile::tempdir().unwrap();
    let inventory = write_temp(&dir, "inventory.yml", INVENTORY_YML);

    let output = Command::cargo_bin("katmer")
        .unwrap()
        .args(["-i", inventory.to_str().unwrap(), "list-targets", "webservers:!staging"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let stdout = String::from_utf8(output).unwrap();
    assert!(stdout.contains("web2"));
    assert!(!stdout.contains("web1"));
}

#[test]
fn list_targets_without_inventory_flag_errors_cleanly() {
    Command::cargo_bin("katmer")
        .unwrap()
        .args(["list-targets", "all"])
        .env_remove("KATMER_INVENTORY")
        .assert()
        .code(1);
}

#[test]
fn version_flag_matches_manifest_version() {
    let expected = env!("CARGO_PKG_VERSION");
    Command::cargo_bin("katmer")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(expected));
    assert_eq!(expected, env!("CARGO_PKG_VERSION"));
}
