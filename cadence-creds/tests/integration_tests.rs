//! Integration tests for cadence-creds CLI

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Helper to create a test environment with isolated config and data directories
struct TestEnv {
    _temp_dir: TempDir,
    config_path: PathBuf,
}

impl TestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("data")
            .join("cadence.db")
            .to_string_lossy()
            .replace('\\', "\\\\");

        let config_path = temp_dir.path().join("config.toml");
        fs::write(
            &config_path,
            format!("[database]\npath = \"{}\"\n\n[defaults]\nuser_id = \"alice\"\n", db_path),
        )
        .unwrap();

        Self {
            _temp_dir: temp_dir,
            config_path,
        }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("cadence-creds").unwrap();
        cmd.env("CADENCE_CONFIG", &self.config_path)
            .env_remove("CADENCE_DB_PATH");
        cmd
    }
}

#[test]
fn test_list_with_no_credentials() {
    let env = TestEnv::new();

    env.cmd()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("Credentials for user 'alice'"))
        .stdout(predicate::str::contains("✗ threads: not configured"))
        .stdout(predicate::str::contains("✗ linkedin: not configured"))
        .stdout(predicate::str::contains("✗ instagram: not configured"))
        .stdout(predicate::str::contains("cadence-creds set <platform>"));
}

#[test]
fn test_set_linkedin_from_stdin() {
    let env = TestEnv::new();

    env.cmd()
        .args(["set", "linkedin", "--stdin"])
        .write_stdin("linkedin-secret-token-1234\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ Stored linkedin credentials for user 'alice'"));

    env.cmd()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ linkedin: token ****1234"))
        .stdout(predicate::str::contains("linkedin-secret-token").not());
}

#[test]
fn test_set_threads_requires_account_id() {
    let env = TestEnv::new();

    env.cmd()
        .args(["set", "threads", "--stdin"])
        .write_stdin("token")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("--account-id"));
}

#[test]
fn test_set_threads_with_account_id() {
    let env = TestEnv::new();

    env.cmd()
        .args(["set", "threads", "--account-id", "app-77", "--stdin"])
        .write_stdin("threads-token-abcdef")
        .assert()
        .success();

    env.cmd()
        .args(["list", "--platform", "threads"])
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ threads: account app-77, token ****cdef"))
        .stdout(predicate::str::contains("linkedin").not());
}

#[test]
fn test_set_rejects_empty_token() {
    let env = TestEnv::new();

    env.cmd()
        .args(["set", "linkedin", "--stdin"])
        .write_stdin("   \n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be empty"));
}

#[test]
fn test_set_rejects_unknown_platform() {
    let env = TestEnv::new();

    env.cmd()
        .args(["set", "mastodon", "--stdin"])
        .write_stdin("token")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Unknown platform 'mastodon'"));
}

#[test]
fn test_overwrite_requires_force_when_non_interactive() {
    let env = TestEnv::new();

    env.cmd()
        .args(["set", "linkedin", "--stdin"])
        .write_stdin("first-token-0001")
        .assert()
        .success();

    env.cmd()
        .args(["set", "linkedin", "--stdin"])
        .write_stdin("second-token-0002")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Refusing to overwrite"));

    env.cmd()
        .args(["set", "linkedin", "--stdin", "--force"])
        .write_stdin("second-token-0002")
        .assert()
        .success();

    env.cmd()
        .arg("list")
        .assert()
        .stdout(predicate::str::contains("token ****0002"));
}

#[test]
fn test_delete_credentials() {
    let env = TestEnv::new();

    env.cmd()
        .args(["set", "instagram", "--account-id", "ig-1", "--stdin"])
        .write_stdin("instagram-token-9999")
        .assert()
        .success();

    env.cmd()
        .args(["delete", "instagram", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ Deleted instagram credentials"));

    env.cmd()
        .arg("list")
        .assert()
        .stdout(predicate::str::contains("✗ instagram: not configured"));
}

#[test]
fn test_delete_missing_credentials_is_noop() {
    let env = TestEnv::new();

    env.cmd()
        .args(["delete", "threads", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No threads credentials found"));
}

#[test]
fn test_user_flag_isolates_credentials() {
    let env = TestEnv::new();

    env.cmd()
        .args(["set", "linkedin", "--stdin", "--user", "bob"])
        .write_stdin("bob-token-5678")
        .assert()
        .success();

    env.cmd()
        .arg("list")
        .assert()
        .stdout(predicate::str::contains("✗ linkedin: not configured"));

    env.cmd()
        .args(["list", "--user", "bob"])
        .assert()
        .stdout(predicate::str::contains("✓ linkedin: token ****5678"));
}
