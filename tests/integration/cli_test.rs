//! CLI tests against the built binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

use crate::helpers::anr_log;

/// Command with HOME pointed at `home` and no inherited overrides.
fn logsift(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("logsift").unwrap();
    cmd.env("HOME", home)
        .env_remove("LOGSIFT_LOG")
        .env_remove("MAX_TOKENS_PER_REQUEST")
        .env_remove("RATE_LIMIT_TOKENS_PER_MINUTE")
        .env_remove("RATE_LIMIT_TOKENS_PER_SEGMENT")
        .env_remove("OVERLAP_SIZE")
        .env_remove("PARALLEL_SEGMENTS")
        .env_remove("RETRY_DELAY")
        .env_remove("MAX_RETRIES")
        .env_remove("CACHE_MAX_SIZE")
        .env_remove("CACHE_MAX_AGE_HOURS");
    cmd
}

fn write_config(home: &Path, contents: &str) {
    let dir = home.join(".config").join("logsift");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("config.toml"), contents).unwrap();
}

#[test]
fn help_lists_subcommands() {
    let home = TempDir::new().unwrap();
    logsift(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("analyze"))
        .stdout(predicate::str::contains("segment"))
        .stdout(predicate::str::contains("estimate"));
}

#[test]
fn estimate_prints_token_count() {
    let home = TempDir::new().unwrap();
    let log = home.path().join("traces.txt");
    fs::write(&log, anr_log(5)).unwrap();

    logsift(home.path())
        .arg("estimate")
        .arg(&log)
        .assert()
        .success()
        .stdout(predicate::str::contains("Estimated tokens:"))
        .stdout(predicate::str::contains("Fits in one request"));
}

#[test]
fn estimate_missing_file_fails() {
    let home = TempDir::new().unwrap();
    logsift(home.path())
        .args(["estimate", "/no/such/log.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("File not found"));
}

#[test]
fn segment_prints_plan() {
    let home = TempDir::new().unwrap();
    let log = home.path().join("anr.txt");
    fs::write(&log, anr_log(200)).unwrap();

    logsift(home.path())
        .arg("segment")
        .arg(&log)
        .args(["--max-tokens", "800", "--overlap", "100"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(anr)"))
        .stdout(predicate::str::contains("[  1/"))
        .stdout(predicate::str::contains("cut: block"));
}

#[test]
fn segment_respects_env_overlap_override() {
    let home = TempDir::new().unwrap();
    let log = home.path().join("anr.txt");
    fs::write(&log, anr_log(200)).unwrap();

    logsift(home.path())
        .env("OVERLAP_SIZE", "0")
        .arg("segment")
        .arg(&log)
        .args(["--max-tokens", "800"])
        .assert()
        .success()
        .stdout(predicate::str::contains("context: 0 chars"))
        .stdout(predicate::str::contains("context: 1").not());
}

#[test]
fn config_init_then_show() {
    let home = TempDir::new().unwrap();
    logsift(home.path())
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote default configuration"));
    assert!(home.path().join(".config/logsift/config.toml").exists());

    logsift(home.path())
        .env("PARALLEL_SEGMENTS", "4")
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[orchestrator]"))
        .stdout(predicate::str::contains("parallel_segments = 4"));
}

#[test]
fn invalid_config_is_reported() {
    let home = TempDir::new().unwrap();
    write_config(home.path(), "[orchestrator]\nparallel_segments = 0\n");

    logsift(home.path())
        .args(["config", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("parallel_segments"));
}

#[test]
fn analyze_with_missing_service_command_fails() {
    let home = TempDir::new().unwrap();
    write_config(
        home.path(),
        "[service]\ncommand = \"logsift-test-client-that-does-not-exist\"\n",
    );
    let log = home.path().join("anr.txt");
    fs::write(&log, anr_log(3)).unwrap();

    logsift(home.path())
        .arg("analyze")
        .arg(&log)
        .arg("--quiet")
        .assert()
        .failure()
        .stderr(predicate::str::contains("is not installed"));
}

#[cfg(unix)]
#[test]
fn analyze_runs_through_a_process_service() {
    // `cat` echoes the prompt back, which is enough for a heuristic report
    let home = TempDir::new().unwrap();
    write_config(home.path(), "[service]\ncommand = \"cat\"\nargs = []\n");
    let log = home.path().join("anr.txt");
    fs::write(&log, anr_log(3)).unwrap();

    logsift(home.path())
        .arg("analyze")
        .arg(&log)
        .arg("--quiet")
        .assert()
        .success()
        .stdout(predicate::str::contains("# Triage report: Android ANR trace"))
        .stdout(predicate::str::contains("status: success"))
        .stdout(predicate::str::contains("Segments processed: 1"));
}

#[test]
fn completions_are_generated() {
    let home = TempDir::new().unwrap();
    logsift(home.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("logsift"));
}
