//! CLI integration tests: environment handling and observability output.

use codesync_testkit::fixtures::fixture_path;
use std::error::Error;
use std::process::Command;

type TestResult = Result<(), Box<dyn Error>>;

const TOKEN: &str = "ghp_integration_token";

fn command_clean_env() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_codesync"));
    scrub_scoped_env(&mut command);
    command
}

fn scrub_scoped_env(command: &mut Command) {
    for (key, _) in std::env::vars() {
        if key.starts_with("CODESYNC_") {
            command.env_remove(key);
        }
    }
    command.env_remove("ACME_GITHUB_TOKEN");
}

fn temp_state_dir() -> std::path::PathBuf {
    std::env::temp_dir().join(format!("codesync-cli-{}", uuid::Uuid::new_v4()))
}

#[test]
fn invalid_env_overrides_are_reported() -> TestResult {
    let output = command_clean_env()
        .args(["config", "validate", "--output", "json", "--config"])
        .arg(fixture_path("config/codesync.valid.json"))
        .env("CODESYNC_MAX_REPO_INDEXING_JOB_CONCURRENCY", "many")
        .output()?;
    assert_eq!(output.status.code(), Some(2));

    let value: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(value["error"]["code"], "config:invalid_env_int");
    Ok(())
}

#[test]
fn env_overrides_show_up_in_the_effective_config() -> TestResult {
    let output = command_clean_env()
        .args(["config", "show", "--output", "json", "--config"])
        .arg(fixture_path("config/codesync.valid.json"))
        .env("CODESYNC_MAX_REPO_INDEXING_JOB_CONCURRENCY", "3")
        .output()?;
    assert_eq!(output.status.code(), Some(0));

    let value: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(
        value["effectiveConfig"]["settings"]["maxRepoIndexingJobConcurrency"],
        3
    );
    Ok(())
}

#[test]
fn json_mode_logs_json_events_to_stderr_without_secrets() -> TestResult {
    let state = temp_state_dir();
    let output = command_clean_env()
        .args(["sync", "--once", "--output", "json", "--no-progress", "--config"])
        .arg(fixture_path("config/codesync.valid.json"))
        .arg("--candidates")
        .arg(fixture_path("candidates/acme.json"))
        .arg("--state")
        .arg(&state)
        .env("CODESYNC_LOG", "info")
        .env("ACME_GITHUB_TOKEN", TOKEN)
        .output()?;
    let _ = std::fs::remove_dir_all(&state);
    assert_eq!(output.status.code(), Some(0));

    let stdout: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(stdout["status"], "ok");

    let stderr = String::from_utf8_lossy(&output.stderr);
    let events: Vec<serde_json::Value> = stderr
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;
    assert!(
        events
            .iter()
            .any(|event| event["fields"]["event"] == "jobs.sync.start")
    );
    assert!(!stderr.contains(TOKEN));
    Ok(())
}

#[test]
fn metrics_flag_emits_metric_lines() -> TestResult {
    let state = temp_state_dir();
    let output = command_clean_env()
        .args(["sync", "--once", "--metrics", "--no-progress", "--config"])
        .arg(fixture_path("config/codesync.valid.json"))
        .arg("--candidates")
        .arg(fixture_path("candidates/acme.json"))
        .arg("--state")
        .arg(&state)
        .env("ACME_GITHUB_TOKEN", TOKEN)
        .output()?;
    let _ = std::fs::remove_dir_all(&state);
    assert_eq!(output.status.code(), Some(0));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.lines().any(|line| line.contains("\"type\":\"metric\"")));
    Ok(())
}

#[test]
fn failed_syncs_are_recorded_not_fatal() -> TestResult {
    let state = temp_state_dir();
    let output = command_clean_env()
        .args(["sync", "--once", "--no-progress", "--config"])
        .arg(fixture_path("config/codesync.valid.json"))
        .arg("--candidates")
        .arg(fixture_path("candidates/acme.json"))
        .arg("--state")
        .arg(&state)
        .output()?;
    assert_eq!(output.status.code(), Some(0));

    let status = command_clean_env()
        .args(["jobs", "status", "--entity", "connection:acme-github", "--state"])
        .arg(&state)
        .output()?;
    let _ = std::fs::remove_dir_all(&state);
    let stdout = String::from_utf8_lossy(&status.stdout);
    assert!(stdout.contains("FAILED"));
    assert!(stdout.contains("error: SecretNotFound"));
    Ok(())
}
