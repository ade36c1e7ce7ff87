//! `sync --once` followed by `jobs status` over the same state directory.

use codesync_testkit::fixtures::fixture_path;
use serde_json::Value;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

type TestResult = Result<(), Box<dyn Error>>;

struct StateDir(PathBuf);

impl StateDir {
    fn new() -> Self {
        Self(std::env::temp_dir().join(format!("codesync-e2e-{}", uuid::Uuid::new_v4())))
    }

    fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for StateDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

fn codesync(state: &StateDir, args: &[&str]) -> std::io::Result<Output> {
    Command::new(env!("CARGO_BIN_EXE_codesync"))
        .args(args)
        .arg("--state")
        .arg(state.path())
        .arg("--config")
        .arg(fixture_path("config/codesync.valid.json"))
        .env_remove("CODESYNC_CONFIG")
        .env_remove("CODESYNC_GCP_ACCESS_TOKEN")
        .env("ACME_GITHUB_TOKEN", "ghp_e2e_sync_token")
        .output()
}

fn sync_once(state: &StateDir) -> Result<Value, Box<dyn Error>> {
    let candidates = fixture_path("candidates/acme.json").display().to_string();
    let output = codesync(
        state,
        &["sync", "--once", "--candidates", &candidates, "--output", "json"],
    )?;
    assert_eq!(
        output.status.code(),
        Some(0),
        "{}",
        String::from_utf8_lossy(&output.stdout)
    );
    Ok(serde_json::from_slice(&output.stdout)?)
}

fn jobs_of_kind<'a>(value: &'a Value, kind: &str) -> Vec<&'a Value> {
    value["report"]["jobs"]
        .as_array()
        .map(|jobs| jobs.iter().filter(|job| job["kind"] == kind).collect())
        .unwrap_or_default()
}

#[test]
fn sync_once_syncs_connections_then_indexes_repos() -> TestResult {
    let state = StateDir::new();
    let value = sync_once(&state)?;

    assert_eq!(value["status"], "ok");
    let syncs = jobs_of_kind(&value, "connectionSync");
    assert_eq!(syncs.len(), 2);
    assert!(syncs.iter().all(|job| job["status"] == "COMPLETED"));

    let indexes = jobs_of_kind(&value, "repoIndex");
    assert_eq!(indexes.len(), 2);
    assert!(indexes.iter().all(|job| job["status"] == "COMPLETED"));

    assert!(state.path().join("jobs.json").is_file());
    assert!(state.path().join("catalog.json").is_file());
    assert!(state.path().join("manifests").is_dir());
    Ok(())
}

#[test]
fn a_second_run_schedules_nothing_new() -> TestResult {
    let state = StateDir::new();
    sync_once(&state)?;
    let value = sync_once(&state)?;

    assert_eq!(value["ticks"]["scheduled"], 0);
    assert_eq!(value["ticks"]["dispatched"], 0);
    assert_eq!(jobs_of_kind(&value, "connectionSync").len(), 2);
    Ok(())
}

#[test]
fn jobs_status_reports_entity_state() -> TestResult {
    let state = StateDir::new();
    sync_once(&state)?;

    let output = codesync(
        &state,
        &["jobs", "status", "--entity", "acme-github", "--output", "json"],
    )?;
    assert_eq!(output.status.code(), Some(0));
    let value: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(value["entity"]["entity"]["kind"], "connection");
    assert_eq!(value["entity"]["isActive"], false);
    assert_eq!(value["entity"]["latestStatus"], "COMPLETED");
    assert_eq!(value["counts"]["connectionSync"]["completed"], 1);
    Ok(())
}

#[test]
fn jobs_status_filters_by_kind_in_text_and_ndjson() -> TestResult {
    let state = StateDir::new();
    sync_once(&state)?;

    let text = codesync(&state, &["jobs", "status", "--kind", "index"])?;
    assert_eq!(text.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&text.stdout);
    assert!(stdout.contains("jobs: 2\n"));
    assert!(stdout.contains("  repoIndex: pending=0 inProgress=0 completed=2 failed=0\n"));

    let ndjson = codesync(&state, &["jobs", "status", "--kind", "index", "--output", "ndjson"])?;
    let lines: Vec<Value> = String::from_utf8_lossy(&ndjson.stdout)
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[2]["type"], "summary");
    assert_eq!(lines[2]["total"], 2);
    Ok(())
}

#[test]
fn unknown_job_ids_exit_with_invalid_input() -> TestResult {
    let state = StateDir::new();
    let output = codesync(&state, &["jobs", "status", "--job-id", "job-404", "--output", "json"])?;
    assert_eq!(output.status.code(), Some(2));

    let value: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(value["error"]["code"], "jobs:job_not_found");
    Ok(())
}
