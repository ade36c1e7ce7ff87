//! `plan` command against the candidates fixture.

use codesync_testkit::fixtures::fixture_path;
use serde_json::Value;
use std::error::Error;
use std::process::{Command, Output};

type TestResult = Result<(), Box<dyn Error>>;

const TOKEN: &str = "ghp_e2e_plan_token";

fn plan(connection: &str, token: Option<&str>, output: &str) -> std::io::Result<Output> {
    let mut command = Command::new(env!("CARGO_BIN_EXE_codesync"));
    command
        .args(["plan", "--connection", connection, "--output", output, "--config"])
        .arg(fixture_path("config/codesync.valid.json"))
        .arg("--candidates")
        .arg(fixture_path("candidates/acme.json"))
        .env_remove("CODESYNC_CONFIG")
        .env_remove("CODESYNC_GCP_ACCESS_TOKEN");
    match token {
        Some(token) => command.env("ACME_GITHUB_TOKEN", token),
        None => command.env_remove("ACME_GITHUB_TOKEN"),
    };
    command.output()
}

#[test]
fn plan_applies_exclusions_and_revision_globs() -> TestResult {
    let output = plan("acme-github", Some(TOKEN), "json")?;
    assert_eq!(output.status.code(), Some(0));

    let value: Value = serde_json::from_slice(&output.stdout)?;
    let entries = value["plan"]["entries"].as_array().cloned().unwrap_or_default();
    assert_eq!(entries.len(), 1, "forks and legacy-* are excluded, duplicates dropped");

    let api = &entries[0];
    assert_eq!(api["identity"], "github.com/acme/api");
    assert_eq!(api["revisions"]["branches"][0], "main");
    assert_eq!(
        api["revisions"]["branches"],
        serde_json::json!(["main", "release/1.0", "release/2.0"])
    );
    assert_eq!(api["revisions"]["tags"], serde_json::json!(["v1.0.0", "v2.0.0"]));
    assert_eq!(
        value["plan"]["warnings"][0]["kind"],
        "duplicateRepoInConnection"
    );
    Ok(())
}

#[test]
fn plan_output_never_contains_the_token() -> TestResult {
    for format in ["text", "json", "ndjson"] {
        let output = plan("acme-github", Some(TOKEN), format)?;
        assert_eq!(output.status.code(), Some(0));
        assert!(!String::from_utf8_lossy(&output.stdout).contains(TOKEN));
        assert!(!String::from_utf8_lossy(&output.stderr).contains(TOKEN));
    }
    Ok(())
}

#[test]
fn connections_without_credentials_plan_anonymously() -> TestResult {
    let output = plan("tools-mirror", None, "text")?;
    assert_eq!(output.status.code(), Some(0));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("connection: tools-mirror (git)\n"));
    assert!(stdout.contains("repos: 1\n"));
    assert!(!stdout.contains("(authenticated)"));
    Ok(())
}

#[test]
fn missing_secret_fails_the_plan() -> TestResult {
    let output = plan("acme-github", None, "json")?;
    assert_eq!(output.status.code(), Some(2));

    let value: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(value["error"]["code"], "secret:secret_not_found");
    Ok(())
}

#[test]
fn unknown_connections_are_not_found() -> TestResult {
    let output = plan("nope", Some(TOKEN), "json")?;
    assert_eq!(output.status.code(), Some(2));

    let value: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(value["error"]["code"], "core:not_found");
    assert_eq!(value["error"]["meta"]["connection"], "nope");
    Ok(())
}
