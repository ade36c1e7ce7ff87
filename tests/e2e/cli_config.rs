//! `config` and `connection` commands.

use codesync_testkit::fixtures::fixture_path;
use serde_json::Value;
use std::error::Error;
use std::process::{Command, Output};

type TestResult = Result<(), Box<dyn Error>>;

fn codesync(args: &[&str]) -> std::io::Result<Output> {
    Command::new(env!("CARGO_BIN_EXE_codesync"))
        .args(args)
        .env_remove("CODESYNC_CONFIG")
        .env_remove("CODESYNC_LOG")
        .output()
}

fn fixture(relative: &str) -> String {
    fixture_path(relative).display().to_string()
}

fn json_stdout(output: &Output) -> Result<Value, serde_json::Error> {
    serde_json::from_slice(&output.stdout)
}

#[test]
fn valid_config_validates_cleanly() -> TestResult {
    let config = fixture("config/codesync.valid.json");
    let output = codesync(&["config", "validate", "--config", &config, "--output", "json"])?;
    assert_eq!(output.status.code(), Some(0));

    let value = json_stdout(&output)?;
    assert_eq!(value["status"], "ok");
    assert_eq!(value["valid"], 2);
    assert_eq!(value["rejected"], 0);
    assert_eq!(value["connections"][0]["name"], "acme-github");
    assert_eq!(value["connections"][0]["codeHost"], "github");
    Ok(())
}

#[test]
fn toml_config_validates_cleanly() -> TestResult {
    let config = fixture("config/codesync.valid.toml");
    let output = codesync(&["config", "validate", "--config", &config])?;
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("status: ok\n"));
    Ok(())
}

#[test]
fn rejected_connections_are_listed_and_fail_validation() -> TestResult {
    let config = fixture("config/codesync.rejected-connection.json");
    let output = codesync(&["config", "validate", "--config", &config, "--output", "json"])?;
    assert_eq!(output.status.code(), Some(2));

    let value = json_stdout(&output)?;
    assert_eq!(value["status"], "invalid");
    let connections = value["connections"].as_array().cloned().unwrap_or_default();
    let typo = connections
        .iter()
        .find(|connection| connection["name"] == "typo")
        .cloned()
        .unwrap_or(Value::Null);
    assert_eq!(typo["error"]["kind"], "UnknownConnectionType");
    assert!(
        connections
            .iter()
            .any(|connection| connection["name"] == "good" && connection["error"].is_null())
    );
    Ok(())
}

#[test]
fn out_of_range_settings_reject_the_whole_file() -> TestResult {
    let config = fixture("config/codesync.invalid-setting.json");
    let output = codesync(&["config", "validate", "--config", &config, "--output", "json"])?;
    assert_eq!(output.status.code(), Some(2));

    let value = json_stdout(&output)?;
    assert_eq!(value["status"], "error");
    assert_eq!(value["error"]["kind"], "expected");
    Ok(())
}

#[test]
fn config_path_falls_back_to_the_environment() -> TestResult {
    let output = Command::new(env!("CARGO_BIN_EXE_codesync"))
        .args(["config", "validate"])
        .env("CODESYNC_CONFIG", fixture("config/codesync.valid.json"))
        .output()?;
    assert_eq!(output.status.code(), Some(0));
    Ok(())
}

#[test]
fn show_renders_defaults_as_toml() -> TestResult {
    let config = fixture("config/codesync.valid.json");
    let output = codesync(&["config", "show", "--config", &config, "--format", "toml"])?;
    assert_eq!(output.status.code(), Some(0));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("status: ok\nconfig:\n"));
    assert!(stdout.contains("version = 1"));
    Ok(())
}

#[test]
fn show_json_is_deterministic() -> TestResult {
    let config = fixture("config/codesync.valid.json");
    let first = codesync(&["config", "show", "--config", &config, "--output", "json"])?;
    let second = codesync(&["config", "show", "--config", &config, "--output", "json"])?;
    assert_eq!(first.stdout, second.stdout);

    let value = json_stdout(&first)?;
    assert_eq!(
        value["effectiveConfig"]["settings"]["repoGarbageCollectionGracePeriodMs"],
        60000
    );
    Ok(())
}

#[test]
fn connection_check_prints_the_defaulted_connection() -> TestResult {
    let path = fixture("connections/github.valid.json");
    let output = codesync(&["connection", "check", &path, "--output", "json"])?;
    assert_eq!(output.status.code(), Some(0));

    let value = json_stdout(&output)?;
    assert_eq!(value["codeHost"], "github");
    assert_eq!(value["connection"]["type"], "github");
    Ok(())
}

#[test]
fn connection_check_names_the_unexpected_field() -> TestResult {
    let path = fixture("connections/gerrit.unexpected-field.json");
    let output = codesync(&["connection", "check", &path, "--output", "ndjson"])?;
    assert_eq!(output.status.code(), Some(2));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 1);
    let value: Value = serde_json::from_str(stdout.trim())?;
    assert_eq!(value["type"], "error");
    assert_eq!(value["error"]["code"], "config:unexpected_field");
    Ok(())
}
