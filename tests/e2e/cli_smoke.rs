//! `codesync` binary smoke tests.

use std::io;
use std::process::{Command, Output};

fn codesync(args: &[&str]) -> io::Result<Output> {
    Command::new(env!("CARGO_BIN_EXE_codesync"))
        .args(args)
        .env_remove("CODESYNC_CONFIG")
        .output()
}

#[test]
fn help_lists_every_command() -> io::Result<()> {
    let output = codesync(&["--help"])?;
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["config", "connection", "plan", "sync", "jobs"] {
        assert!(stdout.contains(command), "missing `{command}` in help");
    }
    Ok(())
}

#[test]
fn version_is_printed() -> io::Result<()> {
    let output = codesync(&["--version"])?;
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("codesync "));
    Ok(())
}

#[test]
fn unknown_subcommands_exit_with_usage_error() -> io::Result<()> {
    let output = codesync(&["reticulate"])?;
    assert_eq!(output.status.code(), Some(2));
    Ok(())
}

#[test]
fn config_without_a_file_is_an_io_error() -> io::Result<()> {
    let output = codesync(&["config", "validate", "--config", "/definitely/not/codesync.json"])?;
    assert_eq!(output.status.code(), Some(3));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("code: config:config_file_not_found"));
    Ok(())
}
