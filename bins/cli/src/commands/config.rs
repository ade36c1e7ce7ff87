//! `config validate` and `config show`.

use crate::error::{CliError, ExitCode};
use crate::{CliOutput, Invocation, format_error_output, format_success, log_info};
use codesync_infra::{
    ConfigRenderFormat, ConfigSummary, load_validated_config, render_effective_config,
    summarize_config,
};
use std::fmt::Write as _;

/// Validate the whole config. Rejected connections exit with `InvalidInput`
/// after the summary is printed.
pub fn run_config_validate(invocation: &Invocation<'_>) -> Result<CliOutput, CliError> {
    let mode = invocation.mode;
    let config = match load_validated_config(invocation.env, invocation.config_path) {
        Ok(config) => config,
        Err(error) => return Ok(format_error_output(mode, &error)),
    };
    let summary = summarize_config(&config);
    let (status, exit_code) = if summary.is_clean() {
        ("ok", ExitCode::Ok)
    } else {
        ("invalid", ExitCode::InvalidInput)
    };

    let mut stderr = String::new();
    log_info(&mut stderr, "config validate completed", mode.no_progress);

    let mut payload = serde_json::to_value(&summary)?;
    if let (Some(path), serde_json::Value::Object(map)) = (invocation.config_path, &mut payload) {
        map.insert(
            "configPath".to_string(),
            serde_json::Value::String(path.to_string_lossy().to_string()),
        );
    }
    let stdout = format_success(mode, "config", status, payload, || {
        format_summary_text(status, &summary)
    })?;

    Ok(CliOutput {
        stdout,
        stderr,
        exit_code,
    })
}

/// Print the effective config.
pub fn run_config_show(
    invocation: &Invocation<'_>,
    format: ConfigRenderFormat,
) -> Result<CliOutput, CliError> {
    let mode = invocation.mode;
    let loaded = load_validated_config(invocation.env, invocation.config_path)
        .and_then(|config| render_effective_config(&config, format).map(|text| (config, text)));
    let (config, rendered) = match loaded {
        Ok(loaded) => loaded,
        Err(error) => return Ok(format_error_output(mode, &error)),
    };

    let mut stderr = String::new();
    log_info(&mut stderr, "config show completed", mode.no_progress);

    let payload = serde_json::json!({
        "configPath": invocation.config_path.map(|path| path.to_string_lossy().to_string()),
        "effectiveConfig": config.effective(),
    });
    let stdout = format_success(mode, "config", "ok", payload, || {
        let mut out = String::from("status: ok\nconfig:\n");
        out.push_str(&rendered);
        out
    })?;

    Ok(CliOutput {
        stdout,
        stderr,
        exit_code: ExitCode::Ok,
    })
}

fn format_summary_text(status: &str, summary: &ConfigSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "status: {status}");
    let _ = writeln!(out, "version: {}", summary.version);
    let _ = writeln!(
        out,
        "connections: {} valid, {} rejected",
        summary.valid, summary.rejected
    );
    for connection in &summary.connections {
        match (&connection.error, connection.code_host) {
            (Some(issue), _) => {
                let _ = write!(out, "  {}: rejected {} ({})", connection.name, issue.kind, issue.code);
                if let Some(field) = issue.field.as_deref() {
                    let _ = write!(out, " field `{field}`");
                }
                let _ = writeln!(out, ": {}", issue.message);
            },
            (None, Some(code_host)) => {
                let _ = writeln!(out, "  {}: {code_host}", connection.name);
            },
            (None, None) => {
                let _ = writeln!(out, "  {}", connection.name);
            },
        }
    }
    out
}
