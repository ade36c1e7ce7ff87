//! `connection check`.

use crate::error::{CliError, ExitCode};
use crate::{CliOutput, Invocation, format_error_output, format_success, log_info};
use codesync_infra::check_connection_file;
use std::path::Path;

/// Parse one connection file and print it with defaults applied.
pub fn run_connection_check(
    invocation: &Invocation<'_>,
    path: &Path,
) -> Result<CliOutput, CliError> {
    let mode = invocation.mode;
    let connection = match check_connection_file(path) {
        Ok(connection) => connection,
        Err(error) => return Ok(format_error_output(mode, &error)),
    };

    let mut stderr = String::new();
    log_info(&mut stderr, "connection check completed", mode.no_progress);

    let rendered = serde_json::to_string_pretty(&connection)?;
    let payload = serde_json::json!({
        "path": path.to_string_lossy(),
        "codeHost": connection.kind(),
        "connection": connection,
    });
    let stdout = format_success(mode, "connection", "ok", payload, || {
        format!(
            "status: ok\ncodeHost: {}\nconnection:\n{rendered}\n",
            connection.kind()
        )
    })?;

    Ok(CliOutput {
        stdout,
        stderr,
        exit_code: ExitCode::Ok,
    })
}
