//! `sync`: run the scheduler against local state.

use crate::commands::jobs::format_report_text;
use crate::error::{CliError, ExitCode};
use crate::observability::observability;
use crate::{CliOutput, Invocation, format_error_output, format_success, log_info};
use codesync_infra::{LocalSyncOutcome, LocalSyncRequest, run_local_sync};
use std::fmt::Write as _;
use std::path::Path;

/// Flags of the `sync` command.
pub struct SyncArgs<'a> {
    pub candidates: &'a Path,
    pub state: &'a Path,
    pub once: bool,
    pub max_rounds: usize,
    pub metrics: bool,
}

/// Sync every configured connection, then print the resulting job state.
pub fn run_sync(invocation: &Invocation<'_>, args: &SyncArgs<'_>) -> Result<CliOutput, CliError> {
    let mode = invocation.mode;
    let request = LocalSyncRequest {
        config_path: invocation.config_path.map(Path::to_path_buf),
        candidates_path: args.candidates.to_path_buf(),
        state_dir: args.state.to_path_buf(),
        once: args.once,
        max_rounds: args.max_rounds,
    };

    let mut stderr = String::new();
    if !args.once && !mode.no_progress {
        // Printed up front: the run only returns after an interrupt.
        eprintln!("info: polling until interrupted (Ctrl-C to stop)");
    }
    let outcome = match run_local_sync(invocation.env, &request, observability(args.metrics)) {
        Ok(outcome) => outcome,
        Err(error) => return Ok(format_error_output(mode, &error)),
    };
    log_info(
        &mut stderr,
        &format!("sync finished, state in {}", args.state.display()),
        mode.no_progress,
    );

    let payload = serde_json::to_value(&outcome)?;
    let stdout = format_success(mode, "sync", "ok", payload, || format_outcome_text(&outcome))?;

    Ok(CliOutput {
        stdout,
        stderr,
        exit_code: ExitCode::Ok,
    })
}

fn format_outcome_text(outcome: &LocalSyncOutcome) -> String {
    let ticks = outcome.ticks;
    let mut out = String::from("status: ok\n");
    let _ = writeln!(
        out,
        "scheduled: {}  dispatched: {}  deferred: {}  expired: {}",
        ticks.scheduled, ticks.dispatched, ticks.deferred, ticks.expired
    );
    format_report_text(&outcome.report, &mut out);
    out
}
