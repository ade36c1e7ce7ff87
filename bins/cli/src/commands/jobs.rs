//! Job command handlers.

use crate::error::{CliError, ExitCode};
use crate::{CliOutput, Invocation, format_error_output, format_success};
use codesync_domain::{JobId, JobKind, JobRecord, JobStatus};
use codesync_infra::{StatusReport, StatusRequest, parse_entity, read_local_status};
use codesync_shared::ErrorEnvelope;
use std::fmt::Write as _;
use std::path::Path;

/// Flags of `jobs status`.
pub struct JobsStatusArgs<'a> {
    pub job_id: Option<&'a str>,
    pub entity: Option<&'a str>,
    pub kind: Option<&'a str>,
    pub status: Option<&'a str>,
    pub limit: Option<usize>,
    pub state: &'a Path,
}

/// Run the jobs status command.
pub fn run_jobs_status(
    invocation: &Invocation<'_>,
    args: &JobsStatusArgs<'_>,
) -> Result<CliOutput, CliError> {
    let mode = invocation.mode;
    let request = match status_request(args) {
        Ok(request) => request,
        Err(error) => return Ok(format_error_output(mode, &error)),
    };
    let report = match read_local_status(args.state, request) {
        Ok(report) => report,
        Err(error) => return Ok(format_error_output(mode, &error)),
    };

    let stdout = if mode.is_ndjson() {
        // One line per job, then the summary.
        let mut out = String::new();
        for job in &report.jobs {
            let payload = serde_json::json!({
                "type": "job_status",
                "status": "ok",
                "job": job,
            });
            out.push_str(&serde_json::to_string(&payload)?);
            out.push('\n');
        }
        let summary = serde_json::json!({
            "entity": report.entity,
            "counts": report.counts,
            "total": report.jobs.len(),
        });
        out.push_str(&format_success(mode, "jobs", "ok", summary, String::new)?);
        out
    } else {
        format_success(mode, "jobs", "ok", serde_json::to_value(&report)?, || {
            let mut out = String::from("status: ok\n");
            format_report_text(&report, &mut out);
            out
        })?
    };

    Ok(CliOutput {
        stdout,
        stderr: String::new(),
        exit_code: ExitCode::Ok,
    })
}

fn status_request(args: &JobsStatusArgs<'_>) -> Result<StatusRequest, ErrorEnvelope> {
    Ok(StatusRequest {
        job_id: args.job_id.map(JobId::parse).transpose()?,
        entity: args.entity.map(parse_entity).transpose()?,
        kind: args.kind.map(str::parse::<JobKind>).transpose()?,
        status: args.status.map(str::parse::<JobStatus>).transpose()?,
        limit: args.limit,
    })
}

/// Append the text rendering of a report to `out`.
pub(crate) fn format_report_text(report: &StatusReport, out: &mut String) {
    if let Some(entity) = report.entity.as_ref() {
        let state = if entity.is_active { "active" } else { "idle" };
        let _ = writeln!(out, "entity: {} ({state})", entity.entity);
        if let (Some(status), Some(id)) = (entity.latest_status, entity.latest_job_id.as_ref()) {
            let _ = writeln!(out, "latest: {status} {id}");
        }
    }
    let _ = writeln!(out, "jobs: {}", report.jobs.len());
    for job in &report.jobs {
        format_job_line(job, out);
    }
    if !report.counts.is_empty() {
        out.push_str("counts:\n");
        for (kind, counts) in &report.counts {
            let _ = writeln!(
                out,
                "  {kind}: pending={} inProgress={} completed={} failed={}",
                counts.pending, counts.in_progress, counts.completed, counts.failed
            );
        }
    }
}

fn format_job_line(job: &JobRecord, out: &mut String) {
    let _ = writeln!(out, "  {}  {}  {}  {}", job.id, job.kind, job.entity, job.status);
    if let Some(message) = job.error_message.as_deref() {
        match job.error_kind {
            Some(kind) => {
                let _ = writeln!(out, "    error: {kind}: {message}");
            },
            None => {
                let _ = writeln!(out, "    error: {message}");
            },
        }
    }
    for warning in &job.warning_messages {
        let _ = writeln!(out, "    warning: {warning}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codesync_domain::{EntityRef, FailureKind};

    fn args<'a>(state: &'a Path) -> JobsStatusArgs<'a> {
        JobsStatusArgs {
            job_id: None,
            entity: None,
            kind: None,
            status: None,
            limit: None,
            state,
        }
    }

    #[test]
    fn flags_parse_into_a_request() -> codesync_shared::Result<()> {
        let state = Path::new(".codesync");
        let request = status_request(&JobsStatusArgs {
            entity: Some("acme-github"),
            kind: Some("index"),
            status: Some("in-progress"),
            limit: Some(5),
            ..args(state)
        })?;
        assert!(matches!(request.entity, Some(EntityRef::Connection(_))));
        assert_eq!(request.kind, Some(JobKind::RepoIndex));
        assert_eq!(request.status, Some(JobStatus::InProgress));
        assert_eq!(request.limit, Some(5));
        Ok(())
    }

    #[test]
    fn unknown_kinds_are_rejected() {
        let state = Path::new(".codesync");
        let error = status_request(&JobsStatusArgs {
            kind: Some("compile"),
            ..args(state)
        })
        .err();
        assert!(error.is_some_and(|error| ExitCode::for_error(&error) == ExitCode::InvalidInput));
    }

    #[test]
    fn failed_jobs_show_their_failure_kind() -> codesync_shared::Result<()> {
        let job = JobRecord {
            id: JobId::parse("job-1")?,
            kind: JobKind::ConnectionSync,
            entity: parse_entity("acme-github")?,
            status: JobStatus::Failed,
            created_at_ms: 1,
            seq: 1,
            config_fingerprint: None,
            started_at_ms: Some(2),
            completed_at_ms: Some(3),
            error_message: Some("slow down".into()),
            error_kind: Some(FailureKind::CodeHostRateLimited),
            warning_messages: vec!["RepoFailed: github.com/acme/api: boom".into()],
        };
        let mut out = String::new();
        format_job_line(&job, &mut out);
        assert_eq!(
            out,
            "  job-1  connectionSync  connection:acme-github  FAILED\n    error: CodeHostRateLimited: slow down\n    warning: RepoFailed: github.com/acme/api: boom\n"
        );
        Ok(())
    }
}
