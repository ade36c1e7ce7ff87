//! Claim a pending job and run it to a terminal status.

use super::gc::run_repo_gc;
use super::index::run_repo_index;
use super::sync::run_connection_sync;
use super::{JobDeps, JobError, JobPolicy, WorkOutcome, kind_event_prefix};
use crate::log_fields::{duration_ms, fields};
use codesync_domain::{JobKind, JobRecord, JobStatus, JobTransition};
use codesync_ports::{LogFields, telemetry_tags};
use codesync_shared::{CorrelationId, ErrorEnvelope, RequestContext, Result, with_deadline};
use serde_json::Value;
use std::time::Instant;

/// What happened to a job handed to [`run_job`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobRun {
    /// Another worker claimed the job first, or it is no longer pending.
    NotClaimed,
    /// The job reached a terminal status; this is the stored record.
    Finished(JobRecord),
}

/// Claim `job` and run it under its kind's deadline.
///
/// The claim is a compare-and-swap `PENDING -> IN_PROGRESS`. On expiry the
/// job context is cancelled, which aborts in-flight lister, secret manager
/// and indexer calls, and the job fails with `"timeout"`.
#[tracing::instrument(skip_all, fields(job = %job.id, kind = %job.kind))]
pub async fn run_job(
    ctx: &RequestContext,
    deps: &JobDeps,
    policy: &JobPolicy,
    job: &JobRecord,
) -> Result<JobRun> {
    let prefix = kind_event_prefix(job.kind);
    let claimed = deps
        .store
        .try_transition(ctx, &job.id, JobTransition::start(deps.clock.now_ms()))
        .await?;
    if !claimed {
        if let Some(logger) = deps.logger.as_ref() {
            logger.debug(
                "jobs.claim.lost",
                "Job was not pending; skipping",
                Some(log_fields_job(job)),
            );
        }
        return Ok(JobRun::NotClaimed);
    }
    count_transition(deps, job.kind, JobStatus::InProgress);

    let started_at = Instant::now();
    if let Some(logger) = deps.logger.as_ref() {
        logger.info(
            &format!("{prefix}.start"),
            "Job started",
            Some(log_fields_job(job)),
        );
    }

    let correlation_id = CorrelationId::parse(format!("job-{}", job.id))?;
    let outcome = with_deadline(
        ctx,
        correlation_id,
        policy.timeout_for(job.kind),
        "jobs.run",
        |job_ctx| async move { dispatch(&job_ctx, deps, policy, job).await },
    )
    .await;

    let finished_at = deps.clock.now_ms();
    let transition = match &outcome {
        Ok(work) => work.clone().into_transition(finished_at),
        Err(error) => JobTransition::fail(JobStatus::InProgress, finished_at, error),
    };
    let target = transition.to;
    let applied = deps.store.try_transition(ctx, &job.id, transition).await?;
    if applied {
        count_transition(deps, job.kind, target);
    }

    let record = deps
        .store
        .get_job(ctx, &job.id)
        .await?
        .ok_or_else(|| JobError::JobNotFound { id: job.id.clone() })?;

    let mut log_fields = log_fields_job(&record);
    log_fields.insert("durationMs".into(), Value::from(duration_ms(started_at)));
    if let Some(logger) = deps.logger.as_ref() {
        if applied {
            log_finished(logger.as_ref(), prefix, &record, outcome.as_ref().err(), log_fields);
        } else {
            logger.warn(
                "jobs.finish.stale",
                "Job changed status while running; result discarded",
                Some(log_fields),
            );
        }
    }
    Ok(JobRun::Finished(record))
}

async fn dispatch(
    ctx: &RequestContext,
    deps: &JobDeps,
    policy: &JobPolicy,
    job: &JobRecord,
) -> Result<WorkOutcome> {
    ctx.ensure_not_cancelled("jobs.run.start")?;
    match job.kind {
        JobKind::ConnectionSync => run_connection_sync(ctx, deps, policy, &job.entity).await,
        JobKind::RepoIndex => run_repo_index(ctx, deps, &job.entity).await,
        JobKind::RepoGarbageCollection => run_repo_gc(ctx, deps, policy, &job.entity).await,
    }
}

fn log_finished(
    logger: &dyn codesync_ports::LoggerPort,
    prefix: &str,
    record: &JobRecord,
    error: Option<&ErrorEnvelope>,
    mut log_fields: LogFields,
) {
    log_fields.insert(
        "warnings".into(),
        Value::from(record.warning_messages.len()),
    );
    match (record.status, error) {
        (JobStatus::Failed, Some(error)) if error.is_timeout() => {
            logger.warn("jobs.timeout.expired", "Job exceeded its deadline", Some(log_fields));
        },
        (JobStatus::Failed, Some(error)) => {
            logger.error(&format!("{prefix}.failed"), error, Some(log_fields));
        },
        (JobStatus::Failed, None) => {
            if let Some(message) = record.error_message.as_deref() {
                log_fields.insert("errorMessage".into(), Value::from(message));
            }
            logger.warn(&format!("{prefix}.failed"), "Every unit of work failed", Some(log_fields));
        },
        _ => logger.info(&format!("{prefix}.completed"), "Job completed", Some(log_fields)),
    }
}

fn count_transition(deps: &JobDeps, kind: JobKind, to: JobStatus) {
    if let Some(telemetry) = deps.telemetry.as_ref() {
        let tags = telemetry_tags([("kind", kind.as_str()), ("to", to.as_str())]);
        telemetry.increment_counter("jobs.transition", 1, Some(&tags));
    }
}

fn log_fields_job(job: &JobRecord) -> LogFields {
    fields([
        ("jobId", Value::from(job.id.as_str())),
        ("kind", Value::from(job.kind.as_str())),
        ("entity", Value::from(job.entity.to_string())),
        ("status", Value::from(job.status.as_str())),
    ])
}
