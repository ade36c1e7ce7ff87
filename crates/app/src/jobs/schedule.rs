//! Decide which jobs are due and create them.
//!
//! Creation is delegated to the store, which refuses a second active job for
//! the same entity. The due checks themselves are pure functions of the
//! latest job record, the clock, and the current config fingerprint.

use super::{JobDeps, JobError, JobPolicy};
use crate::log_fields::fields;
use codesync_domain::{
    ConnectionName, EntityRef, FailureKind, JobKind, JobRecord, JobStatus, RepoIdentity, RepoRecord,
};
use codesync_ports::{CreateJobOutcome, JobQuery, JobStorePort, NewJob, telemetry_tags};
use codesync_shared::{RequestContext, Result, exponential_backoff_ms};
use serde_json::Value;
use std::collections::BTreeSet;

/// Create a pending job unless the entity already has an active one.
pub async fn schedule_job(
    ctx: &RequestContext,
    store: &dyn JobStorePort,
    request: NewJob,
) -> Result<CreateJobOutcome> {
    ctx.ensure_not_cancelled("jobs.schedule")?;
    store.create_job(ctx, request).await
}

/// Operator-triggered sync of one connection.
///
/// Fails with `jobs:already_scheduled` when the connection has an active job.
pub async fn request_connection_sync(
    ctx: &RequestContext,
    deps: &JobDeps,
    name: &ConnectionName,
) -> Result<JobRecord> {
    if deps.connections.get(name).is_none() {
        return Err(JobError::ConnectionNotConfigured { name: name.clone() }.into());
    }
    let entity = EntityRef::Connection(name.clone());
    let request = NewJob::new(JobKind::ConnectionSync, entity, deps.clock.now_ms())
        .with_config_fingerprint(deps.connections.fingerprint(name));
    match schedule_job(ctx, deps.store.as_ref(), request).await? {
        CreateJobOutcome::Created(record) => {
            record_scheduled(deps, &record);
            Ok(record)
        },
        CreateJobOutcome::AlreadyScheduled(active) => Err(JobError::AlreadyScheduled {
            id: active.id,
            entity: active.entity,
        }
        .into()),
    }
}

/// Whether a connection should get a new sync job at `now_ms`.
///
/// `latest` is the newest sync job of the connection and
/// `consecutive_rate_limited` counts the rate-limited failures at the head
/// of its history.
#[must_use]
pub fn connection_sync_due(
    latest: Option<&JobRecord>,
    connection_valid: bool,
    consecutive_rate_limited: u32,
    policy: &JobPolicy,
    now_ms: u64,
) -> bool {
    let Some(latest) = latest else {
        return true;
    };
    if latest.status.is_active() {
        return false;
    }
    let finished_at = latest.completed_at_ms.unwrap_or(latest.created_at_ms);
    let elapsed = now_ms.saturating_sub(finished_at);

    if latest.status == JobStatus::Failed {
        match latest.error_kind {
            Some(kind) if is_config_failure(kind) => return connection_valid,
            Some(FailureKind::CodeHostRateLimited) => {
                let wait = exponential_backoff_ms(
                    policy.rate_limit_backoff_base_ms,
                    policy.rate_limit_backoff_max_ms,
                    consecutive_rate_limited.max(1),
                );
                return elapsed >= wait;
            },
            _ => {},
        }
    }
    elapsed >= policy.resync_connection_interval_ms
}

/// Whether the connection config differs from the one its latest finished
/// sync was scheduled for.
///
/// Records without a fingerprint never count as changed.
#[must_use]
pub fn connection_config_changed(latest: Option<&JobRecord>, current: Option<&str>) -> bool {
    let Some(latest) = latest.filter(|job| job.status.is_terminal()) else {
        return false;
    };
    match (latest.config_fingerprint.as_deref(), current) {
        (Some(recorded), Some(current)) => recorded != current,
        _ => false,
    }
}

/// Whether a repository should get a new indexing job at `now_ms`.
///
/// `latest` is the newest job of any kind for the repository.
#[must_use]
pub fn repo_index_due(
    record: &RepoRecord,
    latest: Option<&JobRecord>,
    policy: &JobPolicy,
    now_ms: u64,
) -> bool {
    if record.is_orphaned() {
        return false;
    }
    if let Some(latest) = latest {
        if latest.status.is_active() {
            return false;
        }
        if latest.kind == JobKind::RepoIndex && latest.status == JobStatus::Failed {
            let failed_at = latest.completed_at_ms.unwrap_or(latest.created_at_ms);
            return now_ms.saturating_sub(failed_at) >= policy.reindex_interval_ms;
        }
    }
    record
        .indexed_at_ms
        .is_none_or(|indexed_at| now_ms.saturating_sub(indexed_at) >= policy.reindex_interval_ms)
}

/// Create sync jobs for every connection that is due.
///
/// Rejected connections get one job, which fails with `SyncAborted`, and are
/// not scheduled again until their config parses. A connection whose config
/// changed since its last sync is due right away.
#[tracing::instrument(skip_all)]
pub async fn schedule_due_connections(
    ctx: &RequestContext,
    deps: &JobDeps,
    policy: &JobPolicy,
) -> Result<Vec<JobRecord>> {
    let now = deps.clock.now_ms();
    let mut scheduled = Vec::new();
    for name in deps.connections.names() {
        ctx.ensure_not_cancelled("jobs.schedule.connections")?;
        let entity = EntityRef::Connection(name.clone());
        let history = deps
            .store
            .list_jobs(
                ctx,
                JobQuery {
                    kind: Some(JobKind::ConnectionSync),
                    entity: Some(entity.clone()),
                    ..JobQuery::default()
                },
            )
            .await?;
        let fingerprint = deps.connections.fingerprint(name);
        let changed = connection_config_changed(history.first(), fingerprint.as_deref());
        let due = changed
            || connection_sync_due(
                history.first(),
                deps.connections.is_valid(name),
                consecutive_rate_limited(&history),
                policy,
                now,
            );
        if !due {
            continue;
        }
        if changed && let Some(logger) = deps.logger.as_ref() {
            logger.info(
                "jobs.schedule.config_changed",
                "Connection config changed since the last sync",
                Some(fields([("connection", Value::from(name.as_str()))])),
            );
        }
        let request =
            NewJob::new(JobKind::ConnectionSync, entity, now).with_config_fingerprint(fingerprint);
        if let CreateJobOutcome::Created(record) =
            schedule_job(ctx, deps.store.as_ref(), request).await?
        {
            record_scheduled(deps, &record);
            scheduled.push(record);
        }
    }
    Ok(scheduled)
}

/// Create indexing jobs for catalog repositories that are due.
#[tracing::instrument(skip_all)]
pub async fn schedule_due_repos(
    ctx: &RequestContext,
    deps: &JobDeps,
    policy: &JobPolicy,
) -> Result<Vec<JobRecord>> {
    let now = deps.clock.now_ms();
    let mut scheduled = Vec::new();
    for record in deps.catalog.list_repos(ctx).await? {
        ctx.ensure_not_cancelled("jobs.schedule.repos")?;
        if let Some(job) = schedule_repo_index_if_due(ctx, deps, policy, &record, now).await? {
            scheduled.push(job);
        }
    }
    Ok(scheduled)
}

/// Index `identity` when it is due. Returns the created job, if any.
pub(super) async fn schedule_repo_index(
    ctx: &RequestContext,
    deps: &JobDeps,
    policy: &JobPolicy,
    identity: &RepoIdentity,
    now_ms: u64,
) -> Result<Option<JobRecord>> {
    let Some(record) = deps.catalog.get_repo(ctx, identity).await? else {
        return Err(JobError::RepoNotFound {
            identity: identity.clone(),
        }
        .into());
    };
    schedule_repo_index_if_due(ctx, deps, policy, &record, now_ms).await
}

async fn schedule_repo_index_if_due(
    ctx: &RequestContext,
    deps: &JobDeps,
    policy: &JobPolicy,
    record: &RepoRecord,
    now_ms: u64,
) -> Result<Option<JobRecord>> {
    let entity = EntityRef::Repo(record.identity.clone());
    let latest = latest_job(ctx, deps.store.as_ref(), entity.clone()).await?;
    if !repo_index_due(record, latest.as_ref(), policy, now_ms) {
        return Ok(None);
    }
    let request = NewJob::new(JobKind::RepoIndex, entity, now_ms);
    match schedule_job(ctx, deps.store.as_ref(), request).await? {
        CreateJobOutcome::Created(job) => {
            record_scheduled(deps, &job);
            Ok(Some(job))
        },
        CreateJobOutcome::AlreadyScheduled(_) => Ok(None),
    }
}

/// Release catalog ownership held by connections no longer in the config.
///
/// Repositories left without owners start their garbage-collection grace
/// period. Returns the released connection names.
#[tracing::instrument(skip_all)]
pub async fn release_unconfigured_connections(
    ctx: &RequestContext,
    deps: &JobDeps,
) -> Result<Vec<ConnectionName>> {
    let now = deps.clock.now_ms();
    let stale: BTreeSet<ConnectionName> = deps
        .catalog
        .list_repos(ctx)
        .await?
        .into_iter()
        .flat_map(|record| record.owners)
        .filter(|owner| deps.connections.get(owner).is_none())
        .collect();
    let mut released = Vec::with_capacity(stale.len());
    for name in stale {
        ctx.ensure_not_cancelled("jobs.release.connections")?;
        let repos = deps.catalog.release_connection(ctx, &name, now).await?;
        if let Some(logger) = deps.logger.as_ref() {
            logger.info(
                "jobs.release.connection",
                "Released repositories of a removed connection",
                Some(fields([
                    ("connection", Value::from(name.as_str())),
                    ("repoCount", Value::from(repos.len())),
                ])),
            );
        }
        released.push(name);
    }
    Ok(released)
}

/// Create garbage-collection jobs for orphaned repositories past the grace period.
#[tracing::instrument(skip_all)]
pub async fn schedule_garbage_collection(
    ctx: &RequestContext,
    deps: &JobDeps,
    policy: &JobPolicy,
) -> Result<Vec<JobRecord>> {
    let now = deps.clock.now_ms();
    let mut scheduled = Vec::new();
    for record in deps.catalog.list_repos(ctx).await? {
        ctx.ensure_not_cancelled("jobs.schedule.gc")?;
        if !record.gc_eligible(now, policy.gc_grace_period_ms) {
            continue;
        }
        let entity = EntityRef::Repo(record.identity.clone());
        let request = NewJob::new(JobKind::RepoGarbageCollection, entity, now);
        if let CreateJobOutcome::Created(job) =
            schedule_job(ctx, deps.store.as_ref(), request).await?
        {
            record_scheduled(deps, &job);
            scheduled.push(job);
        }
    }
    Ok(scheduled)
}

/// Pending jobs of one kind, oldest first.
pub async fn pending_jobs(
    ctx: &RequestContext,
    store: &dyn JobStorePort,
    kind: JobKind,
) -> Result<Vec<JobRecord>> {
    let mut jobs = store
        .list_jobs(ctx, JobQuery::with_status(kind, JobStatus::Pending))
        .await?;
    jobs.reverse();
    Ok(jobs)
}

async fn latest_job(
    ctx: &RequestContext,
    store: &dyn JobStorePort,
    entity: EntityRef,
) -> Result<Option<JobRecord>> {
    let query = JobQuery {
        limit: Some(1),
        ..JobQuery::for_entity(entity)
    };
    Ok(store.list_jobs(ctx, query).await?.into_iter().next())
}

fn consecutive_rate_limited(history: &[JobRecord]) -> u32 {
    let count = history
        .iter()
        .take_while(|job| {
            job.status == JobStatus::Failed
                && job.error_kind == Some(FailureKind::CodeHostRateLimited)
        })
        .count();
    u32::try_from(count).unwrap_or(u32::MAX)
}

const fn is_config_failure(kind: FailureKind) -> bool {
    matches!(
        kind,
        FailureKind::UnknownConnectionType
            | FailureKind::MissingRequiredField
            | FailureKind::InvalidFieldShape
            | FailureKind::UnexpectedField
            | FailureKind::SyncAborted
    )
}

fn record_scheduled(deps: &JobDeps, job: &JobRecord) {
    if let Some(telemetry) = deps.telemetry.as_ref() {
        let tags = telemetry_tags([("kind", job.kind.as_str())]);
        telemetry.increment_counter("jobs.scheduled", 1, Some(&tags));
    }
    if let Some(logger) = deps.logger.as_ref() {
        logger.debug(
            "jobs.scheduled",
            "Job scheduled",
            Some(fields([
                ("jobId", Value::from(job.id.as_str())),
                ("kind", Value::from(job.kind.as_str())),
                ("entity", Value::from(job.entity.to_string())),
            ])),
        );
    }
}
