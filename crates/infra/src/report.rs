//! Job status reports for `jobs status`.

use crate::InfraResult;
use codesync_app::{entity_status, job_status, list_jobs};
use codesync_domain::{
    ConnectionName, EntityRef, JobId, JobKind, JobRecord, JobStatus, RepoIdentity,
};
use codesync_ports::{JobQuery, JobStorePort};
use codesync_shared::{ErrorCode, ErrorEnvelope, RequestContext};
use serde::Serialize;
use std::collections::BTreeMap;

/// Filters for a status report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusRequest {
    /// Exactly this job; other filters are ignored.
    pub job_id: Option<JobId>,
    /// Only jobs for this entity.
    pub entity: Option<EntityRef>,
    /// Only this kind.
    pub kind: Option<JobKind>,
    /// Only this status.
    pub status: Option<JobStatus>,
    /// Maximum number of jobs listed.
    pub limit: Option<usize>,
}

/// Jobs plus per-kind counts, newest job first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    /// Entity summary when the request named one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<EntitySummary>,
    /// Matching jobs.
    pub jobs: Vec<JobRecord>,
    /// Counts of the listed jobs keyed by kind.
    pub counts: BTreeMap<JobKind, StatusCounts>,
}

/// Current state of one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySummary {
    /// Entity.
    pub entity: EntityRef,
    /// Whether a job is pending or running.
    pub is_active: bool,
    /// Status of the newest job.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_status: Option<JobStatus>,
    /// Id of the newest job.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_job_id: Option<JobId>,
}

/// Jobs per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    /// `PENDING` jobs.
    pub pending: usize,
    /// `IN_PROGRESS` jobs.
    pub in_progress: usize,
    /// `COMPLETED` jobs.
    pub completed: usize,
    /// `FAILED` jobs.
    pub failed: usize,
}

impl StatusCounts {
    fn record(&mut self, status: JobStatus) {
        match status {
            JobStatus::Pending => self.pending += 1,
            JobStatus::InProgress => self.in_progress += 1,
            JobStatus::Completed => self.completed += 1,
            JobStatus::Failed => self.failed += 1,
        }
    }
}

/// Parse an entity argument.
///
/// Accepts `connection:<name>`, `repo:<identity>`, a bare connection name,
/// or a bare repository identity (anything with a `/`).
pub fn parse_entity(raw: &str) -> InfraResult<EntityRef> {
    let raw = raw.trim();
    if raw.starts_with("connection:") || raw.starts_with("repo:") {
        return raw.parse::<EntityRef>().map_err(ErrorEnvelope::from);
    }
    if let Ok(name) = ConnectionName::parse(raw) {
        return Ok(EntityRef::Connection(name));
    }
    RepoIdentity::parse(raw).map(EntityRef::Repo).map_err(|_| {
        ErrorEnvelope::expected(
            ErrorCode::invalid_input(),
            format!("`{raw}` is neither a connection name nor a repository identity"),
        )
        .with_metadata("entity", raw)
    })
}

/// Build a status report from the store.
#[tracing::instrument(skip_all)]
pub async fn build_status_report(
    ctx: &RequestContext,
    store: &dyn JobStorePort,
    request: StatusRequest,
) -> InfraResult<StatusReport> {
    if let Some(id) = request.job_id.as_ref() {
        let job = job_status(ctx, store, id).await?;
        return Ok(report_for(None, vec![job]));
    }

    let entity = match request.entity.clone() {
        Some(entity) => {
            let status = entity_status(ctx, store, entity, request.kind).await?;
            Some(EntitySummary {
                is_active: status.is_active(),
                latest_status: status.latest.as_ref().map(|job| job.status),
                latest_job_id: status.latest.map(|job| job.id),
                entity: status.entity,
            })
        },
        None => None,
    };
    let query = JobQuery {
        kind: request.kind,
        entity: request.entity,
        statuses: request.status.into_iter().collect(),
        limit: request.limit,
    };
    let jobs = list_jobs(ctx, store, query).await?;
    Ok(report_for(entity, jobs))
}

fn report_for(entity: Option<EntitySummary>, jobs: Vec<JobRecord>) -> StatusReport {
    let mut counts: BTreeMap<JobKind, StatusCounts> = BTreeMap::new();
    for job in &jobs {
        counts.entry(job.kind).or_default().record(job.status);
    }
    StatusReport {
        entity,
        jobs,
        counts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codesync_adapters::InMemoryJobStore;
    use codesync_domain::JobTransition;
    use codesync_ports::NewJob;
    use codesync_shared::Result;

    #[test]
    fn entities_parse_with_and_without_prefix() -> Result<()> {
        assert_eq!(
            parse_entity("acme-github")?,
            EntityRef::Connection(ConnectionName::parse("acme-github")?)
        );
        assert_eq!(
            parse_entity("connection:acme-github")?,
            EntityRef::Connection(ConnectionName::parse("acme-github")?)
        );
        assert_eq!(
            parse_entity("github.com/acme/api")?,
            EntityRef::Repo(RepoIdentity::parse("github.com/acme/api")?)
        );
        assert!(parse_entity("connection:has space").is_err());
        Ok(())
    }

    async fn seeded_store(ctx: &RequestContext) -> Result<InMemoryJobStore> {
        let store = InMemoryJobStore::new();
        let acme = EntityRef::Connection(ConnectionName::parse("acme")?);
        let api = EntityRef::Repo(RepoIdentity::parse("github.com/acme/api")?);

        let sync = store
            .create_job(ctx, NewJob::new(JobKind::ConnectionSync, acme.clone(), 1))
            .await?;
        store.try_transition(ctx, &sync.record().id, JobTransition::start(2)).await?;
        store
            .try_transition(ctx, &sync.record().id, JobTransition::complete(3, Vec::new()))
            .await?;
        store
            .create_job(ctx, NewJob::new(JobKind::ConnectionSync, acme, 10))
            .await?;
        store
            .create_job(ctx, NewJob::new(JobKind::RepoIndex, api, 11))
            .await?;
        Ok(store)
    }

    #[tokio::test]
    async fn reports_entity_state_and_counts() -> Result<()> {
        let ctx = RequestContext::new_request();
        let store = seeded_store(&ctx).await?;

        let report = build_status_report(
            &ctx,
            &store,
            StatusRequest {
                entity: Some(parse_entity("acme")?),
                ..StatusRequest::default()
            },
        )
        .await?;

        let entity = report.entity.as_ref().map(|entity| (entity.is_active, entity.latest_status));
        assert_eq!(entity, Some((true, Some(JobStatus::Pending))));
        assert_eq!(report.jobs.len(), 2);
        let counts = report.counts.get(&JobKind::ConnectionSync).copied().unwrap_or_default();
        assert_eq!((counts.pending, counts.completed), (1, 1));
        assert!(!report.counts.contains_key(&JobKind::RepoIndex));
        Ok(())
    }

    #[tokio::test]
    async fn filters_by_kind_status_and_limit() -> Result<()> {
        let ctx = RequestContext::new_request();
        let store = seeded_store(&ctx).await?;

        let pending = build_status_report(
            &ctx,
            &store,
            StatusRequest {
                status: Some(JobStatus::Pending),
                ..StatusRequest::default()
            },
        )
        .await?;
        assert_eq!(pending.jobs.len(), 2);
        assert_eq!(pending.jobs.first().map(|job| job.kind), Some(JobKind::RepoIndex));

        let limited = build_status_report(
            &ctx,
            &store,
            StatusRequest {
                kind: Some(JobKind::ConnectionSync),
                limit: Some(1),
                ..StatusRequest::default()
            },
        )
        .await?;
        assert_eq!(limited.jobs.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_job_ids_are_reported() -> Result<()> {
        let ctx = RequestContext::new_request();
        let store = seeded_store(&ctx).await?;
        let error = build_status_report(
            &ctx,
            &store,
            StatusRequest {
                job_id: Some(JobId::parse("job-404")?),
                ..StatusRequest::default()
            },
        )
        .await
        .err();
        assert_eq!(
            error.map(|error| error.code),
            Some(ErrorCode::new("jobs", "job_not_found"))
        );
        Ok(())
    }
}
