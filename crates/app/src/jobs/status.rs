//! Read-only job status queries for operator tooling.

use super::JobError;
use codesync_domain::{EntityRef, JobId, JobKind, JobRecord};
use codesync_ports::{JobQuery, JobStorePort};
use codesync_shared::{RequestContext, Result};
use serde::Serialize;

/// Latest and active job of one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityStatus {
    /// Entity queried.
    pub entity: EntityRef,
    /// Newest job, in any status.
    pub latest: Option<JobRecord>,
    /// The pending or running job, if any.
    pub active: Option<JobRecord>,
}

impl EntityStatus {
    /// Returns true when a job is pending or running.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active.is_some()
    }
}

/// Fetch one job; unknown ids are `jobs:job_not_found`.
pub async fn job_status(
    ctx: &RequestContext,
    store: &dyn JobStorePort,
    id: &JobId,
) -> Result<JobRecord> {
    store
        .get_job(ctx, id)
        .await?
        .ok_or_else(|| JobError::JobNotFound { id: id.clone() }.into())
}

/// Jobs matching `query`, newest first.
pub async fn list_jobs(
    ctx: &RequestContext,
    store: &dyn JobStorePort,
    query: JobQuery,
) -> Result<Vec<JobRecord>> {
    store.list_jobs(ctx, query).await
}

/// Status of one connection or repository, optionally restricted to one job kind.
pub async fn entity_status(
    ctx: &RequestContext,
    store: &dyn JobStorePort,
    entity: EntityRef,
    kind: Option<JobKind>,
) -> Result<EntityStatus> {
    let query = JobQuery {
        kind,
        ..JobQuery::for_entity(entity.clone())
    };
    let jobs = store.list_jobs(ctx, query).await?;
    let active = jobs.iter().find(|job| job.status.is_active()).cloned();
    Ok(EntityStatus {
        entity,
        latest: jobs.into_iter().next(),
        active,
    })
}
