//! Repository indexing job body.

use super::{JobDeps, JobError, WorkOutcome};
use crate::log_fields::fields;
use crate::plan_builder::sync_aborted;
use codesync_domain::{EntityRef, JobKind, SyncPlanEntry};
use codesync_shared::{RequestContext, Result};
use serde_json::Value;

/// Hand one catalog repository to the indexer.
///
/// The owning connection's token is resolved again here; catalog records
/// never hold credentials.
pub(super) async fn run_repo_index(
    ctx: &RequestContext,
    deps: &JobDeps,
    entity: &EntityRef,
) -> Result<WorkOutcome> {
    let EntityRef::Repo(identity) = entity else {
        return Err(JobError::InvalidEntity {
            kind: JobKind::RepoIndex,
            entity: entity.clone(),
        }
        .into());
    };
    let record = deps
        .catalog
        .get_repo(ctx, identity)
        .await?
        .ok_or_else(|| JobError::RepoNotFound {
            identity: identity.clone(),
        })?;

    let Some(owner) = record.primary_owner() else {
        if let Some(logger) = deps.logger.as_ref() {
            logger.info(
                "jobs.index.skipped",
                "Repository has no owning connection",
                Some(fields([("repo", Value::from(identity.as_str()))])),
            );
        }
        return Ok(WorkOutcome::skipped(format!(
            "skipped {identity}: no connection owns it"
        )));
    };

    let token = match deps.connections.get(owner) {
        Some(Ok(config)) => deps.secrets.resolve_optional(ctx, config.token()).await?,
        Some(Err(cause)) => return Err(sync_aborted(owner, cause)),
        None => {
            return Err(JobError::ConnectionNotConfigured {
                name: owner.clone(),
            }
            .into());
        },
    };

    let entry = SyncPlanEntry {
        identity: record.identity.clone(),
        name: record.name.clone(),
        clone_url: record.clone_url.clone(),
        revisions: record.revisions.clone(),
        token,
    };
    let outcome = ctx
        .run_cancellable("jobs.index.repo", deps.indexer.index_repo(ctx, &entry))
        .await?;

    let work = WorkOutcome {
        failed: outcome.warnings.len(),
        succeeded: outcome.indexed_revisions,
        warnings: outcome.warnings,
    };
    if work.succeeded > 0 || work.failed == 0 {
        deps.catalog
            .record_indexed(ctx, &entry.identity, deps.clock.now_ms())
            .await?;
    }
    Ok(work)
}
