//! Repository garbage-collection job body.

use super::{JobDeps, JobError, JobPolicy, WorkOutcome};
use crate::log_fields::fields;
use codesync_domain::{EntityRef, JobKind};
use codesync_shared::{RequestContext, Result};
use serde_json::Value;

/// Remove an orphaned repository's index artifacts and catalog record.
pub(super) async fn run_repo_gc(
    ctx: &RequestContext,
    deps: &JobDeps,
    policy: &JobPolicy,
    entity: &EntityRef,
) -> Result<WorkOutcome> {
    let EntityRef::Repo(identity) = entity else {
        return Err(JobError::InvalidEntity {
            kind: JobKind::RepoGarbageCollection,
            entity: entity.clone(),
        }
        .into());
    };
    let Some(record) = deps.catalog.get_repo(ctx, identity).await? else {
        return Ok(WorkOutcome::default());
    };

    // Re-checked at run time: a sync may have re-adopted the repo since scheduling.
    if !record.gc_eligible(deps.clock.now_ms(), policy.gc_grace_period_ms) {
        return Ok(WorkOutcome::skipped(format!(
            "skipped {identity}: not eligible for garbage collection"
        )));
    }

    ctx.run_cancellable("jobs.gc.indexer", deps.indexer.remove_repo(ctx, identity))
        .await?;
    let removed = deps.catalog.remove_repo(ctx, identity).await?;

    if let Some(logger) = deps.logger.as_ref() {
        logger.info(
            "jobs.gc.removed",
            "Repository artifacts removed",
            Some(fields([
                ("repo", Value::from(identity.as_str())),
                ("catalogRecordRemoved", Value::from(removed)),
            ])),
        );
    }
    if removed {
        Ok(WorkOutcome {
            succeeded: 1,
            ..WorkOutcome::default()
        })
    } else {
        Ok(WorkOutcome {
            succeeded: 1,
            ..WorkOutcome::skipped(format!(
                "{identity} regained an owner after its artifacts were removed"
            ))
        })
    }
}
