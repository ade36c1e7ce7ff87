//! Connection sync job body.

use super::schedule::schedule_repo_index;
use super::{JobDeps, JobError, JobPolicy, WorkOutcome};
use crate::log_fields::fields;
use crate::plan_builder::{SyncPlanDeps, build_sync_plan};
use codesync_domain::{EntityRef, JobKind, SyncWarning};
use codesync_shared::{RequestContext, Result};
use serde_json::Value;
use std::sync::Arc;

/// Build the plan, apply it to the catalog, and queue indexing for due repos.
pub(super) async fn run_connection_sync(
    ctx: &RequestContext,
    deps: &JobDeps,
    policy: &JobPolicy,
    entity: &EntityRef,
) -> Result<WorkOutcome> {
    let EntityRef::Connection(name) = entity else {
        return Err(JobError::InvalidEntity {
            kind: JobKind::ConnectionSync,
            entity: entity.clone(),
        }
        .into());
    };
    let input = deps
        .connections
        .sync_input(name)
        .ok_or_else(|| JobError::ConnectionNotConfigured { name: name.clone() })?;

    let plan_deps = SyncPlanDeps {
        secrets: deps.secrets.clone(),
        lister: Arc::clone(&deps.lister),
        logger: deps.logger.clone(),
        telemetry: deps.telemetry.clone(),
    };
    let plan = build_sync_plan(ctx, &plan_deps, input).await?;

    ctx.ensure_not_cancelled("jobs.sync.apply")?;
    let now = deps.clock.now_ms();
    let diff = deps.catalog.apply_sync_plan(ctx, &plan, now).await?;

    let mut warnings: Vec<Box<str>> = plan
        .warnings
        .iter()
        .map(|warning| warning.message().into_boxed_str())
        .collect();
    let mut scheduled = 0_usize;
    let mut failed = 0_usize;
    for identity in diff.added.iter().chain(&diff.retained) {
        ctx.ensure_not_cancelled("jobs.sync.schedule")?;
        match schedule_repo_index(ctx, deps, policy, identity, now).await {
            Ok(Some(_)) => scheduled += 1,
            Ok(None) => {},
            Err(error) if error.is_cancelled() => return Err(error),
            Err(error) => {
                failed += 1;
                let warning = SyncWarning::RepoFailed {
                    identity: identity.clone(),
                    message: error.message.into_boxed_str(),
                };
                warnings.push(warning.message().into_boxed_str());
            },
        }
    }

    if let Some(logger) = deps.logger.as_ref() {
        logger.info(
            "jobs.sync.applied",
            "Sync plan applied to the catalog",
            Some(fields([
                ("connection", Value::from(name.as_str())),
                ("added", Value::from(diff.added.len())),
                ("retained", Value::from(diff.retained.len())),
                ("removed", Value::from(diff.removed.len())),
                ("indexScheduled", Value::from(scheduled)),
            ])),
        );
    }

    Ok(WorkOutcome {
        warnings,
        succeeded: plan.entries.len().saturating_sub(failed),
        failed,
    })
}
