//! Sweep jobs that stayed `IN_PROGRESS` past their deadline.
//!
//! Workers enforce their own deadline; the sweep covers workers that died or
//! ran in another process sharing the store.

use super::{JobDeps, JobPolicy};
use crate::log_fields::fields;
use codesync_domain::{JobKind, JobRecord, JobStatus, JobTransition};
use codesync_ports::{JobQuery, telemetry_tags};
use codesync_shared::{RequestContext, Result};
use serde_json::Value;

/// Fail every running job whose age exceeds its kind's timeout.
///
/// Returns the records that this call moved to `FAILED`.
#[tracing::instrument(skip_all)]
pub async fn expire_timed_out_jobs(
    ctx: &RequestContext,
    deps: &JobDeps,
    policy: &JobPolicy,
) -> Result<Vec<JobRecord>> {
    let now = deps.clock.now_ms();
    let mut expired = Vec::new();
    for kind in JobKind::ALL {
        let limit_ms = u64::try_from(policy.timeout_for(kind).as_millis()).unwrap_or(u64::MAX);
        let running = deps
            .store
            .list_jobs(ctx, JobQuery::with_status(kind, JobStatus::InProgress))
            .await?;
        for job in running {
            if job.running_for_ms(now).is_none_or(|running_for| running_for < limit_ms) {
                continue;
            }
            let transition = JobTransition::timeout(JobStatus::InProgress, now);
            if !deps.store.try_transition(ctx, &job.id, transition).await? {
                continue;
            }
            if let Some(telemetry) = deps.telemetry.as_ref() {
                let tags = telemetry_tags([("kind", kind.as_str())]);
                telemetry.increment_counter("jobs.timeout", 1, Some(&tags));
            }
            if let Some(logger) = deps.logger.as_ref() {
                logger.warn(
                    "jobs.timeout.expired",
                    "Job exceeded its deadline",
                    Some(fields([
                        ("jobId", Value::from(job.id.as_str())),
                        ("kind", Value::from(kind.as_str())),
                        ("entity", Value::from(job.entity.to_string())),
                        ("limitMs", Value::from(limit_ms)),
                    ])),
                );
            }
            if let Some(record) = deps.store.get_job(ctx, &job.id).await? {
                expired.push(record);
            }
        }
    }
    Ok(expired)
}
