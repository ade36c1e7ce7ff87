//! # codesync-app
//!
//! Use cases for turning connection configs into sync plans and driving
//! sync, indexing and garbage-collection jobs through their lifecycle.
//! This crate depends on `ports`, `domain`, and `shared`.

pub mod connections;
pub mod exclusion;
pub mod jobs;
mod log_fields;
pub mod plan_builder;
pub mod revisions;
pub mod secret_resolver;

/// Returns the app crate version.
#[must_use]
pub const fn app_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub use connections::ConnectionSet;
pub use exclusion::{ExclusionFilter, ExclusionReason, filter_candidates};
pub use jobs::{
    EntityStatus, JobDeps, JobError, JobPolicy, JobRun, connection_config_changed,
    connection_sync_due, entity_status, expire_timed_out_jobs, job_status, list_jobs,
    pending_jobs, release_unconfigured_connections, repo_index_due, request_connection_sync,
    run_job, schedule_due_connections, schedule_due_repos, schedule_garbage_collection,
    schedule_job,
};
pub use plan_builder::{SyncPlanDeps, SyncPlanInput, build_sync_plan, sync_aborted};
pub use revisions::{RevisionMatcher, select_revisions};
pub use secret_resolver::SecretResolver;
