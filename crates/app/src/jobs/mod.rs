//! Job lifecycle: scheduling, claiming, running, timeouts, and status.
//!
//! Jobs move `PENDING -> IN_PROGRESS -> {COMPLETED | FAILED}`. Every status
//! change goes through [`JobStorePort::try_transition`], so a job is claimed
//! by exactly one worker and a timed-out job cannot be completed later.

mod gc;
mod index;
pub mod runner;
pub mod schedule;
pub mod status;
mod sync;
pub mod timeout;

use crate::connections::ConnectionSet;
use crate::secret_resolver::SecretResolver;
use codesync_domain::{
    ConnectionName, EntityRef, JobId, JobKind, JobTransition, RepoIdentity,
};
use codesync_ports::{
    CatalogPort, ClockPort, IndexerPort, JobStorePort, LoggerPort, RepoListerPort, TelemetryPort,
};
use codesync_shared::{ErrorCode, ErrorEnvelope};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub use runner::{JobRun, run_job};
pub use schedule::{
    connection_config_changed, connection_sync_due, pending_jobs,
    release_unconfigured_connections, repo_index_due, request_connection_sync,
    schedule_due_connections, schedule_due_repos, schedule_garbage_collection, schedule_job,
};
pub use status::{EntityStatus, entity_status, job_status, list_jobs};
pub use timeout::expire_timed_out_jobs;

/// Timing knobs for scheduling and running jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobPolicy {
    /// Minimum time between connection syncs.
    pub resync_connection_interval_ms: u64,
    /// Minimum time between indexes of one repository.
    pub reindex_interval_ms: u64,
    /// Deadline for a connection sync job.
    pub connection_sync_timeout: Duration,
    /// Deadline for indexing and garbage-collection jobs.
    pub repo_index_timeout: Duration,
    /// Time an orphaned repository is kept before garbage collection.
    pub gc_grace_period_ms: u64,
    /// First backoff step after a rate-limited sync.
    pub rate_limit_backoff_base_ms: u64,
    /// Backoff ceiling for rate-limited syncs.
    pub rate_limit_backoff_max_ms: u64,
}

impl Default for JobPolicy {
    fn default() -> Self {
        Self {
            resync_connection_interval_ms: 86_400_000,
            reindex_interval_ms: 3_600_000,
            connection_sync_timeout: Duration::from_millis(7_200_000),
            repo_index_timeout: Duration::from_millis(7_200_000),
            gc_grace_period_ms: 10_000,
            rate_limit_backoff_base_ms: 3_000,
            rate_limit_backoff_max_ms: 3_600_000,
        }
    }
}

impl JobPolicy {
    /// Deadline applied to jobs of `kind`.
    #[must_use]
    pub const fn timeout_for(&self, kind: JobKind) -> Duration {
        match kind {
            JobKind::ConnectionSync => self.connection_sync_timeout,
            JobKind::RepoIndex | JobKind::RepoGarbageCollection => self.repo_index_timeout,
        }
    }
}

/// Ports shared by every job use case.
#[derive(Clone)]
pub struct JobDeps {
    /// Job status store.
    pub store: Arc<dyn JobStorePort>,
    /// Repository catalog.
    pub catalog: Arc<dyn CatalogPort>,
    /// Indexer hand-off.
    pub indexer: Arc<dyn IndexerPort>,
    /// Code-host lister.
    pub lister: Arc<dyn RepoListerPort>,
    /// Token resolver.
    pub secrets: SecretResolver,
    /// Configured connections.
    pub connections: Arc<ConnectionSet>,
    /// Wall clock.
    pub clock: Arc<dyn ClockPort>,
    /// Optional logger.
    pub logger: Option<Arc<dyn LoggerPort>>,
    /// Optional telemetry sink.
    pub telemetry: Option<Arc<dyn TelemetryPort>>,
}

/// Job lookup and scheduling failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// No job with this id.
    JobNotFound {
        /// Requested id.
        id: JobId,
    },
    /// The entity already has a pending or running job.
    AlreadyScheduled {
        /// The active job.
        id: JobId,
        /// Entity it works on.
        entity: EntityRef,
    },
    /// The job kind cannot work on this entity.
    InvalidEntity {
        /// Job kind.
        kind: JobKind,
        /// Entity found on the job.
        entity: EntityRef,
    },
    /// The connection is not in the config.
    ConnectionNotConfigured {
        /// Connection name.
        name: ConnectionName,
    },
    /// The repository is not in the catalog.
    RepoNotFound {
        /// Repository identity.
        identity: RepoIdentity,
    },
}

impl JobError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::JobNotFound { .. } => ErrorCode::new("jobs", "job_not_found"),
            Self::AlreadyScheduled { .. } => ErrorCode::new("jobs", "already_scheduled"),
            Self::InvalidEntity { .. } => ErrorCode::new("jobs", "invalid_entity"),
            Self::ConnectionNotConfigured { .. } | Self::RepoNotFound { .. } => {
                ErrorCode::not_found()
            },
        }
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::JobNotFound { id } => write!(formatter, "job `{id}` not found"),
            Self::AlreadyScheduled { id, entity } => {
                write!(formatter, "{entity} already has active job `{id}`")
            },
            Self::InvalidEntity { kind, entity } => {
                write!(formatter, "{kind} jobs cannot run on {entity}")
            },
            Self::ConnectionNotConfigured { name } => {
                write!(formatter, "connection `{name}` is not configured")
            },
            Self::RepoNotFound { identity } => {
                write!(formatter, "repository `{identity}` is not in the catalog")
            },
        }
    }
}

impl std::error::Error for JobError {}

impl From<JobError> for ErrorEnvelope {
    fn from(error: JobError) -> Self {
        let envelope = Self::expected(error.error_code(), error.to_string());
        match error {
            JobError::JobNotFound { id } => envelope.with_metadata("job_id", id.to_string()),
            JobError::AlreadyScheduled { id, entity } => envelope
                .with_metadata("job_id", id.to_string())
                .with_metadata("entity", entity.to_string()),
            JobError::InvalidEntity { kind, entity } => envelope
                .with_metadata("kind", kind.as_str())
                .with_metadata("entity", entity.to_string()),
            JobError::ConnectionNotConfigured { name } => {
                envelope.with_metadata("connection", name.as_str())
            },
            JobError::RepoNotFound { identity } => envelope.with_metadata("repo", identity.as_str()),
        }
    }
}

/// Result of one job body, before it is written back to the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct WorkOutcome {
    pub warnings: Vec<Box<str>>,
    pub succeeded: usize,
    pub failed: usize,
}

impl WorkOutcome {
    pub(crate) fn skipped(reason: impl Into<Box<str>>) -> Self {
        Self {
            warnings: vec![reason.into()],
            ..Self::default()
        }
    }

    /// Partial failure completes with warnings; the job fails only when
    /// nothing succeeded.
    pub(crate) fn into_transition(self, at_ms: u64) -> JobTransition {
        if self.succeeded == 0 && self.failed > 0 {
            let message = format!("all {} units of work failed", self.failed);
            JobTransition::fail_all(at_ms, message, self.warnings)
        } else {
            JobTransition::complete(at_ms, self.warnings)
        }
    }
}

fn kind_event_prefix(kind: JobKind) -> &'static str {
    match kind {
        JobKind::ConnectionSync => "jobs.sync",
        JobKind::RepoIndex => "jobs.index",
        JobKind::RepoGarbageCollection => "jobs.gc",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codesync_domain::{FailureKind, JobStatus};

    #[test]
    fn partial_failure_completes_with_warnings() {
        let outcome = WorkOutcome {
            warnings: vec!["RepoFailed: a".into()],
            succeeded: 2,
            failed: 1,
        };
        let transition = outcome.into_transition(10);
        assert_eq!(transition.to, JobStatus::Completed);
        assert_eq!(transition.warning_messages.len(), 1);
    }

    #[test]
    fn total_failure_fails_and_keeps_warnings() {
        let outcome = WorkOutcome {
            warnings: vec!["RepoFailed: a".into(), "RepoFailed: b".into()],
            succeeded: 0,
            failed: 2,
        };
        let transition = outcome.into_transition(10);
        assert_eq!(transition.to, JobStatus::Failed);
        assert_eq!(transition.error_kind, Some(FailureKind::Internal));
        assert_eq!(transition.warning_messages.len(), 2);
    }

    #[test]
    fn empty_work_completes() {
        assert_eq!(WorkOutcome::default().into_transition(1).to, JobStatus::Completed);
    }

    #[test]
    fn timeouts_follow_job_kind() {
        let policy = JobPolicy {
            connection_sync_timeout: Duration::from_secs(5),
            repo_index_timeout: Duration::from_secs(9),
            ..JobPolicy::default()
        };
        assert_eq!(policy.timeout_for(JobKind::ConnectionSync), Duration::from_secs(5));
        assert_eq!(policy.timeout_for(JobKind::RepoIndex), Duration::from_secs(9));
        assert_eq!(
            policy.timeout_for(JobKind::RepoGarbageCollection),
            Duration::from_secs(9)
        );
    }

    #[test]
    fn job_errors_carry_codes_and_metadata() -> codesync_shared::Result<()> {
        let error = ErrorEnvelope::from(JobError::AlreadyScheduled {
            id: JobId::parse("job-7")?,
            entity: EntityRef::Connection(ConnectionName::parse("acme")?),
        });
        assert!(error.code.is("jobs", "already_scheduled"));
        assert_eq!(error.metadata_value("job_id"), Some("job-7"));
        assert_eq!(error.metadata_value("entity"), Some("connection:acme"));
        Ok(())
    }
}
