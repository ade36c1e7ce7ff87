//! Job status store contract.
//!
//! The store is the single source of truth for "is a job already active for
//! entity X". Both operations below must be atomic with respect to each
//! other so concurrent scheduler ticks cannot create two active jobs for one
//! entity or claim the same pending job twice.

use crate::BoxFuture;
use codesync_domain::{EntityRef, JobId, JobKind, JobRecord, JobStatus, JobTransition};
use codesync_shared::{RequestContext, Result};

/// Request to create a pending job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJob {
    /// Job kind.
    pub kind: JobKind,
    /// Entity the job works on.
    pub entity: EntityRef,
    /// Creation time (epoch ms).
    pub at_ms: u64,
    /// Digest of the connection config, for sync jobs.
    pub config_fingerprint: Option<Box<str>>,
}

impl NewJob {
    /// Request without a config fingerprint.
    #[must_use]
    pub const fn new(kind: JobKind, entity: EntityRef, at_ms: u64) -> Self {
        Self {
            kind,
            entity,
            at_ms,
            config_fingerprint: None,
        }
    }

    /// Record the config the job is scheduled for.
    #[must_use]
    pub fn with_config_fingerprint(mut self, fingerprint: Option<Box<str>>) -> Self {
        self.config_fingerprint = fingerprint;
        self
    }
}

/// Result of [`JobStorePort::create_job`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateJobOutcome {
    /// A new pending job was stored.
    Created(JobRecord),
    /// The entity already has a `PENDING` or `IN_PROGRESS` job; nothing was stored.
    AlreadyScheduled(JobRecord),
}

impl CreateJobOutcome {
    /// The new or already-active job.
    #[must_use]
    pub const fn record(&self) -> &JobRecord {
        match self {
            Self::Created(record) | Self::AlreadyScheduled(record) => record,
        }
    }

    /// Returns true when a new job was created.
    #[must_use]
    pub const fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Filter for [`JobStorePort::list_jobs`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobQuery {
    /// Only this kind.
    pub kind: Option<JobKind>,
    /// Only this entity.
    pub entity: Option<EntityRef>,
    /// Only these statuses (empty means all).
    pub statuses: Vec<JobStatus>,
    /// Maximum number of records.
    pub limit: Option<usize>,
}

impl JobQuery {
    /// Active (`PENDING` or `IN_PROGRESS`) jobs of one kind.
    #[must_use]
    pub fn active(kind: JobKind) -> Self {
        Self {
            kind: Some(kind),
            statuses: vec![JobStatus::Pending, JobStatus::InProgress],
            ..Self::default()
        }
    }

    /// Jobs of one kind in one status.
    #[must_use]
    pub fn with_status(kind: JobKind, status: JobStatus) -> Self {
        Self {
            kind: Some(kind),
            statuses: vec![status],
            ..Self::default()
        }
    }

    /// Every job for one entity.
    #[must_use]
    pub fn for_entity(entity: EntityRef) -> Self {
        Self {
            entity: Some(entity),
            ..Self::default()
        }
    }

    /// Returns true when `record` passes the filter (the limit is not considered).
    #[must_use]
    pub fn matches(&self, record: &JobRecord) -> bool {
        self.kind.is_none_or(|kind| record.kind == kind)
            && self
                .entity
                .as_ref()
                .is_none_or(|entity| &record.entity == entity)
            && (self.statuses.is_empty() || self.statuses.contains(&record.status))
    }
}

/// Sort records newest first (creation time, then creation counter) and
/// apply the query limit.
pub fn order_and_limit(mut records: Vec<JobRecord>, query: &JobQuery) -> Vec<JobRecord> {
    records.sort_by(|left, right| {
        (right.created_at_ms, right.seq)
            .cmp(&(left.created_at_ms, left.seq))
            .then_with(|| right.id.cmp(&left.id))
    });
    if let Some(limit) = query.limit {
        records.truncate(limit);
    }
    records
}

/// Transactional job status store.
pub trait JobStorePort: Send + Sync {
    /// Create a pending job unless the entity already has an active one.
    fn create_job<'a>(
        &'a self,
        ctx: &'a RequestContext,
        request: NewJob,
    ) -> BoxFuture<'a, Result<CreateJobOutcome>>;

    /// Apply `transition` only if the job is currently in `transition.from`.
    ///
    /// Returns `false` (and changes nothing) when the status differs or the
    /// transition is illegal. Unknown ids are an error.
    fn try_transition<'a>(
        &'a self,
        ctx: &'a RequestContext,
        id: &'a JobId,
        transition: JobTransition,
    ) -> BoxFuture<'a, Result<bool>>;

    /// Fetch one job.
    fn get_job<'a>(
        &'a self,
        ctx: &'a RequestContext,
        id: &'a JobId,
    ) -> BoxFuture<'a, Result<Option<JobRecord>>>;

    /// List jobs matching `query`, newest first.
    fn list_jobs<'a>(
        &'a self,
        ctx: &'a RequestContext,
        query: JobQuery,
    ) -> BoxFuture<'a, Result<Vec<JobRecord>>>;
}
