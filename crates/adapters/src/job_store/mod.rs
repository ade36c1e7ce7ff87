//! Job status stores.
//!
//! Both stores share [`JobTable`], which enforces "one active job per entity"
//! on create, applies compare-and-swap transitions, and prunes old finished
//! jobs when a retention limit is set.

mod file;
mod memory;

pub use file::FileJobStore;
pub use memory::InMemoryJobStore;

use codesync_domain::{EntityRef, JobId, JobRecord, JobTransition};
use codesync_ports::{CreateJobOutcome, JobQuery, NewJob, order_and_limit};
use codesync_shared::{ErrorClass, ErrorCode, ErrorEnvelope, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

const TABLE_VERSION: u32 = 1;

/// Serializable set of job records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobTable {
    version: u32,
    #[serde(default)]
    next_seq: u64,
    #[serde(default)]
    jobs: Vec<JobRecord>,
}

impl Default for JobTable {
    fn default() -> Self {
        Self {
            version: TABLE_VERSION,
            next_seq: 0,
            jobs: Vec::new(),
        }
    }
}

impl JobTable {
    fn check_version(&self) -> Result<()> {
        if self.version == TABLE_VERSION {
            return Ok(());
        }
        Err(ErrorEnvelope::unexpected(
            ErrorCode::new("store", "unsupported_version"),
            format!("job table version {} is not supported", self.version),
            ErrorClass::NonRetriable,
        ))
    }

    /// Insert a pending job unless the entity already has an active one.
    pub fn create(&mut self, id: JobId, request: NewJob) -> Result<CreateJobOutcome> {
        self.check_version()?;
        if let Some(active) = self
            .jobs
            .iter()
            .find(|job| job.entity == request.entity && job.status.is_active())
        {
            return Ok(CreateJobOutcome::AlreadyScheduled(active.clone()));
        }
        if self.jobs.iter().any(|job| job.id == id) {
            return Err(ErrorEnvelope::unexpected(
                ErrorCode::new("jobs", "duplicate_id"),
                format!("job id `{id}` is already in use"),
                ErrorClass::Retriable,
            ));
        }
        let mut record = JobRecord::pending(id, request.kind, request.entity, request.at_ms);
        self.next_seq = self.next_seq.max(self.max_seq()) + 1;
        record.seq = self.next_seq;
        record.config_fingerprint = request.config_fingerprint;
        self.jobs.push(record.clone());
        Ok(CreateJobOutcome::Created(record))
    }

    /// Apply `transition` to job `id`; `Ok(false)` when it does not apply.
    pub fn transition(&mut self, id: &JobId, transition: &JobTransition) -> Result<bool> {
        self.check_version()?;
        let job = self
            .jobs
            .iter_mut()
            .find(|job| &job.id == id)
            .ok_or_else(|| job_not_found(id))?;
        Ok(job.apply(transition).is_ok())
    }

    /// Apply `transition` and, when the job finished, prune the entity's
    /// history down to `retention` finished jobs.
    pub fn transition_retaining(
        &mut self,
        id: &JobId,
        transition: &JobTransition,
        retention: Option<usize>,
    ) -> Result<bool> {
        let applied = self.transition(id, transition)?;
        if applied
            && transition.to.is_terminal()
            && let Some(keep) = retention
        {
            self.prune(keep);
        }
        Ok(applied)
    }

    /// Drop finished jobs beyond the newest `keep_terminal` per entity.
    ///
    /// Active jobs are never dropped and `keep_terminal` is at least one, so
    /// each entity keeps its latest record. Returns the number removed.
    pub fn prune(&mut self, keep_terminal: usize) -> usize {
        let keep = keep_terminal.max(1);
        let newest_first = order_and_limit(self.jobs.clone(), &JobQuery::default());
        let mut finished: BTreeMap<&EntityRef, usize> = BTreeMap::new();
        let mut dropped = BTreeSet::new();
        for job in &newest_first {
            if job.status.is_active() {
                continue;
            }
            let count = finished.entry(&job.entity).or_insert(0);
            *count += 1;
            if *count > keep {
                dropped.insert(job.id.clone());
            }
        }
        let before = self.jobs.len();
        self.jobs.retain(|job| !dropped.contains(&job.id));
        before - self.jobs.len()
    }

    fn max_seq(&self) -> u64 {
        self.jobs.iter().map(|job| job.seq).max().unwrap_or(0)
    }

    /// One job by id.
    #[must_use]
    pub fn get(&self, id: &JobId) -> Option<JobRecord> {
        self.jobs.iter().find(|job| &job.id == id).cloned()
    }

    /// Jobs matching `query`, newest first.
    #[must_use]
    pub fn list(&self, query: &JobQuery) -> Vec<JobRecord> {
        let matching = self
            .jobs
            .iter()
            .filter(|job| query.matches(job))
            .cloned()
            .collect();
        order_and_limit(matching, query)
    }

    /// Number of stored jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Returns true when no job is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

fn job_not_found(id: &JobId) -> ErrorEnvelope {
    ErrorEnvelope::expected(
        ErrorCode::new("jobs", "job_not_found"),
        format!("job `{id}` does not exist"),
    )
    .with_metadata("job_id", id.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use codesync_domain::{ConnectionName, EntityRef, JobKind, JobStatus, RepoIdentity};

    fn connection(name: &str) -> Result<EntityRef> {
        Ok(EntityRef::Connection(ConnectionName::parse(name)?))
    }

    fn new_job(kind: JobKind, entity: EntityRef, at_ms: u64) -> NewJob {
        NewJob::new(kind, entity, at_ms)
    }

    #[test]
    fn one_active_job_per_entity() -> Result<()> {
        let mut table = JobTable::default();
        let entity = connection("main")?;
        let first = table.create(JobId::parse("a")?, new_job(JobKind::ConnectionSync, entity.clone(), 1))?;
        assert!(first.is_created());

        let second = table.create(JobId::parse("b")?, new_job(JobKind::ConnectionSync, entity.clone(), 2))?;
        assert_eq!(second, CreateJobOutcome::AlreadyScheduled(first.record().clone()));
        assert_eq!(table.len(), 1);

        table.transition(&JobId::parse("a")?, &JobTransition::start(3))?;
        table.transition(&JobId::parse("a")?, &JobTransition::complete(4, Vec::new()))?;
        let third = table.create(JobId::parse("c")?, new_job(JobKind::ConnectionSync, entity, 5))?;
        assert!(third.is_created());
        Ok(())
    }

    #[test]
    fn repo_entities_block_across_kinds() -> Result<()> {
        let mut table = JobTable::default();
        let repo = EntityRef::Repo(RepoIdentity::parse("github.com/acme/api")?);
        table.create(JobId::parse("a")?, new_job(JobKind::RepoIndex, repo.clone(), 1))?;
        let gc = table.create(JobId::parse("b")?, new_job(JobKind::RepoGarbageCollection, repo, 2))?;
        assert!(!gc.is_created());
        Ok(())
    }

    #[test]
    fn transitions_are_compare_and_swap() -> Result<()> {
        let mut table = JobTable::default();
        let id = JobId::parse("a")?;
        table.create(id.clone(), new_job(JobKind::ConnectionSync, connection("main")?, 1))?;

        assert!(table.transition(&id, &JobTransition::start(2))?);
        assert!(!table.transition(&id, &JobTransition::start(3))?);
        assert!(table.transition(&id, &JobTransition::timeout(JobStatus::InProgress, 4))?);
        assert!(!table.transition(&id, &JobTransition::complete(5, Vec::new()))?);

        let job = table.get(&id);
        assert_eq!(job.as_ref().map(|job| job.status), Some(JobStatus::Failed));
        assert_eq!(job.and_then(|job| job.started_at_ms), Some(2));
        Ok(())
    }

    #[test]
    fn jobs_created_in_one_millisecond_list_newest_first() -> Result<()> {
        let mut table = JobTable::default();
        for n in 1..=10 {
            let entity = connection(&format!("conn-{n}"))?;
            table.create(JobId::parse(format!("job-{n}"))?, new_job(JobKind::ConnectionSync, entity, 7))?;
        }
        let listed = table.list(&JobQuery::default());
        let ids: Vec<&str> = listed.iter().map(|job| job.id.as_str()).collect();
        assert_eq!(ids.first(), Some(&"job-10"));
        assert_eq!(ids.get(1), Some(&"job-9"));
        assert_eq!(ids.last(), Some(&"job-1"));
        Ok(())
    }

    #[test]
    fn retention_keeps_recent_finished_jobs_and_active_ones() -> Result<()> {
        let mut table = JobTable::default();
        let main = connection("main")?;
        for n in 1..=5_u64 {
            let id = JobId::parse(format!("job-{n}"))?;
            table.create(id.clone(), new_job(JobKind::ConnectionSync, main.clone(), n * 10))?;
            table.transition_retaining(&id, &JobTransition::start(n * 10 + 1), Some(2))?;
            table.transition_retaining(&id, &JobTransition::complete(n * 10 + 2, Vec::new()), Some(2))?;
        }
        let other = connection("other")?;
        table.create(JobId::parse("solo")?, new_job(JobKind::ConnectionSync, other.clone(), 1))?;
        table.create(JobId::parse("job-6")?, new_job(JobKind::ConnectionSync, main.clone(), 60))?;

        let history: Vec<String> = table
            .list(&JobQuery::for_entity(main))
            .into_iter()
            .map(|job| job.id.to_string())
            .collect();
        assert_eq!(history, vec!["job-6", "job-5", "job-4"]);

        assert_eq!(table.prune(1), 1);
        assert_eq!(table.list(&JobQuery::for_entity(other)).len(), 1);
        assert!(table.get(&JobId::parse("job-6")?).is_some());
        assert!(table.get(&JobId::parse("job-5")?).is_some());
        assert!(table.get(&JobId::parse("job-4")?).is_none());
        Ok(())
    }

    #[test]
    fn unknown_ids_are_errors() -> Result<()> {
        let mut table = JobTable::default();
        let error = table
            .transition(&JobId::parse("ghost")?, &JobTransition::start(1))
            .err();
        assert_eq!(
            error.map(|error| error.code),
            Some(ErrorCode::new("jobs", "job_not_found"))
        );
        Ok(())
    }

    #[test]
    fn unsupported_versions_are_rejected() -> Result<()> {
        let mut table: JobTable = serde_json::from_str(r#"{"version":7,"jobs":[]}"#)
            .map_err(|error| ErrorEnvelope::expected(ErrorCode::invalid_input(), error.to_string()))?;
        let result = table.create(JobId::parse("a")?, new_job(JobKind::ConnectionSync, connection("main")?, 1));
        assert!(result.is_err());
        Ok(())
    }
}
