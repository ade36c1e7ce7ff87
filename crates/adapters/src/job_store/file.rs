use super::JobTable;
use crate::json_file::LockedJsonFile;
use codesync_domain::{JobId, JobRecord, JobTransition};
use codesync_ports::{BoxFuture, CreateJobOutcome, JobQuery, JobStorePort, NewJob};
use codesync_shared::{RequestContext, Result};
use std::path::{Path, PathBuf};

/// Job store persisted as one JSON file.
///
/// Several processes may share the file; each operation holds an exclusive
/// lock for its read-modify-write cycle. Ids are random (`job-<uuid>`).
#[derive(Debug, Clone)]
pub struct FileJobStore {
    file: LockedJsonFile,
    retention: Option<usize>,
}

impl FileJobStore {
    /// Store backed by `path`; the file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: LockedJsonFile::new(path),
            retention: None,
        }
    }

    /// Keep at most `keep` finished jobs per entity.
    #[must_use]
    pub fn with_retention(mut self, keep: usize) -> Self {
        self.retention = Some(keep);
        self
    }

    /// Backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

impl JobStorePort for FileJobStore {
    fn create_job<'a>(
        &'a self,
        ctx: &'a RequestContext,
        request: NewJob,
    ) -> BoxFuture<'a, Result<CreateJobOutcome>> {
        Box::pin(async move {
            ctx.ensure_not_cancelled("job_store.create")?;
            let id = JobId::parse(format!("job-{}", uuid::Uuid::new_v4()))?;
            self.file
                .with_document(move |table: &mut JobTable| {
                    let outcome = table.create(id, request)?;
                    let dirty = outcome.is_created();
                    Ok((outcome, dirty))
                })
                .await
        })
    }

    fn try_transition<'a>(
        &'a self,
        ctx: &'a RequestContext,
        id: &'a JobId,
        transition: JobTransition,
    ) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            ctx.ensure_not_cancelled("job_store.transition")?;
            let id = id.clone();
            let retention = self.retention;
            self.file
                .with_document(move |table: &mut JobTable| {
                    let applied = table.transition_retaining(&id, &transition, retention)?;
                    Ok((applied, applied))
                })
                .await
        })
    }

    fn get_job<'a>(
        &'a self,
        ctx: &'a RequestContext,
        id: &'a JobId,
    ) -> BoxFuture<'a, Result<Option<JobRecord>>> {
        Box::pin(async move {
            ctx.ensure_not_cancelled("job_store.get")?;
            let id = id.clone();
            self.file
                .with_document(move |table: &mut JobTable| Ok((table.get(&id), false)))
                .await
        })
    }

    fn list_jobs<'a>(
        &'a self,
        ctx: &'a RequestContext,
        query: JobQuery,
    ) -> BoxFuture<'a, Result<Vec<JobRecord>>> {
        Box::pin(async move {
            ctx.ensure_not_cancelled("job_store.list")?;
            self.file
                .with_document(move |table: &mut JobTable| Ok((table.list(&query), false)))
                .await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codesync_domain::{ConnectionName, EntityRef, JobKind, JobStatus};

    fn temp_store() -> FileJobStore {
        FileJobStore::new(
            std::env::temp_dir()
                .join(format!("codesync-jobs-{}", uuid::Uuid::new_v4()))
                .join("jobs.json"),
        )
    }

    #[tokio::test]
    async fn records_survive_reopening() -> Result<()> {
        let store = temp_store();
        let ctx = RequestContext::new_request();
        let outcome = store
            .create_job(
                &ctx,
                NewJob::new(JobKind::ConnectionSync, EntityRef::Connection(ConnectionName::parse("main")?), 10),
            )
            .await?;
        let id = outcome.record().id.clone();
        assert!(store.try_transition(&ctx, &id, JobTransition::start(11)).await?);

        let reopened = FileJobStore::new(store.path());
        let job = reopened.get_job(&ctx, &id).await?;
        assert_eq!(job.map(|job| job.status), Some(JobStatus::InProgress));

        let running = reopened
            .list_jobs(&ctx, JobQuery::with_status(JobKind::ConnectionSync, JobStatus::InProgress))
            .await?;
        assert_eq!(running.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn two_handles_share_the_active_job_guard() -> Result<()> {
        let first = temp_store();
        let second = FileJobStore::new(first.path());
        let ctx = RequestContext::new_request();
        let entity = EntityRef::Connection(ConnectionName::parse("main")?);
        let request = NewJob::new(JobKind::ConnectionSync, entity, 1);
        let (a, b) = tokio::join!(
            first.create_job(&ctx, request.clone()),
            second.create_job(&ctx, request)
        );
        let created = [a?, b?].iter().filter(|outcome| outcome.is_created()).count();
        assert_eq!(created, 1);
        Ok(())
    }
}
