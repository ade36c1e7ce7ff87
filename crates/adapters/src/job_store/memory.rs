use super::JobTable;
use codesync_domain::{JobId, JobRecord, JobTransition};
use codesync_ports::{BoxFuture, CreateJobOutcome, JobQuery, JobStorePort, NewJob};
use codesync_shared::{RequestContext, Result};
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct State {
    table: JobTable,
    next_id: u64,
}

/// Process-local job store with sequential ids (`job-1`, `job-2`, ...).
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    state: Mutex<State>,
    retention: Option<usize>,
}

impl InMemoryJobStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `keep` finished jobs per entity.
    #[must_use]
    pub fn with_retention(mut self, keep: usize) -> Self {
        self.retention = Some(keep);
        self
    }

    /// Copy of the current table.
    pub async fn snapshot(&self) -> JobTable {
        self.state.lock().await.table.clone()
    }
}

impl JobStorePort for InMemoryJobStore {
    fn create_job<'a>(
        &'a self,
        ctx: &'a RequestContext,
        request: NewJob,
    ) -> BoxFuture<'a, Result<CreateJobOutcome>> {
        Box::pin(async move {
            ctx.ensure_not_cancelled("job_store.create")?;
            let mut state = self.state.lock().await;
            let id = JobId::parse(format!("job-{}", state.next_id + 1))?;
            let outcome = state.table.create(id, request)?;
            if outcome.is_created() {
                state.next_id += 1;
            }
            Ok(outcome)
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
            self.state
                .lock()
                .await
                .table
                .transition_retaining(id, &transition, self.retention)
        })
    }

    fn get_job<'a>(
        &'a self,
        ctx: &'a RequestContext,
        id: &'a JobId,
    ) -> BoxFuture<'a, Result<Option<JobRecord>>> {
        Box::pin(async move {
            ctx.ensure_not_cancelled("job_store.get")?;
            Ok(self.state.lock().await.table.get(id))
        })
    }

    fn list_jobs<'a>(
        &'a self,
        ctx: &'a RequestContext,
        query: JobQuery,
    ) -> BoxFuture<'a, Result<Vec<JobRecord>>> {
        Box::pin(async move {
            ctx.ensure_not_cancelled("job_store.list")?;
            Ok(self.state.lock().await.table.list(&query))
        })
    }
}
