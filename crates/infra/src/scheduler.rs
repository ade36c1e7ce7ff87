//! Polling scheduler with one bounded worker pool per job kind.
//!
//! Each tick sweeps timed-out jobs, creates the jobs that are due, and hands
//! pending jobs to the pool for their kind. A job that finds its pool full
//! stays `PENDING` and is picked up by a later tick. Claiming still goes
//! through the store, so two schedulers sharing one store never run the same
//! job twice.

use crate::InfraResult;
use crate::wiring::Runtime;
use codesync_app::{
    JobRun, expire_timed_out_jobs, pending_jobs, release_unconfigured_connections, run_job,
    schedule_due_connections, schedule_due_repos, schedule_garbage_collection,
};
use codesync_domain::{JobId, JobKind, JobRecord};
use codesync_ports::LogFields;
use codesync_shared::{RequestContext, WorkerPool};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::time::MissedTickBehavior;

/// Counts from one or more ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    /// Running jobs failed by the timeout sweep.
    pub expired: usize,
    /// Jobs created because they were due.
    pub scheduled: usize,
    /// Pending jobs handed to a worker.
    pub dispatched: usize,
    /// Pending jobs left waiting for a free slot.
    pub deferred: usize,
}

impl TickReport {
    fn merge(&mut self, other: Self) {
        self.expired += other.expired;
        self.scheduled += other.scheduled;
        self.dispatched += other.dispatched;
        self.deferred += other.deferred;
    }

    const fn is_idle(&self) -> bool {
        self.dispatched == 0 && self.deferred == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TickScope {
    Connections,
    Repos,
    All,
}

impl TickScope {
    const fn kinds(self) -> &'static [JobKind] {
        match self {
            Self::Connections => &[JobKind::ConnectionSync],
            Self::Repos => &[JobKind::RepoIndex, JobKind::RepoGarbageCollection],
            Self::All => &JobKind::ALL,
        }
    }
}

struct Pools {
    sync: WorkerPool,
    index: WorkerPool,
    gc: WorkerPool,
}

impl Pools {
    const fn get(&self, kind: JobKind) -> &WorkerPool {
        match kind {
            JobKind::ConnectionSync => &self.sync,
            JobKind::RepoIndex => &self.index,
            JobKind::RepoGarbageCollection => &self.gc,
        }
    }
}

/// Drives scheduling and execution for one runtime.
pub struct Scheduler {
    runtime: Runtime,
    pools: Pools,
    dispatched: Arc<Mutex<BTreeSet<JobId>>>,
}

impl Scheduler {
    /// Scheduler with pools sized from the runtime's settings.
    #[must_use]
    pub fn new(runtime: Runtime) -> Self {
        let settings = runtime.scheduler;
        let pools = Pools {
            sync: WorkerPool::new(
                "connection-sync",
                settings.concurrency(JobKind::ConnectionSync),
            ),
            index: WorkerPool::new("repo-index", settings.concurrency(JobKind::RepoIndex)),
            gc: WorkerPool::new(
                "repo-gc",
                settings.concurrency(JobKind::RepoGarbageCollection),
            ),
        };
        Self {
            runtime,
            pools,
            dispatched: Arc::new(Mutex::new(BTreeSet::new())),
        }
    }

    /// The runtime this scheduler drives.
    #[must_use]
    pub const fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Worker pool for `kind`.
    #[must_use]
    pub const fn pool(&self, kind: JobKind) -> &WorkerPool {
        self.pools.get(kind)
    }

    /// One full pass: sweep, schedule everything due, dispatch every kind.
    pub async fn tick(&self, ctx: &RequestContext) -> InfraResult<TickReport> {
        self.tick_scope(ctx, TickScope::All).await
    }

    /// Wait for every dispatched job to finish.
    pub async fn drain(&self) {
        for kind in JobKind::ALL {
            self.pools.get(kind).drain().await;
        }
    }

    /// Tick and drain until a round dispatches nothing, at most `max_rounds`
    /// times. Syncs finish in one round, the indexing they schedule in the
    /// next.
    #[tracing::instrument(skip_all, fields(max_rounds))]
    pub async fn run_until_idle(
        &self,
        ctx: &RequestContext,
        max_rounds: usize,
    ) -> InfraResult<TickReport> {
        let mut total = TickReport::default();
        for _ in 0..max_rounds {
            let report = self.tick(ctx).await?;
            self.drain().await;
            total.merge(report);
            if report.is_idle() {
                break;
            }
        }
        Ok(total)
    }

    /// Poll until `ctx` is cancelled, then wait for running jobs.
    ///
    /// Connections and repositories poll on their own intervals. A failed
    /// tick is logged and retried on the next interval.
    #[tracing::instrument(skip_all)]
    pub async fn run(&self, ctx: &RequestContext) -> InfraResult<TickReport> {
        let settings = self.runtime.scheduler;
        let mut connection_timer = tokio::time::interval(settings.connection_poll);
        let mut repo_timer = tokio::time::interval(settings.repo_poll);
        connection_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        repo_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut total = TickReport::default();
        loop {
            let scope = tokio::select! {
                biased;
                () = ctx.cancelled() => break,
                _ = connection_timer.tick() => TickScope::Connections,
                _ = repo_timer.tick() => TickScope::Repos,
            };
            match self.tick_scope(ctx, scope).await {
                Ok(report) => total.merge(report),
                Err(error) if error.is_cancelled() => break,
                Err(error) => {
                    tracing::warn!(error = %error, "scheduler tick failed");
                    if let Some(logger) = self.runtime.deps.logger.as_ref() {
                        logger.error("scheduler.tick.failed", &error, None);
                    }
                },
            }
        }
        self.drain().await;
        Ok(total)
    }

    async fn tick_scope(&self, ctx: &RequestContext, scope: TickScope) -> InfraResult<TickReport> {
        let deps = &self.runtime.deps;
        let policy = &self.runtime.policy;
        let mut report = TickReport {
            expired: expire_timed_out_jobs(ctx, deps, policy).await?.len(),
            ..TickReport::default()
        };

        if matches!(scope, TickScope::Connections | TickScope::All) {
            report.scheduled += schedule_due_connections(ctx, deps, policy).await?.len();
        }
        if matches!(scope, TickScope::Repos | TickScope::All) {
            release_unconfigured_connections(ctx, deps).await?;
            report.scheduled += schedule_due_repos(ctx, deps, policy).await?.len();
            report.scheduled += schedule_garbage_collection(ctx, deps, policy).await?.len();
        }
        for kind in scope.kinds() {
            report.merge(self.dispatch_pending(ctx, *kind).await?);
        }

        if report.expired + report.scheduled + report.dispatched > 0
            && let Some(logger) = deps.logger.as_ref()
        {
            logger.debug("scheduler.tick", "Scheduler tick", Some(report_fields(&report)));
        }
        Ok(report)
    }

    async fn dispatch_pending(
        &self,
        ctx: &RequestContext,
        kind: JobKind,
    ) -> InfraResult<TickReport> {
        let pool = self.pools.get(kind);
        let mut report = TickReport::default();
        for job in pending_jobs(ctx, self.runtime.deps.store.as_ref(), kind).await? {
            if !self.mark_dispatched(&job.id) {
                continue;
            }
            let id = job.id.clone();
            match pool.try_spawn(self.job_task(ctx, job)) {
                Ok(()) => report.dispatched += 1,
                Err(_) => {
                    release(&self.dispatched, &id);
                    report.deferred += 1;
                },
            }
        }
        Ok(report)
    }

    fn mark_dispatched(&self, id: &JobId) -> bool {
        self.dispatched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone())
    }

    fn job_task(&self, ctx: &RequestContext, job: JobRecord) -> impl Future<Output = ()> + Send + 'static {
        let ctx = ctx.clone();
        let deps = self.runtime.deps.clone();
        let policy = self.runtime.policy;
        let dispatched = Arc::clone(&self.dispatched);
        async move {
            match run_job(&ctx, &deps, &policy, &job).await {
                Ok(JobRun::Finished(record)) => {
                    tracing::debug!(job = %record.id, status = %record.status, "job finished");
                },
                Ok(JobRun::NotClaimed) => {},
                Err(error) => {
                    if let Some(logger) = deps.logger.as_ref() {
                        let mut fields = LogFields::new();
                        fields.insert("jobId".into(), Value::from(job.id.as_str()));
                        fields.insert("kind".into(), Value::from(job.kind.as_str()));
                        logger.error("scheduler.job.error", &error, Some(fields));
                    }
                },
            }
            release(&dispatched, &job.id);
        }
    }
}

fn release(dispatched: &Mutex<BTreeSet<JobId>>, id: &JobId) {
    dispatched
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(id);
}

fn report_fields(report: &TickReport) -> LogFields {
    let mut fields = LogFields::new();
    fields.insert("expired".into(), Value::from(report.expired));
    fields.insert("scheduled".into(), Value::from(report.scheduled));
    fields.insert("dispatched".into(), Value::from(report.dispatched));
    fields.insert("deferred".into(), Value::from(report.deferred));
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wiring::{Observability, RuntimePorts, build_runtime};
    use codesync_adapters::{InMemoryCatalog, InMemoryJobStore};
    use codesync_config::parse_codesync_config_json;
    use codesync_domain::{JobStatus, RepoIdentity};
    use codesync_ports::{CatalogPort, JobQuery, JobStorePort};
    use codesync_testkit::fixtures::acme_candidates;
    use codesync_testkit::in_memory::{
        ManualClock, MapEnv, RecordingIndexer, RecordingLogger, StaticRepoLister,
    };
    use std::time::Duration;

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    const START_MS: u64 = 1_700_000_000_000;

    fn config(index_concurrency: u32) -> codesync_shared::Result<codesync_config::ValidatedConfig> {
        parse_codesync_config_json(&format!(
            r#"{{
                "version": 1,
                "settings": {{ "maxRepoIndexingJobConcurrency": {index_concurrency} }},
                "connections": {{
                    "acme-github": {{
                        "type": "github",
                        "token": {{ "env": "ACME_GITHUB_TOKEN" }},
                        "orgs": ["acme"],
                        "exclude": {{ "forks": true }}
                    }}
                }}
            }}"#
        ))
    }

    struct Fixture {
        scheduler: Scheduler,
        store: Arc<InMemoryJobStore>,
        catalog: Arc<InMemoryCatalog>,
        indexer: RecordingIndexer,
        logger: RecordingLogger,
    }

    fn fixture(index_concurrency: u32, indexer: RecordingIndexer) -> std::result::Result<Fixture, Box<dyn std::error::Error>> {
        let store = Arc::new(InMemoryJobStore::new());
        let catalog = Arc::new(InMemoryCatalog::new());
        let logger = RecordingLogger::default();
        let ports = RuntimePorts {
            store: store.clone(),
            catalog: catalog.clone(),
            indexer: Arc::new(indexer.clone()),
            lister: Arc::new(StaticRepoLister::from_map(acme_candidates()?)),
            env: Arc::new(MapEnv::new().with("ACME_GITHUB_TOKEN", "ghp_scheduler")),
            secret_manager: None,
            clock: Arc::new(ManualClock::new(START_MS)),
            observability: Observability {
                logger: Some(Arc::new(logger.clone())),
                telemetry: None,
            },
        };
        let runtime = build_runtime(&config(index_concurrency)?, ports);
        Ok(Fixture {
            scheduler: Scheduler::new(runtime),
            store,
            catalog,
            indexer,
            logger,
        })
    }

    #[tokio::test]
    async fn run_until_idle_syncs_then_indexes() -> TestResult {
        let fixture = fixture(8, RecordingIndexer::new())?;
        let ctx = RequestContext::new_request();

        let report = fixture.scheduler.run_until_idle(&ctx, 8).await?;
        assert!(report.dispatched >= 2);

        let syncs = fixture
            .store
            .list_jobs(&ctx, JobQuery::with_status(JobKind::ConnectionSync, JobStatus::Completed))
            .await?;
        assert_eq!(syncs.len(), 1);
        let repos = fixture.catalog.list_repos(&ctx).await?;
        assert!(!repos.is_empty());
        assert_eq!(fixture.indexer.indexed().len(), repos.len());
        assert!(repos.iter().all(|repo| repo.indexed_at_ms.is_some()));
        Ok(())
    }

    #[tokio::test]
    async fn full_pools_leave_jobs_pending() -> TestResult {
        let fixture = fixture(1, RecordingIndexer::new().with_delay(Duration::from_millis(200)))?;
        let ctx = RequestContext::new_request();

        // First round: the sync runs and schedules one index job per repo.
        fixture.scheduler.tick(&ctx).await?;
        fixture.scheduler.drain().await;

        let report = fixture.scheduler.tick(&ctx).await?;
        let pending = fixture
            .store
            .list_jobs(&ctx, JobQuery::active(JobKind::RepoIndex))
            .await?;
        assert_eq!(report.dispatched, 1);
        assert_eq!(report.deferred, pending.len().saturating_sub(1));
        assert_eq!(fixture.scheduler.pool(JobKind::RepoIndex).capacity(), 1);

        fixture.scheduler.drain().await;
        fixture.scheduler.run_until_idle(&ctx, 16).await?;
        assert_eq!(fixture.indexer.indexed().len(), pending.len());
        let active = fixture
            .store
            .list_jobs(&ctx, JobQuery::active(JobKind::RepoIndex))
            .await?;
        assert!(active.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn a_pending_job_is_dispatched_once_per_scheduler() -> TestResult {
        let fixture = fixture(4, RecordingIndexer::new().with_delay(Duration::from_millis(100)))?;
        let ctx = RequestContext::new_request();
        fixture.scheduler.run_until_idle(&ctx, 1).await?;

        let first = fixture.scheduler.dispatch_pending(&ctx, JobKind::RepoIndex).await?;
        let second = fixture.scheduler.dispatch_pending(&ctx, JobKind::RepoIndex).await?;
        assert!(first.dispatched > 0);
        assert_eq!(second.dispatched, 0);
        fixture.scheduler.drain().await;

        let api = RepoIdentity::parse("github.com/acme/api")?;
        let indexed = fixture
            .indexer
            .indexed()
            .into_iter()
            .filter(|entry| entry.identity == api)
            .count();
        assert_eq!(indexed, 1);
        Ok(())
    }

    #[tokio::test]
    async fn run_stops_when_cancelled() -> TestResult {
        let fixture = fixture(2, RecordingIndexer::new())?;
        let ctx = RequestContext::new_request();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            canceller.cancel();
        });

        let report = tokio::time::timeout(Duration::from_secs(5), fixture.scheduler.run(&ctx)).await??;
        assert!(report.dispatched >= 1);
        assert!(fixture.logger.contains("jobs.sync.start"));
        Ok(())
    }
}
