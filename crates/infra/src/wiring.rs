//! Compose job dependencies from a validated config.
//!
//! Local runs keep all state under one directory:
//!
//! ```text
//! <state>/jobs.json       job records (file-locked)
//! <state>/catalog.json    repository catalog (file-locked)
//! <state>/manifests/      one indexer manifest per repository
//! ```

use crate::InfraResult;
use codesync_adapters::{
    FileCatalog, FileJobStore, GcpSecretManager, GcpSecretManagerConfig, ManifestIndexer,
    SystemClock,
};
use codesync_app::{
    ConnectionSet, JobDeps, JobPolicy, SecretResolver, SyncPlanDeps, build_sync_plan,
};
use codesync_config::{CodesyncEnv, ValidatedConfig, ValidatedSettings};
use codesync_domain::{ConnectionName, JobKind, SyncPlan};
use codesync_ports::{
    CatalogPort, ClockPort, EnvironmentPort, IndexerPort, JobStorePort, LoggerPort,
    RepoListerPort, SecretManagerPort, TelemetryPort,
};
use codesync_shared::{ErrorCode, ErrorEnvelope, RequestContext};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Job timing derived from settings.
#[must_use]
pub const fn job_policy(settings: &ValidatedSettings) -> JobPolicy {
    JobPolicy {
        resync_connection_interval_ms: settings.resync_connection_interval_ms(),
        reindex_interval_ms: settings.reindex_interval_ms(),
        connection_sync_timeout: settings.connection_sync_timeout(),
        repo_index_timeout: settings.repo_index_timeout(),
        gc_grace_period_ms: settings.repo_garbage_collection_grace_period_ms(),
        rate_limit_backoff_base_ms: settings.rate_limit_backoff_base_ms(),
        rate_limit_backoff_max_ms: settings.rate_limit_backoff_max_ms(),
    }
}

/// Every configured connection, rejected ones included so their syncs abort
/// with a recorded failure.
#[must_use]
pub fn connection_set(config: &ValidatedConfig) -> ConnectionSet {
    let mut set = ConnectionSet::new();
    for (name, connection) in config.connections() {
        set.insert_valid(name.clone(), connection.clone());
    }
    for (name, error) in config.rejected() {
        set.insert_rejected(name.clone(), error.clone());
    }
    set
}

/// Polling cadence and pool sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// How often connections are checked for a due sync.
    pub connection_poll: Duration,
    /// How often repositories are checked for due indexing and GC.
    pub repo_poll: Duration,
    /// Concurrent connection syncs.
    pub sync_concurrency: usize,
    /// Concurrent repository indexes.
    pub index_concurrency: usize,
    /// Concurrent garbage collections.
    pub gc_concurrency: usize,
}

impl SchedulerSettings {
    /// Read cadence and pool sizes from settings.
    #[must_use]
    pub const fn from_settings(settings: &ValidatedSettings) -> Self {
        Self {
            connection_poll: settings.resync_connection_polling_interval(),
            repo_poll: settings.reindex_repo_polling_interval(),
            sync_concurrency: settings.max_connection_sync_job_concurrency(),
            index_concurrency: settings.max_repo_indexing_job_concurrency(),
            gc_concurrency: settings.max_repo_garbage_collection_job_concurrency(),
        }
    }

    /// Pool size for `kind`.
    #[must_use]
    pub const fn concurrency(&self, kind: JobKind) -> usize {
        match kind {
            JobKind::ConnectionSync => self.sync_concurrency,
            JobKind::RepoIndex => self.index_concurrency,
            JobKind::RepoGarbageCollection => self.gc_concurrency,
        }
    }
}

/// File locations for local state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateLayout {
    root: PathBuf,
}

impl StateLayout {
    /// Layout rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// State directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Job store file.
    #[must_use]
    pub fn jobs_path(&self) -> PathBuf {
        self.root.join("jobs.json")
    }

    /// Catalog file.
    #[must_use]
    pub fn catalog_path(&self) -> PathBuf {
        self.root.join("catalog.json")
    }

    /// Indexer manifest directory.
    #[must_use]
    pub fn manifests_dir(&self) -> PathBuf {
        self.root.join("manifests")
    }
}

/// Secret Manager client, when an access token is configured.
pub fn secret_manager_from_env(
    env: &CodesyncEnv,
) -> InfraResult<Option<Arc<dyn SecretManagerPort>>> {
    let Some(token) = env.gcp_access_token.clone() else {
        return Ok(None);
    };
    let mut config = GcpSecretManagerConfig::new(token);
    config.base_url = env.gcp_secret_manager_url.clone();
    let manager = GcpSecretManager::new(config)?;
    Ok(Some(Arc::new(manager)))
}

/// Logger and telemetry sinks shared by every use case.
#[derive(Clone, Default)]
pub struct Observability {
    /// Structured logger.
    pub logger: Option<Arc<dyn LoggerPort>>,
    /// Counters and timers.
    pub telemetry: Option<Arc<dyn TelemetryPort>>,
}

/// Ports a runtime is built from.
#[derive(Clone)]
pub struct RuntimePorts {
    /// Job store.
    pub store: Arc<dyn JobStorePort>,
    /// Repository catalog.
    pub catalog: Arc<dyn CatalogPort>,
    /// Indexer hand-off.
    pub indexer: Arc<dyn IndexerPort>,
    /// Code-host lister.
    pub lister: Arc<dyn RepoListerPort>,
    /// Environment for `env` secret references.
    pub env: Arc<dyn EnvironmentPort>,
    /// Secret Manager for `googleCloudSecret` references.
    pub secret_manager: Option<Arc<dyn SecretManagerPort>>,
    /// Wall clock.
    pub clock: Arc<dyn ClockPort>,
    /// Logging and telemetry.
    pub observability: Observability,
}

/// Everything the scheduler needs.
#[derive(Clone)]
pub struct Runtime {
    /// Job dependencies.
    pub deps: JobDeps,
    /// Job timing.
    pub policy: JobPolicy,
    /// Polling cadence and pool sizes.
    pub scheduler: SchedulerSettings,
}

/// Build a runtime from explicit ports.
#[must_use]
pub fn build_runtime(config: &ValidatedConfig, ports: RuntimePorts) -> Runtime {
    let deps = JobDeps {
        store: ports.store,
        catalog: ports.catalog,
        indexer: ports.indexer,
        lister: ports.lister,
        secrets: SecretResolver::new(ports.env, ports.secret_manager),
        connections: Arc::new(connection_set(config)),
        clock: ports.clock,
        logger: ports.observability.logger,
        telemetry: ports.observability.telemetry,
    };
    Runtime {
        deps,
        policy: job_policy(config.settings()),
        scheduler: SchedulerSettings::from_settings(config.settings()),
    }
}

/// Build a runtime whose state lives in `layout`: file-backed jobs and
/// catalog, manifest indexer, system clock.
#[must_use]
pub fn build_local_runtime(
    config: &ValidatedConfig,
    layout: &StateLayout,
    lister: Arc<dyn RepoListerPort>,
    env: Arc<dyn EnvironmentPort>,
    secret_manager: Option<Arc<dyn SecretManagerPort>>,
    observability: Observability,
) -> Runtime {
    let ports = RuntimePorts {
        store: Arc::new(
            FileJobStore::new(layout.jobs_path())
                .with_retention(config.settings().max_terminal_jobs_per_entity()),
        ),
        catalog: Arc::new(FileCatalog::new(layout.catalog_path())),
        indexer: Arc::new(ManifestIndexer::new(layout.manifests_dir())),
        lister,
        env,
        secret_manager,
        clock: Arc::new(SystemClock),
        observability,
    };
    build_runtime(config, ports)
}

/// Build the sync plan for one configured connection without touching job
/// state.
pub async fn preview_sync_plan(
    ctx: &RequestContext,
    config: &ValidatedConfig,
    connection: &ConnectionName,
    deps: SyncPlanDeps,
) -> InfraResult<SyncPlan> {
    let input = connection_set(config).sync_input(connection).ok_or_else(|| {
        ErrorEnvelope::expected(
            ErrorCode::not_found(),
            format!("connection `{connection}` is not configured"),
        )
        .with_metadata("connection", connection.as_str())
    })?;
    build_sync_plan(ctx, &deps, input).await
}
