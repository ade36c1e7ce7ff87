//! Blocking entry points for local runs.
//!
//! Each call builds its own tokio runtime, so CLI handlers stay synchronous.

use crate::config_check::load_validated_config;
use crate::env_check::parse_env;
use crate::report::{StatusReport, StatusRequest, build_status_report};
use crate::scheduler::{Scheduler, TickReport};
use crate::wiring::{
    Observability, StateLayout, build_local_runtime, preview_sync_plan, secret_manager_from_env,
};
use crate::{InfraError, InfraResult};
use codesync_adapters::{FileJobStore, FixtureRepoLister, ProcessEnv};
use codesync_app::{SecretResolver, SyncPlanDeps};
use codesync_domain::{ConnectionName, SyncPlan};
use codesync_shared::{ErrorEnvelope, RequestContext};
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Rounds `sync --once` runs before giving up on reaching idle.
pub const DEFAULT_MAX_ROUNDS: usize = 8;

/// Inputs for a local plan preview.
#[derive(Debug, Clone)]
pub struct LocalPlanRequest {
    /// Config file; falls back to `CODESYNC_CONFIG`.
    pub config_path: Option<PathBuf>,
    /// Connection to plan.
    pub connection: ConnectionName,
    /// Candidate listings fixture.
    pub candidates_path: PathBuf,
}

/// Inputs for a local sync run.
#[derive(Debug, Clone)]
pub struct LocalSyncRequest {
    /// Config file; falls back to `CODESYNC_CONFIG`.
    pub config_path: Option<PathBuf>,
    /// Candidate listings fixture.
    pub candidates_path: PathBuf,
    /// State directory.
    pub state_dir: PathBuf,
    /// Stop once no work is left instead of polling until interrupted.
    pub once: bool,
    /// Round limit for `once`.
    pub max_rounds: usize,
}

/// Result of a local sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalSyncOutcome {
    /// Scheduler counts summed over the run.
    pub ticks: TickReport,
    /// Job state after the run.
    pub report: StatusReport,
}

/// Build the sync plan for one connection from a candidates fixture.
pub fn run_local_plan(
    env: &BTreeMap<String, String>,
    request: &LocalPlanRequest,
    observability: Observability,
) -> InfraResult<SyncPlan> {
    let config = load_validated_config(env, request.config_path.as_deref())?;
    let secret_manager = secret_manager_from_env(&parse_env(env)?)?;

    run_async_with_ctx(RequestContext::new_request(), |ctx| async move {
        let lister = FixtureRepoLister::load(&request.candidates_path).await?;
        let deps = SyncPlanDeps {
            secrets: SecretResolver::new(Arc::new(ProcessEnv), secret_manager),
            lister: Arc::new(lister),
            logger: observability.logger,
            telemetry: observability.telemetry,
        };
        preview_sync_plan(&ctx, &config, &request.connection, deps).await
    })
}

/// Sync every configured connection against a candidates fixture, with
/// state kept under `request.state_dir`.
///
/// Without `once`, polls until Ctrl-C.
pub fn run_local_sync(
    env: &BTreeMap<String, String>,
    request: &LocalSyncRequest,
    observability: Observability,
) -> InfraResult<LocalSyncOutcome> {
    let config = load_validated_config(env, request.config_path.as_deref())?;
    let secret_manager = secret_manager_from_env(&parse_env(env)?)?;
    let layout = StateLayout::new(&request.state_dir);
    std::fs::create_dir_all(layout.root()).map_err(|error| {
        ErrorEnvelope::from(error).with_metadata("path", layout.root().display().to_string())
    })?;

    run_async_with_ctx(RequestContext::new_request(), |ctx| async move {
        let lister = FixtureRepoLister::load(&request.candidates_path).await?;
        let runtime = build_local_runtime(
            &config,
            &layout,
            Arc::new(lister),
            Arc::new(ProcessEnv),
            secret_manager,
            observability,
        );
        let store = Arc::clone(&runtime.deps.store);
        let scheduler = Scheduler::new(runtime);

        let ticks = if request.once {
            scheduler.run_until_idle(&ctx, request.max_rounds.max(1)).await?
        } else {
            let watcher = spawn_interrupt_watcher(&ctx);
            let ticks = scheduler.run(&ctx).await;
            watcher.abort();
            ticks?
        };

        let report = build_status_report(&ctx, store.as_ref(), StatusRequest::default()).await?;
        tracing::info!(
            dispatched = ticks.dispatched,
            jobs = report.jobs.len(),
            "local sync finished"
        );
        Ok(LocalSyncOutcome { ticks, report })
    })
}

/// Read job status from a state directory.
pub fn read_local_status(state_dir: &Path, request: StatusRequest) -> InfraResult<StatusReport> {
    let store = FileJobStore::new(StateLayout::new(state_dir).jobs_path());
    run_async_with_ctx(RequestContext::new_request(), |ctx| async move {
        build_status_report(&ctx, &store, request).await
    })
}

fn run_async_with_ctx<F, T>(
    ctx: RequestContext,
    op: impl FnOnce(RequestContext) -> F,
) -> InfraResult<T>
where
    F: Future<Output = Result<T, ErrorEnvelope>>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(InfraError::from)?;
    runtime.block_on(async { op(ctx).await })
}

fn spawn_interrupt_watcher(ctx: &RequestContext) -> tokio::task::JoinHandle<()> {
    let ctx = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, stopping scheduler");
            ctx.cancel();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use codesync_testkit::fixtures::fixture_path;

    fn temp_state_dir() -> PathBuf {
        std::env::temp_dir().join(format!("codesync-local-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn missing_candidates_file_is_reported() -> codesync_shared::Result<()> {
        let request = LocalPlanRequest {
            config_path: Some(fixture_path("config/codesync.valid.json")),
            connection: ConnectionName::parse("acme-github")?,
            candidates_path: PathBuf::from("/definitely/not/candidates.json"),
        };
        let error = run_local_plan(&BTreeMap::new(), &request, Observability::default()).err();
        assert!(error.is_some_and(|error| error.metadata_value("path").is_some()));
        Ok(())
    }

    #[test]
    fn status_of_an_empty_state_dir_lists_nothing() -> codesync_shared::Result<()> {
        let state = temp_state_dir();
        let report = read_local_status(&state, StatusRequest::default())?;
        assert!(report.jobs.is_empty());
        assert!(report.counts.is_empty());
        Ok(())
    }

    #[test]
    fn sync_once_without_configured_connections_is_idle() -> codesync_shared::Result<()> {
        let state = temp_state_dir();
        let config = state.join("empty.json");
        std::fs::create_dir_all(&state)?;
        std::fs::write(&config, r#"{ "version": 1, "connections": {} }"#)?;

        let request = LocalSyncRequest {
            config_path: Some(config),
            candidates_path: fixture_path("candidates/acme.json"),
            state_dir: state.clone(),
            once: true,
            max_rounds: DEFAULT_MAX_ROUNDS,
        };
        let outcome = run_local_sync(&BTreeMap::new(), &request, Observability::default())?;

        assert_eq!(outcome.ticks.dispatched, 0);
        assert!(outcome.report.jobs.is_empty());
        let _ = std::fs::remove_dir_all(state);
        Ok(())
    }
}
