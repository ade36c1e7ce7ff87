//! Build the sync plan of one connection.
//!
//! Resolve the token, list candidates, filter them, select revisions, and
//! dedupe by identity. Code-host errors fail the build; per-repo problems
//! become warnings on the plan.

use crate::exclusion::ExclusionFilter;
use crate::log_fields::{duration_ms, fields};
use crate::revisions::RevisionMatcher;
use crate::secret_resolver::SecretResolver;
use codesync_domain::{
    ConnectionConfig, ConnectionName, FailureKind, SyncPlan, SyncPlanEntry, SyncWarning,
};
use codesync_ports::{LogFields, LoggerPort, RepoListerPort, TelemetryPort, telemetry_tags};
use codesync_shared::{ErrorEnvelope, RequestContext, Result};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// Input for [`build_sync_plan`].
#[derive(Debug, Clone)]
pub struct SyncPlanInput {
    /// Connection being planned.
    pub connection: ConnectionName,
    /// Parsed config, or the error that rejected it.
    pub config: std::result::Result<ConnectionConfig, ErrorEnvelope>,
}

/// Dependencies required by [`build_sync_plan`].
#[derive(Clone)]
pub struct SyncPlanDeps {
    /// Token resolver.
    pub secrets: SecretResolver,
    /// Code-host lister.
    pub lister: Arc<dyn RepoListerPort>,
    /// Optional logger.
    pub logger: Option<Arc<dyn LoggerPort>>,
    /// Optional telemetry sink.
    pub telemetry: Option<Arc<dyn TelemetryPort>>,
}

/// Build the plan for one connection.
///
/// A rejected config fails with `SyncAborted` before anything is resolved or
/// listed. Running twice against the same listing yields the same plan.
#[tracing::instrument(skip_all, fields(connection = %input.connection))]
pub async fn build_sync_plan(
    ctx: &RequestContext,
    deps: &SyncPlanDeps,
    input: SyncPlanInput,
) -> Result<SyncPlan> {
    let started_at = Instant::now();
    let SyncPlanInput { connection, config } = input;

    if let Some(logger) = deps.logger.as_ref() {
        logger.info(
            "sync.plan.start",
            "Sync plan started",
            Some(fields([("connection", Value::from(connection.as_str()))])),
        );
    }

    let result: Result<SyncPlan> = (async {
        let config = config.map_err(|cause| sync_aborted(&connection, &cause))?;
        ctx.ensure_not_cancelled("build_sync_plan.start")?;

        let filter = ExclusionFilter::from_config(&config)
            .map_err(|error| sync_aborted(&connection, &ErrorEnvelope::from(error)))?;
        let matcher = RevisionMatcher::new(config.revisions())
            .map_err(|error| sync_aborted(&connection, &ErrorEnvelope::from(error)))?;

        let token = deps.secrets.resolve_optional(ctx, config.token()).await?;

        ctx.ensure_not_cancelled("build_sync_plan.list")?;
        let candidates = ctx
            .run_cancellable(
                "build_sync_plan.list",
                deps.lister
                    .list_candidates(ctx, &connection, &config, token.as_ref()),
            )
            .await?;
        let listed = candidates.len();

        let mut entries = Vec::new();
        let mut warnings = Vec::new();
        let mut seen = HashSet::new();
        let mut excluded = 0_u64;
        for repo in candidates {
            if let Some(reason) = filter.exclusion_reason(&repo) {
                excluded += 1;
                if let Some(logger) = deps.logger.as_ref() {
                    logger.debug(
                        "sync.plan.excluded",
                        "Candidate excluded",
                        Some(fields([
                            ("connection", Value::from(connection.as_str())),
                            ("repo", Value::from(&*repo.name)),
                            ("reason", Value::from(reason.as_str())),
                        ])),
                    );
                }
                continue;
            }

            let Ok(identity) = repo.identity() else {
                warnings.push(SyncWarning::UnidentifiableRepo { name: repo.name });
                continue;
            };
            if !seen.insert(identity.clone()) {
                if let Some(logger) = deps.logger.as_ref() {
                    logger.warn(
                        "sync.plan.duplicate",
                        "Duplicate repository in listing; keeping the first occurrence",
                        Some(fields([
                            ("connection", Value::from(connection.as_str())),
                            ("identity", Value::from(identity.as_str())),
                        ])),
                    );
                }
                warnings.push(SyncWarning::DuplicateRepoInConnection {
                    identity,
                    name: repo.name,
                });
                continue;
            }

            let revisions = matcher.select(&repo.branches, &repo.tags, &repo.default_branch);
            entries.push(SyncPlanEntry {
                identity,
                name: repo.name,
                clone_url: repo.clone_url,
                revisions,
                token: token.clone(),
            });
        }

        if let Some(telemetry) = deps.telemetry.as_ref() {
            let tags = telemetry_tags([("codeHost", config.kind().as_str())]);
            telemetry.increment_counter("sync.plan.listed", count(listed), Some(&tags));
            telemetry.increment_counter("sync.plan.excluded", excluded, Some(&tags));
            telemetry.increment_counter("sync.plan.repos", count(entries.len()), Some(&tags));
            let duplicates = warnings
                .iter()
                .filter(|warning| matches!(warning, SyncWarning::DuplicateRepoInConnection { .. }))
                .count();
            telemetry.increment_counter("sync.plan.duplicates", count(duplicates), Some(&tags));
        }

        Ok(SyncPlan {
            connection: connection.clone(),
            code_host: config.kind(),
            entries,
            warnings,
        })
    })
    .await;

    let duration_ms = duration_ms(started_at);
    if let Some(telemetry) = deps.telemetry.as_ref() {
        telemetry.record_timer_ms("sync.plan.total", duration_ms, None);
    }

    match result {
        Ok(plan) => {
            if let Some(logger) = deps.logger.as_ref() {
                logger.info(
                    "sync.plan.completed",
                    "Sync plan completed",
                    Some(log_fields_completed(&plan, duration_ms)),
                );
            }
            Ok(plan)
        },
        Err(error) => {
            let event = if error.is_cancelled() {
                "sync.plan.aborted"
            } else {
                "sync.plan.failed"
            };
            if let Some(telemetry) = deps.telemetry.as_ref() {
                telemetry.increment_counter(event, 1, None);
            }
            if let Some(logger) = deps.logger.as_ref() {
                let fields = fields([
                    ("connection", Value::from(connection.as_str())),
                    ("durationMs", Value::from(duration_ms)),
                ]);
                if error.is_cancelled() {
                    logger.info(event, "Sync plan aborted", Some(fields));
                } else {
                    logger.error(event, &error, Some(fields));
                }
            }
            Err(error)
        },
    }
}

/// `SyncAborted` error for a connection whose config cannot be used.
///
/// The message carries the causing kind, e.g.
/// `connection `x` cannot sync: MissingRequiredField: ...`.
pub fn sync_aborted(connection: &ConnectionName, cause: &ErrorEnvelope) -> ErrorEnvelope {
    let cause_kind = FailureKind::from_code(&cause.code);
    let mut error = FailureKind::SyncAborted
        .envelope(format!(
            "connection `{connection}` cannot sync: {cause_kind}: {}",
            cause.message
        ))
        .with_metadata("connection", connection.as_str())
        .with_metadata("cause", cause.code.to_string());
    if let Some(field) = cause.metadata_value("field") {
        error = error.with_metadata("field", field);
    }
    error
}

fn count(value: usize) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

fn log_fields_completed(plan: &SyncPlan, duration_ms: u64) -> LogFields {
    fields([
        ("connection", Value::from(plan.connection.as_str())),
        ("codeHost", Value::from(plan.code_host.as_str())),
        ("repos", Value::from(plan.entries.len())),
        ("warnings", Value::from(plan.warnings.len())),
        ("durationMs", Value::from(duration_ms)),
    ])
}
