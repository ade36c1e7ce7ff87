//! # codesync-infra
//!
//! Runtime composition: wiring ports from a validated config, the polling
//! scheduler with per-kind worker pools, and status reports.
//! This crate depends on `app`, `adapters`, `config`, and `shared`.

/// Config loading helpers used by CLI surfaces.
pub mod config_check;
/// Environment validation helpers used by CLI surfaces.
pub mod env_check;
/// Blocking entry points for local runs.
pub mod local;
/// Job status reports.
pub mod report;
/// Polling scheduler and worker pools.
pub mod scheduler;
/// Runtime wiring.
pub mod wiring;

pub use config_check::{
    ConfigRenderFormat, ConfigSummary, ConnectionIssue, ConnectionSummary, check_connection_file,
    load_effective_config_json, load_validated_config, render_effective_config, summarize_config,
};
pub use env_check::{InfraError, InfraResult, parse_env, validate_env_parsing};
pub use local::{
    DEFAULT_MAX_ROUNDS, LocalPlanRequest, LocalSyncOutcome, LocalSyncRequest, read_local_status,
    run_local_plan, run_local_sync,
};
pub use report::{
    EntitySummary, StatusCounts, StatusReport, StatusRequest, build_status_report, parse_entity,
};
pub use scheduler::{Scheduler, TickReport};
pub use wiring::{
    Observability, Runtime, RuntimePorts, SchedulerSettings, StateLayout, build_local_runtime,
    build_runtime, connection_set, job_policy, preview_sync_plan, secret_manager_from_env,
};

// Re-export redaction utilities for CLI boundary sanitization
pub use codesync_shared::{is_secret_key, redact_if_secret};

/// Returns the infra crate version.
#[must_use]
pub const fn infra_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;
    use codesync_adapters::adapters_crate_version;
    use codesync_app::app_crate_version;
    use codesync_config::config_crate_version;
    use codesync_shared::shared_crate_version;

    fn workspace_deps() -> Vec<String> {
        let cargo_toml = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml"));
        let mut deps = Vec::new();
        let mut in_deps = false;

        for raw_line in cargo_toml.lines() {
            let line = raw_line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('[') {
                in_deps = line == "[dependencies]";
                continue;
            }
            if in_deps && line.starts_with("codesync-") {
                let key = line.split('=').next().unwrap_or("").trim();
                deps.push(key.split('.').next().unwrap_or("").trim().to_owned());
            }
        }
        deps
    }

    #[test]
    fn infra_depends_on_app_adapters_config() {
        let deps = workspace_deps();
        for expected in ["codesync-app", "codesync-adapters", "codesync-config"] {
            assert!(
                deps.iter().any(|dep| dep == expected),
                "missing dependency: {expected}"
            );
        }
        assert!(!deps.iter().any(|dep| dep == "codesync-testkit"));
    }

    #[test]
    fn infra_can_use_app_adapters_config_shared() {
        assert!(!infra_crate_version().is_empty());
        assert!(!app_crate_version().is_empty());
        assert!(!adapters_crate_version().is_empty());
        assert!(!config_crate_version().is_empty());
        assert!(!shared_crate_version().is_empty());
    }
}
