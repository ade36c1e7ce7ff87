//! `plan`: preview one connection's sync plan.

use crate::error::{CliError, ExitCode};
use crate::observability::observability;
use crate::{CliOutput, Invocation, format_error_output, format_success, log_info};
use codesync_domain::{ConnectionName, SyncPlan};
use codesync_infra::{LocalPlanRequest, run_local_plan};
use codesync_shared::ErrorEnvelope;
use std::fmt::Write as _;
use std::path::Path;

/// Build and print the plan. Nothing is written to job or catalog state.
pub fn run_plan(
    invocation: &Invocation<'_>,
    connection: &str,
    candidates: &Path,
) -> Result<CliOutput, CliError> {
    let mode = invocation.mode;
    let connection = match ConnectionName::parse(connection) {
        Ok(name) => name,
        Err(error) => return Ok(format_error_output(mode, &ErrorEnvelope::from(error))),
    };
    let request = LocalPlanRequest {
        config_path: invocation.config_path.map(Path::to_path_buf),
        connection,
        candidates_path: candidates.to_path_buf(),
    };
    let plan = match run_local_plan(invocation.env, &request, observability(false)) {
        Ok(plan) => plan,
        Err(error) => return Ok(format_error_output(mode, &error)),
    };

    let mut stderr = String::new();
    log_info(
        &mut stderr,
        &format!("planned {} repositories", plan.entries.len()),
        mode.no_progress,
    );

    let payload = serde_json::json!({ "plan": plan });
    let stdout = format_success(mode, "plan", "ok", payload, || format_plan_text(&plan))?;

    Ok(CliOutput {
        stdout,
        stderr,
        exit_code: ExitCode::Ok,
    })
}

fn format_plan_text(plan: &SyncPlan) -> String {
    let mut out = String::from("status: ok\n");
    let _ = writeln!(out, "connection: {} ({})", plan.connection, plan.code_host);
    let _ = writeln!(out, "repos: {}", plan.entries.len());
    for entry in &plan.entries {
        let _ = write!(out, "  {}", entry.identity);
        if !entry.revisions.branches.is_empty() {
            let _ = write!(out, "  branches: {}", entry.revisions.branches.join(", "));
        }
        if !entry.revisions.tags.is_empty() {
            let _ = write!(out, "  tags: {}", entry.revisions.tags.join(", "));
        }
        if entry.token.is_some() {
            out.push_str("  (authenticated)");
        }
        out.push('\n');
    }
    if !plan.warnings.is_empty() {
        let _ = writeln!(out, "warnings: {}", plan.warnings.len());
        for warning in &plan.warnings {
            let _ = writeln!(out, "  {}", warning.message());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use codesync_domain::{CodeHostType, RepoIdentity, RevisionSelection, SyncPlanEntry, SyncWarning};
    use codesync_shared::SecretString;

    #[test]
    fn plan_text_lists_revisions_and_warnings() -> codesync_shared::Result<()> {
        let identity = RepoIdentity::parse("github.com/acme/api")?;
        let plan = SyncPlan {
            connection: ConnectionName::parse("acme-github")?,
            code_host: CodeHostType::Github,
            entries: vec![SyncPlanEntry {
                identity: identity.clone(),
                name: "acme/api".into(),
                clone_url: "https://github.com/acme/api.git".into(),
                revisions: RevisionSelection {
                    branches: vec!["main".into(), "release".into()],
                    tags: vec!["v1.0.0".into()],
                },
                token: Some(SecretString::from("ghp_example")),
            }],
            warnings: vec![SyncWarning::DuplicateRepoInConnection {
                identity,
                name: "acme/API".into(),
            }],
        };

        let text = format_plan_text(&plan);
        assert!(text.contains("connection: acme-github (github)\n"));
        assert!(text.contains(
            "  github.com/acme/api  branches: main, release  tags: v1.0.0  (authenticated)\n"
        ));
        assert!(text.contains("warnings: 1\n"));
        assert!(!text.contains("ghp_example"));
        Ok(())
    }
}
