//! # codesync-domain
//!
//! Domain model for connection configuration, sync planning, and job tracking.
//!
//! - **Primitives** - `ConnectionName`, `RepoIdentity`, `JobId`, `EntityRef`
//! - **Connections** - the `ConnectionConfig` sum type and normalized selectors
//! - **Secrets** - `SecretRef` and secret-manager resource paths
//! - **Repos and plans** - `CandidateRepo`, `RevisionSelection`, `SyncPlan`
//! - **Jobs** - `JobRecord` and the status state machine
//! - **Glob** - the pattern dialect shared by every filter
//!
//! ## Dependency Rules
//!
//! - Depends only on `shared` crate
//! - No infrastructure or adapter dependencies
//! - Pure domain logic with no I/O

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub use codesync_shared::shared_crate_version;

pub mod catalog;
pub mod connection;
pub mod failure;
pub mod glob;
pub mod jobs;
pub mod plan;
pub mod primitives;
pub mod repo;
pub mod secret;

pub use catalog::RepoRecord;
pub use connection::{
    AzureDevOpsConnection, AzureDevOpsDeploymentType, AzureDevOpsExclude, BitbucketConnection,
    BitbucketDeploymentType, BitbucketExclude, CodeHostType, ConnectionConfig, ExclusionRules,
    GerritConnection, GerritExclude, GitConnection, GiteaConnection, GiteaExclude,
    GithubConnection, GithubExclude, GitlabAccessLevel, GitlabConnection, GitlabExclude,
    InclusionSelectors, RevisionsConfig, SizeRange,
};
pub use failure::FailureKind;
pub use glob::{GlobError, GlobList, validate_glob};
pub use jobs::{
    JobKind, JobRecord, JobStatus, JobTransition, TIMEOUT_ERROR_MESSAGE, TransitionRejected,
};
pub use plan::{MAX_REVISIONS, PlanDiff, RevisionSelection, SyncPlan, SyncPlanEntry, SyncWarning};
pub use primitives::{
    ConnectionName, EntityRef, JobId, PrimitiveError, RepoIdentity, is_simple_name,
};
pub use repo::{CandidateRepo, RepoVisibility};
pub use secret::{InvalidSecretPath, SecretRef, SecretResourcePath};

/// Returns the domain crate version.
#[must_use]
pub const fn domain_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_crate_compiles() {
        assert!(!domain_crate_version().is_empty());
        assert!(!shared_crate_version().is_empty());
    }
}
