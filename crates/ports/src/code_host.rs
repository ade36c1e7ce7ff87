//! Code host repository listing contract.

use crate::BoxFuture;
use codesync_domain::{CandidateRepo, ConnectionConfig, ConnectionName};
use codesync_shared::{RequestContext, Result, SecretString};

/// Lists the repositories a connection can see, with their branches and tags.
///
/// Implementations own pagination, rate limits, and auth headers. Failures
/// must use the `code_host` error codes (`unreachable`, `rate_limited`,
/// `auth_failed`) so jobs record the right kind; an empty list is only
/// returned when the host genuinely reports no repositories.
pub trait RepoListerPort: Send + Sync {
    /// List candidates for one connection.
    fn list_candidates<'a>(
        &'a self,
        ctx: &'a RequestContext,
        connection: &'a ConnectionName,
        config: &'a ConnectionConfig,
        token: Option<&'a SecretString>,
    ) -> BoxFuture<'a, Result<Vec<CandidateRepo>>>;
}
