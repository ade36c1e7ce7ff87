//! Repository catalog contract.

use crate::BoxFuture;
use codesync_domain::{ConnectionName, PlanDiff, RepoIdentity, RepoRecord, SyncPlan};
use codesync_shared::{RequestContext, Result};

/// Persistent view of which connections own which repositories.
pub trait CatalogPort: Send + Sync {
    /// Make `plan.connection` own exactly the repositories in `plan`.
    ///
    /// Repositories that lose their last owner get `orphaned_at_ms = at_ms`.
    fn apply_sync_plan<'a>(
        &'a self,
        ctx: &'a RequestContext,
        plan: &'a SyncPlan,
        at_ms: u64,
    ) -> BoxFuture<'a, Result<PlanDiff>>;

    /// Remove `connection` from every owner set, e.g. after it was deleted
    /// from the config.
    ///
    /// Returns the repositories it owned. Those left without owners get
    /// `orphaned_at_ms = at_ms`.
    fn release_connection<'a>(
        &'a self,
        ctx: &'a RequestContext,
        connection: &'a ConnectionName,
        at_ms: u64,
    ) -> BoxFuture<'a, Result<Vec<RepoIdentity>>>;

    /// Every repository, ordered by identity.
    fn list_repos<'a>(&'a self, ctx: &'a RequestContext) -> BoxFuture<'a, Result<Vec<RepoRecord>>>;

    /// One repository.
    fn get_repo<'a>(
        &'a self,
        ctx: &'a RequestContext,
        identity: &'a RepoIdentity,
    ) -> BoxFuture<'a, Result<Option<RepoRecord>>>;

    /// Record a successful index.
    fn record_indexed<'a>(
        &'a self,
        ctx: &'a RequestContext,
        identity: &'a RepoIdentity,
        at_ms: u64,
    ) -> BoxFuture<'a, Result<()>>;

    /// Drop a repository. Returns `false` when it still has owners and was kept.
    fn remove_repo<'a>(
        &'a self,
        ctx: &'a RequestContext,
        identity: &'a RepoIdentity,
    ) -> BoxFuture<'a, Result<bool>>;
}
