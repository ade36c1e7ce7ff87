use super::CatalogTable;
use codesync_domain::{ConnectionName, PlanDiff, RepoIdentity, RepoRecord, SyncPlan};
use codesync_ports::{BoxFuture, CatalogPort};
use codesync_shared::{RequestContext, Result};
use tokio::sync::Mutex;

/// Process-local catalog.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    table: Mutex<CatalogTable>,
}

impl InMemoryCatalog {
    /// Empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CatalogPort for InMemoryCatalog {
    fn apply_sync_plan<'a>(
        &'a self,
        ctx: &'a RequestContext,
        plan: &'a SyncPlan,
        at_ms: u64,
    ) -> BoxFuture<'a, Result<PlanDiff>> {
        Box::pin(async move {
            ctx.ensure_not_cancelled("catalog.apply_sync_plan")?;
            self.table.lock().await.apply(plan, at_ms)
        })
    }

    fn release_connection<'a>(
        &'a self,
        ctx: &'a RequestContext,
        connection: &'a ConnectionName,
        at_ms: u64,
    ) -> BoxFuture<'a, Result<Vec<RepoIdentity>>> {
        Box::pin(async move {
            ctx.ensure_not_cancelled("catalog.release_connection")?;
            self.table.lock().await.release_connection(connection, at_ms)
        })
    }

    fn list_repos<'a>(&'a self, ctx: &'a RequestContext) -> BoxFuture<'a, Result<Vec<RepoRecord>>> {
        Box::pin(async move {
            ctx.ensure_not_cancelled("catalog.list_repos")?;
            Ok(self.table.lock().await.list())
        })
    }

    fn get_repo<'a>(
        &'a self,
        ctx: &'a RequestContext,
        identity: &'a RepoIdentity,
    ) -> BoxFuture<'a, Result<Option<RepoRecord>>> {
        Box::pin(async move {
            ctx.ensure_not_cancelled("catalog.get_repo")?;
            Ok(self.table.lock().await.get(identity))
        })
    }

    fn record_indexed<'a>(
        &'a self,
        ctx: &'a RequestContext,
        identity: &'a RepoIdentity,
        at_ms: u64,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            ctx.ensure_not_cancelled("catalog.record_indexed")?;
            self.table.lock().await.record_indexed(identity, at_ms)
        })
    }

    fn remove_repo<'a>(
        &'a self,
        ctx: &'a RequestContext,
        identity: &'a RepoIdentity,
    ) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            ctx.ensure_not_cancelled("catalog.remove_repo")?;
            self.table.lock().await.remove(identity)
        })
    }
}
