use super::CatalogTable;
use crate::json_file::LockedJsonFile;
use codesync_domain::{ConnectionName, PlanDiff, RepoIdentity, RepoRecord, SyncPlan};
use codesync_ports::{BoxFuture, CatalogPort};
use codesync_shared::{RequestContext, Result};
use std::path::{Path, PathBuf};

/// Catalog persisted as one lock-guarded JSON file.
#[derive(Debug, Clone)]
pub struct FileCatalog {
    file: LockedJsonFile,
}

impl FileCatalog {
    /// Catalog backed by `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: LockedJsonFile::new(path),
        }
    }

    /// Backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

impl CatalogPort for FileCatalog {
    fn apply_sync_plan<'a>(
        &'a self,
        ctx: &'a RequestContext,
        plan: &'a SyncPlan,
        at_ms: u64,
    ) -> BoxFuture<'a, Result<PlanDiff>> {
        Box::pin(async move {
            ctx.ensure_not_cancelled("catalog.apply_sync_plan")?;
            let plan = plan.clone();
            self.file
                .with_document(move |table: &mut CatalogTable| Ok((table.apply(&plan, at_ms)?, true)))
                .await
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
            let connection = connection.clone();
            self.file
                .with_document(move |table: &mut CatalogTable| {
                    let released = table.release_connection(&connection, at_ms)?;
                    let dirty = !released.is_empty();
                    Ok((released, dirty))
                })
                .await
        })
    }

    fn list_repos<'a>(&'a self, ctx: &'a RequestContext) -> BoxFuture<'a, Result<Vec<RepoRecord>>> {
        Box::pin(async move {
            ctx.ensure_not_cancelled("catalog.list_repos")?;
            self.file
                .with_document(|table: &mut CatalogTable| Ok((table.list(), false)))
                .await
        })
    }

    fn get_repo<'a>(
        &'a self,
        ctx: &'a RequestContext,
        identity: &'a RepoIdentity,
    ) -> BoxFuture<'a, Result<Option<RepoRecord>>> {
        Box::pin(async move {
            ctx.ensure_not_cancelled("catalog.get_repo")?;
            let identity = identity.clone();
            self.file
                .with_document(move |table: &mut CatalogTable| Ok((table.get(&identity), false)))
                .await
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
            let identity = identity.clone();
            self.file
                .with_document(move |table: &mut CatalogTable| {
                    table.record_indexed(&identity, at_ms)?;
                    Ok(((), true))
                })
                .await
        })
    }

    fn remove_repo<'a>(
        &'a self,
        ctx: &'a RequestContext,
        identity: &'a RepoIdentity,
    ) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            ctx.ensure_not_cancelled("catalog.remove_repo")?;
            let identity = identity.clone();
            self.file
                .with_document(move |table: &mut CatalogTable| {
                    let removed = table.remove(&identity)?;
                    Ok((removed, removed))
                })
                .await
        })
    }
}
