//! Indexer hand-off contract.

use crate::BoxFuture;
use codesync_domain::{RepoIdentity, SyncPlanEntry};
use codesync_shared::{RequestContext, Result};

/// What the indexer reports after processing one repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexOutcome {
    /// Revisions that were indexed.
    pub indexed_revisions: usize,
    /// Revisions that could not be indexed.
    pub warnings: Vec<Box<str>>,
}

/// Search-engine indexer that turns a plan entry into searchable shards.
///
/// Implementations must honor `ctx` cancellation and leave any partial output
/// in a state that a later run can overwrite.
pub trait IndexerPort: Send + Sync {
    /// Index one repository at the selected revisions.
    fn index_repo<'a>(
        &'a self,
        ctx: &'a RequestContext,
        entry: &'a SyncPlanEntry,
    ) -> BoxFuture<'a, Result<IndexOutcome>>;

    /// Delete every artifact produced for `identity`.
    fn remove_repo<'a>(
        &'a self,
        ctx: &'a RequestContext,
        identity: &'a RepoIdentity,
    ) -> BoxFuture<'a, Result<()>>;
}
