//! Repository catalog records: which connections own which repositories.

use crate::plan::RevisionSelection;
use crate::primitives::{ConnectionName, RepoIdentity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A repository known to the catalog.
///
/// Resolved credentials are never stored here; indexing jobs re-resolve the
/// owning connection's token when they run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoRecord {
    /// Stable identity.
    pub identity: RepoIdentity,
    /// Display name.
    pub name: Box<str>,
    /// Clone URL.
    pub clone_url: Box<str>,
    /// Revisions selected by the latest sync.
    pub revisions: RevisionSelection,
    /// Connections whose latest plan contains this repository.
    #[serde(default)]
    pub owners: BTreeSet<ConnectionName>,
    /// Last successful index (epoch ms).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexed_at_ms: Option<u64>,
    /// Time the last owner released this repository (epoch ms).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orphaned_at_ms: Option<u64>,
}

impl RepoRecord {
    /// Returns true when no connection owns the repository.
    #[must_use]
    pub fn is_orphaned(&self) -> bool {
        self.owners.is_empty()
    }

    /// First owner in name order, used to resolve credentials for indexing.
    #[must_use]
    pub fn primary_owner(&self) -> Option<&ConnectionName> {
        self.owners.iter().next()
    }

    /// Whether garbage collection may remove this repository at `now_ms`.
    ///
    /// The repository must be orphaned, and both the release and the last
    /// index must be at least `grace_ms` old.
    #[must_use]
    pub fn gc_eligible(&self, now_ms: u64, grace_ms: u64) -> bool {
        if !self.is_orphaned() {
            return false;
        }
        let settled = |at: Option<u64>| at.is_none_or(|at| now_ms.saturating_sub(at) >= grace_ms);
        settled(self.orphaned_at_ms) && settled(self.indexed_at_ms)
    }
}
