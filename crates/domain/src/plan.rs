//! Sync plans: what to index for one connection.

use crate::connection::CodeHostType;
use crate::primitives::{ConnectionName, RepoIdentity};
use codesync_shared::SecretString;
use serde::{Deserialize, Serialize};

/// Upper bound on `branches + tags` selected for one repository.
pub const MAX_REVISIONS: usize = 64;

/// Revisions selected for indexing. The default branch is always first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionSelection {
    /// Branch names, default branch first.
    pub branches: Vec<Box<str>>,
    /// Tag names.
    pub tags: Vec<Box<str>>,
}

impl RevisionSelection {
    /// Total number of selected revisions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.branches.len() + self.tags.len()
    }

    /// Returns true when nothing is selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.branches.is_empty() && self.tags.is_empty()
    }
}

/// One repository to index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPlanEntry {
    /// Stable identity.
    pub identity: RepoIdentity,
    /// Display name on the code host.
    pub name: Box<str>,
    /// Clone URL.
    pub clone_url: Box<str>,
    /// Selected revisions.
    pub revisions: RevisionSelection,
    /// Resolved credential, serialized redacted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<SecretString>,
}

/// Non-fatal findings recorded while building a plan or running a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SyncWarning {
    /// The lister reported the same repository twice; the first occurrence was kept.
    DuplicateRepoInConnection {
        /// Duplicated identity.
        identity: RepoIdentity,
        /// Name of the dropped occurrence.
        name: Box<str>,
    },
    /// The lister returned a repository whose clone URL has no usable identity.
    UnidentifiableRepo {
        /// Reported name.
        name: Box<str>,
    },
    /// Work for one repository failed without failing its siblings.
    RepoFailed {
        /// Affected repository.
        identity: RepoIdentity,
        /// Failure description.
        message: Box<str>,
    },
}

impl SyncWarning {
    /// Render as a job warning message.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::DuplicateRepoInConnection { identity, name } => {
                format!("DuplicateRepoInConnection: {identity} (dropped duplicate `{name}`)")
            },
            Self::UnidentifiableRepo { name } => {
                format!("UnidentifiableRepo: `{name}` has no usable clone URL")
            },
            Self::RepoFailed { identity, message } => format!("RepoFailed: {identity}: {message}"),
        }
    }
}

/// The normalized output of planning one connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPlan {
    /// Connection the plan belongs to.
    pub connection: ConnectionName,
    /// Code host type of the connection.
    pub code_host: CodeHostType,
    /// Repositories in lister order, unique by identity.
    pub entries: Vec<SyncPlanEntry>,
    /// Warnings collected while planning.
    pub warnings: Vec<SyncWarning>,
}

impl SyncPlan {
    /// Identities in plan order.
    pub fn identities(&self) -> impl Iterator<Item = &RepoIdentity> {
        self.entries.iter().map(|entry| &entry.identity)
    }
}

/// Difference between the catalog before and after applying a plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanDiff {
    /// Repositories new to this connection.
    pub added: Vec<RepoIdentity>,
    /// Repositories already owned by this connection.
    pub retained: Vec<RepoIdentity>,
    /// Repositories this connection no longer owns.
    pub removed: Vec<RepoIdentity>,
}
