//! Repositories as reported by a code host lister.

use crate::primitives::{PrimitiveError, RepoIdentity};
use serde::{Deserialize, Serialize};

/// Repository visibility on the code host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RepoVisibility {
    /// Visible to anyone.
    #[default]
    Public,
    /// Visible to members of the instance.
    Internal,
    /// Visible to explicit collaborators.
    Private,
}

/// A repository reported by a code host, before exclusion filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRepo {
    /// Full name or path, e.g. `acme/api` or `group/sub/project`.
    pub name: Box<str>,
    /// Owning user, org, workspace or namespace.
    #[serde(default)]
    pub owner: Box<str>,
    /// URL used to clone the repo.
    pub clone_url: Box<str>,
    /// Browser URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_url: Option<Box<str>>,
    /// Visibility.
    #[serde(default)]
    pub visibility: RepoVisibility,
    /// Fork flag.
    #[serde(default)]
    pub is_fork: bool,
    /// Archived flag.
    #[serde(default)]
    pub is_archived: bool,
    /// Read-only flag (Gerrit).
    #[serde(default)]
    pub is_read_only: bool,
    /// Hidden flag (Gerrit).
    #[serde(default)]
    pub is_hidden: bool,
    /// Disabled flag (Azure DevOps).
    #[serde(default)]
    pub is_disabled: bool,
    /// Repository size in bytes, when the host reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    /// On-disk usage in bytes, when the host reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_usage_bytes: Option<u64>,
    /// Topics as reported by the host.
    #[serde(default)]
    pub topics: Vec<Box<str>>,
    /// Default branch (HEAD).
    pub default_branch: Box<str>,
    /// Remote branch names.
    #[serde(default)]
    pub branches: Vec<Box<str>>,
    /// Remote tag names.
    #[serde(default)]
    pub tags: Vec<Box<str>>,
}

impl CandidateRepo {
    /// Minimal candidate with only the required fields set.
    pub fn new(
        name: impl Into<Box<str>>,
        clone_url: impl Into<Box<str>>,
        default_branch: impl Into<Box<str>>,
    ) -> Self {
        let name = name.into();
        let owner = name
            .rsplit_once('/')
            .map_or_else(Box::default, |(owner, _)| owner.into());
        Self {
            name,
            owner,
            clone_url: clone_url.into(),
            web_url: None,
            visibility: RepoVisibility::default(),
            is_fork: false,
            is_archived: false,
            is_read_only: false,
            is_hidden: false,
            is_disabled: false,
            size_bytes: None,
            disk_usage_bytes: None,
            topics: Vec::new(),
            default_branch: default_branch.into(),
            branches: Vec::new(),
            tags: Vec::new(),
        }
    }

    /// Stable identity derived from the clone URL.
    pub fn identity(&self) -> Result<RepoIdentity, PrimitiveError> {
        RepoIdentity::from_clone_url(&self.clone_url)
    }
}
