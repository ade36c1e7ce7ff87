//! Connection configuration model: one variant per supported code host.
//!
//! Values of these types are only produced by the config parser, which
//! applies validation and defaults. They are immutable for the duration of
//! a sync and replaced wholesale on reload.

use crate::secret::SecretRef;
use serde::Serialize;
use std::fmt;

/// Default GitHub host.
pub const DEFAULT_GITHUB_URL: &str = "https://github.com";
/// Default GitLab host.
pub const DEFAULT_GITLAB_URL: &str = "https://gitlab.com";
/// Default Gitea host.
pub const DEFAULT_GITEA_URL: &str = "https://gitea.com";
/// Default Bitbucket Cloud API host.
pub const DEFAULT_BITBUCKET_CLOUD_URL: &str = "https://api.bitbucket.org/2.0";
/// Default Azure DevOps Services host.
pub const DEFAULT_AZURE_DEVOPS_URL: &str = "https://dev.azure.com";

/// Discriminant of [`ConnectionConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeHostType {
    /// GitHub or GitHub Enterprise.
    Github,
    /// GitLab.
    Gitlab,
    /// Gitea.
    Gitea,
    /// Gerrit.
    Gerrit,
    /// Bitbucket Cloud or Data Center.
    Bitbucket,
    /// Azure DevOps Services or Server.
    #[serde(rename = "azuredevops")]
    AzureDevOps,
    /// A plain git remote or local path.
    Git,
}

impl CodeHostType {
    /// Every supported type, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Github,
        Self::Gitlab,
        Self::Gitea,
        Self::Gerrit,
        Self::Bitbucket,
        Self::AzureDevOps,
        Self::Git,
    ];

    /// The `type` literal used in configs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Github => "github",
            Self::Gitlab => "gitlab",
            Self::Gitea => "gitea",
            Self::Gerrit => "gerrit",
            Self::Bitbucket => "bitbucket",
            Self::AzureDevOps => "azuredevops",
            Self::Git => "git",
        }
    }

    /// Parse a `type` literal (exact, case-sensitive).
    #[must_use]
    pub fn from_literal(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }
}

impl fmt::Display for CodeHostType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Branch and tag globs to index in addition to the default branch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RevisionsConfig {
    /// Branch globs, applied in order.
    pub branches: Vec<Box<str>>,
    /// Tag globs, applied in order.
    pub tags: Vec<Box<str>>,
}

/// Inclusive repository size bounds in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SizeRange {
    /// Repos smaller than this are excluded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<u64>,
    /// Repos larger than this are excluded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<u64>,
}

/// GitHub connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GithubConnection {
    /// Access token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<SecretRef>,
    /// Host URL.
    pub url: Box<str>,
    /// Users whose repos are synced.
    pub users: Vec<Box<str>>,
    /// Organizations whose repos are synced.
    pub orgs: Vec<Box<str>>,
    /// Explicit `owner/name` repos.
    pub repos: Vec<Box<str>>,
    /// Topic globs; a repo must carry one of them.
    pub topics: Vec<Box<str>>,
    /// Exclusion rules.
    pub exclude: GithubExclude,
    /// Revision globs.
    pub revisions: RevisionsConfig,
}

/// GitHub exclusion rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GithubExclude {
    /// Exclude forks.
    pub forks: bool,
    /// Exclude archived repos.
    pub archived: bool,
    /// Repo name globs.
    pub repos: Vec<Box<str>>,
    /// Topic globs.
    pub topics: Vec<Box<str>>,
    /// Size bounds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<SizeRange>,
}

/// GitLab access levels accepted by `minAccessLevel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GitlabAccessLevel {
    /// Minimal access (5).
    Minimal,
    /// Guest (10).
    Guest,
    /// Reporter (20).
    Reporter,
    /// Developer (30).
    Developer,
    /// Maintainer (40).
    Maintainer,
    /// Owner (50).
    Owner,
}

impl GitlabAccessLevel {
    /// Numeric values accepted in configs.
    pub const ACCEPTED: [u64; 6] = [5, 10, 20, 30, 40, 50];

    /// Map a numeric access level.
    #[must_use]
    pub const fn from_level(level: u64) -> Option<Self> {
        match level {
            5 => Some(Self::Minimal),
            10 => Some(Self::Guest),
            20 => Some(Self::Reporter),
            30 => Some(Self::Developer),
            40 => Some(Self::Maintainer),
            50 => Some(Self::Owner),
            _ => None,
        }
    }

    /// Numeric access level.
    #[must_use]
    pub const fn level(self) -> u64 {
        match self {
            Self::Minimal => 5,
            Self::Guest => 10,
            Self::Reporter => 20,
            Self::Developer => 30,
            Self::Maintainer => 40,
            Self::Owner => 50,
        }
    }
}

impl Serialize for GitlabAccessLevel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.level())
    }
}

/// GitLab connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitlabConnection {
    /// Access token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<SecretRef>,
    /// Host URL.
    pub url: Box<str>,
    /// Sync every project visible to the token (self-hosted only).
    pub all: bool,
    /// Users whose projects are synced.
    pub users: Vec<Box<str>>,
    /// Groups (and subgroups) whose projects are synced.
    pub groups: Vec<Box<str>>,
    /// Explicit project paths.
    pub projects: Vec<Box<str>>,
    /// Topic globs; a project must carry one of them.
    pub topics: Vec<Box<str>>,
    /// Minimum access level the token must hold on a project.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_access_level: Option<GitlabAccessLevel>,
    /// Exclusion rules.
    pub exclude: GitlabExclude,
    /// Revision globs.
    pub revisions: RevisionsConfig,
}

/// GitLab exclusion rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GitlabExclude {
    /// Exclude forks.
    pub forks: bool,
    /// Exclude archived projects.
    pub archived: bool,
    /// Project path globs.
    pub projects: Vec<Box<str>>,
    /// Topic globs.
    pub topics: Vec<Box<str>>,
    /// Size bounds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<SizeRange>,
}

/// Gitea connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GiteaConnection {
    /// Access token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<SecretRef>,
    /// Host URL.
    pub url: Box<str>,
    /// Organizations whose repos are synced.
    pub orgs: Vec<Box<str>>,
    /// Explicit `owner/name` repos.
    pub repos: Vec<Box<str>>,
    /// Users whose repos are synced.
    pub users: Vec<Box<str>>,
    /// Exclusion rules.
    pub exclude: GiteaExclude,
    /// Revision globs.
    pub revisions: RevisionsConfig,
}

/// Gitea exclusion rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GiteaExclude {
    /// Exclude forks.
    pub forks: bool,
    /// Exclude archived repos.
    pub archived: bool,
    /// Repo name globs.
    pub repos: Vec<Box<str>>,
}

/// Gerrit connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GerritConnection {
    /// Host URL.
    pub url: Box<str>,
    /// Project globs to sync.
    pub projects: Vec<Box<str>>,
    /// Exclusion rules.
    pub exclude: GerritExclude,
    /// Revision globs.
    pub revisions: RevisionsConfig,
}

/// Gerrit exclusion rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GerritExclude {
    /// Project globs.
    pub projects: Vec<Box<str>>,
    /// Exclude read-only projects.
    pub read_only: bool,
    /// Exclude hidden projects.
    pub hidden: bool,
}

/// Bitbucket deployment flavor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BitbucketDeploymentType {
    /// bitbucket.org.
    #[default]
    Cloud,
    /// Self-hosted Data Center / Server.
    Server,
}

/// Bitbucket connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BitbucketConnection {
    /// Username paired with the token (cloud app passwords).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<Box<str>>,
    /// Access token or app password.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<SecretRef>,
    /// Host URL; required for server deployments.
    pub url: Box<str>,
    /// Deployment flavor.
    pub deployment_type: BitbucketDeploymentType,
    /// Cloud workspaces to sync.
    pub workspaces: Vec<Box<str>>,
    /// Projects to sync.
    pub projects: Vec<Box<str>>,
    /// Explicit repos.
    pub repos: Vec<Box<str>>,
    /// Exclusion rules.
    pub exclude: BitbucketExclude,
    /// Revision globs.
    pub revisions: RevisionsConfig,
}

/// Bitbucket exclusion rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BitbucketExclude {
    /// Exclude forks.
    pub forks: bool,
    /// Exclude archived repos.
    pub archived: bool,
    /// Repo name globs.
    pub repos: Vec<Box<str>>,
}

/// Azure DevOps deployment flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AzureDevOpsDeploymentType {
    /// dev.azure.com.
    Cloud,
    /// Azure DevOps Server.
    Server,
}

/// Azure DevOps connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureDevOpsConnection {
    /// Personal access token.
    pub token: SecretRef,
    /// Host URL.
    pub url: Box<str>,
    /// Deployment flavor.
    pub deployment_type: AzureDevOpsDeploymentType,
    /// Use the legacy `/tfs` path prefix (server only).
    pub use_tfs_path: bool,
    /// Organizations (cloud) or collections (server).
    pub orgs: Vec<Box<str>>,
    /// `org/project` entries.
    pub projects: Vec<Box<str>>,
    /// `org/project/repo` entries.
    pub repos: Vec<Box<str>>,
    /// Exclusion rules.
    pub exclude: AzureDevOpsExclude,
    /// Revision globs.
    pub revisions: RevisionsConfig,
}

/// Azure DevOps exclusion rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AzureDevOpsExclude {
    /// Exclude disabled repos.
    pub disabled: bool,
    /// Repo globs.
    pub repos: Vec<Box<str>>,
    /// Project globs.
    pub projects: Vec<Box<str>>,
    /// Size bounds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<SizeRange>,
}

/// Generic git connection (remote URL or `file://` path, globs allowed in the path).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitConnection {
    /// Remote or local URL.
    pub url: Box<str>,
    /// Revision globs.
    pub revisions: RevisionsConfig,
}

/// A validated, defaulted connection config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum ConnectionConfig {
    /// GitHub.
    #[serde(rename = "github")]
    Github(GithubConnection),
    /// GitLab.
    #[serde(rename = "gitlab")]
    Gitlab(GitlabConnection),
    /// Gitea.
    #[serde(rename = "gitea")]
    Gitea(GiteaConnection),
    /// Gerrit.
    #[serde(rename = "gerrit")]
    Gerrit(GerritConnection),
    /// Bitbucket.
    #[serde(rename = "bitbucket")]
    Bitbucket(BitbucketConnection),
    /// Azure DevOps.
    #[serde(rename = "azuredevops")]
    AzureDevOps(AzureDevOpsConnection),
    /// Generic git.
    #[serde(rename = "git")]
    Git(GitConnection),
}

/// Normalized exclusion rules, independent of the code host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionRules {
    /// Drop forks.
    pub forks: bool,
    /// Drop archived repos.
    pub archived: bool,
    /// Drop repos outside these bounds.
    pub size: Option<SizeRange>,
    /// Name/path globs.
    pub names: Vec<Box<str>>,
    /// Topic globs.
    pub topics: Vec<Box<str>>,
    /// Drop read-only repos.
    pub read_only: bool,
    /// Drop hidden repos.
    pub hidden: bool,
    /// Drop disabled repos.
    pub disabled: bool,
}

/// Normalized positive selectors, independent of the code host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InclusionSelectors {
    /// Owner/namespace names (users, orgs, workspaces); compared ignoring case.
    pub owners: Vec<Box<str>>,
    /// Namespace prefixes (GitLab groups); subgroups are included.
    pub namespaces: Vec<Box<str>>,
    /// Full-name globs (repos, projects).
    pub names: Vec<Box<str>>,
    /// Topic globs.
    pub topics: Vec<Box<str>>,
}

impl InclusionSelectors {
    /// Returns true when nothing is selected, meaning "everything visible".
    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        self.owners.is_empty()
            && self.namespaces.is_empty()
            && self.names.is_empty()
            && self.topics.is_empty()
    }
}

impl ConnectionConfig {
    /// Code host type of this connection.
    #[must_use]
    pub const fn kind(&self) -> CodeHostType {
        match self {
            Self::Github(_) => CodeHostType::Github,
            Self::Gitlab(_) => CodeHostType::Gitlab,
            Self::Gitea(_) => CodeHostType::Gitea,
            Self::Gerrit(_) => CodeHostType::Gerrit,
            Self::Bitbucket(_) => CodeHostType::Bitbucket,
            Self::AzureDevOps(_) => CodeHostType::AzureDevOps,
            Self::Git(_) => CodeHostType::Git,
        }
    }

    /// Credential reference, when configured.
    #[must_use]
    pub const fn token(&self) -> Option<&SecretRef> {
        match self {
            Self::Github(config) => config.token.as_ref(),
            Self::Gitlab(config) => config.token.as_ref(),
            Self::Gitea(config) => config.token.as_ref(),
            Self::Bitbucket(config) => config.token.as_ref(),
            Self::AzureDevOps(config) => Some(&config.token),
            Self::Gerrit(_) | Self::Git(_) => None,
        }
    }

    /// Host (or remote) URL after defaults.
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::Github(config) => &config.url,
            Self::Gitlab(config) => &config.url,
            Self::Gitea(config) => &config.url,
            Self::Gerrit(config) => &config.url,
            Self::Bitbucket(config) => &config.url,
            Self::AzureDevOps(config) => &config.url,
            Self::Git(config) => &config.url,
        }
    }

    /// Revision globs.
    #[must_use]
    pub const fn revisions(&self) -> &RevisionsConfig {
        match self {
            Self::Github(config) => &config.revisions,
            Self::Gitlab(config) => &config.revisions,
            Self::Gitea(config) => &config.revisions,
            Self::Gerrit(config) => &config.revisions,
            Self::Bitbucket(config) => &config.revisions,
            Self::AzureDevOps(config) => &config.revisions,
            Self::Git(config) => &config.revisions,
        }
    }

    /// Exclusion rules normalized across code hosts.
    #[must_use]
    pub fn exclusion_rules(&self) -> ExclusionRules {
        match self {
            Self::Github(config) => ExclusionRules {
                forks: config.exclude.forks,
                archived: config.exclude.archived,
                size: config.exclude.size,
                names: config.exclude.repos.clone(),
                topics: config.exclude.topics.clone(),
                ..ExclusionRules::default()
            },
            Self::Gitlab(config) => ExclusionRules {
                forks: config.exclude.forks,
                archived: config.exclude.archived,
                size: config.exclude.size,
                names: config.exclude.projects.clone(),
                topics: config.exclude.topics.clone(),
                ..ExclusionRules::default()
            },
            Self::Gitea(config) => ExclusionRules {
                forks: config.exclude.forks,
                archived: config.exclude.archived,
                names: config.exclude.repos.clone(),
                ..ExclusionRules::default()
            },
            Self::Gerrit(config) => ExclusionRules {
                names: config.exclude.projects.clone(),
                read_only: config.exclude.read_only,
                hidden: config.exclude.hidden,
                ..ExclusionRules::default()
            },
            Self::Bitbucket(config) => ExclusionRules {
                forks: config.exclude.forks,
                archived: config.exclude.archived,
                names: config.exclude.repos.clone(),
                ..ExclusionRules::default()
            },
            Self::AzureDevOps(config) => ExclusionRules {
                disabled: config.exclude.disabled,
                size: config.exclude.size,
                names: config
                    .exclude
                    .repos
                    .iter()
                    .chain(&config.exclude.projects)
                    .cloned()
                    .collect(),
                ..ExclusionRules::default()
            },
            Self::Git(_) => ExclusionRules::default(),
        }
    }

    /// Inclusion selectors normalized across code hosts.
    ///
    /// Azure DevOps `projects` entries select every repo under `org/project`.
    #[must_use]
    pub fn inclusion_selectors(&self) -> InclusionSelectors {
        match self {
            Self::Github(config) => InclusionSelectors {
                owners: concat(&config.users, &config.orgs),
                names: config.repos.clone(),
                topics: config.topics.clone(),
                ..InclusionSelectors::default()
            },
            Self::Gitlab(config) if config.all => InclusionSelectors::default(),
            Self::Gitlab(config) => InclusionSelectors {
                owners: config.users.clone(),
                namespaces: config.groups.clone(),
                names: config.projects.clone(),
                topics: config.topics.clone(),
            },
            Self::Gitea(config) => InclusionSelectors {
                owners: concat(&config.users, &config.orgs),
                names: config.repos.clone(),
                ..InclusionSelectors::default()
            },
            Self::Gerrit(config) => InclusionSelectors {
                names: config.projects.clone(),
                ..InclusionSelectors::default()
            },
            Self::Bitbucket(config) => InclusionSelectors {
                owners: config.workspaces.clone(),
                namespaces: config.projects.clone(),
                names: config.repos.clone(),
                ..InclusionSelectors::default()
            },
            Self::AzureDevOps(config) => InclusionSelectors {
                owners: config.orgs.clone(),
                namespaces: config.projects.clone(),
                names: config.repos.clone(),
                ..InclusionSelectors::default()
            },
            Self::Git(_) => InclusionSelectors::default(),
        }
    }
}

fn concat(first: &[Box<str>], second: &[Box<str>]) -> Vec<Box<str>> {
    first.iter().chain(second).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn github() -> GithubConnection {
        GithubConnection {
            token: Some(SecretRef::env("GITHUB_TOKEN")),
            url: DEFAULT_GITHUB_URL.into(),
            users: vec!["octocat".into()],
            orgs: vec!["acme".into()],
            repos: vec!["torvalds/linux".into()],
            topics: Vec::new(),
            exclude: GithubExclude {
                forks: true,
                repos: vec!["acme/legacy-*".into()],
                ..GithubExclude::default()
            },
            revisions: RevisionsConfig::default(),
        }
    }

    #[test]
    fn type_literals_round_trip() {
        for kind in CodeHostType::ALL {
            assert_eq!(CodeHostType::from_literal(kind.as_str()), Some(kind));
        }
        assert_eq!(CodeHostType::from_literal("GitHub"), None);
        assert_eq!(CodeHostType::from_literal("svn"), None);
    }

    #[test]
    fn github_normalizes_rules_and_selectors() {
        let config = ConnectionConfig::Github(github());
        let rules = config.exclusion_rules();
        assert!(rules.forks);
        assert!(!rules.archived);
        assert_eq!(rules.names, vec![Box::<str>::from("acme/legacy-*")]);

        let selectors = config.inclusion_selectors();
        assert_eq!(selectors.owners.len(), 2);
        assert!(!selectors.is_unrestricted());
        assert_eq!(config.url(), DEFAULT_GITHUB_URL);
        assert!(config.token().is_some());
    }

    #[test]
    fn git_connections_select_everything() {
        let config = ConnectionConfig::Git(GitConnection {
            url: "file:///srv/repos/*".into(),
            revisions: RevisionsConfig::default(),
        });
        assert!(config.inclusion_selectors().is_unrestricted());
        assert_eq!(config.exclusion_rules(), ExclusionRules::default());
        assert!(config.token().is_none());
    }

    #[test]
    fn serializes_with_type_tag() -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(ConnectionConfig::Github(github()))?;
        assert_eq!(value["type"], "github");
        assert_eq!(value["url"], DEFAULT_GITHUB_URL);
        assert_eq!(value["exclude"]["forks"], true);
        assert_eq!(value["token"]["env"], "GITHUB_TOKEN");
        Ok(())
    }

    #[test]
    fn gitlab_access_levels_are_closed() {
        for level in GitlabAccessLevel::ACCEPTED {
            assert_eq!(
                GitlabAccessLevel::from_level(level).map(GitlabAccessLevel::level),
                Some(level)
            );
        }
        assert!(GitlabAccessLevel::from_level(15).is_none());
    }
}
