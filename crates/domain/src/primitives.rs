//! Domain primitives with validated constructors.

use codesync_shared::{ErrorCode, ErrorEnvelope};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Validation failures for domain primitives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimitiveError {
    /// `ConnectionName` is empty or contains characters outside `[A-Za-z0-9_.-]`.
    InvalidConnectionName {
        /// Trimmed input that failed validation.
        input: String,
    },
    /// `RepoIdentity` is empty after normalization.
    InvalidRepoIdentity {
        /// Raw input that failed validation.
        input: String,
    },
    /// `JobId` is empty after trimming.
    InvalidJobId {
        /// Length of the raw input before trimming.
        input_length: usize,
    },
    /// `EntityRef` is not `connection:<name>` or `repo:<identity>`.
    InvalidEntityRef {
        /// Raw input that failed validation.
        input: String,
    },
}

impl PrimitiveError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::InvalidConnectionName { .. } => ErrorCode::new("domain", "invalid_connection_name"),
            Self::InvalidRepoIdentity { .. } => ErrorCode::new("domain", "invalid_repo_identity"),
            Self::InvalidJobId { .. } => ErrorCode::new("domain", "invalid_job_id"),
            Self::InvalidEntityRef { .. } => ErrorCode::new("domain", "invalid_entity_ref"),
        }
    }
}

impl fmt::Display for PrimitiveError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConnectionName { input } => write!(
                formatter,
                "connection name `{input}` must match /^[\\w.-]+$/"
            ),
            Self::InvalidRepoIdentity { input } => {
                write!(formatter, "repo identity `{input}` is empty after normalization")
            },
            Self::InvalidJobId { .. } => formatter.write_str("JobId must be non-empty"),
            Self::InvalidEntityRef { input } => write!(
                formatter,
                "entity `{input}` must be `connection:<name>` or `repo:<identity>`"
            ),
        }
    }
}

impl std::error::Error for PrimitiveError {}

impl From<PrimitiveError> for ErrorEnvelope {
    fn from(error: PrimitiveError) -> Self {
        let envelope = Self::expected(error.error_code(), error.to_string());
        match error {
            PrimitiveError::InvalidConnectionName { input }
            | PrimitiveError::InvalidRepoIdentity { input }
            | PrimitiveError::InvalidEntityRef { input } => envelope.with_metadata("input", input),
            PrimitiveError::InvalidJobId { input_length } => {
                envelope.with_metadata("input_length", input_length.to_string())
            },
        }
    }
}

/// Returns true when `value` matches `^[\w.-]+$` (ASCII word characters, `.` and `-`).
#[must_use]
pub fn is_simple_name(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '-'))
}

/// Name of a configured connection (the key under `connections`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConnectionName(Box<str>);

impl ConnectionName {
    /// Parse a connection name.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, PrimitiveError> {
        let trimmed = input.as_ref().trim();
        if !is_simple_name(trimmed) {
            return Err(PrimitiveError::InvalidConnectionName {
                input: trimmed.to_owned(),
            });
        }
        Ok(Self(trimmed.into()))
    }

    /// Access the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ConnectionName {
    type Error = PrimitiveError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ConnectionName> for String {
    fn from(value: ConnectionName) -> Self {
        value.0.into()
    }
}

impl AsRef<str> for ConnectionName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for ConnectionName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Stable identity of a repository across re-syncs.
///
/// Derived from the clone URL: scheme, credentials, default ports, query,
/// fragment, a trailing `/` and a trailing `.git` are stripped and the host
/// is lowercased. scp-style `git@host:owner/repo` is read as
/// `ssh://git@host/owner/repo`, so `https://user@GitHub.com/acme/api.git`,
/// `git@github.com:acme/api.git` and `https://github.com/acme/api` all map
/// to `github.com/acme/api`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoIdentity(Box<str>);

impl RepoIdentity {
    /// Parse an already-normalized identity (as produced by [`Self::from_clone_url`]).
    pub fn parse(input: impl AsRef<str>) -> Result<Self, PrimitiveError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(PrimitiveError::InvalidRepoIdentity {
                input: trimmed.to_owned(),
            });
        }
        Ok(Self(trimmed.into()))
    }

    /// Derive the identity from a clone URL.
    ///
    /// Input without a scheme that is not scp-style is taken as a local path.
    pub fn from_clone_url(clone_url: &str) -> Result<Self, PrimitiveError> {
        let trimmed = clone_url.trim();
        let invalid = || PrimitiveError::InvalidRepoIdentity {
            input: trimmed.to_owned(),
        };
        let normalized = if trimmed.contains("://") {
            identity_from_url(&Url::parse(trimmed).map_err(|_| invalid())?)
        } else if let Some((authority, path)) = scp_parts(trimmed) {
            let rewritten = format!("ssh://{authority}/{path}");
            identity_from_url(&Url::parse(&rewritten).map_err(|_| invalid())?)
        } else {
            trimmed.trim_end_matches('/').to_owned()
        };

        if normalized.trim_matches('/').is_empty() {
            return Err(invalid());
        }
        Ok(Self(normalized.into_boxed_str()))
    }

    /// Access the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// `user@host:path` split into `("user@host", "path")`.
fn scp_parts(input: &str) -> Option<(&str, &str)> {
    let (authority, path) = input.split_once(':')?;
    if authority.is_empty() || authority.contains('/') || authority.contains('\\') {
        return None;
    }
    Some((authority, path.trim_start_matches('/')))
}

fn identity_from_url(url: &Url) -> String {
    let path = url.path().trim_end_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    let Some(host) = url
        .host_str()
        .filter(|host| !host.is_empty() && url.scheme() != "file")
    else {
        return path.to_owned();
    };
    let host = host.to_ascii_lowercase();
    match url
        .port()
        .filter(|port| Some(*port) != default_port(url.scheme()))
    {
        Some(port) => format!("{host}:{port}{path}"),
        None => format!("{host}{path}"),
    }
}

fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" => Some(80),
        "https" => Some(443),
        "ssh" | "git+ssh" | "ssh+git" => Some(22),
        "git" => Some(9418),
        _ => None,
    }
}

impl TryFrom<String> for RepoIdentity {
    type Error = PrimitiveError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<RepoIdentity> for String {
    fn from(value: RepoIdentity) -> Self {
        value.0.into()
    }
}

impl fmt::Display for RepoIdentity {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Identifier of a sync, indexing, or garbage-collection job.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobId(Box<str>);

impl JobId {
    /// Parse a `JobId` from user input.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, PrimitiveError> {
        let raw = input.as_ref();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(PrimitiveError::InvalidJobId {
                input_length: raw.len(),
            });
        }
        Ok(Self(trimmed.into()))
    }

    /// Access the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for JobId {
    type Error = PrimitiveError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<JobId> for String {
    fn from(value: JobId) -> Self {
        value.0.into()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// The entity a job works on. At most one active job exists per entity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum EntityRef {
    /// A configured connection.
    Connection(ConnectionName),
    /// A repository in the catalog.
    Repo(RepoIdentity),
}

impl fmt::Display for EntityRef {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(name) => write!(formatter, "connection:{name}"),
            Self::Repo(identity) => write!(formatter, "repo:{identity}"),
        }
    }
}

impl FromStr for EntityRef {
    type Err = PrimitiveError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = || PrimitiveError::InvalidEntityRef {
            input: input.to_owned(),
        };
        match input.trim().split_once(':') {
            Some(("connection", name)) => {
                ConnectionName::parse(name).map(Self::Connection).map_err(|_| invalid())
            },
            Some(("repo", identity)) => {
                RepoIdentity::parse(identity).map(Self::Repo).map_err(|_| invalid())
            },
            _ => Err(invalid()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn connection_name_rejects_spaces_and_slashes() {
        assert!(ConnectionName::parse("main-github_1.0").is_ok());
        for bad in ["", "  ", "my conn", "a/b"] {
            assert!(matches!(
                ConnectionName::parse(bad),
                Err(PrimitiveError::InvalidConnectionName { .. })
            ));
        }
    }

    #[test]
    fn repo_identity_normalizes_clone_urls() -> Result<(), PrimitiveError> {
        let plain = RepoIdentity::from_clone_url("https://github.com/acme/api")?;
        let noisy = RepoIdentity::from_clone_url("https://x-token@GitHub.com/acme/api.git/")?;
        assert_eq!(plain, noisy);
        assert_eq!(plain.as_str(), "github.com/acme/api");

        let local = RepoIdentity::from_clone_url("file:///srv/repos/tools")?;
        assert_eq!(local.as_str(), "/srv/repos/tools");
        Ok(())
    }

    #[test]
    fn repo_identity_is_shared_by_every_clone_url_form() -> Result<(), PrimitiveError> {
        for url in [
            "https://github.com/acme/api.git",
            "git@github.com:acme/api.git",
            "ssh://git@github.com:22/acme/api.git",
            "https://github.com:443/acme/api",
            "http://github.com:80/acme/api/",
            "https://github.com/acme/api?ref=main#readme",
        ] {
            assert_eq!(RepoIdentity::from_clone_url(url)?.as_str(), "github.com/acme/api", "{url}");
        }
        let custom_port = RepoIdentity::from_clone_url("https://git.example.com:8443/acme/api.git")?;
        assert_eq!(custom_port.as_str(), "git.example.com:8443/acme/api");
        Ok(())
    }

    #[test]
    fn repo_identity_rejects_empty_urls() {
        assert!(RepoIdentity::from_clone_url("https://").is_err());
        assert!(RepoIdentity::from_clone_url("   ").is_err());
    }

    #[test]
    fn entity_ref_round_trips_through_display() -> Result<(), PrimitiveError> {
        let entity: EntityRef = "connection:main".parse()?;
        assert_eq!(entity.to_string(), "connection:main");
        let repo: EntityRef = "repo:github.com/acme/api".parse()?;
        assert!(matches!(repo, EntityRef::Repo(_)));
        assert!("team:main".parse::<EntityRef>().is_err());
        Ok(())
    }

    #[test]
    fn primitive_error_converts_to_envelope() {
        let envelope: ErrorEnvelope = PrimitiveError::InvalidConnectionName {
            input: "a b".to_owned(),
        }
        .into();
        assert!(envelope.code.is("domain", "invalid_connection_name"));
        assert_eq!(envelope.metadata_value("input"), Some("a b"));
    }

    proptest! {
        #[test]
        fn simple_names_are_accepted(name in "[A-Za-z0-9_.-]{1,32}") {
            prop_assert!(ConnectionName::parse(&name).is_ok());
        }

        #[test]
        fn identity_ignores_git_suffix(owner in "[a-z0-9]{1,12}", repo in "[a-z0-9-]{1,12}") {
            let bare = RepoIdentity::from_clone_url(&format!("https://git.example.com/{owner}/{repo}"));
            let suffixed = RepoIdentity::from_clone_url(&format!("https://git.example.com/{owner}/{repo}.git"));
            prop_assert_eq!(bare, suffixed);
        }
    }
}
