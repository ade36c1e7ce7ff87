//! Repo lister backed by a JSON fixture file.
//!
//! The file maps connection names to either a candidate list or a failure:
//!
//! ```json
//! {
//!   "acme-github": [{ "name": "acme/api", "cloneUrl": "...", "defaultBranch": "main" }],
//!   "flaky": { "error": "CodeHostRateLimited", "message": "slow down" }
//! }
//! ```
//!
//! Connections missing from the file list no repositories.

use codesync_domain::{CandidateRepo, ConnectionConfig, ConnectionName, FailureKind};
use codesync_ports::{BoxFuture, RepoListerPort};
use codesync_shared::{ErrorCode, ErrorEnvelope, RequestContext, Result, SecretString};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum FixtureListing {
    Repos(Vec<CandidateRepo>),
    Failure {
        error: FailureKind,
        #[serde(default)]
        message: Option<String>,
    },
}

/// Lister that replays fixture listings.
#[derive(Debug, Clone, Default)]
pub struct FixtureRepoLister {
    listings: BTreeMap<String, FixtureListing>,
}

impl FixtureRepoLister {
    /// Parse fixture JSON.
    pub fn from_json(raw: &str) -> Result<Self> {
        let listings = serde_json::from_str(raw).map_err(|error| {
            ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                format!("invalid candidates fixture: {error}"),
            )
        })?;
        Ok(Self { listings })
    }

    /// Read and parse a fixture file.
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|error| {
            ErrorEnvelope::from(error).with_metadata("path", path.display().to_string())
        })?;
        Self::from_json(&raw).map_err(|error| error.with_metadata("path", path.display().to_string()))
    }

    /// Connection names present in the fixture.
    pub fn connections(&self) -> impl Iterator<Item = &str> {
        self.listings.keys().map(String::as_str)
    }
}

impl RepoListerPort for FixtureRepoLister {
    fn list_candidates<'a>(
        &'a self,
        ctx: &'a RequestContext,
        connection: &'a ConnectionName,
        _config: &'a ConnectionConfig,
        _token: Option<&'a SecretString>,
    ) -> BoxFuture<'a, Result<Vec<CandidateRepo>>> {
        Box::pin(async move {
            ctx.ensure_not_cancelled("fixture_lister.list")?;
            match self.listings.get(connection.as_str()) {
                None => Ok(Vec::new()),
                Some(FixtureListing::Repos(repos)) => Ok(repos.clone()),
                Some(FixtureListing::Failure { error, message }) => {
                    let message = message
                        .clone()
                        .unwrap_or_else(|| format!("{error} (fixture)"));
                    Err(error
                        .envelope(message)
                        .with_metadata("connection", connection.as_str()))
                },
            }
        })
    }
}
