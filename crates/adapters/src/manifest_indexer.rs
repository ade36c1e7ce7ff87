//! Indexer that records what would be indexed as one manifest file per repo.
//!
//! Manifests are named after the SHA-256 of the repository identity so any
//! identity maps to a safe file name.

use codesync_domain::{RepoIdentity, RevisionSelection, SyncPlanEntry};
use codesync_ports::{BoxFuture, IndexOutcome, IndexerPort};
use codesync_shared::{ErrorEnvelope, RequestContext, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Contents of one manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexManifest {
    /// Repository identity.
    pub identity: RepoIdentity,
    /// Display name.
    pub name: Box<str>,
    /// Clone URL.
    pub clone_url: Box<str>,
    /// Indexed revisions.
    pub revisions: RevisionSelection,
    /// Whether a credential was available; the credential itself is never written.
    pub authenticated: bool,
    /// Write time (epoch ms).
    pub indexed_at_ms: u64,
}

/// Writes `<dir>/<sha256(identity)>.json` per indexed repository.
#[derive(Debug, Clone)]
pub struct ManifestIndexer {
    dir: PathBuf,
}

impl ManifestIndexer {
    /// Indexer writing into `dir` (created on demand).
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Manifest path for `identity`.
    #[must_use]
    pub fn manifest_path(&self, identity: &RepoIdentity) -> PathBuf {
        let digest = Sha256::digest(identity.as_str().as_bytes());
        let stem: String = digest.iter().map(|byte| format!("{byte:02x}")).collect();
        self.dir.join(format!("{stem}.json"))
    }

    /// Read back a manifest, if present.
    pub async fn read_manifest(&self, identity: &RepoIdentity) -> Result<Option<IndexManifest>> {
        let path = self.manifest_path(identity);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(io_error(error, &path)),
        };
        serde_json::from_slice(&bytes).map(Some).map_err(|error| {
            ErrorEnvelope::from(std::io::Error::new(std::io::ErrorKind::InvalidData, error))
                .with_metadata("path", path.display().to_string())
        })
    }

    async fn write(&self, ctx: &RequestContext, entry: &SyncPlanEntry) -> Result<IndexOutcome> {
        ctx.ensure_not_cancelled("manifest_indexer.index")?;
        let manifest = IndexManifest {
            identity: entry.identity.clone(),
            name: entry.name.clone(),
            clone_url: entry.clone_url.clone(),
            revisions: entry.revisions.clone(),
            authenticated: entry.token.as_ref().is_some_and(|token| !token.is_empty()),
            indexed_at_ms: now_epoch_ms(),
        };
        let mut payload = serde_json::to_vec_pretty(&manifest).map_err(|error| {
            ErrorEnvelope::from(std::io::Error::new(std::io::ErrorKind::InvalidData, error))
        })?;
        payload.push(b'\n');

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|error| io_error(error, &self.dir))?;
        let path = self.manifest_path(&entry.identity);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, payload)
            .await
            .map_err(|error| io_error(error, &tmp))?;
        ctx.ensure_not_cancelled("manifest_indexer.index")?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|error| io_error(error, &path))?;

        Ok(IndexOutcome {
            indexed_revisions: entry.revisions.len(),
            warnings: Vec::new(),
        })
    }

    async fn remove(&self, ctx: &RequestContext, identity: &RepoIdentity) -> Result<()> {
        ctx.ensure_not_cancelled("manifest_indexer.remove")?;
        let path = self.manifest_path(identity);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(io_error(error, &path)),
        }
    }
}

impl IndexerPort for ManifestIndexer {
    fn index_repo<'a>(
        &'a self,
        ctx: &'a RequestContext,
        entry: &'a SyncPlanEntry,
    ) -> BoxFuture<'a, Result<IndexOutcome>> {
        Box::pin(self.write(ctx, entry))
    }

    fn remove_repo<'a>(
        &'a self,
        ctx: &'a RequestContext,
        identity: &'a RepoIdentity,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.remove(ctx, identity))
    }
}

fn io_error(error: std::io::Error, path: &Path) -> ErrorEnvelope {
    ErrorEnvelope::from(error).with_metadata("path", path.display().to_string())
}

fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|duration| u64::try_from(duration.as_millis()).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use codesync_shared::SecretString;

    fn entry() -> Result<SyncPlanEntry> {
        Ok(SyncPlanEntry {
            identity: RepoIdentity::parse("github.com/acme/api")?,
            name: "acme/api".into(),
            clone_url: "https://github.com/acme/api.git".into(),
            revisions: RevisionSelection {
                branches: vec!["main".into(), "release/1.0".into()],
                tags: vec!["v1.0.0".into()],
            },
            token: Some(SecretString::new("ghp_manifest_secret")),
        })
    }

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("codesync-manifests-{}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn writes_manifest_without_token_and_removes_it() -> Result<()> {
        let indexer = ManifestIndexer::new(temp_dir());
        let ctx = RequestContext::new_request();
        let entry = entry()?;

        let outcome = indexer.index_repo(&ctx, &entry).await?;
        assert_eq!(outcome.indexed_revisions, 3);

        let path = indexer.manifest_path(&entry.identity);
        let raw = std::fs::read_to_string(&path)?;
        assert!(!raw.contains("ghp_manifest_secret"));
        let manifest = indexer.read_manifest(&entry.identity).await?;
        assert_eq!(manifest.map(|manifest| manifest.authenticated), Some(true));

        indexer.remove_repo(&ctx, &entry.identity).await?;
        assert!(!path.exists());
        indexer.remove_repo(&ctx, &entry.identity).await?;
        Ok(())
    }

    #[test]
    fn manifest_names_are_lowercase_hex_digests() -> Result<()> {
        let dir = temp_dir();
        let indexer = ManifestIndexer::new(&dir);
        let path = indexer.manifest_path(&RepoIdentity::parse("github.com/acme/api")?);
        assert_eq!(
            path,
            dir.join("e1dcaa3496b93562cbcd84eaed8b8e3e4d60f98854d6d90fa0f7c267d3ca7919.json")
        );
        Ok(())
    }

    #[tokio::test]
    async fn cancelled_requests_write_nothing() -> Result<()> {
        let indexer = ManifestIndexer::new(temp_dir());
        let ctx = RequestContext::new_request();
        ctx.cancel();
        let entry = entry()?;
        let error = indexer.index_repo(&ctx, &entry).await.err();
        assert!(error.is_some_and(|error| error.is_cancelled()));
        assert!(indexer.read_manifest(&entry.identity).await?.is_none());
        Ok(())
    }
}
