//! Small JSON documents guarded by an advisory lock file.
//!
//! Every access takes an exclusive `fs2` lock on `<path>.lock`, reads the
//! document, optionally mutates it, and replaces the file through a
//! temporary sibling so readers never observe a torn write. The lock makes
//! read-modify-write atomic across processes that share the file.

use codesync_shared::{ErrorClass, ErrorCode, ErrorEnvelope, Result};
use fs2::FileExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// A JSON document on disk.
#[derive(Debug, Clone)]
pub(crate) struct LockedJsonFile {
    path: PathBuf,
}

impl LockedJsonFile {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Run `apply` on the current document under the lock.
    ///
    /// `apply` returns the value to hand back and whether the document
    /// changed; unchanged documents are not rewritten.
    pub(crate) async fn with_document<T, R, F>(&self, apply: F) -> Result<R>
    where
        T: Serialize + DeserializeOwned + Default + Send + 'static,
        R: Send + 'static,
        F: FnOnce(&mut T) -> Result<(R, bool)> + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || locked_update(&path, apply))
            .await
            .map_err(|error| {
                ErrorEnvelope::unexpected(
                    ErrorCode::internal(),
                    format!("store task failed: {error}"),
                    ErrorClass::NonRetriable,
                )
            })?
    }
}

fn locked_update<T, R, F>(path: &Path, apply: F) -> Result<R>
where
    T: Serialize + DeserializeOwned + Default,
    F: FnOnce(&mut T) -> Result<(R, bool)>,
{
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let lock = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(sibling(path, "lock"))?;
    lock.lock_exclusive()?;

    let outcome = read_document(path).and_then(|mut document: T| {
        let (value, dirty) = apply(&mut document)?;
        if dirty {
            write_document(path, &document)?;
        }
        Ok(value)
    });
    let unlocked = FileExt::unlock(&lock);
    let value = outcome?;
    unlocked?;
    Ok(value)
}

fn read_document<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(error) => return Err(error.into()),
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(&bytes).map_err(|error| {
        ErrorEnvelope::unexpected(
            ErrorCode::new("store", "corrupt"),
            format!("cannot parse {}: {error}", path.display()),
            ErrorClass::NonRetriable,
        )
        .with_metadata("path", path.display().to_string())
    })
}

fn write_document<T: Serialize>(path: &Path, document: &T) -> Result<()> {
    let mut payload = serde_json::to_vec_pretty(document).map_err(|error| {
        ErrorEnvelope::unexpected(
            ErrorCode::internal(),
            format!("cannot serialize store document: {error}"),
            ErrorClass::NonRetriable,
        )
    })?;
    payload.push(b'\n');
    let tmp = sibling(path, "tmp");
    std::fs::write(&tmp, payload)?;
    File::open(&tmp)?.sync_all()?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn sibling(path: &Path, extension: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    type Doc = BTreeMap<String, u32>;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("codesync-json-file-{}", uuid::Uuid::new_v4()))
            .join(name)
    }

    #[tokio::test]
    async fn missing_documents_start_empty_and_persist() -> Result<()> {
        let file = LockedJsonFile::new(temp_path("doc.json"));
        let len = file
            .with_document(|doc: &mut Doc| Ok((doc.len(), false)))
            .await?;
        assert_eq!(len, 0);
        assert!(!file.path().exists());

        file.with_document(|doc: &mut Doc| {
            doc.insert("a".into(), 1);
            Ok(((), true))
        })
        .await?;
        let value = file
            .with_document(|doc: &mut Doc| Ok((doc.get("a").copied(), false)))
            .await?;
        assert_eq!(value, Some(1));
        assert!(!sibling(file.path(), "tmp").exists());
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_documents_are_reported() -> Result<()> {
        let path = temp_path("bad.json");
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, b"{not json")?;
        let error = LockedJsonFile::new(&path)
            .with_document(|doc: &mut Doc| Ok((doc.len(), false)))
            .await
            .err();
        assert_eq!(
            error.map(|error| error.code),
            Some(ErrorCode::new("store", "corrupt"))
        );
        Ok(())
    }

    #[tokio::test]
    async fn failed_mutations_leave_the_file_untouched() -> Result<()> {
        let file = LockedJsonFile::new(temp_path("doc.json"));
        file.with_document(|doc: &mut Doc| {
            doc.insert("a".into(), 1);
            Ok(((), true))
        })
        .await?;
        let result: Result<()> = file
            .with_document(|doc: &mut Doc| {
                doc.insert("b".into(), 2);
                Err(ErrorEnvelope::expected(ErrorCode::invalid_input(), "nope"))
            })
            .await;
        assert!(result.is_err());
        let keys = file
            .with_document(|doc: &mut Doc| Ok((doc.keys().cloned().collect::<Vec<_>>(), false)))
            .await?;
        assert_eq!(keys, vec!["a".to_owned()]);
        Ok(())
    }
}
