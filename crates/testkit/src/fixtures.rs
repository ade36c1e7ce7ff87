//! Access to the JSON/TOML fixtures shipped under `crates/testkit/fixtures`.

use codesync_domain::CandidateRepo;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::{fmt, fs};

/// Errors raised while loading fixtures.
#[derive(Debug)]
pub enum FixtureError {
    /// Fixture file does not exist.
    MissingFixture {
        /// Path that could not be found.
        path: PathBuf,
    },
    /// Fixture file could not be read.
    FixtureRead {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Fixture file could not be parsed.
    FixtureParse {
        /// Path that failed to parse.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
}

impl fmt::Display for FixtureError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingFixture { path } => {
                write!(formatter, "missing fixture: {}", path.display())
            },
            Self::FixtureRead { path, source } => {
                write!(formatter, "failed to read fixture {}: {source}", path.display())
            },
            Self::FixtureParse { path, source } => {
                write!(formatter, "failed to parse fixture {}: {source}", path.display())
            },
        }
    }
}

impl std::error::Error for FixtureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::FixtureRead { source, .. } => Some(source),
            Self::FixtureParse { source, .. } => Some(source),
            Self::MissingFixture { .. } => None,
        }
    }
}

/// Root of the fixture tree.
pub fn fixture_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

/// Absolute path of one fixture.
pub fn fixture_path(relative_path: &str) -> PathBuf {
    fixture_root().join(relative_path)
}

/// Read a fixture as text.
pub fn read_fixture(relative_path: &str) -> Result<String, FixtureError> {
    let path = fixture_path(relative_path);
    match fs::read_to_string(&path) {
        Ok(contents) => Ok(contents),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            Err(FixtureError::MissingFixture { path })
        },
        Err(error) => Err(FixtureError::FixtureRead {
            path,
            source: error,
        }),
    }
}

/// Read and deserialize a JSON fixture.
pub fn load_json_fixture<T: DeserializeOwned>(relative_path: &str) -> Result<T, FixtureError> {
    let contents = read_fixture(relative_path)?;
    serde_json::from_str(&contents).map_err(|error| FixtureError::FixtureParse {
        path: fixture_path(relative_path),
        source: error,
    })
}

/// Candidate listings keyed by connection name (`candidates/acme.json`).
pub fn acme_candidates() -> Result<BTreeMap<String, Vec<CandidateRepo>>, FixtureError> {
    load_json_fixture("candidates/acme.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fixture_errors_are_reported() {
        let result: Result<serde_json::Value, FixtureError> = load_json_fixture("nope/missing.json");
        assert!(matches!(result, Err(FixtureError::MissingFixture { .. })));
    }

    #[test]
    fn candidate_fixture_contains_a_duplicate() -> Result<(), Box<dyn std::error::Error>> {
        let candidates = acme_candidates()?;
        let acme = candidates.get("acme-github").ok_or("acme-github missing")?;
        let api_count = acme.iter().filter(|repo| &*repo.name == "acme/api").count();
        assert_eq!(api_count, 2);
        assert!(acme.iter().any(|repo| repo.is_fork));
        Ok(())
    }
}
