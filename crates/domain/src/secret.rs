//! Secret references as they appear in connection configs.
//!
//! A reference names where a credential lives; it never holds the value.

use crate::failure::FailureKind;
use codesync_shared::ErrorEnvelope;
use serde::{Serialize, Serializer};
use std::fmt;

/// Where a credential is read from at sync time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SecretRef {
    /// Name of a process environment variable.
    Env {
        /// Variable name.
        env: Box<str>,
    },
    /// Google Cloud Secret Manager resource path, parsed when resolved.
    GoogleCloudSecret {
        /// Resource path of the secret version.
        #[serde(rename = "googleCloudSecret")]
        google_cloud_secret: Box<str>,
    },
}

impl SecretRef {
    /// Reference an environment variable.
    pub fn env(name: impl Into<Box<str>>) -> Self {
        Self::Env { env: name.into() }
    }

    /// Reference a Google Cloud secret version.
    pub fn google_cloud(path: impl Into<Box<str>>) -> Self {
        Self::GoogleCloudSecret {
            google_cloud_secret: path.into(),
        }
    }

    /// Short description safe for logs (never the secret value).
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Env { env } => format!("env:{env}"),
            Self::GoogleCloudSecret {
                google_cloud_secret,
            } => format!("googleCloudSecret:{google_cloud_secret}"),
        }
    }
}

/// Parsed `projects/<id>/secrets/<name>/versions/<id>` resource path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SecretResourcePath {
    project: Box<str>,
    secret: Box<str>,
    version: Box<str>,
}

/// The resource path did not match `projects/<id>/secrets/<name>/versions/<id>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidSecretPath {
    /// Raw path that failed to parse.
    pub path: String,
}

impl fmt::Display for InvalidSecretPath {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "secret path `{}` must match projects/<id>/secrets/<name>/versions/<id>",
            self.path
        )
    }
}

impl std::error::Error for InvalidSecretPath {}

impl From<InvalidSecretPath> for ErrorEnvelope {
    fn from(error: InvalidSecretPath) -> Self {
        FailureKind::InvalidSecretPath
            .envelope(error.to_string())
            .with_metadata("path", error.path)
    }
}

impl SecretResourcePath {
    /// Parse a resource path.
    pub fn parse(input: &str) -> Result<Self, InvalidSecretPath> {
        let invalid = || InvalidSecretPath {
            path: input.to_owned(),
        };
        let segments: Vec<&str> = input.trim().split('/').collect();
        let [
            "projects",
            project,
            "secrets",
            secret,
            "versions",
            version,
        ] = segments.as_slice()
        else {
            return Err(invalid());
        };
        if [project, secret, version]
            .iter()
            .any(|segment| segment.is_empty() || segment.chars().any(char::is_whitespace))
        {
            return Err(invalid());
        }
        Ok(Self {
            project: (*project).into(),
            secret: (*secret).into(),
            version: (*version).into(),
        })
    }

    /// Project id.
    #[must_use]
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Secret name.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Version id (`latest` is allowed).
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }
}

impl fmt::Display for SecretResourcePath {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "projects/{}/secrets/{}/versions/{}",
            self.project, self.secret, self.version
        )
    }
}

impl Serialize for SecretResourcePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
