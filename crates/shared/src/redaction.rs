//! Secret detection and redaction utilities.
//!
//! Resolved credentials travel through the sync pipeline as [`SecretString`]
//! so that logs, errors and serialized plans never carry the raw value.

use serde::{Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;

/// The redacted placeholder string.
pub const REDACTED: &str = "[REDACTED]";

const SECRET_MARKERS: [&str; 6] = ["KEY", "TOKEN", "SECRET", "PASSWORD", "CREDENTIAL", "AUTH"];

/// Checks if a key/variable name likely refers to a secret.
///
/// ```
/// use codesync_shared::is_secret_key;
///
/// assert!(is_secret_key("GITHUB_TOKEN"));
/// assert!(is_secret_key("googleCloudSecret"));
/// assert!(!is_secret_key("CODESYNC_REPO_INDEX_TIMEOUT_MS"));
/// ```
pub fn is_secret_key(key: &str) -> bool {
    let key = key.to_ascii_uppercase();
    SECRET_MARKERS.iter().any(|marker| key.contains(marker))
}

/// Redacts a value if the key is likely a secret.
pub fn redact_if_secret<'a>(key: &str, value: &'a str) -> Cow<'a, str> {
    if is_secret_key(key) {
        Cow::Borrowed(REDACTED)
    } else {
        Cow::Borrowed(value)
    }
}

/// A resolved secret value that redacts on `Display`, `Debug` and `Serialize`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SecretString(Box<str>);

impl SecretString {
    /// Wrap a secret value.
    pub fn new(value: impl Into<Box<str>>) -> Self {
        Self(value.into())
    }

    /// Borrow the underlying secret.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns true when the secret is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(REDACTED)
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(REDACTED)
    }
}

impl Serialize for SecretString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(REDACTED)
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value.into_boxed_str())
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_common_secret_patterns() {
        for key in [
            "GITHUB_TOKEN",
            "api_key",
            "CLIENT_SECRET",
            "DB_PASSWORD",
            "credentials",
            "basic_auth",
            "googleCloudSecret",
        ] {
            assert!(is_secret_key(key), "{key} should be secret");
        }
    }

    #[test]
    fn rejects_non_secret_patterns() {
        for key in ["LOG_LEVEL", "url", "connection", "TIMEOUT_MS", "deploymentType"] {
            assert!(!is_secret_key(key), "{key} should not be secret");
        }
    }

    #[test]
    fn redacts_only_secret_keys() {
        assert_eq!(redact_if_secret("token", "ghp_123"), REDACTED);
        assert_eq!(redact_if_secret("url", "https://github.com"), "https://github.com");
    }

    #[test]
    fn secret_string_never_leaks() -> Result<(), serde_json::Error> {
        let secret = SecretString::from("ghp_123");
        assert_eq!(secret.to_string(), REDACTED);
        assert_eq!(format!("{secret:?}"), REDACTED);
        assert_eq!(serde_json::to_string(&secret)?, format!("\"{REDACTED}\""));
        assert_eq!(secret.expose(), "ghp_123");
        Ok(())
    }
}
