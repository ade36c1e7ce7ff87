//! Secret sources used by the secret resolver.

use crate::BoxFuture;
use codesync_domain::SecretResourcePath;
use codesync_shared::{RequestContext, Result, SecretString};

/// Read access to process environment variables.
pub trait EnvironmentPort: Send + Sync {
    /// Value of `name`, or `None` when unset.
    fn var(&self, name: &str) -> Option<String>;
}

/// External secret manager (Google Cloud Secret Manager).
///
/// Errors use the `secret` codes: `secret_not_found` and `secret_access_denied`.
pub trait SecretManagerPort: Send + Sync {
    /// Fetch the payload of a secret version.
    fn access_secret<'a>(
        &'a self,
        ctx: &'a RequestContext,
        path: &'a SecretResourcePath,
    ) -> BoxFuture<'a, Result<SecretString>>;
}
