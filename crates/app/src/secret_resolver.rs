//! Resolve `SecretRef`s to credential values.
//!
//! Every call reads the source again. Nothing is cached, so a resync picks up
//! rotated credentials without a restart.

use codesync_domain::{FailureKind, SecretRef, SecretResourcePath};
use codesync_ports::{EnvironmentPort, SecretManagerPort};
use codesync_shared::{ErrorEnvelope, RequestContext, Result, SecretString};
use std::sync::Arc;

/// Resolves environment and Google Cloud secret references.
#[derive(Clone)]
pub struct SecretResolver {
    env: Arc<dyn EnvironmentPort>,
    secret_manager: Option<Arc<dyn SecretManagerPort>>,
}

impl SecretResolver {
    /// Build a resolver. Without a secret manager, `googleCloudSecret`
    /// references fail with `SecretAccessDenied`.
    pub fn new(
        env: Arc<dyn EnvironmentPort>,
        secret_manager: Option<Arc<dyn SecretManagerPort>>,
    ) -> Self {
        Self {
            env,
            secret_manager,
        }
    }

    /// Resolve one reference.
    #[tracing::instrument(skip_all, fields(secret = %reference.describe()))]
    pub async fn resolve(
        &self,
        ctx: &RequestContext,
        reference: &SecretRef,
    ) -> Result<SecretString> {
        ctx.ensure_not_cancelled("secret_resolver.resolve")?;
        match reference {
            SecretRef::Env { env } => self.resolve_env(env),
            SecretRef::GoogleCloudSecret {
                google_cloud_secret,
            } => self.resolve_google_cloud(ctx, google_cloud_secret).await,
        }
    }

    /// Resolve an optional reference; `None` stays `None`.
    pub async fn resolve_optional(
        &self,
        ctx: &RequestContext,
        reference: Option<&SecretRef>,
    ) -> Result<Option<SecretString>> {
        match reference {
            Some(reference) => self.resolve(ctx, reference).await.map(Some),
            None => Ok(None),
        }
    }

    fn resolve_env(&self, name: &str) -> Result<SecretString> {
        match self.env.var(name) {
            Some(value) if !value.is_empty() => Ok(SecretString::new(value)),
            Some(_) => Err(FailureKind::SecretNotFound
                .envelope(format!("environment variable `{name}` is empty"))
                .with_metadata("env_var", name)),
            None => Err(FailureKind::SecretNotFound
                .envelope(format!("environment variable `{name}` is not set"))
                .with_metadata("env_var", name)),
        }
    }

    async fn resolve_google_cloud(
        &self,
        ctx: &RequestContext,
        raw_path: &str,
    ) -> Result<SecretString> {
        let path = SecretResourcePath::parse(raw_path).map_err(ErrorEnvelope::from)?;
        let Some(manager) = self.secret_manager.as_ref() else {
            return Err(FailureKind::SecretAccessDenied
                .envelope("no Google Cloud secret manager is configured")
                .with_metadata("path", path.to_string()));
        };

        let value = ctx
            .run_cancellable(
                "secret_resolver.google_cloud",
                manager.access_secret(ctx, &path),
            )
            .await
            .map_err(|error| normalize_provider_error(error, &path))?;
        if value.is_empty() {
            return Err(FailureKind::SecretNotFound
                .envelope("secret payload is empty")
                .with_metadata("path", path.to_string()));
        }
        Ok(value)
    }
}

/// Provider errors outside the secret taxonomy become `SecretAccessDenied`.
fn normalize_provider_error(error: ErrorEnvelope, path: &SecretResourcePath) -> ErrorEnvelope {
    if error.is_cancelled() {
        return error;
    }
    match FailureKind::from_code(&error.code) {
        FailureKind::SecretNotFound | FailureKind::SecretAccessDenied => error,
        _ => FailureKind::SecretAccessDenied
            .envelope(format!("secret manager request failed: {}", error.message))
            .with_metadata("path", path.to_string())
            .with_metadata("cause", error.code.to_string()),
    }
}
