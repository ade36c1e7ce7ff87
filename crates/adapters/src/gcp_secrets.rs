//! Google Cloud Secret Manager adapter (REST `versions.access`).

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use codesync_domain::{FailureKind, SecretResourcePath};
use codesync_ports::{BoxFuture, SecretManagerPort};
use codesync_shared::{
    ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result, RetryPolicy, SecretString,
    retry_async,
};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://secretmanager.googleapis.com";

/// Environment variable holding the OAuth access token.
pub const ACCESS_TOKEN_ENV: &str = "CODESYNC_GCP_ACCESS_TOKEN";

/// Adapter configuration.
#[derive(Debug, Clone)]
pub struct GcpSecretManagerConfig {
    /// OAuth bearer token.
    pub access_token: SecretString,
    /// API base URL; defaults to the public endpoint.
    pub base_url: Option<Box<str>>,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Retries for transport failures and 5xx/429 responses.
    pub retry: RetryPolicy,
}

impl GcpSecretManagerConfig {
    /// Config using the public endpoint, a 30s timeout and the default retry policy.
    #[must_use]
    pub fn new(access_token: SecretString) -> Self {
        Self {
            access_token,
            base_url: None,
            timeout_ms: 30_000,
            retry: RetryPolicy::default(),
        }
    }
}

/// Reads secret versions over HTTPS.
pub struct GcpSecretManager {
    client: reqwest::Client,
    base_url: Box<str>,
    access_token: SecretString,
    retry: RetryPolicy,
}

impl GcpSecretManager {
    /// Build the HTTP client.
    pub fn new(config: GcpSecretManagerConfig) -> Result<Self> {
        if config.access_token.is_empty() {
            return Err(ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                "Google Cloud access token must be non-empty",
            ));
        }
        if config.timeout_ms == 0 {
            return Err(ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                "timeout must be greater than zero",
            ));
        }
        let base_url = config
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .into();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|error| {
                ErrorEnvelope::unexpected(
                    ErrorCode::new("secret", "client_init_failed"),
                    format!("failed to build secret manager client: {error}"),
                    ErrorClass::NonRetriable,
                )
            })?;
        Ok(Self {
            client,
            base_url,
            access_token: config.access_token,
            retry: config.retry,
        })
    }

    async fn fetch(&self, ctx: &RequestContext, path: &SecretResourcePath) -> Result<SecretString> {
        let operation = "gcp_secret_manager.access";
        // Outer errors are transient and retried; the inner result is final.
        retry_async(ctx, self.retry, operation, || self.access_once(ctx, path, operation)).await?
    }

    async fn access_once(
        &self,
        ctx: &RequestContext,
        path: &SecretResourcePath,
        operation: &'static str,
    ) -> Result<Result<SecretString>> {
        ctx.ensure_not_cancelled(operation)?;
        let url = format!("{}/v1/{path}:access", self.base_url);

        let request = self
            .client
            .get(&url)
            .bearer_auth(self.access_token.expose())
            .send();
        let response = tokio::select! {
            () = ctx.cancelled() => return Err(cancelled(operation)),
            result = request => result.map_err(|error| transport_error(&error, path))?,
        };
        let status = response.status();
        let body = tokio::select! {
            () = ctx.cancelled() => return Err(cancelled(operation)),
            result = response.bytes() => result.map_err(|error| transport_error(&error, path))?,
        };
        if is_transient(status) {
            return Err(status_error(status, path));
        }
        if !status.is_success() {
            return Ok(Err(status_error(status, path)));
        }
        Ok(decode_payload(&body, path))
    }
}

fn decode_payload(body: &[u8], path: &SecretResourcePath) -> Result<SecretString> {
    let parsed: AccessResponse = serde_json::from_slice(body).map_err(|error| {
        FailureKind::SecretAccessDenied
            .envelope(format!("unreadable secret manager response: {error}"))
            .with_metadata("path", path.to_string())
    })?;
    let bytes = STANDARD.decode(parsed.payload.data.trim()).map_err(|error| {
        FailureKind::SecretAccessDenied
            .envelope(format!("secret payload is not valid base64: {error}"))
            .with_metadata("path", path.to_string())
    })?;
    let value = String::from_utf8(bytes).map_err(|_| {
        FailureKind::SecretAccessDenied
            .envelope("secret payload is not valid UTF-8")
            .with_metadata("path", path.to_string())
    })?;
    Ok(SecretString::new(value))
}

fn is_transient(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

impl SecretManagerPort for GcpSecretManager {
    fn access_secret<'a>(
        &'a self,
        ctx: &'a RequestContext,
        path: &'a SecretResourcePath,
    ) -> BoxFuture<'a, Result<SecretString>> {
        Box::pin(self.fetch(ctx, path))
    }
}

#[derive(Debug, Deserialize)]
struct AccessResponse {
    payload: AccessPayload,
}

#[derive(Debug, Deserialize)]
struct AccessPayload {
    data: String,
}

fn status_error(status: StatusCode, path: &SecretResourcePath) -> ErrorEnvelope {
    let error = match status {
        StatusCode::NOT_FOUND => {
            FailureKind::SecretNotFound.envelope(format!("secret `{path}` does not exist"))
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FailureKind::SecretAccessDenied
            .envelope(format!("access to secret `{path}` was denied")),
        _ => FailureKind::SecretAccessDenied
            .envelope(format!("secret manager returned HTTP {}", status.as_u16())),
    };
    error
        .with_metadata("path", path.to_string())
        .with_metadata("status", status.as_u16().to_string())
}

fn transport_error(error: &reqwest::Error, path: &SecretResourcePath) -> ErrorEnvelope {
    let reason = if error.is_timeout() {
        "timed out"
    } else if error.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    FailureKind::SecretAccessDenied
        .envelope(format!("secret manager {reason}: {error}"))
        .with_metadata("path", path.to_string())
}

fn cancelled(operation: &'static str) -> ErrorEnvelope {
    ErrorEnvelope::cancelled("operation cancelled").with_metadata("operation", operation)
}
