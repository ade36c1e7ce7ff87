//! Environment variable parsing and env-to-config merging.
//!
//! Parsing is strict: a present but empty or malformed variable fails fast.
//! Secret values never appear in error metadata.

use crate::schema::{CodesyncConfig, ValidatedConfig};
use crate::settings::Settings;
use codesync_shared::{ErrorCode, ErrorEnvelope, REDACTED, SecretString, is_secret_key};
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

/// Env var: resync interval (ms).
pub const ENV_RESYNC_CONNECTION_INTERVAL_MS: &str = "CODESYNC_RESYNC_CONNECTION_INTERVAL_MS";
/// Env var: connection polling interval (ms).
pub const ENV_RESYNC_CONNECTION_POLLING_INTERVAL_MS: &str =
    "CODESYNC_RESYNC_CONNECTION_POLLING_INTERVAL_MS";
/// Env var: reindex interval (ms).
pub const ENV_REINDEX_INTERVAL_MS: &str = "CODESYNC_REINDEX_INTERVAL_MS";
/// Env var: repo polling interval (ms).
pub const ENV_REINDEX_REPO_POLLING_INTERVAL_MS: &str = "CODESYNC_REINDEX_REPO_POLLING_INTERVAL_MS";
/// Env var: connection sync ceiling.
pub const ENV_MAX_CONNECTION_SYNC_JOB_CONCURRENCY: &str =
    "CODESYNC_MAX_CONNECTION_SYNC_JOB_CONCURRENCY";
/// Env var: repo indexing ceiling.
pub const ENV_MAX_REPO_INDEXING_JOB_CONCURRENCY: &str =
    "CODESYNC_MAX_REPO_INDEXING_JOB_CONCURRENCY";
/// Env var: garbage collection ceiling.
pub const ENV_MAX_REPO_GARBAGE_COLLECTION_JOB_CONCURRENCY: &str =
    "CODESYNC_MAX_REPO_GARBAGE_COLLECTION_JOB_CONCURRENCY";
/// Env var: orphaned repo grace period (ms).
pub const ENV_REPO_GARBAGE_COLLECTION_GRACE_PERIOD_MS: &str =
    "CODESYNC_REPO_GARBAGE_COLLECTION_GRACE_PERIOD_MS";
/// Env var: indexing job deadline (ms).
pub const ENV_REPO_INDEX_TIMEOUT_MS: &str = "CODESYNC_REPO_INDEX_TIMEOUT_MS";
/// Env var: connection sync job deadline (ms).
pub const ENV_CONNECTION_SYNC_TIMEOUT_MS: &str = "CODESYNC_CONNECTION_SYNC_TIMEOUT_MS";
/// Env var: rate-limit backoff base (ms).
pub const ENV_RATE_LIMIT_BACKOFF_BASE_MS: &str = "CODESYNC_RATE_LIMIT_BACKOFF_BASE_MS";
/// Env var: rate-limit backoff ceiling (ms).
pub const ENV_RATE_LIMIT_BACKOFF_MAX_MS: &str = "CODESYNC_RATE_LIMIT_BACKOFF_MAX_MS";
/// Env var: finished jobs kept per entity.
pub const ENV_MAX_TERMINAL_JOBS_PER_ENTITY: &str = "CODESYNC_MAX_TERMINAL_JOBS_PER_ENTITY";

/// Env var: config file path.
pub const ENV_CONFIG: &str = "CODESYNC_CONFIG";
/// Env var: tracing filter directives.
pub const ENV_LOG: &str = "CODESYNC_LOG";
/// Env var: bearer token for Google Cloud Secret Manager.
pub const ENV_GCP_ACCESS_TOKEN: &str = "CODESYNC_GCP_ACCESS_TOKEN";
/// Env var: Secret Manager base URL override.
pub const ENV_GCP_SECRET_MANAGER_URL: &str = "CODESYNC_GCP_SECRET_MANAGER_URL";

const ALL_VARS: [&str; 17] = [
    ENV_RESYNC_CONNECTION_INTERVAL_MS,
    ENV_RESYNC_CONNECTION_POLLING_INTERVAL_MS,
    ENV_REINDEX_INTERVAL_MS,
    ENV_REINDEX_REPO_POLLING_INTERVAL_MS,
    ENV_MAX_CONNECTION_SYNC_JOB_CONCURRENCY,
    ENV_MAX_REPO_INDEXING_JOB_CONCURRENCY,
    ENV_MAX_REPO_GARBAGE_COLLECTION_JOB_CONCURRENCY,
    ENV_REPO_GARBAGE_COLLECTION_GRACE_PERIOD_MS,
    ENV_REPO_INDEX_TIMEOUT_MS,
    ENV_CONNECTION_SYNC_TIMEOUT_MS,
    ENV_RATE_LIMIT_BACKOFF_BASE_MS,
    ENV_RATE_LIMIT_BACKOFF_MAX_MS,
    ENV_MAX_TERMINAL_JOBS_PER_ENTITY,
    ENV_CONFIG,
    ENV_LOG,
    ENV_GCP_ACCESS_TOKEN,
    ENV_GCP_SECRET_MANAGER_URL,
];

/// Typed view of the `CODESYNC_*` environment.
#[derive(Debug, Clone, Default)]
pub struct CodesyncEnv {
    /// Override for `resyncConnectionIntervalMs`.
    pub resync_connection_interval_ms: Option<u64>,
    /// Override for `resyncConnectionPollingIntervalMs`.
    pub resync_connection_polling_interval_ms: Option<u64>,
    /// Override for `reindexIntervalMs`.
    pub reindex_interval_ms: Option<u64>,
    /// Override for `reindexRepoPollingIntervalMs`.
    pub reindex_repo_polling_interval_ms: Option<u64>,
    /// Override for `maxConnectionSyncJobConcurrency`.
    pub max_connection_sync_job_concurrency: Option<u32>,
    /// Override for `maxRepoIndexingJobConcurrency`.
    pub max_repo_indexing_job_concurrency: Option<u32>,
    /// Override for `maxRepoGarbageCollectionJobConcurrency`.
    pub max_repo_garbage_collection_job_concurrency: Option<u32>,
    /// Override for `repoGarbageCollectionGracePeriodMs`.
    pub repo_garbage_collection_grace_period_ms: Option<u64>,
    /// Override for `repoIndexTimeoutMs`.
    pub repo_index_timeout_ms: Option<u64>,
    /// Override for `connectionSyncTimeoutMs`.
    pub connection_sync_timeout_ms: Option<u64>,
    /// Override for `rateLimitBackoffBaseMs`.
    pub rate_limit_backoff_base_ms: Option<u64>,
    /// Override for `rateLimitBackoffMaxMs`.
    pub rate_limit_backoff_max_ms: Option<u64>,
    /// Override for `maxTerminalJobsPerEntity`.
    pub max_terminal_jobs_per_entity: Option<u32>,
    /// Config file path.
    pub config_path: Option<Box<str>>,
    /// Tracing filter directives.
    pub log_filter: Option<Box<str>>,
    /// Secret Manager bearer token.
    pub gcp_access_token: Option<SecretString>,
    /// Secret Manager base URL.
    pub gcp_secret_manager_url: Option<Box<str>>,
}

impl CodesyncEnv {
    /// Parse from an explicit variable map.
    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self, EnvParseError> {
        Ok(Self {
            resync_connection_interval_ms: parse_optional_u64(
                map,
                ENV_RESYNC_CONNECTION_INTERVAL_MS,
            )?,
            resync_connection_polling_interval_ms: parse_optional_u64(
                map,
                ENV_RESYNC_CONNECTION_POLLING_INTERVAL_MS,
            )?,
            reindex_interval_ms: parse_optional_u64(map, ENV_REINDEX_INTERVAL_MS)?,
            reindex_repo_polling_interval_ms: parse_optional_u64(
                map,
                ENV_REINDEX_REPO_POLLING_INTERVAL_MS,
            )?,
            max_connection_sync_job_concurrency: parse_optional_u32(
                map,
                ENV_MAX_CONNECTION_SYNC_JOB_CONCURRENCY,
            )?,
            max_repo_indexing_job_concurrency: parse_optional_u32(
                map,
                ENV_MAX_REPO_INDEXING_JOB_CONCURRENCY,
            )?,
            max_repo_garbage_collection_job_concurrency: parse_optional_u32(
                map,
                ENV_MAX_REPO_GARBAGE_COLLECTION_JOB_CONCURRENCY,
            )?,
            repo_garbage_collection_grace_period_ms: parse_optional_u64(
                map,
                ENV_REPO_GARBAGE_COLLECTION_GRACE_PERIOD_MS,
            )?,
            repo_index_timeout_ms: parse_optional_u64(map, ENV_REPO_INDEX_TIMEOUT_MS)?,
            connection_sync_timeout_ms: parse_optional_u64(map, ENV_CONNECTION_SYNC_TIMEOUT_MS)?,
            rate_limit_backoff_base_ms: parse_optional_u64(map, ENV_RATE_LIMIT_BACKOFF_BASE_MS)?,
            rate_limit_backoff_max_ms: parse_optional_u64(map, ENV_RATE_LIMIT_BACKOFF_MAX_MS)?,
            max_terminal_jobs_per_entity: parse_optional_u32(
                map,
                ENV_MAX_TERMINAL_JOBS_PER_ENTITY,
            )?,
            config_path: parse_optional_trimmed_string(map, ENV_CONFIG)?,
            log_filter: parse_optional_trimmed_string(map, ENV_LOG)?,
            gcp_access_token: parse_optional_secret(map, ENV_GCP_ACCESS_TOKEN)?,
            gcp_secret_manager_url: parse_optional_url_string(map, ENV_GCP_SECRET_MANAGER_URL)?,
        })
    }

    /// Parse from the process environment.
    pub fn from_std_env() -> Result<Self, EnvParseError> {
        let map = ALL_VARS
            .iter()
            .filter_map(|name| {
                std::env::var(name)
                    .ok()
                    .map(|value| ((*name).to_owned(), value))
            })
            .collect();
        Self::from_map(&map)
    }

    fn apply_to(&self, settings: &mut Settings) {
        set(
            &mut settings.resync_connection_interval_ms,
            self.resync_connection_interval_ms,
        );
        set(
            &mut settings.resync_connection_polling_interval_ms,
            self.resync_connection_polling_interval_ms,
        );
        set(&mut settings.reindex_interval_ms, self.reindex_interval_ms);
        set(
            &mut settings.reindex_repo_polling_interval_ms,
            self.reindex_repo_polling_interval_ms,
        );
        set(
            &mut settings.max_connection_sync_job_concurrency,
            self.max_connection_sync_job_concurrency,
        );
        set(
            &mut settings.max_repo_indexing_job_concurrency,
            self.max_repo_indexing_job_concurrency,
        );
        set(
            &mut settings.max_repo_garbage_collection_job_concurrency,
            self.max_repo_garbage_collection_job_concurrency,
        );
        set(
            &mut settings.repo_garbage_collection_grace_period_ms,
            self.repo_garbage_collection_grace_period_ms,
        );
        set(&mut settings.repo_index_timeout_ms, self.repo_index_timeout_ms);
        set(
            &mut settings.connection_sync_timeout_ms,
            self.connection_sync_timeout_ms,
        );
        set(
            &mut settings.rate_limit_backoff_base_ms,
            self.rate_limit_backoff_base_ms,
        );
        set(
            &mut settings.rate_limit_backoff_max_ms,
            self.rate_limit_backoff_max_ms,
        );
        set(
            &mut settings.max_terminal_jobs_per_entity,
            self.max_terminal_jobs_per_entity,
        );
    }
}

fn set<T: Copy>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

/// Apply env overrides to a base config (env wins over file/default values).
pub fn apply_env_overrides(
    base: CodesyncConfig,
    env: &CodesyncEnv,
) -> Result<ValidatedConfig, ErrorEnvelope> {
    let mut config = base;
    env.apply_to(&mut config.settings);
    config.validate_and_normalize().map_err(Into::into)
}

/// Validation failures when parsing env variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvParseError {
    /// An env var was present but empty after trimming.
    EmptyValue {
        /// Env var name.
        var: &'static str,
    },
    /// A secret env var was present but empty after trimming.
    EmptySecret {
        /// Env var name.
        var: &'static str,
    },
    /// Integer env var had an invalid value.
    InvalidInt {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
    /// URL env var had an invalid value.
    InvalidUrl {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
}

impl EnvParseError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::EmptyValue { .. } | Self::EmptySecret { .. } => {
                ErrorCode::new("config", "empty_env_var")
            },
            Self::InvalidInt { .. } => ErrorCode::new("config", "invalid_env_int"),
            Self::InvalidUrl { .. } => ErrorCode::new("config", "invalid_env_url"),
        }
    }
}

impl fmt::Display for EnvParseError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyValue { var } | Self::EmptySecret { var } => {
                write!(formatter, "{var} must be non-empty")
            },
            Self::InvalidInt { var, .. } => {
                write!(formatter, "{var} must be a non-negative integer")
            },
            Self::InvalidUrl { var, .. } => write!(formatter, "{var} must be an http(s) URL"),
        }
    }
}

impl std::error::Error for EnvParseError {}

impl From<EnvParseError> for ErrorEnvelope {
    fn from(error: EnvParseError) -> Self {
        let envelope = Self::expected(error.error_code(), error.to_string());
        match error {
            EnvParseError::EmptyValue { var } | EnvParseError::EmptySecret { var } => {
                envelope.with_metadata("env_var", var)
            },
            EnvParseError::InvalidInt { var, value } | EnvParseError::InvalidUrl { var, value } => {
                envelope
                    .with_metadata("env_var", var)
                    .with_metadata("value", redact_value(var, &value))
            },
        }
    }
}

fn parse_optional_trimmed_string(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<Box<str>>, EnvParseError> {
    let Some(raw) = map.get(var) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EnvParseError::EmptyValue { var });
    }
    Ok(Some(trimmed.into()))
}

fn parse_optional_secret(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<SecretString>, EnvParseError> {
    let Some(raw) = map.get(var) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EnvParseError::EmptySecret { var });
    }
    Ok(Some(SecretString::new(trimmed.to_owned())))
}

fn parse_optional_u64(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<u64>, EnvParseError> {
    let Some(raw) = map.get(var) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EnvParseError::EmptyValue { var });
    }
    trimmed
        .parse::<u64>()
        .map(Some)
        .map_err(|_| EnvParseError::InvalidInt {
            var,
            value: raw.clone(),
        })
}

fn parse_optional_u32(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<u32>, EnvParseError> {
    let Some(raw) = map.get(var) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EnvParseError::EmptyValue { var });
    }
    trimmed
        .parse::<u32>()
        .map(Some)
        .map_err(|_| EnvParseError::InvalidInt {
            var,
            value: raw.clone(),
        })
}

fn parse_optional_url_string(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<Box<str>>, EnvParseError> {
    let Some(raw) = map.get(var) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EnvParseError::EmptyValue { var });
    }
    let invalid = || EnvParseError::InvalidUrl {
        var,
        value: raw.clone(),
    };
    let parsed = Url::parse(trimmed).map_err(|_| invalid())?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(invalid());
    }
    Ok(Some(trimmed.trim_end_matches('/').into()))
}

fn redact_value(var: &str, value: &str) -> String {
    if is_secret_key(var) {
        REDACTED.to_owned()
    } else {
        value.to_owned()
    }
}
