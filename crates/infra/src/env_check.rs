//! Environment validation helpers for CLI surfaces.

use codesync_config::{CodesyncConfig, CodesyncEnv, apply_env_overrides};
use codesync_shared::ErrorEnvelope;
use std::collections::BTreeMap;

/// Infra-level error type (shared error envelope).
pub type InfraError = ErrorEnvelope;

/// Infra-level result type.
pub type InfraResult<T> = Result<T, InfraError>;

/// Parse `CODESYNC_*` variables from an explicit map.
pub fn parse_env(env: &BTreeMap<String, String>) -> InfraResult<CodesyncEnv> {
    CodesyncEnv::from_map(env).map_err(ErrorEnvelope::from)
}

/// Validate that the provided env overrides parse and produce valid settings.
pub fn validate_env_parsing(env: &BTreeMap<String, String>) -> InfraResult<()> {
    let parsed = parse_env(env)?;
    let _ = apply_env_overrides(CodesyncConfig::default(), &parsed)?;
    Ok(())
}
