//! Config loading helpers (file + env).
//!
//! The loader fixes the merge order and surfaces user-facing errors as typed
//! `ErrorEnvelope`s.

use crate::schema::{CodesyncConfig, EffectiveConfig, ValidatedConfig};
use crate::{CodesyncEnv, apply_env_overrides};
use codesync_shared::{ErrorClass, ErrorCode, ErrorEnvelope};
use std::path::Path;

/// Serialization format of a config document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.json` or no extension.
    Json,
    /// `.toml`.
    Toml,
}

impl ConfigFormat {
    /// Pick the format from a file extension.
    pub fn detect(path: &Path) -> Result<Self, ErrorEnvelope> {
        let ext = path
            .extension()
            .and_then(|value| value.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            None | Some("json") => Ok(Self::Json),
            Some("toml") => Ok(Self::Toml),
            Some(other) => Err(ErrorEnvelope::expected(
                ErrorCode::new("config", "unsupported_config_format"),
                "unsupported config format; use .json or .toml",
            )
            .with_metadata("extension", other.to_owned())),
        }
    }
}

/// Load config from in-memory text.
///
/// Precedence (highest wins):
/// - env overrides (`CodesyncEnv`)
/// - config document
/// - defaults (`CodesyncConfig::default()`)
pub fn load_config_from_sources(
    config_text: Option<(&str, ConfigFormat)>,
    env: &CodesyncEnv,
) -> Result<ValidatedConfig, ErrorEnvelope> {
    let config = match config_text {
        None => CodesyncConfig::default(),
        Some((input, format)) => parse_config_unvalidated(input, format)?,
    };
    // env is applied last and also validates the merged settings.
    apply_env_overrides(config, env)
}

/// Load config from an optional file path.
pub fn load_config_from_path(
    config_path: Option<&Path>,
    env: &CodesyncEnv,
) -> Result<ValidatedConfig, ErrorEnvelope> {
    match config_path {
        None => load_config_from_sources(None, env),
        Some(path) => {
            let format = ConfigFormat::detect(path)?;
            let text = read_config_file(path)?;
            load_config_from_sources(Some((&text, format)), env)
        },
    }
}

/// Load config from the process environment and an optional file path.
///
/// An explicit path wins over `CODESYNC_CONFIG`.
pub fn load_config_std_env(config_path: Option<&Path>) -> Result<ValidatedConfig, ErrorEnvelope> {
    let env = CodesyncEnv::from_std_env().map_err(ErrorEnvelope::from)?;
    let env_path = env.config_path.as_deref().map(Path::new);
    load_config_from_path(config_path.or(env_path), &env)
}

/// Serialize the effective config as pretty JSON (with trailing newline).
pub fn to_pretty_json(config: &EffectiveConfig) -> Result<String, ErrorEnvelope> {
    let mut output = serde_json::to_string_pretty(config).map_err(|error| {
        ErrorEnvelope::unexpected(
            ErrorCode::internal(),
            format!("failed to serialize config: {error}"),
            ErrorClass::NonRetriable,
        )
    })?;
    output.push('\n');
    Ok(output)
}

/// Serialize the effective config as pretty TOML (with trailing newline).
pub fn to_pretty_toml(config: &EffectiveConfig) -> Result<String, ErrorEnvelope> {
    let mut output = toml::to_string_pretty(config).map_err(|error| {
        ErrorEnvelope::unexpected(
            ErrorCode::new("config", "serialize_toml"),
            format!("failed to serialize config TOML: {error}"),
            ErrorClass::NonRetriable,
        )
    })?;
    if !output.ends_with('\n') {
        output.push('\n');
    }
    Ok(output)
}

fn parse_config_unvalidated(
    input: &str,
    format: ConfigFormat,
) -> Result<CodesyncConfig, ErrorEnvelope> {
    match format {
        ConfigFormat::Json => serde_json::from_str(input).map_err(|error| {
            ErrorEnvelope::expected(
                ErrorCode::new("config", "invalid_json"),
                format!("invalid config JSON: {error}"),
            )
            .with_metadata("source", "config")
        }),
        ConfigFormat::Toml => toml::from_str(input).map_err(|error| {
            ErrorEnvelope::expected(
                ErrorCode::new("config", "invalid_toml"),
                format!("invalid config TOML: {error}"),
            )
            .with_metadata("source", "config")
        }),
    }
}

/// Read a config file, mapping I/O failures to config error codes.
pub fn read_config_file(path: &Path) -> Result<String, ErrorEnvelope> {
    std::fs::read_to_string(path).map_err(|error| {
        let code = match error.kind() {
            std::io::ErrorKind::NotFound => ErrorCode::new("config", "config_file_not_found"),
            std::io::ErrorKind::PermissionDenied => {
                ErrorCode::new("config", "config_file_permission_denied")
            },
            _ => ErrorCode::new("config", "config_file_read_failed"),
        };
        ErrorEnvelope::expected(code, format!("failed to read config file: {error}"))
            .with_metadata("path", path.to_string_lossy().to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_file_values() -> Result<(), Box<dyn std::error::Error>> {
        let config_json = r#"{ "version": 1, "settings": { "repoIndexTimeoutMs": 45000 } }"#;
        let env = CodesyncEnv {
            repo_index_timeout_ms: Some(60_000),
            ..CodesyncEnv::default()
        };
        let config = load_config_from_sources(Some((config_json, ConfigFormat::Json)), &env)?;
        assert_eq!(config.settings().repo_index_timeout().as_millis(), 60_000);
        Ok(())
    }

    #[test]
    fn invalid_file_value_overridden_by_env_succeeds() -> Result<(), Box<dyn std::error::Error>> {
        // 500 ms is below the 1s minimum; env replaces it before validation.
        let config_json = r#"{ "settings": { "connectionSyncTimeoutMs": 500 } }"#;
        let env = CodesyncEnv {
            connection_sync_timeout_ms: Some(30_000),
            ..CodesyncEnv::default()
        };
        let config = load_config_from_sources(Some((config_json, ConfigFormat::Json)), &env)?;
        assert_eq!(config.settings().connection_sync_timeout().as_millis(), 30_000);
        Ok(())
    }

    #[test]
    fn serialization_is_deterministic() -> Result<(), Box<dyn std::error::Error>> {
        let config = load_config_from_sources(None, &CodesyncEnv::default())?;
        let first = to_pretty_json(&config.effective())?;
        let second = to_pretty_json(&config.effective())?;
        assert_eq!(first, second);
        assert!(first.ends_with('\n'));
        assert!(to_pretty_toml(&config.effective())?.contains("[settings]"));
        Ok(())
    }

    #[test]
    fn unknown_extensions_are_rejected() {
        let error = ConfigFormat::detect(Path::new("codesync.yaml")).err();
        assert!(error.is_some_and(|error| {
            error.code.is("config", "unsupported_config_format")
                && error.metadata_value("extension") == Some("yaml")
        }));
        assert_eq!(
            ConfigFormat::detect(Path::new("codesync")).ok(),
            Some(ConfigFormat::Json)
        );
    }

    #[test]
    fn missing_files_have_a_dedicated_code() {
        let error = load_config_from_path(
            Some(Path::new("/definitely/not/here/codesync.json")),
            &CodesyncEnv::default(),
        )
        .err();
        assert!(error.is_some_and(|error| error.code.is("config", "config_file_not_found")));
    }
}
