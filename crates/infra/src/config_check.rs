//! Config loading and summaries for CLI surfaces.

use crate::InfraResult;
use crate::env_check::parse_env;
use codesync_config::{
    ValidatedConfig, load_config_from_path, parse_connection_config_json, read_config_file,
    to_pretty_json, to_pretty_toml,
};
use codesync_domain::{CodeHostType, ConnectionConfig, FailureKind};
use codesync_shared::ErrorEnvelope;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Output format for `config show`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigRenderFormat {
    /// Pretty JSON.
    Json,
    /// Pretty TOML.
    Toml,
}

/// Load and validate the config. An explicit path wins over `CODESYNC_CONFIG`.
pub fn load_validated_config(
    env: &BTreeMap<String, String>,
    config_path: Option<&Path>,
) -> InfraResult<ValidatedConfig> {
    let env = parse_env(env)?;
    let env_path = env.config_path.as_deref().map(Path::new);
    load_config_from_path(config_path.or(env_path), &env)
}

/// Load and validate the effective config, returning deterministic pretty JSON.
pub fn load_effective_config_json(
    env: &BTreeMap<String, String>,
    config_path: Option<&Path>,
) -> InfraResult<String> {
    let config = load_validated_config(env, config_path)?;
    to_pretty_json(&config.effective())
}

/// Render the defaulted config.
pub fn render_effective_config(
    config: &ValidatedConfig,
    format: ConfigRenderFormat,
) -> InfraResult<String> {
    let effective = config.effective();
    match format {
        ConfigRenderFormat::Json => to_pretty_json(&effective),
        ConfigRenderFormat::Toml => to_pretty_toml(&effective),
    }
}

/// Outcome of validating a whole config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSummary {
    /// Schema version.
    pub version: u32,
    /// Number of usable connections.
    pub valid: usize,
    /// Number of rejected connections.
    pub rejected: usize,
    /// Per-connection results, ordered by name.
    pub connections: Vec<ConnectionSummary>,
}

impl ConfigSummary {
    /// Returns true when every connection parsed.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.rejected == 0
    }
}

/// One connection in a [`ConfigSummary`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSummary {
    /// Connection name.
    pub name: String,
    /// Code host, when the connection parsed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_host: Option<CodeHostType>,
    /// Rejection details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ConnectionIssue>,
}

/// Why a connection was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionIssue {
    /// Failure kind, e.g. `UnexpectedField`.
    pub kind: String,
    /// Stable `namespace:code`.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Offending field, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl From<&ErrorEnvelope> for ConnectionIssue {
    fn from(error: &ErrorEnvelope) -> Self {
        Self {
            kind: FailureKind::from_code(&error.code).to_string(),
            code: format!("{}:{}", error.code.namespace(), error.code.code()),
            message: error.message.clone(),
            field: error.metadata_value("field").map(str::to_owned),
        }
    }
}

/// Summarize valid and rejected connections.
#[must_use]
pub fn summarize_config(config: &ValidatedConfig) -> ConfigSummary {
    let mut connections: Vec<ConnectionSummary> = config
        .connections()
        .iter()
        .map(|(name, connection)| ConnectionSummary {
            name: name.as_str().to_owned(),
            code_host: Some(connection.kind()),
            error: None,
        })
        .chain(config.rejected().iter().map(|(name, error)| ConnectionSummary {
            name: name.as_str().to_owned(),
            code_host: None,
            error: Some(ConnectionIssue::from(error)),
        }))
        .collect();
    connections.sort_by(|left, right| left.name.cmp(&right.name));

    ConfigSummary {
        version: config.version(),
        valid: config.connections().len(),
        rejected: config.rejected().len(),
        connections,
    }
}

/// Parse a single connection config file (JSON).
pub fn check_connection_file(path: &Path) -> InfraResult<ConnectionConfig> {
    let raw = read_config_file(path)?;
    parse_connection_config_json(&raw)
        .map_err(|error| error.with_metadata("path", path.display().to_string()))
}
