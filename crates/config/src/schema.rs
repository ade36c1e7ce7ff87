//! Top-level config document: version, settings, and named connections.
//!
//! - Deserialization uses `serde` (JSON or TOML).
//! - Settings are range-checked into bounded types.
//! - Each connection is parsed independently; a bad connection is recorded
//!   as rejected instead of failing the whole document.

use crate::connection::parse_connection_config;
use crate::settings::{Settings, ValidatedSettings};
use codesync_domain::{ConnectionConfig, ConnectionName};
use codesync_shared::{ErrorCode, ErrorEnvelope};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Current supported configuration schema version.
pub const CURRENT_CONFIG_VERSION: u32 = 1;

/// Config file contents before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct CodesyncConfig {
    /// Schema version.
    pub version: u32,
    /// Scheduler settings.
    pub settings: Settings,
    /// Connection configs keyed by name, still untyped.
    pub connections: BTreeMap<String, Value>,
}

impl Default for CodesyncConfig {
    fn default() -> Self {
        Self {
            version: CURRENT_CONFIG_VERSION,
            settings: Settings::default(),
            connections: BTreeMap::new(),
        }
    }
}

impl CodesyncConfig {
    /// Validate settings and parse every connection.
    pub fn validate_and_normalize(self) -> Result<ValidatedConfig, ConfigSchemaError> {
        if self.version != CURRENT_CONFIG_VERSION {
            return Err(ConfigSchemaError::UnsupportedVersion {
                found: self.version,
                supported: CURRENT_CONFIG_VERSION,
            });
        }
        let settings = self.settings.validate()?;

        let mut connections = BTreeMap::new();
        let mut rejected = BTreeMap::new();
        for (raw_name, raw) in self.connections {
            let name = ConnectionName::parse(&raw_name).map_err(|_| {
                ConfigSchemaError::InvalidConnectionName {
                    name: raw_name.clone(),
                }
            })?;
            match parse_connection_config(&raw) {
                Ok(config) => {
                    connections.insert(name, config);
                },
                Err(error) => {
                    let envelope =
                        ErrorEnvelope::from(error).with_metadata("connection", name.as_str());
                    rejected.insert(name, envelope);
                },
            }
        }

        Ok(ValidatedConfig {
            version: self.version,
            settings,
            connections,
            rejected,
        })
    }
}

/// A config whose settings are in range and whose connections are typed.
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    version: u32,
    settings: ValidatedSettings,
    connections: BTreeMap<ConnectionName, ConnectionConfig>,
    rejected: BTreeMap<ConnectionName, ErrorEnvelope>,
}

impl ValidatedConfig {
    /// Schema version.
    #[must_use]
    pub const fn version(&self) -> u32 {
        self.version
    }

    /// Validated settings.
    #[must_use]
    pub const fn settings(&self) -> &ValidatedSettings {
        &self.settings
    }

    /// Connections that parsed successfully.
    #[must_use]
    pub const fn connections(&self) -> &BTreeMap<ConnectionName, ConnectionConfig> {
        &self.connections
    }

    /// Connections that failed to parse, with their typed error.
    #[must_use]
    pub const fn rejected(&self) -> &BTreeMap<ConnectionName, ErrorEnvelope> {
        &self.rejected
    }

    /// Parse result for one connection, if it is configured at all.
    #[must_use]
    pub fn connection(
        &self,
        name: &ConnectionName,
    ) -> Option<Result<&ConnectionConfig, &ErrorEnvelope>> {
        self.connections
            .get(name)
            .map(Ok)
            .or_else(|| self.rejected.get(name).map(Err))
    }

    /// Every configured connection name, valid or not.
    pub fn connection_names(&self) -> impl Iterator<Item = &ConnectionName> {
        let mut names: Vec<_> = self.connections.keys().chain(self.rejected.keys()).collect();
        names.sort();
        names.into_iter()
    }

    /// Fail when any connection was rejected.
    pub fn ensure_all_connections_valid(&self) -> Result<(), ErrorEnvelope> {
        match self.rejected.values().next() {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    /// Defaulted, serializable view.
    #[must_use]
    pub fn effective(&self) -> EffectiveConfig {
        EffectiveConfig {
            version: self.version,
            settings: self.settings.to_settings(),
            connections: self
                .connections
                .iter()
                .map(|(name, config)| (name.as_str().to_owned(), config.clone()))
                .collect(),
            rejected: self
                .rejected
                .iter()
                .map(|(name, error)| (name.as_str().to_owned(), error.to_string()))
                .collect(),
        }
    }
}

/// Effective config as printed by `config show`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveConfig {
    /// Schema version.
    pub version: u32,
    /// Settings with defaults filled in.
    pub settings: Settings,
    /// Typed connections with defaults filled in.
    pub connections: BTreeMap<String, ConnectionConfig>,
    /// Rejected connections and why.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub rejected: BTreeMap<String, String>,
}

/// Parse and validate a JSON config document.
pub fn parse_codesync_config_json(input: &str) -> Result<ValidatedConfig, ErrorEnvelope> {
    let config: CodesyncConfig = serde_json::from_str(input).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "invalid_json"),
            format!("invalid config JSON: {error}"),
        )
    })?;
    config.validate_and_normalize().map_err(ErrorEnvelope::from)
}

/// Parse and validate a TOML config document.
pub fn parse_codesync_config_toml(input: &str) -> Result<ValidatedConfig, ErrorEnvelope> {
    let config: CodesyncConfig = toml::from_str(input).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "invalid_toml"),
            format!("invalid config TOML: {error}"),
        )
    })?;
    config.validate_and_normalize().map_err(ErrorEnvelope::from)
}

/// Config document errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSchemaError {
    /// The config version is not supported by this binary.
    UnsupportedVersion {
        /// Version found in the config.
        found: u32,
        /// Version supported by this crate.
        supported: u32,
    },
    /// A setting is outside its allowed range.
    SettingOutOfRange {
        /// Setting name (camelCase).
        field: &'static str,
        /// Value provided.
        value: u64,
        /// Minimum allowed value.
        min: u64,
        /// Maximum allowed value.
        max: u64,
    },
    /// Two settings contradict each other.
    SettingConflict {
        /// Setting name (camelCase).
        field: &'static str,
        /// Human readable reason.
        reason: String,
    },
    /// A key under `connections` is not a valid connection name.
    InvalidConnectionName {
        /// Offending key.
        name: String,
    },
}

impl ConfigSchemaError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::UnsupportedVersion { .. }
            | Self::SettingOutOfRange { .. }
            | Self::SettingConflict { .. } => ErrorCode::new("config", "invalid_setting"),
            Self::InvalidConnectionName { .. } => ErrorCode::new("config", "invalid_field_shape"),
        }
    }
}

impl fmt::Display for ConfigSchemaError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedVersion { found, supported } => write!(
                formatter,
                "unsupported config version: {found} (supported: {supported})"
            ),
            Self::SettingOutOfRange {
                field,
                value,
                min,
                max,
            } => write!(
                formatter,
                "settings.{field} must be within [{min}, {max}] (got {value})"
            ),
            Self::SettingConflict { field, reason } => {
                write!(formatter, "settings.{field} {reason}")
            },
            Self::InvalidConnectionName { name } => write!(
                formatter,
                "connection name `{name}` must match ^[\\w.-]+$"
            ),
        }
    }
}

impl std::error::Error for ConfigSchemaError {}

impl From<ConfigSchemaError> for ErrorEnvelope {
    fn from(error: ConfigSchemaError) -> Self {
        let envelope = Self::expected(error.error_code(), error.to_string());
        match error {
            ConfigSchemaError::UnsupportedVersion { found, supported } => envelope
                .with_metadata("field", "version")
                .with_metadata("found", found.to_string())
                .with_metadata("supported", supported.to_string()),
            ConfigSchemaError::SettingOutOfRange {
                field,
                value,
                min,
                max,
            } => envelope
                .with_metadata("field", field)
                .with_metadata("value", value.to_string())
                .with_metadata("min", min.to_string())
                .with_metadata("max", max.to_string()),
            ConfigSchemaError::SettingConflict { field, .. } => {
                envelope.with_metadata("field", field)
            },
            ConfigSchemaError::InvalidConnectionName { name } => {
                envelope.with_metadata("connection", name)
            },
        }
    }
}
