//! # codesync-config
//!
//! Connection config parsing, scheduler settings, env overrides, and file
//! loading. This crate depends on `domain` and `shared` only.

/// Typed connection config parsing.
pub mod connection;
/// Environment variable parsing and merging.
pub mod env;
/// Config loading helpers (file + env).
pub mod load;
/// Config document schema.
pub mod schema;
/// Scheduler settings.
pub mod settings;

pub use connection::{ConnectionConfigError, parse_connection_config, parse_connection_config_json};
pub use env::{CodesyncEnv, EnvParseError, apply_env_overrides};
pub use load::{
    ConfigFormat, load_config_from_path, load_config_from_sources, load_config_std_env,
    read_config_file, to_pretty_json, to_pretty_toml,
};
pub use schema::{
    CURRENT_CONFIG_VERSION, CodesyncConfig, ConfigSchemaError, EffectiveConfig, ValidatedConfig,
    parse_codesync_config_json, parse_codesync_config_toml,
};
pub use settings::{Settings, ValidatedSettings};

/// Returns the config crate version.
#[must_use]
pub const fn config_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;
    use codesync_domain::domain_crate_version;
    use codesync_shared::shared_crate_version;

    #[test]
    fn config_crate_compiles() {
        assert!(!config_crate_version().is_empty());
    }

    #[test]
    fn config_can_use_domain_and_shared() {
        assert!(!domain_crate_version().is_empty());
        assert!(!shared_crate_version().is_empty());
    }
}
