//! Integration tests for parsing config fixtures from the workspace testkit.

use codesync_config::{
    CURRENT_CONFIG_VERSION, CodesyncEnv, load_config_from_path, parse_codesync_config_json,
    parse_codesync_config_toml,
};
use codesync_domain::{ConnectionConfig, ConnectionName, FailureKind, SecretRef};
use codesync_shared::ErrorCode;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

fn fixture_path(relative: &str) -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .map_or_else(|| manifest_dir.to_path_buf(), Path::to_path_buf)
        .join("testkit")
        .join("fixtures")
        .join(relative)
}

fn read_fixture(relative: &str) -> Result<String, Box<dyn Error>> {
    Ok(fs::read_to_string(fixture_path(relative))?)
}

#[test]
fn parses_valid_json_fixture() -> Result<(), Box<dyn Error>> {
    let config = parse_codesync_config_json(&read_fixture("config/codesync.valid.json")?)?;

    assert_eq!(config.version(), CURRENT_CONFIG_VERSION);
    assert_eq!(config.settings().max_connection_sync_job_concurrency(), 4);
    assert_eq!(config.settings().repo_garbage_collection_grace_period_ms(), 60_000);
    assert_eq!(config.settings().max_repo_indexing_job_concurrency(), 8);
    assert!(config.rejected().is_empty());

    let github = config
        .connections()
        .get(&ConnectionName::parse("acme-github")?)
        .ok_or_else(|| std::io::Error::other("missing acme-github"))?;
    assert_eq!(github.url(), "https://github.com");
    assert_eq!(github.token(), Some(&SecretRef::env("ACME_GITHUB_TOKEN")));
    let rules = github.exclusion_rules();
    assert!(rules.forks);
    assert!(rules.archived);
    Ok(())
}

#[test]
fn parses_valid_toml_fixture() -> Result<(), Box<dyn Error>> {
    let config = parse_codesync_config_toml(&read_fixture("config/codesync.valid.toml")?)?;
    assert_eq!(config.settings().max_repo_indexing_job_concurrency(), 2);
    assert_eq!(config.settings().reindex_interval_ms(), 7_200_000);

    let platform = config
        .connections()
        .get(&ConnectionName::parse("platform")?)
        .ok_or_else(|| std::io::Error::other("missing platform"))?;
    assert!(matches!(platform, ConnectionConfig::Gitlab(gitlab) if !gitlab.all));
    Ok(())
}

#[test]
fn rejected_connections_keep_their_typed_error() -> Result<(), Box<dyn Error>> {
    let config =
        parse_codesync_config_json(&read_fixture("config/codesync.rejected-connection.json")?)?;
    assert_eq!(config.connections().len(), 1);

    let kind_of = |name: &str| -> Result<Option<FailureKind>, Box<dyn Error>> {
        Ok(config
            .rejected()
            .get(&ConnectionName::parse(name)?)
            .map(|error| FailureKind::from_code(&error.code)))
    };
    assert_eq!(kind_of("typo")?, Some(FailureKind::UnknownConnectionType));
    assert_eq!(kind_of("server")?, Some(FailureKind::MissingRequiredField));
    Ok(())
}

#[test]
fn out_of_range_setting_fails_the_document() -> Result<(), Box<dyn Error>> {
    let error =
        parse_codesync_config_json(&read_fixture("config/codesync.invalid-setting.json")?).err();
    let error = error.ok_or_else(|| std::io::Error::other("expected setting error"))?;
    assert_eq!(error.code, ErrorCode::new("config", "invalid_setting"));
    assert_eq!(
        error.metadata_value("field"),
        Some("maxRepoIndexingJobConcurrency")
    );
    Ok(())
}

#[test]
fn loads_from_path_with_detected_format() -> Result<(), Box<dyn Error>> {
    let env = CodesyncEnv {
        max_repo_indexing_job_concurrency: Some(5),
        ..CodesyncEnv::default()
    };
    let config = load_config_from_path(Some(&fixture_path("config/codesync.valid.toml")), &env)?;
    assert_eq!(config.settings().max_repo_indexing_job_concurrency(), 5);
    assert_eq!(config.settings().reindex_interval_ms(), 7_200_000);
    Ok(())
}
