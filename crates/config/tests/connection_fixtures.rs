//! Connection config fixtures: one file per connection, parsed in isolation.

use codesync_config::{ConnectionConfigError, parse_connection_config_json};
use codesync_domain::{AzureDevOpsDeploymentType, ConnectionConfig, FailureKind, SizeRange};
use std::error::Error;
use std::fs;
use std::path::Path;

fn read_fixture(name: &str) -> Result<String, Box<dyn Error>> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../testkit/fixtures/connections")
        .join(name);
    Ok(fs::read_to_string(path)?)
}

#[test]
fn github_fixture_is_defaulted() -> Result<(), Box<dyn Error>> {
    let config = parse_connection_config_json(&read_fixture("github.valid.json")?)?;
    let ConnectionConfig::Github(github) = config else {
        return Err("expected a github connection".into());
    };
    assert_eq!(&*github.url, "https://github.com");
    assert_eq!(
        github.exclude.size,
        Some(SizeRange {
            min: Some(1024),
            max: Some(104_857_600)
        })
    );
    assert!(github.orgs.is_empty());
    Ok(())
}

#[test]
fn azure_devops_fixture_keeps_server_settings() -> Result<(), Box<dyn Error>> {
    let config = parse_connection_config_json(&read_fixture("azuredevops.valid.json")?)?;
    let ConnectionConfig::AzureDevOps(azure) = config else {
        return Err("expected an azuredevops connection".into());
    };
    assert_eq!(azure.deployment_type, AzureDevOpsDeploymentType::Server);
    assert!(azure.use_tfs_path);
    assert!(azure.exclude.disabled);
    assert!(azure.token.describe().contains("ado-pat"));
    Ok(())
}

#[test]
fn gerrit_fixture_reports_nested_unexpected_field() -> Result<(), Box<dyn Error>> {
    let raw: serde_json::Value =
        serde_json::from_str(&read_fixture("gerrit.unexpected-field.json")?)?;
    let error = codesync_config::parse_connection_config(&raw).err();
    assert_eq!(
        error,
        Some(ConnectionConfigError::UnexpectedField {
            field: "exclude.archived".to_owned()
        })
    );
    assert_eq!(
        error.map(|error| error.kind()),
        Some(FailureKind::UnexpectedField)
    );
    Ok(())
}
