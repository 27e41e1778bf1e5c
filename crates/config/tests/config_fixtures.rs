//! Integration tests for parsing config fixtures from the workspace testkit.

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use tracker_indexer_config::{
    CURRENT_CONFIG_VERSION, IndexerEnv, load_indexer_config_from_path, parse_indexer_config_json,
    parse_indexer_config_toml, to_pretty_json, to_pretty_toml,
};
use tracker_indexer_shared::ErrorCode;

fn workspace_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_else(|| manifest_dir.to_path_buf())
}

fn fixture_path(relative: &str) -> PathBuf {
    workspace_root()
        .join("crates")
        .join("testkit")
        .join("fixtures")
        .join(relative)
}

fn read_fixture(relative: &str) -> Result<String, Box<dyn Error>> {
    Ok(fs::read_to_string(fixture_path(relative))?)
}

#[test]
fn parses_valid_fixture_and_normalizes() -> Result<(), Box<dyn Error>> {
    let contents = read_fixture("config/indexer-config.valid.json")?;
    let config = parse_indexer_config_json(&contents)?;

    assert_eq!(config.version, CURRENT_CONFIG_VERSION);
    assert_eq!(config.coordinator.max_concurrency, 4);
    assert_eq!(config.limits().quick_interval_ms.get(), 2_000);
    assert_eq!(
        config.limits().full_period_ms.map(|value| value.get()),
        Some(86_400_000)
    );

    assert_eq!(
        config.schedule.full_cron.as_deref(),
        Some("0 0 3 * * ?"),
        "cron should be trimmed"
    );
    assert!(config.full_cron().is_some());

    let keys: Vec<&str> = config.projects.keys.iter().map(AsRef::as_ref).collect();
    assert_eq!(keys, vec!["AS7", "JBESB", "ORG"]);
    assert_eq!(config.project_keys().len(), 3);

    assert_eq!(config.worker.command.len(), 5);
    assert_eq!(config.storage.state_file, Path::new("var/tix/state.json"));
    Ok(())
}

#[test]
fn parses_valid_toml_fixture() -> Result<(), Box<dyn Error>> {
    let contents = read_fixture("config/indexer-config.valid.toml")?;
    let config = parse_indexer_config_toml(&contents)?;

    assert_eq!(config.coordinator.quick_interval_ms, 500);
    assert!(config.limits().full_period_ms.is_none());
    assert!(config.full_cron().is_none());
    assert!(config.worker.command.is_empty());
    Ok(())
}

#[test]
fn rejects_unsupported_version() -> Result<(), Box<dyn Error>> {
    let contents = read_fixture("config/indexer-config.invalid-version.json")?;
    let Err(error) = parse_indexer_config_json(&contents) else {
        return Err("expected unsupported version".into());
    };

    assert_eq!(error.code, ErrorCode::new("config", "unsupported_version"));
    assert_eq!(error.metadata.get("found").map(String::as_str), Some("2"));
    Ok(())
}

#[test]
fn rejects_invalid_cron() -> Result<(), Box<dyn Error>> {
    let contents = read_fixture("config/indexer-config.invalid-cron.json")?;
    let Err(error) = parse_indexer_config_json(&contents) else {
        return Err("expected invalid cron".into());
    };

    assert_eq!(error.code, ErrorCode::new("config", "invalid_cron"));
    assert_eq!(
        error.metadata.get("field").map(String::as_str),
        Some("fullCron")
    );
    Ok(())
}

#[test]
fn rejects_unknown_fields() -> Result<(), Box<dyn Error>> {
    let contents = read_fixture("config/indexer-config.unknown-field.json")?;
    let Err(error) = parse_indexer_config_json(&contents) else {
        return Err("expected unknown field error".into());
    };

    assert_eq!(error.code, ErrorCode::new("config", "invalid_json"));
    assert!(error.message.contains("maxIndexingThreads"));
    Ok(())
}

#[test]
fn rejects_invalid_project_key() -> Result<(), Box<dyn Error>> {
    let contents = read_fixture("config/indexer-config.invalid-project-key.json")?;
    let Err(error) = parse_indexer_config_json(&contents) else {
        return Err("expected invalid project key".into());
    };

    assert_eq!(error.code, ErrorCode::new("config", "invalid_project_key"));
    assert_eq!(error.metadata.get("key").map(String::as_str), Some("BAD KEY"));
    Ok(())
}

#[test]
fn loads_toml_from_path_with_format_detection() -> Result<(), Box<dyn Error>> {
    let path = fixture_path("config/indexer-config.invalid-interval-order.toml");
    let Err(error) = load_indexer_config_from_path(Some(&path), None, &IndexerEnv::default())
    else {
        return Err("expected interval order error".into());
    };

    assert_eq!(
        error.code,
        ErrorCode::new("config", "invalid_interval_order")
    );
    Ok(())
}

#[test]
fn pretty_output_round_trips_through_the_parser() -> Result<(), Box<dyn Error>> {
    let contents = read_fixture("config/indexer-config.valid.json")?;
    let config = parse_indexer_config_json(&contents)?.into_inner();

    let reparsed = parse_indexer_config_toml(&to_pretty_toml(&config)?)?;
    assert_eq!(reparsed.as_ref(), &config);

    let reparsed = parse_indexer_config_json(&to_pretty_json(&config)?)?;
    assert_eq!(reparsed.as_ref(), &config);
    Ok(())
}
