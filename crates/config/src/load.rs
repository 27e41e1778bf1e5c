//! Config loading helpers (env + file + overrides).
//!
//! The loader owns the merge order and surfaces user-facing errors as typed
//! `ErrorEnvelope`s.

use crate::{IndexerConfig, IndexerEnv, ValidatedIndexerConfig, apply_env_overrides};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracker_indexer_shared::{ErrorClass, ErrorCode, ErrorEnvelope};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Json,
    Toml,
}

/// Load the indexer config from sources using a deterministic precedence order.
///
/// Precedence (highest wins):
/// - env overrides (`IndexerEnv`)
/// - overrides JSON (partial config)
/// - config JSON (file content)
/// - defaults (`IndexerConfig::default()`)
pub fn load_indexer_config_from_sources(
    config_json: Option<&str>,
    overrides_json: Option<&str>,
    env: &IndexerEnv,
) -> Result<ValidatedIndexerConfig, ErrorEnvelope> {
    let mut config = match config_json {
        None => IndexerConfig::default(),
        Some(input) => parse_config_unvalidated(input, ConfigFormat::Json)?,
    };

    if let Some(input) = overrides_json {
        let overrides = parse_overrides_json(input)?;
        apply_overrides(&mut config, overrides);
    }

    // env is applied last and also validates/normalizes the resulting config.
    apply_env_overrides(config, env)
}

/// Load the indexer config from an optional file path (`.json` or `.toml`).
pub fn load_indexer_config_from_path(
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
    env: &IndexerEnv,
) -> Result<ValidatedIndexerConfig, ErrorEnvelope> {
    let mut config = match config_path {
        None => IndexerConfig::default(),
        Some(path) => {
            let format = detect_config_format(path)?;
            let config_text = read_config_file(path)?;
            parse_config_unvalidated(&config_text, format)?
        },
    };

    if let Some(input) = overrides_json {
        let overrides = parse_overrides_json(input)?;
        apply_overrides(&mut config, overrides);
    }

    apply_env_overrides(config, env)
}

/// Load the indexer config from std env and an optional file path.
pub fn load_indexer_config_std_env(
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
) -> Result<ValidatedIndexerConfig, ErrorEnvelope> {
    let env = IndexerEnv::from_std_env().map_err(ErrorEnvelope::from)?;
    load_indexer_config_from_path(config_path, overrides_json, &env)
}

/// Serialize the config as deterministic pretty JSON (with trailing newline).
pub fn to_pretty_json(config: &IndexerConfig) -> Result<String, ErrorEnvelope> {
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

/// Serialize the config as deterministic pretty TOML (with trailing newline).
pub fn to_pretty_toml(config: &IndexerConfig) -> Result<String, ErrorEnvelope> {
    let mut output = toml::to_string_pretty(config).map_err(|error| {
        ErrorEnvelope::unexpected(
            ErrorCode::new("config", "serialize_toml"),
            format!("failed to serialize config TOML: {error}"),
            ErrorClass::NonRetriable,
        )
    })?;
    output.push('\n');
    Ok(output)
}

fn parse_config_unvalidated(
    input: &str,
    format: ConfigFormat,
) -> Result<IndexerConfig, ErrorEnvelope> {
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

fn parse_overrides_json(input: &str) -> Result<IndexerConfigOverrides, ErrorEnvelope> {
    serde_json::from_str(input).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "invalid_json"),
            format!("invalid overrides JSON: {error}"),
        )
        .with_metadata("source", "overrides")
    })
}

fn read_config_file(path: &Path) -> Result<String, ErrorEnvelope> {
    std::fs::read_to_string(path).map_err(|error| {
        let code = match error.kind() {
            std::io::ErrorKind::NotFound => ErrorCode::new("config", "config_file_not_found"),
            std::io::ErrorKind::PermissionDenied => {
                ErrorCode::new("config", "config_file_permission_denied")
            },
            _ => ErrorCode::new("config", "config_file_io"),
        };

        ErrorEnvelope::expected(code, format!("failed to read config file: {error}"))
            .with_metadata("path", path.to_string_lossy().to_string())
    })
}

fn detect_config_format(path: &Path) -> Result<ConfigFormat, ErrorEnvelope> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        None | Some("json") => Ok(ConfigFormat::Json),
        Some("toml") => Ok(ConfigFormat::Toml),
        Some(other) => Err(ErrorEnvelope::expected(
            ErrorCode::new("config", "unsupported_format"),
            "unsupported config format; use .json or .toml",
        )
        .with_metadata("extension", other.to_string())),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct IndexerConfigOverrides {
    version: Option<u32>,
    coordinator: Option<CoordinatorOverrides>,
    schedule: Option<ScheduleOverrides>,
    projects: Option<ProjectsOverrides>,
    storage: Option<StorageOverrides>,
    worker: Option<WorkerOverrides>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct CoordinatorOverrides {
    max_concurrency: Option<u32>,
    quick_interval_ms: Option<u64>,
    slow_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct ScheduleOverrides {
    incremental_period_ms: Option<u64>,
    full_period_ms: Option<u64>,
    full_cron: Option<Box<str>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct ProjectsOverrides {
    keys: Option<Vec<Box<str>>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct StorageOverrides {
    state_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct WorkerOverrides {
    command: Option<Vec<Box<str>>>,
}

fn apply_overrides(config: &mut IndexerConfig, overrides: IndexerConfigOverrides) {
    replace(&mut config.version, overrides.version);

    if let Some(coordinator) = overrides.coordinator {
        replace(
            &mut config.coordinator.max_concurrency,
            coordinator.max_concurrency,
        );
        replace(
            &mut config.coordinator.quick_interval_ms,
            coordinator.quick_interval_ms,
        );
        replace(
            &mut config.coordinator.slow_interval_ms,
            coordinator.slow_interval_ms,
        );
    }

    if let Some(schedule) = overrides.schedule {
        replace(
            &mut config.schedule.incremental_period_ms,
            schedule.incremental_period_ms,
        );
        replace(&mut config.schedule.full_period_ms, schedule.full_period_ms);
        if schedule.full_cron.is_some() {
            config.schedule.full_cron = schedule.full_cron;
        }
    }

    if let Some(projects) = overrides.projects {
        replace(&mut config.projects.keys, projects.keys);
    }
    if let Some(storage) = overrides.storage {
        replace(&mut config.storage.state_file, storage.state_file);
    }
    if let Some(worker) = overrides.worker {
        replace(&mut config.worker.command, worker.command);
    }
}

fn replace<T>(field: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *field = value;
    }
}
