//! `config check|show|schema` handlers.

use crate::error::{CliError, ExitCode};
use crate::format::{OutputMode, ndjson_summary, pretty_json};
use crate::{CliOutput, log_info};
use std::path::Path;
use tracker_indexer_config::{
    ValidatedIndexerConfig, indexer_config_schema, to_pretty_json, to_pretty_toml,
};

/// Serialization used by `config show` in text mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ConfigSyntax {
    /// TOML document.
    #[default]
    Toml,
    /// Pretty JSON document.
    Json,
}

/// Report that the effective config loaded and validated.
pub fn run_config_check(
    mode: OutputMode,
    path: Option<&Path>,
    config: &ValidatedIndexerConfig,
) -> Result<CliOutput, CliError> {
    let mut stderr = String::new();
    log_info(&mut stderr, "config check completed", mode.no_progress);

    let projects = config.project_keys().len();
    let stdout = if mode.is_ndjson() {
        ndjson_summary("ok", "config", Some(serde_json::json!({ "projects": projects })))
    } else if mode.is_json() {
        pretty_json(&serde_json::json!({
            "status": "ok",
            "configPath": path.map(|value| value.to_string_lossy().to_string()),
            "projects": projects,
            "fullCron": config.full_cron().map(|cron| cron.as_str().to_owned()),
        }))?
    } else {
        let mut out = String::from("status: ok\nconfig: ok\n");
        if let Some(path) = path {
            out.push_str(&format!("path: {}\n", path.to_string_lossy()));
        }
        out.push_str(&format!("projects: {projects}\n"));
        out
    };

    Ok(CliOutput {
        stdout,
        stderr,
        exit_code: ExitCode::Ok,
    })
}

/// Print the effective config after file, overrides and env are merged.
pub fn run_config_show(
    mode: OutputMode,
    path: Option<&Path>,
    config: &ValidatedIndexerConfig,
    syntax: ConfigSyntax,
) -> Result<CliOutput, CliError> {
    let mut stderr = String::new();
    log_info(&mut stderr, "config show completed", mode.no_progress);

    let stdout = if mode.is_ndjson() || mode.is_json() {
        let effective = serde_json::to_value(config.as_ref())?;
        let payload = serde_json::json!({
            "status": "ok",
            "configPath": path.map(|value| value.to_string_lossy().to_string()),
            "effectiveConfig": effective,
        });
        if mode.is_ndjson() {
            ndjson_summary("ok", "config", Some(payload))
        } else {
            pretty_json(&payload)?
        }
    } else {
        match syntax {
            ConfigSyntax::Toml => to_pretty_toml(config.as_ref())?,
            ConfigSyntax::Json => to_pretty_json(config.as_ref())?,
        }
    };

    Ok(CliOutput {
        stdout,
        stderr,
        exit_code: ExitCode::Ok,
    })
}

/// Print the JSON Schema of the config file.
pub fn run_config_schema() -> Result<CliOutput, CliError> {
    let schema = serde_json::to_value(indexer_config_schema())?;
    Ok(CliOutput {
        stdout: pretty_json(&schema)?,
        stderr: String::new(),
        exit_code: ExitCode::Ok,
    })
}
