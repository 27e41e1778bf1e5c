//! Info command handler.

use crate::CliOutput;
use crate::error::{CliError, ExitCode};
use crate::format::{OutputMode, ndjson_line, pretty_json};
use tracker_indexer_adapters::adapters_crate_version;
use tracker_indexer_app::app_crate_version;
use tracker_indexer_config::{CURRENT_CONFIG_VERSION, config_crate_version};

struct BuildInfo {
    name: &'static str,
    version: &'static str,
    app: &'static str,
    adapters: &'static str,
    config: &'static str,
}

const fn build_info() -> BuildInfo {
    BuildInfo {
        name: "tix",
        version: env!("CARGO_PKG_VERSION"),
        app: app_crate_version(),
        adapters: adapters_crate_version(),
        config: config_crate_version(),
    }
}

/// Run the info command.
pub fn run_info(mode: OutputMode) -> Result<CliOutput, CliError> {
    let build = build_info();

    let stdout = if mode.is_ndjson() {
        let mut payload = build_json(&build);
        if let Some(object) = payload.as_object_mut() {
            object.insert("type".to_owned(), serde_json::Value::from("info"));
        }
        ndjson_line(&payload)?
    } else if mode.is_json() {
        pretty_json(&serde_json::json!({
            "status": "ok",
            "build": build_json(&build),
        }))?
    } else {
        format!(
            "status: ok\nname: {}\nversion: {}\napp: {}\nadapters: {}\nconfig: {} (schema v{})\n",
            build.name,
            build.version,
            build.app,
            build.adapters,
            build.config,
            CURRENT_CONFIG_VERSION,
        )
    };

    Ok(CliOutput {
        stdout,
        stderr: String::new(),
        exit_code: ExitCode::Ok,
    })
}

fn build_json(build: &BuildInfo) -> serde_json::Value {
    serde_json::json!({
        "name": build.name,
        "version": build.version,
        "appVersion": build.app,
        "adaptersVersion": build.adapters,
        "configVersion": build.config,
        "configSchemaVersion": CURRENT_CONFIG_VERSION,
    })
}
