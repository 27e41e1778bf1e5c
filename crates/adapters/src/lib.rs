//! # tracker-indexer-adapters
//!
//! Adapter implementations for the coordinator's ports: logging and
//! telemetry over `tracing`, the wall clock and cron schedule, tokio-backed
//! workers, the JSON state file, the static project source, and
//! command-driven project runs.
//! This crate depends on `config`, `domain`, `ports`, and `shared`.

pub mod clock;
pub mod command;
pub mod logger;
pub mod projects;
pub mod state_file;
pub mod telemetry;
pub mod worker;

pub use clock::{QuartzCron, SystemClock};
pub use command::{CommandRun, CommandRunError, CommandRunFactory};
pub use logger::TracingLogger;
pub use projects::StaticProjectSource;
pub use state_file::{JsonFileTimestampStore, StateFileError};
pub use telemetry::TracingTelemetry;
pub use worker::{TokioWorkerHandle, TokioWorkerSpawner};

/// Returns the adapters crate version.
#[must_use]
pub const fn adapters_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracker_indexer_ports::ports_crate_version;
    use tracker_indexer_shared::shared_crate_version;

    fn workspace_deps() -> Vec<String> {
        let cargo_toml = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml"));
        let mut deps = Vec::new();
        let mut in_deps = false;

        for raw_line in cargo_toml.lines() {
            let line = raw_line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('[') {
                in_deps = line == "[dependencies]" || line == "[dev-dependencies]";
                continue;
            }
            if in_deps && line.starts_with("tracker-indexer-") {
                let key = line.split('=').next().unwrap_or("").trim();
                deps.push(key.split('.').next().unwrap_or("").trim().to_string());
            }
        }

        deps
    }

    #[test]
    fn adapters_do_not_depend_on_app_or_cli() {
        let forbidden = ["tracker-indexer-app", "tracker-indexer-cli"];
        for dep in workspace_deps() {
            assert!(
                !forbidden.contains(&dep.as_str()),
                "forbidden dependency found: {dep}"
            );
        }
    }

    #[test]
    fn adapters_can_use_ports_and_shared() {
        assert!(!adapters_crate_version().is_empty());
        assert!(!ports_crate_version().is_empty());
        assert!(!shared_crate_version().is_empty());
    }
}
