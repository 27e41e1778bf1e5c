//! Composition root: wires the production adapters into a coordinator.

use std::sync::Arc;
use tokio::runtime::Handle;
use tracker_indexer_adapters::{
    CommandRunFactory, JsonFileTimestampStore, QuartzCron, StaticProjectSource, SystemClock,
    TokioWorkerSpawner, TracingLogger, TracingTelemetry,
};
use tracker_indexer_app::{CoordinatorDeps, CoordinatorSettings, IndexingCoordinator};
use tracker_indexer_config::ValidatedIndexerConfig;
use tracker_indexer_ports::CronSchedulePort;

/// Build a coordinator whose workers are spawned on `runtime`.
pub fn build_coordinator(config: &ValidatedIndexerConfig, runtime: Handle) -> IndexingCoordinator {
    let settings = CoordinatorSettings::from_config(config, |cron| {
        Arc::new(QuartzCron::new(cron)) as Arc<dyn CronSchedulePort>
    });
    let deps = CoordinatorDeps {
        projects: Arc::new(StaticProjectSource::from_config(config)),
        timestamps: Arc::new(JsonFileTimestampStore::new(config.storage.state_file.clone())),
        clock: Arc::new(SystemClock),
        runs: Arc::new(CommandRunFactory::from_config(config)),
        workers: Arc::new(TokioWorkerSpawner::new(runtime)),
        logger: Some(Arc::new(TracingLogger::new())),
        telemetry: Some(Arc::new(TracingTelemetry::new())),
    };
    IndexingCoordinator::new(deps, settings)
}

/// Multi-threaded runtime for commands that talk to the coordinator.
pub fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracker_indexer_config::parse_indexer_config_json;
    use tracker_indexer_shared::{RequestContext, Result};

    #[tokio::test]
    async fn coordinator_reflects_the_config() -> Result<()> {
        let config = parse_indexer_config_json(
            r#"{
                "version": 1,
                "coordinator": { "maxConcurrency": 3 },
                "projects": { "keys": ["JBESB", "ORG"] },
                "storage": { "stateFile": "/nonexistent/tix/state.json" }
            }"#,
        )?;
        let coordinator = build_coordinator(&config, Handle::current());

        assert_eq!(coordinator.settings().max_concurrency.get(), 3);
        assert_eq!(coordinator.in_flight_count(), 0);
        let projects = coordinator
            .list_tracked_projects(&RequestContext::new_request())
            .await?;
        let keys: Vec<&str> = projects.iter().map(|project| project.key.as_str()).collect();
        assert_eq!(keys, ["JBESB", "ORG"]);
        Ok(())
    }
}
