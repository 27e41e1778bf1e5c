//! # tracker-indexer-config
//!
//! Configuration schema, validation, and normalization for the indexing
//! coordinator. This crate depends on `domain` and `shared` only.

/// Environment variable parsing and merging.
pub mod env;
/// Config loading helpers (env + file + overrides).
pub mod load;
/// Configuration schema types and helpers.
pub mod schema;
/// JSON Schema export.
pub mod schema_export;

pub use schema::{
    CURRENT_CONFIG_VERSION, ConfigLimits, ConfigSchemaError, CoordinatorConfig, IndexerConfig,
    ProjectsConfig, ScheduleConfig, StorageConfig, ValidatedIndexerConfig,
    WORKER_KIND_PLACEHOLDER, WORKER_PROJECT_PLACEHOLDER, WorkerConfig, parse_indexer_config_json,
    parse_indexer_config_toml,
};

pub use env::{EnvParseError, IndexerEnv, apply_env_overrides};
pub use load::{
    load_indexer_config_from_path, load_indexer_config_from_sources, load_indexer_config_std_env,
    to_pretty_json, to_pretty_toml,
};
pub use schema_export::indexer_config_schema;

/// Returns the config crate version.
#[must_use]
pub const fn config_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
