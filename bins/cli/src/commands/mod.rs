//! CLI command handlers.

pub mod config;
pub mod info;
pub mod projects;
pub mod reindex;
pub mod run;

pub use config::{ConfigSyntax, run_config_check, run_config_schema, run_config_show};
pub use info::run_info;
pub use projects::run_projects;
pub use reindex::{ReindexKind, run_reindex};
pub use run::{ctrl_c, run_coordinator};
