//! # tracker-indexer-domain
//!
//! Domain primitives and value objects for the indexing coordinator.
//!
//! - **Primitives** - `ProjectKey`
//! - **Runs** - `RunKind`, `RunProgress`, `RunOutcome`, `ProjectRunSnapshot`
//! - **Schedule** - `ScheduleProperty`, `ScheduleState`
//! - **Cron** - `CronExpression`, the Quartz-style full-update grammar
//!
//! ## Dependency Rules
//!
//! - Depends only on `shared` crate
//! - No infrastructure or adapter dependencies
//! - Pure domain logic with no I/O

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

// Re-export shared types for convenience
pub use tracker_indexer_shared::shared_crate_version;

// =============================================================================
// DOMAIN MODULES
// =============================================================================

pub mod cron;
pub mod primitives;
pub mod run;
pub mod schedule;

pub use cron::{CronExpression, CronParseError, MAX_CRON_YEAR};
pub use primitives::{MAX_PROJECT_KEY_LEN, PrimitiveError, ProjectKey};
pub use run::{ProjectRunSnapshot, RunKind, RunOutcome, RunProgress};
pub use schedule::{ScheduleProperty, ScheduleState};

/// Returns the domain crate version.
#[must_use]
pub const fn domain_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_crate_compiles() {
        let version = domain_crate_version();
        assert!(!version.is_empty());
    }

    #[test]
    fn domain_depends_on_shared() {
        let shared_version = shared_crate_version();
        assert!(!shared_version.is_empty());
    }
}
