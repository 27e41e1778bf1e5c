//! # tracker-indexer-app
//!
//! The indexing coordinator and its scheduling policy.
//! This crate depends on `config`, `ports`, `domain`, and `shared`.

pub mod coordinator;
pub mod management;
pub mod registry;
pub mod schedule;
pub mod settings;
pub mod slot;

pub use coordinator::{CompletionReport, CoordinatorDeps, IndexingCoordinator, WakeInterval};
pub use management::{ReindexRequestOutcome, TrackedProject};
pub use registry::{InFlightRun, IndexingRegistry};
pub use schedule::{FullUpdateSchedule, SchedulePolicy};
pub use settings::CoordinatorSettings;
pub use slot::{SlotDecision, decide_slot};

/// Returns the app crate version.
#[must_use]
pub const fn app_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
