//! # tracker-indexer-ports
//!
//! Port traits for the tracker-indexer hexagonal architecture.
//!
//! This crate defines the collaborator surface the coordinator is written
//! against: tracked-project source, timestamp store, clock, cron schedule,
//! run factory, worker spawner, logging, and telemetry. Shutdown is observed
//! through the cancellation token of the coordinator's `RequestContext`.
//! It depends only on `domain` and `shared`.

use std::future::Future;
use std::pin::Pin;

/// Boxed future used by port traits.
///
/// Boundary traits are I/O-bound and object-safe, so boxing is acceptable;
/// batched writes exist for the paths that persist several values at once.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Returns the ports crate version.
#[must_use]
pub const fn ports_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub mod clock;
pub mod logger;
pub mod projects;
pub mod telemetry;
pub mod timestamps;
pub mod worker;

pub use clock::*;
pub use logger::*;
pub use projects::*;
pub use telemetry::*;
pub use timestamps::*;
pub use worker::*;

// Re-export domain types used in port signatures, so adapter crates can
// implement ports without naming `tracker-indexer-domain` for these.
pub use tracker_indexer_domain::{
    ProjectKey, ProjectRunSnapshot, RunKind, RunOutcome, RunProgress, ScheduleProperty,
    ScheduleState,
};
