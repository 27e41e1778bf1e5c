//! # tracker-indexer-testkit
//!
//! Deterministic test doubles for the coordinator's ports.
//! This crate depends on `domain`, `ports`, and `shared`.

pub mod errors;
pub mod in_memory;
pub mod runs;

pub use in_memory::{
    FixedCron, InMemoryProjectSource, InMemoryTimestampStore, ManualClock, NoopLogger,
    NoopTelemetry, RecordingLogger, RecordingTelemetry,
};
pub use runs::{RunScript, ScriptedRun, ScriptedRunFactory};

/// Returns the testkit crate version.
#[must_use]
pub const fn testkit_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
