//! # tracker-indexer-shared
//!
//! Shared result types, error handling, and cancellation primitives for the
//! tracker-indexer workspace.
//!
//! - Result and error envelope types
//! - Request context with cooperative cancellation
//! - Bounded numeric wrappers for validated configuration values
//!
//! This crate has no workspace dependencies and is safe to import anywhere.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod concurrency;
pub mod errors;
pub mod invariants;
pub mod result;

pub use concurrency::{CancellationToken, CorrelationId, RequestContext};
pub use errors::{
    ErrorClass, ErrorCode, ErrorEnvelope, ErrorKind, ErrorMetadata, UnexpectedError,
    normalize_unexpected_error,
};
pub use invariants::{BoundedU32, BoundedU64, BoundsError};
pub use result::{Result, ResultExt};

/// Returns the shared crate version.
#[must_use]
pub const fn shared_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
