//! Error fixtures injected by the test doubles.

use tracker_indexer_domain::ProjectKey;
use tracker_indexer_shared::{ErrorClass, ErrorCode, ErrorEnvelope};

/// Injected failure of a timestamp-store operation.
pub fn store_unavailable(operation: &str) -> ErrorEnvelope {
    ErrorEnvelope::unexpected(
        ErrorCode::unavailable(),
        "timestamp store unavailable",
        ErrorClass::Retriable,
    )
    .with_metadata("operation", operation)
}

/// Injected failure of the tracked-project listing.
pub fn source_unavailable() -> ErrorEnvelope {
    ErrorEnvelope::unexpected(
        ErrorCode::unavailable(),
        "project source unavailable",
        ErrorClass::Retriable,
    )
}

/// Injected failure of a scripted run.
pub fn run_failed(project_key: &ProjectKey) -> ErrorEnvelope {
    ErrorEnvelope::expected(ErrorCode::new("indexer", "run_failed"), "scripted run failure")
        .with_metadata("project", project_key.as_str())
}
