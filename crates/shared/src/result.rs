//! Result alias and envelope-aware combinators.

use crate::errors::ErrorEnvelope;

/// Shared result type used across the workspace.
pub type Result<T, E = ErrorEnvelope> = std::result::Result<T, E>;

/// Helpers for annotating envelope errors on the way up.
pub trait ResultExt<T> {
    /// Attach the failing operation name as `operation` metadata.
    fn with_operation(self, operation: &'static str) -> Result<T>;

    /// Attach an arbitrary metadata entry to the error, if any.
    fn with_error_metadata(self, key: &'static str, value: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_operation(self, operation: &'static str) -> Result<T> {
        self.map_err(|error| error.with_metadata("operation", operation))
    }

    fn with_error_metadata(self, key: &'static str, value: impl Into<String>) -> Result<T> {
        self.map_err(|error| error.with_metadata(key, value))
    }
}
