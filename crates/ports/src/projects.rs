//! Tracked-project source boundary contract.

use crate::BoxFuture;
use tracker_indexer_domain::ProjectKey;
use tracker_indexer_shared::{RequestContext, Result};

/// Supplies the set of currently tracked projects.
///
/// The set may grow or shrink between calls; a key missing from the result
/// is simply not tracked anymore.
pub trait ProjectSourcePort: Send + Sync {
    /// List tracked project keys. Transient failures surface as errors.
    fn list_tracked_project_keys(
        &self,
        ctx: &RequestContext,
    ) -> BoxFuture<'_, Result<Vec<ProjectKey>>>;
}
