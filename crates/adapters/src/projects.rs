//! Project source returning a fixed list of keys.

use tracker_indexer_config::ValidatedIndexerConfig;
use tracker_indexer_domain::ProjectKey;
use tracker_indexer_ports::{BoxFuture, ProjectSourcePort};
use tracker_indexer_shared::{RequestContext, Result};

/// Tracks exactly the configured projects.
#[derive(Debug, Clone, Default)]
pub struct StaticProjectSource {
    keys: Vec<ProjectKey>,
}

impl StaticProjectSource {
    /// Source over `keys`, in the given order.
    #[must_use]
    pub const fn new(keys: Vec<ProjectKey>) -> Self {
        Self { keys }
    }

    /// Source over `projects.keys` of a validated config.
    #[must_use]
    pub fn from_config(config: &ValidatedIndexerConfig) -> Self {
        Self::new(config.project_keys().to_vec())
    }
}

impl ProjectSourcePort for StaticProjectSource {
    fn list_tracked_project_keys(
        &self,
        ctx: &RequestContext,
    ) -> BoxFuture<'_, Result<Vec<ProjectKey>>> {
        let result = ctx
            .ensure_not_cancelled("projects.list")
            .map(|()| self.keys.clone());
        Box::pin(async move { result })
    }
}
