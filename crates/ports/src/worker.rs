//! Project run and worker execution boundary contracts.

use crate::BoxFuture;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracker_indexer_domain::{ProjectKey, ProjectRunSnapshot, RunKind};
use tracker_indexer_shared::{RequestContext, Result};

/// One indexing run for a single project.
pub trait ProjectRun: Send + Sync {
    /// Project being indexed.
    fn project_key(&self) -> &ProjectKey;

    /// Kind decided at dispatch.
    fn run_kind(&self) -> RunKind;

    /// Execute the run to completion. Implementations watch `ctx` for
    /// interruption and return a cancellation error when they stop early.
    fn execute(self: Arc<Self>, ctx: RequestContext) -> BoxFuture<'static, Result<()>>;

    /// Point-in-time progress. Must not block.
    fn snapshot(&self) -> ProjectRunSnapshot;
}

/// Creates runs for dispatched projects.
pub trait ProjectRunFactoryPort: Send + Sync {
    /// Build (but do not start) a run.
    fn create(
        &self,
        project_key: ProjectKey,
        run_kind: RunKind,
        started_at: DateTime<Utc>,
    ) -> Result<Arc<dyn ProjectRun>>;
}

/// Work executed by a worker; receives a context that is cancelled on interrupt.
pub type WorkerTask = Box<dyn FnOnce(RequestContext) -> BoxFuture<'static, ()> + Send>;

/// Independent execution context for one run.
pub trait WorkerHandle: Send + Sync {
    /// Worker name, for logs.
    fn name(&self) -> &str;

    /// Start executing. Calling it again is a no-op.
    fn start(&self);

    /// Best-effort cooperative cancellation.
    fn interrupt(&self);

    /// Returns true once the work has returned.
    fn is_finished(&self) -> bool;
}

/// Creates workers. Returned handles are not started.
pub trait WorkerSpawnerPort: Send + Sync {
    /// Wrap `work` in a new, not-yet-started worker.
    fn start_worker(&self, name: &str, work: WorkerTask) -> Box<dyn WorkerHandle>;
}
