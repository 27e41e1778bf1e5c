//! Worker spawner backed by tokio tasks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Handle;
use tracker_indexer_ports::{WorkerHandle, WorkerSpawnerPort, WorkerTask};
use tracker_indexer_shared::{
    CancellationToken, CorrelationId, ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result,
};

/// Spawns each worker as a task on one tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioWorkerSpawner {
    runtime: Handle,
}

impl TokioWorkerSpawner {
    /// Spawner targeting `runtime`.
    #[must_use]
    pub const fn new(runtime: Handle) -> Self {
        Self { runtime }
    }

    /// Spawner targeting the runtime of the calling task.
    pub fn from_current() -> Result<Self> {
        Handle::try_current().map(Self::new).map_err(|error| {
            ErrorEnvelope::unexpected(
                ErrorCode::internal(),
                format!("no tokio runtime available: {error}"),
                ErrorClass::NonRetriable,
            )
        })
    }
}

impl WorkerSpawnerPort for TokioWorkerSpawner {
    fn start_worker(&self, name: &str, work: WorkerTask) -> Box<dyn WorkerHandle> {
        Box::new(TokioWorkerHandle {
            name: name.into(),
            runtime: self.runtime.clone(),
            work: Mutex::new(Some(work)),
            token: CancellationToken::new(),
            finished: Arc::new(AtomicBool::new(false)),
        })
    }
}

/// Handle to one spawned-on-start worker.
pub struct TokioWorkerHandle {
    name: Box<str>,
    runtime: Handle,
    work: Mutex<Option<WorkerTask>>,
    token: CancellationToken,
    finished: Arc<AtomicBool>,
}

struct FinishedFlag(Arc<AtomicBool>);

impl Drop for FinishedFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl WorkerHandle for TokioWorkerHandle {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&self) {
        let work = self
            .work
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(work) = work else {
            return;
        };

        let ctx = RequestContext::with_cancellation(CorrelationId::new_job_id(), self.token.clone());
        let flag = FinishedFlag(Arc::clone(&self.finished));
        let future = work(ctx);
        self.runtime.spawn(async move {
            let _flag = flag;
            future.await;
        });
    }

    fn interrupt(&self) {
        self.token.cancel();
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for TokioWorkerHandle {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("TokioWorkerHandle")
            .field("name", &self.name)
            .field("interrupted", &self.token.is_cancelled())
            .field("finished", &self.is_finished())
            .finish_non_exhaustive()
    }
}
