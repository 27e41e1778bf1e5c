//! In-flight bookkeeping: the work queue and the registry of running projects.
//!
//! Both structures live behind one mutex and are only touched through the
//! operations below; callers never see the raw maps.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracker_indexer_domain::{ProjectKey, ProjectRunSnapshot, RunKind};
use tracker_indexer_ports::{ProjectRun, WorkerHandle};

/// One registered run and the worker executing it.
#[derive(Clone)]
pub struct InFlightRun {
    run: Arc<dyn ProjectRun>,
    worker: Arc<dyn WorkerHandle>,
}

impl InFlightRun {
    /// Pair a run with its worker.
    #[must_use]
    pub fn new(run: Arc<dyn ProjectRun>, worker: Arc<dyn WorkerHandle>) -> Self {
        Self { run, worker }
    }

    /// Kind decided at dispatch.
    #[must_use]
    pub fn run_kind(&self) -> RunKind {
        self.run.run_kind()
    }

    /// Live progress of the run.
    #[must_use]
    pub fn snapshot(&self) -> ProjectRunSnapshot {
        self.run.snapshot()
    }

    /// Worker executing the run.
    #[must_use]
    pub fn worker(&self) -> &Arc<dyn WorkerHandle> {
        &self.worker
    }
}

#[derive(Default)]
struct RegistryState {
    queue: VecDeque<ProjectKey>,
    queued: BTreeSet<ProjectKey>,
    in_flight: BTreeMap<ProjectKey, InFlightRun>,
    last_completed: BTreeMap<ProjectKey, ProjectRunSnapshot>,
}

/// Queue plus in-flight registry guarded by a single lock.
#[derive(Default)]
pub struct IndexingRegistry {
    state: Mutex<RegistryState>,
}

impl IndexingRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        // Every critical section leaves the state consistent, so a poisoned
        // lock is still safe to use.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `key` unless it is already queued or in flight.
    pub fn enqueue(&self, key: ProjectKey) -> bool {
        let mut state = self.lock();
        if state.in_flight.contains_key(&key) || state.queued.contains(&key) {
            return false;
        }
        state.queued.insert(key.clone());
        state.queue.push_back(key);
        true
    }

    /// Returns true when the project is queued or in flight.
    #[must_use]
    pub fn is_scheduled(&self, key: &ProjectKey) -> bool {
        let state = self.lock();
        state.in_flight.contains_key(key) || state.queued.contains(key)
    }

    /// Pop the queue head when fewer than `max_in_flight` runs are registered.
    /// Returns the key with the in-flight count observed under the lock.
    pub fn pop_if_capacity(&self, max_in_flight: usize) -> Option<(ProjectKey, usize)> {
        let mut state = self.lock();
        let in_flight = state.in_flight.len();
        if in_flight >= max_in_flight {
            return None;
        }
        let key = state.queue.pop_front()?;
        state.queued.remove(&key);
        Some((key, in_flight))
    }

    /// Number of queued projects.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.lock().queue.len()
    }

    /// Queued projects in dispatch order.
    #[must_use]
    pub fn queued_keys(&self) -> Vec<ProjectKey> {
        self.lock().queue.iter().cloned().collect()
    }

    /// Register a run. Fails (returns false) when the project is already in flight.
    pub fn try_insert(&self, key: ProjectKey, run: InFlightRun) -> bool {
        let mut state = self.lock();
        if state.in_flight.contains_key(&key) {
            return false;
        }
        state.in_flight.insert(key, run);
        true
    }

    /// Remove a run; `None` when it was not registered.
    pub fn remove(&self, key: &ProjectKey) -> Option<InFlightRun> {
        self.lock().in_flight.remove(key)
    }

    /// Number of registered runs.
    #[must_use]
    pub fn in_flight_len(&self) -> usize {
        self.lock().in_flight.len()
    }

    /// Kind of the registered run for `key`, if any.
    #[must_use]
    pub fn in_flight_kind(&self, key: &ProjectKey) -> Option<RunKind> {
        self.lock().in_flight.get(key).map(InFlightRun::run_kind)
    }

    /// Snapshot every registered run, ordered by project key.
    #[must_use]
    pub fn snapshot_all(&self) -> Vec<ProjectRunSnapshot> {
        let runs: Vec<InFlightRun> = self.lock().in_flight.values().cloned().collect();
        runs.iter().map(InFlightRun::snapshot).collect()
    }

    /// Remove every registered run and clear the queue.
    pub fn drain(&self) -> Vec<(ProjectKey, InFlightRun)> {
        let mut state = self.lock();
        state.queue.clear();
        state.queued.clear();
        std::mem::take(&mut state.in_flight).into_iter().collect()
    }

    /// Keep the final snapshot of a completed run.
    pub fn record_completed(&self, snapshot: ProjectRunSnapshot) {
        self.lock()
            .last_completed
            .insert(snapshot.project_key.clone(), snapshot);
    }

    /// Forget completed-run snapshots of projects no longer tracked.
    pub fn retain_completed(&self, tracked: &BTreeSet<ProjectKey>) {
        self.lock()
            .last_completed
            .retain(|key, _| tracked.contains(key));
    }

    /// Final snapshots of the most recent completed run per project.
    #[must_use]
    pub fn last_completed(&self) -> Vec<ProjectRunSnapshot> {
        self.lock().last_completed.values().cloned().collect()
    }
}
