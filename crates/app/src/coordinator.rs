//! The indexing coordinator: a long-lived loop that refills a work queue from
//! the scheduling policy and dispatches bounded runs onto workers.
//!
//! One loop task owns the wake interval and the dispatch pass. Workers report
//! back through [`IndexingCoordinator::report_completion`], which may race
//! with the loop; the registry serializes both.

use crate::registry::{InFlightRun, IndexingRegistry};
use crate::settings::CoordinatorSettings;
use crate::slot::{SlotDecision, decide_slot};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracker_indexer_domain::{ProjectKey, ProjectRunSnapshot, RunKind, RunOutcome, ScheduleProperty};
use tracker_indexer_ports::{
    BoxFuture, ClockPort, LogFields, LogLevel, LoggerPort, ProjectRun, ProjectRunFactoryPort,
    ProjectSourcePort, TelemetryPort, TimestampStorePort, WorkerHandle, WorkerSpawnerPort,
    WorkerTask, telemetry_tags,
};
use tracker_indexer_shared::{ErrorCode, ErrorEnvelope, RequestContext, Result};

/// Collaborators required by the coordinator.
#[derive(Clone)]
pub struct CoordinatorDeps {
    /// Tracked project listing.
    pub projects: Arc<dyn ProjectSourcePort>,
    /// Persisted per-project timestamps.
    pub timestamps: Arc<dyn TimestampStorePort>,
    /// Wall clock used for due-ness and persisted timestamps.
    pub clock: Arc<dyn ClockPort>,
    /// Builds runs for dispatched projects.
    pub runs: Arc<dyn ProjectRunFactoryPort>,
    /// Creates worker execution contexts.
    pub workers: Arc<dyn WorkerSpawnerPort>,
    /// Optional logger.
    pub logger: Option<Arc<dyn LoggerPort>>,
    /// Optional telemetry sink.
    pub telemetry: Option<Arc<dyn TelemetryPort>>,
}

/// Loop sleep preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeInterval {
    /// Work is queued; wake again soon.
    Quick,
    /// Nothing is queued.
    Slow,
}

impl WakeInterval {
    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Quick => "quick",
            Self::Slow => "slow",
        }
    }

    const fn duration(self, settings: &CoordinatorSettings) -> Duration {
        match self {
            Self::Quick => settings.quick_interval,
            Self::Slow => settings.slow_interval,
        }
    }
}

/// Notification that a run has ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionReport {
    /// Project whose run ended.
    pub project_key: ProjectKey,
    /// Whether the run finished without error.
    pub succeeded: bool,
    /// Kind the run was dispatched with.
    pub run_kind: RunKind,
    /// Final snapshot of the run, when available.
    pub snapshot: Option<ProjectRunSnapshot>,
}

impl CompletionReport {
    /// Report without a snapshot.
    #[must_use]
    pub const fn new(project_key: ProjectKey, succeeded: bool, run_kind: RunKind) -> Self {
        Self {
            project_key,
            succeeded,
            run_kind,
            snapshot: None,
        }
    }

    /// Attach the final run snapshot.
    #[must_use]
    pub fn with_snapshot(mut self, snapshot: ProjectRunSnapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }
}

/// Process-wide indexing coordinator. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct IndexingCoordinator {
    pub(crate) inner: Arc<CoordinatorInner>,
}

pub(crate) struct CoordinatorInner {
    pub(crate) deps: CoordinatorDeps,
    pub(crate) settings: CoordinatorSettings,
    pub(crate) registry: IndexingRegistry,
    started: AtomicBool,
}

struct CycleState {
    wake: WakeInterval,
    last_fill: Option<Instant>,
}

impl IndexingCoordinator {
    /// Build a coordinator; the loop starts with [`IndexingCoordinator::run`].
    #[must_use]
    pub fn new(deps: CoordinatorDeps, settings: CoordinatorSettings) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                deps,
                settings,
                registry: IndexingRegistry::new(),
                started: AtomicBool::new(false),
            }),
        }
    }

    /// Settings the coordinator was built with.
    #[must_use]
    pub fn settings(&self) -> &CoordinatorSettings {
        &self.inner.settings
    }

    /// Run the loop until `ctx` is cancelled.
    ///
    /// The loop cannot be restarted: a second call fails with
    /// `coordinator:already_started`. On exit every in-flight worker is
    /// interrupted and the registry is cleared, including when the returned
    /// future is dropped early.
    pub async fn run(&self, ctx: &RequestContext) -> Result<()> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Err(ErrorEnvelope::expected(
                ErrorCode::new("coordinator", "already_started"),
                "coordinator loop has already been started",
            ));
        }

        let settings = &self.inner.settings;
        self.inner.log(
            LogLevel::Info,
            "coordinator.run.start",
            "Indexing coordinator started",
            Some(log_fields([
                ("maxConcurrency", Value::from(settings.max_concurrency.get())),
                ("quickIntervalMs", Value::from(duration_ms(settings.quick_interval))),
                ("slowIntervalMs", Value::from(duration_ms(settings.slow_interval))),
                (
                    "fullUpdate",
                    Value::String(format!("{:?}", settings.policy.full_update())),
                ),
            ])),
        );

        let _shutdown = ShutdownGuard {
            inner: &self.inner,
        };
        let mut cycle = CycleState {
            wake: WakeInterval::Slow,
            last_fill: None,
        };

        while !ctx.is_cancelled() {
            if let Err(error) = self.inner.process_cycle(ctx, &mut cycle).await {
                if error.is_cancelled() || ctx.is_cancelled() {
                    break;
                }
                self.inner.log_failure(
                    LogLevel::Error,
                    "coordinator.cycle.failed",
                    "Indexing coordination cycle failed",
                    &error,
                    None,
                );
            }

            let interval = cycle.wake.duration(settings);
            self.inner.log(
                LogLevel::Debug,
                "coordinator.cycle.sleep",
                "Coordinator going to sleep",
                Some(log_fields([
                    ("wake", Value::from(cycle.wake.as_str())),
                    ("intervalMs", Value::from(duration_ms(interval))),
                ])),
            );
            tokio::select! {
                () = ctx.cancelled() => break,
                () = tokio::time::sleep(interval) => {},
            }
        }

        Ok(())
    }

    /// Handle the end of a run: unregister it, then on a successful full run
    /// persist `lastFullComplete` and clear the force-full flag.
    ///
    /// Unknown projects are a no-op for the registry. Persistence failures
    /// are logged, never returned.
    pub async fn report_completion(&self, ctx: &RequestContext, report: CompletionReport) {
        self.inner.report_completion(ctx, report).await;
    }

    /// Persist a force-full request; the next cycle picks it up.
    pub async fn force_full_reindex(&self, ctx: &RequestContext, project_key: ProjectKey) -> Result<()> {
        self.inner.force_full_reindex(ctx, project_key).await
    }

    /// Snapshots of every in-flight run, ordered by project key.
    #[must_use]
    pub fn current_status(&self) -> Vec<ProjectRunSnapshot> {
        self.inner.registry.snapshot_all()
    }

    /// Projects waiting for a dispatch decision, in queue order.
    #[must_use]
    pub fn queued_projects(&self) -> Vec<ProjectKey> {
        self.inner.registry.queued_keys()
    }

    /// Number of registered runs.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.inner.registry.in_flight_len()
    }
}

impl CoordinatorInner {
    #[tracing::instrument(name = "coordinator.cycle", skip_all)]
    async fn process_cycle(
        self: &Arc<Self>,
        ctx: &RequestContext,
        cycle: &mut CycleState,
    ) -> Result<()> {
        let now = Instant::now();
        let stale = cycle
            .last_fill
            .is_none_or(|filled| now.duration_since(filled) > self.settings.slow_interval);
        if self.registry.queue_len() == 0 || stale {
            cycle.last_fill = Some(now);
            if let Err(error) = self.fill_queue(ctx).await {
                if error.is_cancelled() {
                    return Err(error);
                }
                self.count("coordinator.fill.failed", None);
                self.log_failure(
                    LogLevel::Error,
                    "coordinator.fill.failed",
                    "Failed to refill the indexing queue",
                    &error,
                    None,
                );
            }
        }

        if self.registry.queue_len() == 0 {
            cycle.wake = WakeInterval::Slow;
            return Ok(());
        }
        cycle.wake = WakeInterval::Quick;
        self.dispatch(ctx).await
    }

    async fn fill_queue(&self, ctx: &RequestContext) -> Result<()> {
        let keys = self.deps.projects.list_tracked_project_keys(ctx).await?;
        let tracked: BTreeSet<ProjectKey> = keys.iter().cloned().collect();
        self.registry.retain_completed(&tracked);

        let now = self.deps.clock.now();
        let mut enqueued = 0_usize;
        for key in keys {
            ctx.ensure_not_cancelled("coordinator.fill")?;
            if self.registry.is_scheduled(&key) {
                continue;
            }
            let state = match self.deps.timestamps.read_schedule_state(ctx, key.clone()).await {
                Ok(state) => state,
                Err(error) if error.is_cancelled() => return Err(error),
                Err(error) => {
                    self.log_failure(
                        LogLevel::Warn,
                        "coordinator.fill.readFailed",
                        "Failed to read schedule state; project skipped this cycle",
                        &error,
                        Some(project_fields(&key)),
                    );
                    continue;
                },
            };
            if self.settings.policy.incremental_due(&state, now) && self.registry.enqueue(key) {
                enqueued += 1;
            }
        }

        let depth = self.registry.queue_len();
        self.gauge("coordinator.queue.depth", depth);
        self.log(
            LogLevel::Debug,
            "coordinator.fill.completed",
            "Indexing queue refilled",
            Some(log_fields([
                ("tracked", Value::from(tracked.len())),
                ("enqueued", Value::from(enqueued)),
                ("queueDepth", Value::from(depth)),
            ])),
        );
        Ok(())
    }

    async fn dispatch(self: &Arc<Self>, ctx: &RequestContext) -> Result<()> {
        let max = self.settings.max_concurrency.get();
        let mut first_deferred: Option<ProjectKey> = None;

        loop {
            ctx.ensure_not_cancelled("coordinator.dispatch")?;
            let Some((key, in_flight)) = self.registry.pop_if_capacity(max) else {
                return Ok(());
            };

            let state = match self.deps.timestamps.read_schedule_state(ctx, key.clone()).await {
                Ok(state) => state,
                Err(error) if error.is_cancelled() => return Err(error),
                Err(error) => {
                    self.log_failure(
                        LogLevel::Warn,
                        "coordinator.dispatch.failed",
                        "Failed to read schedule state; project dropped until next refill",
                        &error,
                        Some(project_fields(&key)),
                    );
                    if first_deferred.as_ref() == Some(&key) {
                        first_deferred = None;
                    }
                    continue;
                },
            };

            let run_kind = self.settings.policy.run_kind(&state, self.deps.clock.now());
            let decision = decide_slot(&key, run_kind, in_flight, max, first_deferred.as_ref());
            if !decision.dispatches() {
                self.count("coordinator.dispatch.deferred", None);
                self.log(
                    LogLevel::Debug,
                    "coordinator.dispatch.deferred",
                    "Full run deferred to keep the last slot for incremental work",
                    Some(project_fields(&key)),
                );
                if first_deferred.is_none() {
                    first_deferred = Some(key.clone());
                }
                self.registry.enqueue(key);
                continue;
            }
            if decision == SlotDecision::DispatchAfterFullPass {
                first_deferred = None;
            }

            if let Err(error) = self.launch(ctx, key.clone(), run_kind).await {
                if error.is_cancelled() {
                    return Err(error);
                }
                self.count("coordinator.dispatch.failed", None);
                self.log_failure(
                    LogLevel::Error,
                    "coordinator.dispatch.failed",
                    "Failed to start indexing run",
                    &error,
                    Some(project_fields(&key)),
                );
            }
        }
    }

    async fn launch(
        self: &Arc<Self>,
        ctx: &RequestContext,
        key: ProjectKey,
        run_kind: RunKind,
    ) -> Result<()> {
        let started_at = self.deps.clock.now();
        let run = self.deps.runs.create(key.clone(), run_kind, started_at)?;
        let worker: Arc<dyn WorkerHandle> = Arc::from(
            self.deps
                .workers
                .start_worker(&format!("tix-indexer-{key}"), self.completion_task(Arc::clone(&run))),
        );

        self.deps
            .timestamps
            .write_timestamp(
                ctx,
                key.clone(),
                ScheduleProperty::LastIncrementalStart,
                started_at,
            )
            .await?;

        if !self
            .registry
            .try_insert(key.clone(), InFlightRun::new(run, Arc::clone(&worker)))
        {
            return Err(ErrorEnvelope::invariant(
                ErrorCode::new("coordinator", "duplicate_run"),
                "project already has a registered run",
            )
            .with_metadata("project", key.as_str()));
        }
        worker.start();

        let in_flight = self.registry.in_flight_len();
        self.count(
            "coordinator.dispatch.started",
            Some(&telemetry_tags(&[("runKind", run_kind.as_str())])),
        );
        self.gauge("coordinator.inFlight", in_flight);
        self.log(
            LogLevel::Info,
            "coordinator.dispatch.started",
            "Indexing run started",
            Some(log_fields([
                ("project", Value::from(key.as_str())),
                ("runKind", Value::from(run_kind.as_str())),
                ("worker", Value::from(worker.name())),
                ("inFlight", Value::from(in_flight)),
            ])),
        );
        Ok(())
    }

    fn completion_task(self: &Arc<Self>, run: Arc<dyn ProjectRun>) -> WorkerTask {
        let inner = Arc::clone(self);
        Box::new(move |worker_ctx: RequestContext| -> BoxFuture<'static, ()> {
            Box::pin(async move {
                let result = Arc::clone(&run).execute(worker_ctx).await;
                inner.finish_run(run.as_ref(), result).await;
            })
        })
    }

    async fn finish_run(&self, run: &dyn ProjectRun, result: Result<()>) {
        let (outcome, message) = match &result {
            Ok(()) => (RunOutcome::Succeeded, None),
            Err(error) if error.is_cancelled() => (RunOutcome::Interrupted, None),
            Err(error) => (RunOutcome::Failed, Some(error.message.clone())),
        };
        let finished_at = self.deps.clock.now();
        let mut snapshot = run.snapshot();
        if !snapshot.is_finished() {
            snapshot = snapshot.finished(outcome, finished_at, message);
        }

        let elapsed_ms = u64::try_from(snapshot.elapsed(finished_at).num_milliseconds()).unwrap_or(0);
        let tags = telemetry_tags(&[
            ("runKind", run.run_kind().as_str()),
            ("outcome", outcome.as_str()),
        ]);
        self.count("coordinator.run.finished", Some(&tags));
        if let Some(telemetry) = self.deps.telemetry.as_ref() {
            telemetry.record_timer_ms("coordinator.run.duration", elapsed_ms, Some(&tags));
        }

        let fields = log_fields([
            ("project", Value::from(run.project_key().as_str())),
            ("runKind", Value::from(run.run_kind().as_str())),
            ("outcome", Value::from(outcome.as_str())),
            ("issuesUpdated", Value::from(snapshot.progress.issues_updated)),
            ("issuesDeleted", Value::from(snapshot.progress.issues_deleted)),
            ("durationMs", Value::from(elapsed_ms)),
        ]);
        match &result {
            Err(error) if !error.is_cancelled() => self.log_failure(
                LogLevel::Warn,
                "coordinator.run.failed",
                "Indexing run failed",
                error,
                Some(fields),
            ),
            _ => self.log(
                LogLevel::Info,
                "coordinator.run.finished",
                "Indexing run finished",
                Some(fields),
            ),
        }

        let report = CompletionReport::new(run.project_key().clone(), result.is_ok(), run.run_kind())
            .with_snapshot(snapshot);
        self.report_completion(&RequestContext::new_job(), report).await;
    }

    async fn report_completion(&self, ctx: &RequestContext, report: CompletionReport) {
        let CompletionReport {
            project_key,
            succeeded,
            run_kind,
            snapshot,
        } = report;

        if self.registry.remove(&project_key).is_none() {
            self.log(
                LogLevel::Debug,
                "coordinator.completion.unknown",
                "Completion reported for a project without a registered run",
                Some(project_fields(&project_key)),
            );
        }
        if let Some(snapshot) = snapshot {
            self.registry.record_completed(snapshot);
        }
        self.gauge("coordinator.inFlight", self.registry.in_flight_len());

        if !(succeeded && run_kind.is_full()) {
            return;
        }

        let now = self.deps.clock.now();
        if let Err(error) = self
            .deps
            .timestamps
            .write_timestamp(ctx, project_key.clone(), ScheduleProperty::LastFullComplete, now)
            .await
        {
            self.persist_failed(&project_key, ScheduleProperty::LastFullComplete, &error);
        }
        if let Err(error) = self
            .deps
            .timestamps
            .delete_timestamp(ctx, project_key.clone(), ScheduleProperty::ForcedFullRequestedAt)
            .await
        {
            self.persist_failed(&project_key, ScheduleProperty::ForcedFullRequestedAt, &error);
        }
    }

    pub(crate) async fn force_full_reindex(
        &self,
        ctx: &RequestContext,
        project_key: ProjectKey,
    ) -> Result<()> {
        let now = self.deps.clock.now();
        self.deps
            .timestamps
            .write_timestamp(
                ctx,
                project_key.clone(),
                ScheduleProperty::ForcedFullRequestedAt,
                now,
            )
            .await?;
        self.log(
            LogLevel::Info,
            "coordinator.forceFull.requested",
            "Full reindex requested",
            Some(project_fields(&project_key)),
        );
        Ok(())
    }

    fn shutdown_workers(&self) {
        let drained = self.registry.drain();
        for (key, run) in &drained {
            run.worker().interrupt();
            self.log(
                LogLevel::Debug,
                "coordinator.shutdown.interrupt",
                "Interrupted in-flight run",
                Some(project_fields(key)),
            );
        }
        self.gauge("coordinator.inFlight", 0);
        self.log(
            LogLevel::Info,
            "coordinator.run.stop",
            "Indexing coordinator stopped",
            Some(log_fields([("interrupted", Value::from(drained.len()))])),
        );
    }

    fn persist_failed(&self, key: &ProjectKey, property: ScheduleProperty, error: &ErrorEnvelope) {
        self.count("coordinator.completion.persistFailed", None);
        let mut fields = project_fields(key);
        fields.insert("property".into(), Value::from(property.as_str()));
        self.log_failure(
            LogLevel::Error,
            "coordinator.completion.persistFailed",
            "Failed to persist run completion",
            error,
            Some(fields),
        );
    }

    pub(crate) fn log(&self, level: LogLevel, event: &str, message: &str, fields: Option<LogFields>) {
        if let Some(logger) = self.deps.logger.as_ref() {
            logger.log(tracker_indexer_ports::LogEvent::new(level, event, message, fields));
        }
    }

    fn log_failure(
        &self,
        level: LogLevel,
        event: &str,
        message: &str,
        error: &ErrorEnvelope,
        fields: Option<LogFields>,
    ) {
        if let Some(logger) = self.deps.logger.as_ref() {
            logger.failure(level, event, message, error, fields);
        }
    }

    fn count(&self, name: &str, tags: Option<&tracker_indexer_ports::TelemetryTags>) {
        if let Some(telemetry) = self.deps.telemetry.as_ref() {
            telemetry.increment_counter(name, 1, tags);
        }
    }

    fn gauge(&self, name: &str, value: usize) {
        if let Some(telemetry) = self.deps.telemetry.as_ref() {
            telemetry.record_gauge(name, u64::try_from(value).unwrap_or(u64::MAX), None);
        }
    }
}

struct ShutdownGuard<'a> {
    inner: &'a CoordinatorInner,
}

impl Drop for ShutdownGuard<'_> {
    fn drop(&mut self) {
        self.inner.shutdown_workers();
    }
}

pub(crate) fn log_fields<const N: usize>(pairs: [(&str, Value); N]) -> LogFields {
    pairs
        .into_iter()
        .map(|(key, value)| (Box::from(key), value))
        .collect()
}

pub(crate) fn project_fields(key: &ProjectKey) -> LogFields {
    log_fields([("project", Value::from(key.as_str()))])
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
