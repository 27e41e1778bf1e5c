//! End-to-end coordinator behavior over in-memory ports and tokio workers.
//!
//! Every test runs on a paused clock: the loop's sleeps advance virtual time
//! only once all tasks are idle, which makes cycle counts deterministic.

use chrono::TimeDelta;
use serde_json::Value;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracker_indexer_adapters::TokioWorkerSpawner;
use tracker_indexer_app::{
    CompletionReport, CoordinatorDeps, CoordinatorSettings, FullUpdateSchedule, IndexingCoordinator,
    SchedulePolicy,
};
use tracker_indexer_domain::{ProjectKey, RunKind, RunOutcome, ScheduleProperty};
use tracker_indexer_ports::ClockPort;
use tracker_indexer_shared::{ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result};
use tracker_indexer_testkit::{
    FixedCron, InMemoryProjectSource, InMemoryTimestampStore, ManualClock, RecordingLogger,
    RecordingTelemetry, ScriptedRunFactory,
};

const QUICK: Duration = Duration::from_millis(100);
const SLOW: Duration = Duration::from_millis(1_000);

fn key(value: &str) -> Result<ProjectKey> {
    Ok(ProjectKey::parse(value)?)
}

fn settings(max_concurrency: usize, full_update: FullUpdateSchedule) -> CoordinatorSettings {
    CoordinatorSettings {
        max_concurrency: NonZeroUsize::new(max_concurrency).unwrap_or(NonZeroUsize::MIN),
        quick_interval: QUICK,
        slow_interval: SLOW,
        policy: SchedulePolicy::new(TimeDelta::hours(1), full_update),
    }
}

struct Harness {
    coordinator: IndexingCoordinator,
    source: InMemoryProjectSource,
    store: InMemoryTimestampStore,
    clock: ManualClock,
    runs: ScriptedRunFactory,
    logger: RecordingLogger,
    telemetry: RecordingTelemetry,
    ctx: RequestContext,
}

impl Harness {
    fn new(
        projects: &[&str],
        runs: ScriptedRunFactory,
        settings: CoordinatorSettings,
    ) -> Result<Self> {
        let source = InMemoryProjectSource::from_keys(projects);
        let store = InMemoryTimestampStore::new();
        let clock = ManualClock::fixed();
        let logger = RecordingLogger::new();
        let telemetry = RecordingTelemetry::new();
        let deps = CoordinatorDeps {
            projects: Arc::new(source.clone()),
            timestamps: Arc::new(store.clone()),
            clock: Arc::new(clock.clone()),
            runs: Arc::new(runs.clone()),
            workers: Arc::new(TokioWorkerSpawner::from_current()?),
            logger: Some(Arc::new(logger.clone())),
            telemetry: Some(Arc::new(telemetry.clone())),
        };
        Ok(Self {
            coordinator: IndexingCoordinator::new(deps, settings),
            source,
            store,
            clock,
            runs,
            logger,
            telemetry,
            ctx: RequestContext::new_job(),
        })
    }

    fn start(&self) -> JoinHandle<Result<()>> {
        let coordinator = self.coordinator.clone();
        let ctx = self.ctx.clone();
        tokio::spawn(async move { coordinator.run(&ctx).await })
    }

    async fn stop(&self, task: JoinHandle<Result<()>>) -> Result<()> {
        self.ctx.cancel();
        let result = task.await.map_err(|error| {
            ErrorEnvelope::unexpected(ErrorCode::internal(), error.to_string(), ErrorClass::NonRetriable)
        })?;
        settle().await;
        result
    }

    fn kinds(&self, project: &str) -> Result<Vec<RunKind>> {
        Ok(self.runs.created_for(&key(project)?))
    }

    fn sleep_wakes(&self) -> Vec<String> {
        self.logger
            .events_named("coordinator.cycle.sleep")
            .into_iter()
            .filter_map(|event| {
                event
                    .fields
                    .and_then(|fields| fields.get("wake").and_then(Value::as_str).map(str::to_owned))
            })
            .collect()
    }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn never_indexed_projects_are_dispatched_incrementally() -> Result<()> {
    let harness = Harness::new(
        &["ORG", "AS7", "JBESB"],
        ScriptedRunFactory::completing(),
        settings(4, FullUpdateSchedule::Never),
    )?;
    let task = harness.start();
    settle().await;

    for project in ["ORG", "AS7", "JBESB"] {
        assert_eq!(harness.kinds(project)?, vec![RunKind::Incremental]);
        assert_eq!(
            harness.store.get(&key(project)?, ScheduleProperty::LastIncrementalStart),
            Some(harness.clock.now())
        );
        assert_eq!(harness.store.get(&key(project)?, ScheduleProperty::LastFullComplete), None);
    }
    assert_eq!(harness.coordinator.in_flight_count(), 0);
    assert_eq!(harness.telemetry.counter("coordinator.dispatch.started"), 3);

    let completed = harness.coordinator.last_completed_runs();
    assert_eq!(completed.len(), 3);
    assert!(completed.iter().all(|run| run.outcome == Some(RunOutcome::Succeeded)));

    harness.stop(task).await
}

#[tokio::test(start_paused = true)]
async fn recently_started_projects_are_not_requeued() -> Result<()> {
    let harness = Harness::new(
        &["ORG"],
        ScriptedRunFactory::completing(),
        settings(2, FullUpdateSchedule::Never),
    )?;
    let task = harness.start();
    tokio::time::sleep(SLOW * 3).await;
    assert_eq!(harness.kinds("ORG")?, vec![RunKind::Incremental]);

    harness.clock.advance(TimeDelta::hours(1));
    tokio::time::sleep(SLOW * 2).await;
    assert_eq!(harness.kinds("ORG")?, vec![RunKind::Incremental, RunKind::Incremental]);

    harness.stop(task).await
}

#[tokio::test(start_paused = true)]
async fn in_flight_runs_never_exceed_max_concurrency() -> Result<()> {
    let harness = Harness::new(
        &["A", "B", "C", "D", "E"],
        ScriptedRunFactory::holding(),
        settings(2, FullUpdateSchedule::Never),
    )?;
    let task = harness.start();
    settle().await;

    assert_eq!(harness.coordinator.in_flight_count(), 2);
    assert_eq!(harness.runs.running(), 2);
    assert_eq!(
        harness.coordinator.queued_projects(),
        vec![key("C")?, key("D")?, key("E")?]
    );
    let status: Vec<ProjectKey> = harness
        .coordinator
        .current_status()
        .into_iter()
        .map(|snapshot| snapshot.project_key)
        .collect();
    assert_eq!(status, vec![key("A")?, key("B")?]);

    harness.runs.release(&key("A")?);
    tokio::time::sleep(QUICK * 2).await;
    assert_eq!(harness.coordinator.in_flight_count(), 2);
    assert_eq!(harness.kinds("C")?, vec![RunKind::Incremental]);

    harness.runs.release_all();
    tokio::time::sleep(QUICK * 10).await;
    assert_eq!(harness.runs.created().len(), 5);
    assert!(harness.runs.peak_running() <= 2);
    assert_eq!(harness.coordinator.in_flight_count(), 0);

    harness.stop(task).await
}

#[tokio::test(start_paused = true)]
async fn last_slot_is_kept_for_incremental_work() -> Result<()> {
    let harness = Harness::new(
        &["F1", "F2", "I1"],
        ScriptedRunFactory::holding(),
        settings(2, FullUpdateSchedule::Period(TimeDelta::days(1))),
    )?;
    let recent = harness.clock.now() - TimeDelta::hours(2);
    harness
        .store
        .set(&key("I1")?, ScheduleProperty::LastFullComplete, recent);

    let task = harness.start();
    settle().await;

    assert_eq!(harness.kinds("F1")?, vec![RunKind::Full]);
    assert_eq!(harness.kinds("I1")?, vec![RunKind::Incremental]);
    assert!(harness.kinds("F2")?.is_empty());
    assert_eq!(harness.coordinator.queued_projects(), vec![key("F2")?]);
    assert!(harness.logger.has_event("coordinator.dispatch.deferred"));

    harness.stop(task).await
}

#[tokio::test(start_paused = true)]
async fn full_runs_take_the_last_slot_after_a_full_pass() -> Result<()> {
    let harness = Harness::new(
        &["F1", "F2", "F3"],
        ScriptedRunFactory::holding(),
        settings(2, FullUpdateSchedule::Period(TimeDelta::days(1))),
    )?;
    let task = harness.start();
    settle().await;

    assert_eq!(harness.kinds("F1")?, vec![RunKind::Full]);
    assert_eq!(harness.kinds("F2")?, vec![RunKind::Full]);
    assert!(harness.kinds("F3")?.is_empty());
    assert_eq!(harness.coordinator.in_flight_count(), 2);
    assert_eq!(harness.coordinator.queued_projects(), vec![key("F3")?]);

    harness.stop(task).await
}

#[tokio::test(start_paused = true)]
async fn single_slot_dispatches_full_runs_immediately() -> Result<()> {
    let harness = Harness::new(
        &["ORG", "AS7"],
        ScriptedRunFactory::holding(),
        settings(1, FullUpdateSchedule::Period(TimeDelta::days(1))),
    )?;
    let task = harness.start();
    settle().await;

    assert_eq!(harness.kinds("ORG")?, vec![RunKind::Full]);
    assert!(!harness.logger.has_event("coordinator.dispatch.deferred"));
    assert_eq!(harness.coordinator.in_flight_count(), 1);

    harness.stop(task).await
}

#[tokio::test(start_paused = true)]
async fn cron_schedule_makes_full_runs_due() -> Result<()> {
    let settings_clock = ManualClock::fixed();
    let fired = settings_clock.now() - TimeDelta::minutes(5);
    let harness = Harness::new(
        &["ORG"],
        ScriptedRunFactory::completing(),
        settings(2, FullUpdateSchedule::Cron(Arc::new(FixedCron::new(vec![fired])))),
    )?;
    let task = harness.start();
    settle().await;

    assert_eq!(harness.kinds("ORG")?, vec![RunKind::Full]);
    assert_eq!(
        harness.store.get(&key("ORG")?, ScheduleProperty::LastFullComplete),
        Some(harness.clock.now())
    );

    harness.stop(task).await
}

#[tokio::test(start_paused = true)]
async fn forced_full_is_cleared_after_a_successful_full_run() -> Result<()> {
    let harness = Harness::new(
        &["ORG"],
        ScriptedRunFactory::completing(),
        settings(2, FullUpdateSchedule::Never),
    )?;
    harness
        .coordinator
        .force_full_reindex(&RequestContext::new_request(), key("ORG")?)
        .await?;
    assert!(
        harness
            .store
            .get(&key("ORG")?, ScheduleProperty::ForcedFullRequestedAt)
            .is_some()
    );

    let task = harness.start();
    settle().await;

    assert_eq!(harness.kinds("ORG")?, vec![RunKind::Full]);
    assert_eq!(harness.store.get(&key("ORG")?, ScheduleProperty::ForcedFullRequestedAt), None);
    assert_eq!(
        harness.store.get(&key("ORG")?, ScheduleProperty::LastFullComplete),
        Some(harness.clock.now())
    );

    harness.stop(task).await
}

#[tokio::test(start_paused = true)]
async fn failed_full_runs_keep_the_force_flag() -> Result<()> {
    let harness = Harness::new(
        &["ORG"],
        ScriptedRunFactory::completing(),
        settings(2, FullUpdateSchedule::Never),
    )?;
    harness.runs.fail_project(&key("ORG")?);
    harness.store.set(
        &key("ORG")?,
        ScheduleProperty::ForcedFullRequestedAt,
        harness.clock.now(),
    );

    let task = harness.start();
    settle().await;

    assert_eq!(harness.kinds("ORG")?, vec![RunKind::Full]);
    assert!(
        harness
            .store
            .get(&key("ORG")?, ScheduleProperty::ForcedFullRequestedAt)
            .is_some()
    );
    assert_eq!(harness.store.get(&key("ORG")?, ScheduleProperty::LastFullComplete), None);
    assert!(harness.logger.has_event("coordinator.run.failed"));
    let completed = harness.coordinator.last_completed_runs();
    assert_eq!(completed.first().and_then(|run| run.outcome), Some(RunOutcome::Failed));

    harness.stop(task).await
}

#[tokio::test(start_paused = true)]
async fn completion_persistence_failures_are_swallowed() -> Result<()> {
    let harness = Harness::new(
        &["ORG", "AS7"],
        ScriptedRunFactory::completing(),
        settings(2, FullUpdateSchedule::Never),
    )?;
    harness.store.set(
        &key("ORG")?,
        ScheduleProperty::ForcedFullRequestedAt,
        harness.clock.now(),
    );
    harness.store.fail_writes_of(ScheduleProperty::LastFullComplete);

    let task = harness.start();
    settle().await;

    assert!(harness.logger.has_event("coordinator.completion.persistFailed"));
    assert_eq!(harness.telemetry.counter("coordinator.completion.persistFailed"), 1);
    assert_eq!(harness.store.get(&key("ORG")?, ScheduleProperty::ForcedFullRequestedAt), None);
    assert_eq!(harness.coordinator.in_flight_count(), 0);
    assert!(!task.is_finished());
    assert_eq!(harness.kinds("AS7")?, vec![RunKind::Incremental]);

    harness.stop(task).await
}

#[tokio::test(start_paused = true)]
async fn completion_for_an_unknown_project_is_a_no_op() -> Result<()> {
    let harness = Harness::new(
        &["ORG"],
        ScriptedRunFactory::holding(),
        settings(2, FullUpdateSchedule::Never),
    )?;
    let ctx = RequestContext::new_request();
    harness
        .coordinator
        .report_completion(&ctx, CompletionReport::new(key("GHOST")?, false, RunKind::Incremental))
        .await;
    harness
        .coordinator
        .report_completion(&ctx, CompletionReport::new(key("GHOST")?, true, RunKind::Incremental))
        .await;

    assert!(harness.logger.has_event("coordinator.completion.unknown"));
    assert_eq!(harness.coordinator.in_flight_count(), 0);
    assert_eq!(harness.store.write_count(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn shutdown_interrupts_workers_and_clears_the_registry() -> Result<()> {
    let harness = Harness::new(
        &["ORG", "AS7"],
        ScriptedRunFactory::holding(),
        settings(2, FullUpdateSchedule::Never),
    )?;
    let task = harness.start();
    settle().await;
    assert_eq!(harness.coordinator.in_flight_count(), 2);

    harness.stop(task).await?;

    assert_eq!(harness.coordinator.in_flight_count(), 0);
    let mut interrupted = harness.runs.interrupted();
    interrupted.sort();
    assert_eq!(interrupted, vec![key("AS7")?, key("ORG")?]);
    assert!(harness.logger.has_event("coordinator.run.stop"));
    assert_eq!(harness.store.get(&key("ORG")?, ScheduleProperty::LastFullComplete), None);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn the_loop_cannot_be_restarted() -> Result<()> {
    let harness = Harness::new(&[], ScriptedRunFactory::completing(), settings(2, FullUpdateSchedule::Never))?;
    let task = harness.start();
    settle().await;

    let second = harness.coordinator.run(&RequestContext::new_job()).await.err();
    assert_eq!(
        second.map(|error| error.code),
        Some(ErrorCode::new("coordinator", "already_started"))
    );

    harness.stop(task).await?;
    let after_stop = harness.coordinator.run(&RequestContext::new_job()).await.err();
    assert_eq!(
        after_stop.map(|error| error.code),
        Some(ErrorCode::new("coordinator", "already_started"))
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn idle_loop_sleeps_slow_and_refills_every_cycle() -> Result<()> {
    let harness = Harness::new(&[], ScriptedRunFactory::completing(), settings(2, FullUpdateSchedule::Never))?;
    let task = harness.start();
    tokio::time::sleep(SLOW * 3 + Duration::from_millis(500)).await;

    assert_eq!(harness.source.calls(), 4);
    assert!(harness.sleep_wakes().iter().all(|wake| wake == "slow"));

    harness.stop(task).await
}

#[tokio::test(start_paused = true)]
async fn queued_work_switches_to_the_quick_interval() -> Result<()> {
    let harness = Harness::new(
        &["ORG", "AS7"],
        ScriptedRunFactory::holding(),
        settings(1, FullUpdateSchedule::Never),
    )?;
    let task = harness.start();
    tokio::time::sleep(QUICK * 3).await;

    let wakes = harness.sleep_wakes();
    assert!(wakes.len() >= 3);
    assert!(wakes.iter().all(|wake| wake == "quick"));
    assert_eq!(harness.source.calls(), 1);

    harness.stop(task).await
}

#[tokio::test(start_paused = true)]
async fn stale_queues_are_refilled_after_a_slow_interval() -> Result<()> {
    let harness = Harness::new(
        &["ORG", "AS7", "JBESB"],
        ScriptedRunFactory::holding(),
        settings(1, FullUpdateSchedule::Never),
    )?;
    let task = harness.start();
    settle().await;
    assert_eq!(harness.coordinator.queued_projects(), vec![key("AS7")?, key("JBESB")?]);
    assert_eq!(harness.source.calls(), 1);

    tokio::time::sleep(SLOW + SLOW / 2).await;
    assert!(harness.source.calls() >= 2);
    assert!(harness.sleep_wakes().iter().all(|wake| wake == "quick"));

    harness
        .source
        .set_projects(vec![key("ORG")?, key("AS7")?, key("JBESB")?, key("NEW")?]);
    tokio::time::sleep(SLOW + SLOW / 2).await;
    assert_eq!(
        harness.coordinator.queued_projects(),
        vec![key("AS7")?, key("JBESB")?, key("NEW")?]
    );
    assert!(harness.kinds("NEW")?.is_empty());
    assert_eq!(harness.coordinator.in_flight_count(), 1);

    harness.stop(task).await
}

#[tokio::test(start_paused = true)]
async fn unreadable_projects_are_skipped_without_stopping_the_loop() -> Result<()> {
    let harness = Harness::new(
        &["ORG", "AS7"],
        ScriptedRunFactory::completing(),
        settings(2, FullUpdateSchedule::Never),
    )?;
    harness.store.fail_reads_for(&key("ORG")?);
    harness.source.fail_next(1);

    let task = harness.start();
    settle().await;
    assert!(harness.logger.has_event("coordinator.fill.failed"));
    assert!(harness.runs.created().is_empty());

    tokio::time::sleep(SLOW).await;
    assert!(harness.logger.has_event("coordinator.fill.readFailed"));
    assert!(harness.kinds("ORG")?.is_empty());
    assert_eq!(harness.kinds("AS7")?, vec![RunKind::Incremental]);

    harness.store.heal();
    tokio::time::sleep(SLOW * 2).await;
    assert_eq!(harness.kinds("ORG")?, vec![RunKind::Incremental]);

    harness.stop(task).await
}

#[tokio::test(start_paused = true)]
async fn launch_failures_skip_only_the_affected_project() -> Result<()> {
    let harness = Harness::new(
        &["ORG", "AS7"],
        ScriptedRunFactory::completing(),
        settings(2, FullUpdateSchedule::Never),
    )?;
    harness.runs.fail_create_for(&key("ORG")?);

    let task = harness.start();
    settle().await;

    assert!(harness.logger.has_event("coordinator.dispatch.failed"));
    assert_eq!(harness.kinds("AS7")?, vec![RunKind::Incremental]);
    assert_eq!(harness.store.get(&key("ORG")?, ScheduleProperty::LastIncrementalStart), None);

    harness.stop(task).await
}

#[tokio::test(start_paused = true)]
async fn management_requests_target_tracked_projects() -> Result<()> {
    let harness = Harness::new(
        &["ORG", "AS7"],
        ScriptedRunFactory::holding(),
        settings(2, FullUpdateSchedule::Never),
    )?;
    let ctx = RequestContext::new_request();

    let missing = harness
        .coordinator
        .request_full_reindex(&ctx, Some(key("GHOST")?))
        .await?;
    assert!(!missing.project_found);
    assert!(missing.reindexed_projects.is_empty());
    assert_eq!(harness.store.batch_count(), 0);

    let all = harness.coordinator.request_full_reindex(&ctx, None).await?;
    assert!(all.project_found);
    assert_eq!(all.reindexed_csv(), "AS7,ORG");
    assert_eq!(harness.store.batch_count(), 1);

    let task = harness.start();
    settle().await;
    let tracked = harness.coordinator.list_tracked_projects(&ctx).await?;
    assert_eq!(tracked.len(), 2);
    assert!(tracked.iter().all(|project| project.in_flight == Some(RunKind::Full)));
    assert!(tracked.iter().all(|project| project.schedule.is_force_full_requested()));

    let one = harness
        .coordinator
        .request_incremental_update(&ctx, Some(key("ORG")?))
        .await?;
    assert_eq!(one.reindexed_projects, vec![key("ORG")?]);
    assert_eq!(harness.store.get(&key("ORG")?, ScheduleProperty::LastIncrementalStart), None);
    assert!(
        harness
            .store
            .get(&key("AS7")?, ScheduleProperty::LastIncrementalStart)
            .is_some()
    );

    harness.stop(task).await
}
