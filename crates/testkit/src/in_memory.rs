//! In-memory implementations of the coordinator's collaborator ports.
//!
//! Every double is deterministic, cheap to clone (clones share state), and
//! supports failure injection where the coordinator has an error path.

use crate::errors::{source_unavailable, store_unavailable};
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use tracker_indexer_domain::{ProjectKey, ScheduleProperty};
use tracker_indexer_ports::{
    BoxFuture, ClockPort, CronSchedulePort, LogEvent, LogFields, LogLevel, LoggerPort,
    ProjectSourcePort, TelemetryPort, TelemetryTags, TelemetryTimer, TimestampStorePort,
    TimestampWrite,
};
use tracker_indexer_shared::{RequestContext, Result};

/// A no-op logger implementation.
#[derive(Debug, Default)]
pub struct NoopLogger;

impl LoggerPort for NoopLogger {
    fn log(&self, _event: LogEvent) {}

    fn child(&self, _fields: LogFields) -> Box<dyn LoggerPort> {
        Box::new(Self)
    }
}

/// A no-op telemetry timer.
#[derive(Debug, Default)]
pub struct NoopTimer;

impl TelemetryTimer for NoopTimer {
    fn stop(&self) {}
}

/// A no-op telemetry implementation.
#[derive(Debug, Default)]
pub struct NoopTelemetry;

impl TelemetryPort for NoopTelemetry {
    fn increment_counter(&self, _name: &str, _value: u64, _tags: Option<&TelemetryTags>) {}

    fn record_gauge(&self, _name: &str, _value: u64, _tags: Option<&TelemetryTags>) {}

    fn record_timer_ms(&self, _name: &str, _duration_ms: u64, _tags: Option<&TelemetryTags>) {}

    fn start_timer(&self, _name: &str, _tags: Option<&TelemetryTags>) -> Box<dyn TelemetryTimer> {
        Box::new(NoopTimer)
    }
}

/// Logger that keeps every event for later assertions.
#[derive(Debug, Clone, Default)]
pub struct RecordingLogger {
    events: Arc<Mutex<Vec<LogEvent>>>,
    base_fields: LogFields,
}

impl RecordingLogger {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events, oldest first.
    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Recorded events with the given name.
    pub fn events_named(&self, event: &str) -> Vec<LogEvent> {
        self.events()
            .into_iter()
            .filter(|recorded| recorded.event.as_ref() == event)
            .collect()
    }

    /// Returns true when an event with the given name was recorded.
    pub fn has_event(&self, event: &str) -> bool {
        !self.events_named(event).is_empty()
    }

    /// Recorded events at or above `level`.
    pub fn events_at_least(&self, level: LogLevel) -> Vec<LogEvent> {
        self.events()
            .into_iter()
            .filter(|recorded| recorded.level >= level)
            .collect()
    }
}

impl LoggerPort for RecordingLogger {
    fn log(&self, mut event: LogEvent) {
        if !self.base_fields.is_empty() {
            let mut fields = self.base_fields.clone();
            fields.extend(event.fields.take().unwrap_or_default());
            event.fields = Some(fields);
        }
        self.events.lock().unwrap().push(event);
    }

    fn child(&self, fields: LogFields) -> Box<dyn LoggerPort> {
        let mut base_fields = self.base_fields.clone();
        base_fields.extend(fields);
        Box::new(Self {
            events: Arc::clone(&self.events),
            base_fields,
        })
    }
}

/// Telemetry sink that sums counters and keeps the last gauge values.
#[derive(Debug, Clone, Default)]
pub struct RecordingTelemetry {
    counters: Arc<Mutex<BTreeMap<String, u64>>>,
    gauges: Arc<Mutex<BTreeMap<String, u64>>>,
}

impl RecordingTelemetry {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum of all increments of `name` (tags ignored).
    pub fn counter(&self, name: &str) -> u64 {
        self.counters.lock().unwrap().get(name).copied().unwrap_or(0)
    }

    /// Last recorded value of gauge `name`.
    pub fn gauge(&self, name: &str) -> Option<u64> {
        self.gauges.lock().unwrap().get(name).copied()
    }
}

impl TelemetryPort for RecordingTelemetry {
    fn increment_counter(&self, name: &str, value: u64, _tags: Option<&TelemetryTags>) {
        *self
            .counters
            .lock()
            .unwrap()
            .entry(name.to_owned())
            .or_default() += value;
    }

    fn record_gauge(&self, name: &str, value: u64, _tags: Option<&TelemetryTags>) {
        self.gauges.lock().unwrap().insert(name.to_owned(), value);
    }

    fn record_timer_ms(&self, _name: &str, _duration_ms: u64, _tags: Option<&TelemetryTags>) {}

    fn start_timer(&self, _name: &str, _tags: Option<&TelemetryTags>) -> Box<dyn TelemetryTimer> {
        Box::new(NoopTimer)
    }
}

#[derive(Debug, Default)]
struct StoreState {
    values: BTreeMap<(ProjectKey, ScheduleProperty), DateTime<Utc>>,
    failing_reads: BTreeSet<ProjectKey>,
    failing_writes: BTreeSet<ScheduleProperty>,
    failing_deletes: BTreeSet<ScheduleProperty>,
    write_count: usize,
    batch_count: usize,
}

/// Timestamp store backed by a map, with per-key and per-property failures.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTimestampStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryTimestampStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of one timestamp.
    pub fn get(&self, project_key: &ProjectKey, property: ScheduleProperty) -> Option<DateTime<Utc>> {
        self.state
            .lock()
            .unwrap()
            .values
            .get(&(project_key.clone(), property))
            .copied()
    }

    /// Seed one timestamp.
    pub fn set(&self, project_key: &ProjectKey, property: ScheduleProperty, value: DateTime<Utc>) {
        self.state
            .lock()
            .unwrap()
            .values
            .insert((project_key.clone(), property), value);
    }

    /// Make every read for `project_key` fail.
    pub fn fail_reads_for(&self, project_key: &ProjectKey) {
        self.state
            .lock()
            .unwrap()
            .failing_reads
            .insert(project_key.clone());
    }

    /// Make writes of `property` fail.
    pub fn fail_writes_of(&self, property: ScheduleProperty) {
        self.state.lock().unwrap().failing_writes.insert(property);
    }

    /// Make deletes of `property` fail.
    pub fn fail_deletes_of(&self, property: ScheduleProperty) {
        self.state.lock().unwrap().failing_deletes.insert(property);
    }

    /// Remove all injected failures.
    pub fn heal(&self) {
        let mut state = self.state.lock().unwrap();
        state.failing_reads.clear();
        state.failing_writes.clear();
        state.failing_deletes.clear();
    }

    /// Number of successful single writes.
    pub fn write_count(&self) -> usize {
        self.state.lock().unwrap().write_count
    }

    /// Number of successful batches.
    pub fn batch_count(&self) -> usize {
        self.state.lock().unwrap().batch_count
    }
}

impl TimestampStorePort for InMemoryTimestampStore {
    fn read_timestamp(
        &self,
        _ctx: &RequestContext,
        project_key: ProjectKey,
        property: ScheduleProperty,
    ) -> BoxFuture<'_, Result<Option<DateTime<Utc>>>> {
        let state = self.state.lock().unwrap();
        let result = if state.failing_reads.contains(&project_key) {
            Err(store_unavailable("read"))
        } else {
            Ok(state.values.get(&(project_key, property)).copied())
        };
        Box::pin(async move { result })
    }

    fn write_timestamp(
        &self,
        ctx: &RequestContext,
        project_key: ProjectKey,
        property: ScheduleProperty,
        value: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<()>> {
        let result = ctx.ensure_not_cancelled("timestamps.write").and_then(|()| {
            let mut state = self.state.lock().unwrap();
            if state.failing_writes.contains(&property) {
                return Err(store_unavailable("write"));
            }
            state.values.insert((project_key, property), value);
            state.write_count += 1;
            Ok(())
        });
        Box::pin(async move { result })
    }

    fn write_batch(
        &self,
        ctx: &RequestContext,
        writes: Vec<TimestampWrite>,
    ) -> BoxFuture<'_, Result<()>> {
        let result = ctx.ensure_not_cancelled("timestamps.writeBatch").and_then(|()| {
            let mut state = self.state.lock().unwrap();
            if writes
                .iter()
                .any(|write| state.failing_writes.contains(&write.property))
            {
                return Err(store_unavailable("write_batch"));
            }
            for write in writes {
                state
                    .values
                    .insert((write.project_key, write.property), write.value);
            }
            state.batch_count += 1;
            Ok(())
        });
        Box::pin(async move { result })
    }

    fn delete_timestamp(
        &self,
        _ctx: &RequestContext,
        project_key: ProjectKey,
        property: ScheduleProperty,
    ) -> BoxFuture<'_, Result<bool>> {
        let mut state = self.state.lock().unwrap();
        let result = if state.failing_deletes.contains(&property) {
            Err(store_unavailable("delete"))
        } else {
            Ok(state.values.remove(&(project_key, property)).is_some())
        };
        drop(state);
        Box::pin(async move { result })
    }
}

#[derive(Debug, Default)]
struct SourceState {
    keys: Vec<ProjectKey>,
    failures_remaining: usize,
    calls: usize,
}

/// Tracked-project source with a mutable key list.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProjectSource {
    state: Arc<Mutex<SourceState>>,
}

impl InMemoryProjectSource {
    /// Source returning `keys` (in the given order).
    pub fn new(keys: Vec<ProjectKey>) -> Self {
        let source = Self::default();
        source.set_projects(keys);
        source
    }

    /// Source built from raw key strings.
    pub fn from_keys(keys: &[&str]) -> Self {
        Self::new(
            keys.iter()
                .map(|key| ProjectKey::parse(key).unwrap())
                .collect(),
        )
    }

    /// Replace the tracked keys.
    pub fn set_projects(&self, keys: Vec<ProjectKey>) {
        self.state.lock().unwrap().keys = keys;
    }

    /// Fail the next `count` listings.
    pub fn fail_next(&self, count: usize) {
        self.state.lock().unwrap().failures_remaining = count;
    }

    /// Number of listing calls so far.
    pub fn calls(&self) -> usize {
        self.state.lock().unwrap().calls
    }
}

impl ProjectSourcePort for InMemoryProjectSource {
    fn list_tracked_project_keys(
        &self,
        _ctx: &RequestContext,
    ) -> BoxFuture<'_, Result<Vec<ProjectKey>>> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        let result = if state.failures_remaining > 0 {
            state.failures_remaining -= 1;
            Err(source_unavailable())
        } else {
            Ok(state.keys.clone())
        };
        drop(state);
        Box::pin(async move { result })
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// Clock frozen at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    /// Clock frozen at a fixed, arbitrary instant (2024-01-01T00:00:00Z).
    pub fn fixed() -> Self {
        Self::new(DateTime::from_timestamp(1_704_067_200, 0).unwrap())
    }

    /// Move the clock forward.
    pub fn advance(&self, delta: TimeDelta) {
        *self.now.lock().unwrap() += delta;
    }

    /// Jump to `now`.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }
}

impl ClockPort for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Cron schedule firing at an explicit list of instants.
#[derive(Debug, Clone)]
pub struct FixedCron {
    fire_times: Vec<DateTime<Utc>>,
}

impl FixedCron {
    /// Schedule firing exactly at `fire_times`.
    pub fn new(mut fire_times: Vec<DateTime<Utc>>) -> Self {
        fire_times.sort();
        fire_times.dedup();
        Self { fire_times }
    }
}

impl CronSchedulePort for FixedCron {
    fn next_fire_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.fire_times.iter().copied().find(|fire| *fire > after)
    }

    fn describe(&self) -> &str {
        "fixed"
    }
}
