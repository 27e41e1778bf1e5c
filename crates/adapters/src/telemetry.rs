//! `TelemetryPort` adapter recording metrics as `tracing` debug events.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracker_indexer_ports::{TelemetryPort, TelemetryTags, TelemetryTimer};

/// Target used for every metric event.
pub const TELEMETRY_TARGET: &str = "tracker_indexer::telemetry";

/// Telemetry adapter that emits one debug event per metric.
#[derive(Debug, Clone, Default)]
pub struct TracingTelemetry {
    base_tags: TelemetryTags,
}

impl TracingTelemetry {
    /// Telemetry without base tags.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set base tags applied to every metric.
    #[must_use]
    pub fn with_base_tags(mut self, tags: TelemetryTags) -> Self {
        self.base_tags = tags;
        self
    }
}

impl TelemetryPort for TracingTelemetry {
    fn increment_counter(&self, name: &str, value: u64, tags: Option<&TelemetryTags>) {
        emit("counter", name, value, &merge_tags(&self.base_tags, tags));
    }

    fn record_gauge(&self, name: &str, value: u64, tags: Option<&TelemetryTags>) {
        emit("gauge", name, value, &merge_tags(&self.base_tags, tags));
    }

    fn record_timer_ms(&self, name: &str, duration_ms: u64, tags: Option<&TelemetryTags>) {
        emit("timer", name, duration_ms, &merge_tags(&self.base_tags, tags));
    }

    fn start_timer(&self, name: &str, tags: Option<&TelemetryTags>) -> Box<dyn TelemetryTimer> {
        Box::new(TracingTimer {
            name: name.into(),
            tags: merge_tags(&self.base_tags, tags),
            started_at: Instant::now(),
            stopped: AtomicBool::new(false),
        })
    }
}

struct TracingTimer {
    name: Box<str>,
    tags: TelemetryTags,
    started_at: Instant,
    stopped: AtomicBool,
}

impl TelemetryTimer for TracingTimer {
    fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        let duration_ms = u64::try_from(self.started_at.elapsed().as_millis()).unwrap_or(u64::MAX);
        emit("timer", &self.name, duration_ms, &self.tags);
    }
}

fn emit(metric_type: &str, name: &str, value: u64, tags: &TelemetryTags) {
    tracing::debug!(
        target: TELEMETRY_TARGET,
        metric_type,
        name,
        value,
        tags = %render_tags(tags),
        "metric"
    );
}

fn merge_tags(base: &TelemetryTags, extra: Option<&TelemetryTags>) -> TelemetryTags {
    let mut merged = base.clone();
    if let Some(extra) = extra {
        merged.extend(extra.iter().map(|(key, value)| (key.clone(), value.clone())));
    }
    merged
}

fn render_tags(tags: &TelemetryTags) -> String {
    tags.iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(",")
}
