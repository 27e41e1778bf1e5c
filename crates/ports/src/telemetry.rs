//! Telemetry boundary contract (counters, gauges, timings).

use std::collections::BTreeMap;

/// Telemetry tags. Keep tags low-cardinality (run kind, outcome), never project keys.
pub type TelemetryTags = BTreeMap<Box<str>, Box<str>>;

/// Build a tag map from static pairs.
#[must_use]
pub fn telemetry_tags(pairs: &[(&str, &str)]) -> TelemetryTags {
    pairs
        .iter()
        .map(|(key, value)| (Box::from(*key), Box::from(*value)))
        .collect()
}

/// Timer handle.
pub trait TelemetryTimer: Send + Sync {
    /// Stop the timer and record its duration.
    fn stop(&self);
}

/// Boundary contract for telemetry.
pub trait TelemetryPort: Send + Sync {
    /// Increment a counter by `value`.
    fn increment_counter(&self, name: &str, value: u64, tags: Option<&TelemetryTags>);

    /// Record the current value of a gauge.
    fn record_gauge(&self, name: &str, value: u64, tags: Option<&TelemetryTags>);

    /// Record a duration (in milliseconds) for an operation.
    fn record_timer_ms(&self, name: &str, duration_ms: u64, tags: Option<&TelemetryTags>);

    /// Start a timer and return a handle that records on `stop()`.
    fn start_timer(&self, name: &str, tags: Option<&TelemetryTags>) -> Box<dyn TelemetryTimer>;
}
