//! Wall-clock and schedule-grammar boundary contracts.

use chrono::{DateTime, Utc};

/// Source of the current time.
pub trait ClockPort: Send + Sync {
    /// Current instant in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Cron-like schedule evaluated as a pure function.
pub trait CronSchedulePort: Send + Sync {
    /// First fire time strictly after `after`, or `None` if it never fires again.
    fn next_fire_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>>;

    /// Human-readable form of the schedule, for logs and status output.
    fn describe(&self) -> &str;
}
