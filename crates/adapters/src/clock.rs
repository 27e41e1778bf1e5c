//! Wall clock and cron schedule adapters.

use chrono::{DateTime, Utc};
use tracker_indexer_domain::CronExpression;
use tracker_indexer_ports::{ClockPort, CronSchedulePort};
use tracker_indexer_shared::Result;

/// `chrono::Utc::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ClockPort for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Quartz-style cron schedule evaluated in UTC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuartzCron {
    expression: CronExpression,
}

impl QuartzCron {
    /// Wrap an already parsed expression.
    #[must_use]
    pub const fn new(expression: CronExpression) -> Self {
        Self { expression }
    }

    /// Parse an expression such as `0 0 3 * * ?`.
    pub fn parse(input: &str) -> Result<Self> {
        Ok(Self::new(CronExpression::parse(input)?))
    }

    /// The wrapped expression.
    #[must_use]
    pub const fn expression(&self) -> &CronExpression {
        &self.expression
    }
}

impl CronSchedulePort for QuartzCron {
    fn next_fire_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.expression.next_fire_after(after)
    }

    fn describe(&self) -> &str {
        self.expression.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn nightly_cron_fires_at_three() -> Result<()> {
        let cron = QuartzCron::parse("0 0 3 * * ?")?;
        let after = Utc.with_ymd_and_hms(2024, 5, 1, 3, 0, 0).single();
        assert_eq!(
            after.and_then(|after| cron.next_fire_after(after)),
            Utc.with_ymd_and_hms(2024, 5, 2, 3, 0, 0).single()
        );
        assert_eq!(cron.describe(), "0 0 3 * * ?");
        Ok(())
    }

    #[test]
    fn invalid_expressions_are_rejected() {
        let error = QuartzCron::parse("0 0 3 * *").err();
        assert_eq!(
            error.map(|error| error.code.to_string()).as_deref(),
            Some("domain:invalid_cron")
        );
    }

    #[test]
    fn system_clock_is_monotone_enough() {
        let first = SystemClock.now();
        let second = SystemClock.now();
        assert!(second >= first);
    }
}
