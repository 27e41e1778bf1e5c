//! Runtime settings derived from a validated config.

use crate::schedule::{FullUpdateSchedule, SchedulePolicy};
use chrono::TimeDelta;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tracker_indexer_config::ValidatedIndexerConfig;
use tracker_indexer_domain::CronExpression;
use tracker_indexer_ports::CronSchedulePort;

/// Coordinator loop tunables and scheduling policy.
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Upper bound on concurrently registered runs.
    pub max_concurrency: NonZeroUsize,
    /// Sleep between cycles while work is queued.
    pub quick_interval: Duration,
    /// Sleep between cycles while idle; a queue older than this is refilled.
    pub slow_interval: Duration,
    /// Due-ness decisions.
    pub policy: SchedulePolicy,
}

impl CoordinatorSettings {
    /// Convert a validated config. `cron_adapter` wraps the configured cron
    /// expression, which wins over the numeric full period.
    pub fn from_config(
        config: &ValidatedIndexerConfig,
        cron_adapter: impl FnOnce(CronExpression) -> Arc<dyn CronSchedulePort>,
    ) -> Self {
        let limits = config.limits();
        let full_update = match (config.full_cron(), limits.full_period_ms) {
            (Some(cron), _) => FullUpdateSchedule::Cron(cron_adapter(cron.clone())),
            (None, Some(period)) => FullUpdateSchedule::Period(millis(period.get())),
            (None, None) => FullUpdateSchedule::Never,
        };
        let max_concurrency = usize::try_from(limits.max_concurrency.get())
            .ok()
            .and_then(NonZeroUsize::new)
            .unwrap_or(NonZeroUsize::MIN);

        Self {
            max_concurrency,
            quick_interval: Duration::from_millis(limits.quick_interval_ms.get()),
            slow_interval: Duration::from_millis(limits.slow_interval_ms.get()),
            policy: SchedulePolicy::new(millis(limits.incremental_period_ms.get()), full_update),
        }
    }
}

fn millis(value: u64) -> TimeDelta {
    TimeDelta::milliseconds(i64::try_from(value).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use tracker_indexer_config::{IndexerConfig, parse_indexer_config_json};
    use tracker_indexer_shared::Result;

    struct Wrapped(CronExpression);

    impl CronSchedulePort for Wrapped {
        fn next_fire_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
            self.0.next_fire_after(after)
        }

        fn describe(&self) -> &str {
            self.0.as_str()
        }
    }

    fn wrap(cron: CronExpression) -> Arc<dyn CronSchedulePort> {
        Arc::new(Wrapped(cron))
    }

    #[test]
    fn defaults_have_no_full_schedule() -> Result<()> {
        let config = IndexerConfig::default().validate_and_normalize()?;
        let settings = CoordinatorSettings::from_config(&config, wrap);
        assert_eq!(settings.max_concurrency.get(), 2);
        assert_eq!(settings.quick_interval, Duration::from_secs(2));
        assert_eq!(settings.slow_interval, Duration::from_secs(15));
        assert!(matches!(
            settings.policy.full_update(),
            FullUpdateSchedule::Never
        ));
        Ok(())
    }

    #[test]
    fn cron_wins_over_period() -> Result<()> {
        let config = parse_indexer_config_json(
            r#"{ "schedule": { "fullPeriodMs": 86400000, "fullCron": "0 0 3 * * ?" } }"#,
        )?;
        let settings = CoordinatorSettings::from_config(&config, wrap);
        let FullUpdateSchedule::Cron(cron) = settings.policy.full_update() else {
            return Err(tracker_indexer_shared::ErrorEnvelope::invariant(
                tracker_indexer_shared::ErrorCode::internal(),
                "expected cron schedule",
            ));
        };
        assert_eq!(cron.describe(), "0 0 3 * * ?");
        Ok(())
    }

    #[test]
    fn period_is_used_without_cron() -> Result<()> {
        let config = parse_indexer_config_json(r#"{ "schedule": { "fullPeriodMs": 86400000 } }"#)?;
        let settings = CoordinatorSettings::from_config(&config, wrap);
        assert!(matches!(
            settings.policy.full_update(),
            FullUpdateSchedule::Period(period) if *period == TimeDelta::days(1)
        ));
        Ok(())
    }
}
