//! Scheduling policy: pure due-ness decisions over persisted timestamps.

use chrono::{DateTime, TimeDelta, Utc};
use std::fmt;
use std::sync::Arc;
use tracker_indexer_domain::{RunKind, ScheduleState};
use tracker_indexer_ports::CronSchedulePort;

/// How full updates are scheduled.
#[derive(Clone, Default)]
pub enum FullUpdateSchedule {
    /// Full updates happen only when forced.
    #[default]
    Never,
    /// Full update once `period` has elapsed since the last successful one.
    Period(TimeDelta),
    /// Full update once the schedule has fired since the last successful one.
    Cron(Arc<dyn CronSchedulePort>),
}

impl FullUpdateSchedule {
    /// Returns true when periodic or cron full updates are configured.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        !matches!(self, Self::Never)
    }
}

impl fmt::Debug for FullUpdateSchedule {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Never => formatter.write_str("Never"),
            Self::Period(period) => formatter.debug_tuple("Period").field(period).finish(),
            Self::Cron(cron) => formatter.debug_tuple("Cron").field(&cron.describe()).finish(),
        }
    }
}

/// Decides whether a project needs an incremental or full update.
#[derive(Debug, Clone)]
pub struct SchedulePolicy {
    incremental_period: TimeDelta,
    full_update: FullUpdateSchedule,
}

impl SchedulePolicy {
    /// Build a policy from an incremental period and a full-update schedule.
    #[must_use]
    pub const fn new(incremental_period: TimeDelta, full_update: FullUpdateSchedule) -> Self {
        Self {
            incremental_period,
            full_update,
        }
    }

    /// Minimum time between incremental runs.
    #[must_use]
    pub const fn incremental_period(&self) -> TimeDelta {
        self.incremental_period
    }

    /// Configured full-update schedule.
    #[must_use]
    pub const fn full_update(&self) -> &FullUpdateSchedule {
        &self.full_update
    }

    /// Whether the project should be queued for any kind of run.
    ///
    /// A forced full update, a never-indexed project, or an expired
    /// incremental period make it due. Otherwise it is due only when a
    /// configured full update is due.
    #[must_use]
    pub fn incremental_due(&self, state: &ScheduleState, now: DateTime<Utc>) -> bool {
        if state.is_force_full_requested() {
            return true;
        }
        let expired = state
            .last_incremental_start
            .is_none_or(|started| now - started >= self.incremental_period);
        if expired {
            return true;
        }
        self.full_update.is_configured() && self.full_due(state, now)
    }

    /// Whether the next run of the project must be a full update.
    #[must_use]
    pub fn full_due(&self, state: &ScheduleState, now: DateTime<Utc>) -> bool {
        if state.is_force_full_requested() {
            return true;
        }
        match &self.full_update {
            FullUpdateSchedule::Never => false,
            FullUpdateSchedule::Period(period) => state
                .last_full_complete
                .is_none_or(|completed| now - completed >= *period),
            FullUpdateSchedule::Cron(cron) => {
                let after = state.last_full_complete.unwrap_or(DateTime::UNIX_EPOCH);
                cron.next_fire_after(after).is_some_and(|next| next < now)
            },
        }
    }

    /// Run kind to dispatch for the project right now.
    #[must_use]
    pub fn run_kind(&self, state: &ScheduleState, now: DateTime<Utc>) -> RunKind {
        RunKind::from_full_due(self.full_due(state, now))
    }
}
