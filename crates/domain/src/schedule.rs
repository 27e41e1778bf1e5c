//! Persisted per-project schedule timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Named timestamp stored per project.
///
/// The stored names are kept stable so existing state files stay readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ScheduleProperty {
    /// Start of the most recent dispatched run (incremental or full).
    #[serde(rename = "lastIndexUpdateStartDate")]
    LastIncrementalStart,
    /// Completion of the most recent successful full run.
    #[serde(rename = "lastIndexFullUpdateDate")]
    LastFullComplete,
    /// Pending force-full request; cleared by a successful full run.
    #[serde(rename = "forceIndexFullUpdateDate")]
    ForcedFullRequestedAt,
}

impl ScheduleProperty {
    /// Every property, in storage order.
    pub const ALL: [Self; 3] = [
        Self::LastIncrementalStart,
        Self::LastFullComplete,
        Self::ForcedFullRequestedAt,
    ];

    /// Stored property name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LastIncrementalStart => "lastIndexUpdateStartDate",
            Self::LastFullComplete => "lastIndexFullUpdateDate",
            Self::ForcedFullRequestedAt => "forceIndexFullUpdateDate",
        }
    }

    /// Resolve a stored property name.
    #[must_use]
    pub fn from_stored_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|property| property.as_str() == name)
    }
}

impl fmt::Display for ScheduleProperty {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// The three schedule timestamps of one project, as read from storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleState {
    /// See [`ScheduleProperty::LastIncrementalStart`].
    pub last_incremental_start: Option<DateTime<Utc>>,
    /// See [`ScheduleProperty::LastFullComplete`].
    pub last_full_complete: Option<DateTime<Utc>>,
    /// See [`ScheduleProperty::ForcedFullRequestedAt`].
    pub forced_full_requested_at: Option<DateTime<Utc>>,
}

impl ScheduleState {
    /// Value of one property.
    #[must_use]
    pub const fn get(&self, property: ScheduleProperty) -> Option<DateTime<Utc>> {
        match property {
            ScheduleProperty::LastIncrementalStart => self.last_incremental_start,
            ScheduleProperty::LastFullComplete => self.last_full_complete,
            ScheduleProperty::ForcedFullRequestedAt => self.forced_full_requested_at,
        }
    }

    /// Replace one property.
    pub fn set(&mut self, property: ScheduleProperty, value: Option<DateTime<Utc>>) {
        match property {
            ScheduleProperty::LastIncrementalStart => self.last_incremental_start = value,
            ScheduleProperty::LastFullComplete => self.last_full_complete = value,
            ScheduleProperty::ForcedFullRequestedAt => self.forced_full_requested_at = value,
        }
    }

    /// Returns true while a force-full request is pending.
    #[must_use]
    pub const fn is_force_full_requested(&self) -> bool {
        self.forced_full_requested_at.is_some()
    }
}
