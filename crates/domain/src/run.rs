//! Run kinds and point-in-time run snapshots.

use crate::ProjectKey;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of indexing run, decided once at dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunKind {
    /// Re-index issues changed since the last run.
    Incremental,
    /// Re-index every issue of the project.
    Full,
}

impl RunKind {
    /// Map the result of a full-due check onto a run kind.
    #[must_use]
    pub const fn from_full_due(full_due: bool) -> Self {
        if full_due { Self::Full } else { Self::Incremental }
    }

    /// Returns true for [`RunKind::Full`].
    #[must_use]
    pub const fn is_full(self) -> bool {
        matches!(self, Self::Full)
    }

    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Incremental => "incremental",
            Self::Full => "full",
        }
    }
}

impl fmt::Display for RunKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Progress counters reported by a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunProgress {
    /// Issues written to the index.
    pub issues_updated: u64,
    /// Issues removed from the index.
    pub issues_deleted: u64,
}

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    /// The run finished without error.
    Succeeded,
    /// The run finished with an error.
    Failed,
    /// The run stopped because it was interrupted.
    Interrupted,
}

impl RunOutcome {
    /// Returns true for [`RunOutcome::Succeeded`].
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Interrupted => "interrupted",
        }
    }
}

/// Point-in-time view of one project run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRunSnapshot {
    /// Project being indexed.
    pub project_key: ProjectKey,
    /// Kind decided at dispatch.
    pub run_kind: RunKind,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished, if it has.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Progress counters.
    pub progress: RunProgress,
    /// Terminal state, if finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<RunOutcome>,
    /// Failure message, if the run failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ProjectRunSnapshot {
    /// Snapshot of a run that has just started.
    #[must_use]
    pub const fn started(project_key: ProjectKey, run_kind: RunKind, started_at: DateTime<Utc>) -> Self {
        Self {
            project_key,
            run_kind,
            started_at,
            finished_at: None,
            progress: RunProgress {
                issues_updated: 0,
                issues_deleted: 0,
            },
            outcome: None,
            error_message: None,
        }
    }

    /// Mark the snapshot finished.
    #[must_use]
    pub fn finished(
        mut self,
        outcome: RunOutcome,
        finished_at: DateTime<Utc>,
        error_message: Option<String>,
    ) -> Self {
        self.outcome = Some(outcome);
        self.finished_at = Some(finished_at);
        self.error_message = error_message;
        self
    }

    /// Returns true once an outcome has been recorded.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    /// Run duration: until `finished_at` when finished, else until `now`.
    #[must_use]
    pub fn elapsed(&self, now: DateTime<Utc>) -> TimeDelta {
        let end = self.finished_at.unwrap_or(now);
        (end - self.started_at).max(TimeDelta::zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PrimitiveError;
    use chrono::TimeZone;

    #[test]
    fn run_kind_maps_full_due_flag() {
        assert_eq!(RunKind::from_full_due(true), RunKind::Full);
        assert_eq!(RunKind::from_full_due(false), RunKind::Incremental);
        assert_eq!(RunKind::Full.to_string(), "full");
    }

    #[test]
    fn snapshot_elapsed_stops_at_finish() -> Result<(), PrimitiveError> {
        let start = Utc.timestamp_opt(1_000, 0).single().unwrap_or_default();
        let snapshot = ProjectRunSnapshot::started(ProjectKey::parse("ORG")?, RunKind::Full, start);
        let now = start + TimeDelta::seconds(30);
        assert_eq!(snapshot.elapsed(now), TimeDelta::seconds(30));
        assert!(!snapshot.is_finished());

        let finished = snapshot.finished(
            RunOutcome::Failed,
            start + TimeDelta::seconds(10),
            Some("tracker unavailable".to_owned()),
        );
        assert_eq!(finished.elapsed(now), TimeDelta::seconds(10));
        assert_eq!(finished.outcome, Some(RunOutcome::Failed));
        Ok(())
    }

    #[test]
    fn snapshot_serializes_camel_case() -> Result<(), Box<dyn std::error::Error>> {
        let start = Utc.timestamp_opt(0, 0).single().unwrap_or_default();
        let snapshot = ProjectRunSnapshot::started(ProjectKey::parse("ORG")?, RunKind::Incremental, start);
        let json = serde_json::to_value(&snapshot)?;
        assert_eq!(json["projectKey"], "ORG");
        assert_eq!(json["runKind"], "incremental");
        assert_eq!(json["progress"]["issuesUpdated"], 0);
        assert!(json.get("outcome").is_none());
        Ok(())
    }
}
