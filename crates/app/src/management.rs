//! Management operations: listing tracked projects and requesting reindexes.

use crate::coordinator::{IndexingCoordinator, log_fields};
use serde::Serialize;
use serde_json::Value;
use tracker_indexer_domain::{ProjectKey, ProjectRunSnapshot, RunKind, ScheduleProperty, ScheduleState};
use tracker_indexer_ports::{LogLevel, TimestampWrite};
use tracker_indexer_shared::{RequestContext, Result, ResultExt};

/// Result of a reindex request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReindexRequestOutcome {
    /// False when a named project is not tracked; nothing was changed then.
    pub project_found: bool,
    /// Projects the request was applied to.
    pub reindexed_projects: Vec<ProjectKey>,
}

impl ReindexRequestOutcome {
    /// Affected projects as a comma-separated list.
    #[must_use]
    pub fn reindexed_csv(&self) -> String {
        self.reindexed_projects
            .iter()
            .map(ProjectKey::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// A tracked project with its persisted schedule state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedProject {
    /// Project key.
    pub key: ProjectKey,
    /// Persisted schedule timestamps.
    pub schedule: ScheduleState,
    /// Kind of the in-flight run, if one is registered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_flight: Option<RunKind>,
}

impl IndexingCoordinator {
    /// Make the selected project (or every tracked project) incrementally due
    /// on the next cycle by deleting its `lastIncrementalStart` timestamp.
    pub async fn request_incremental_update(
        &self,
        ctx: &RequestContext,
        project: Option<ProjectKey>,
    ) -> Result<ReindexRequestOutcome> {
        let Some(selected) = self.select_projects(ctx, project).await? else {
            return Ok(not_found());
        };

        for key in &selected {
            ctx.ensure_not_cancelled("coordinator.requestIncremental")?;
            self.inner
                .deps
                .timestamps
                .delete_timestamp(ctx, key.clone(), ScheduleProperty::LastIncrementalStart)
                .await
                .with_operation("coordinator.requestIncremental")
                .with_error_metadata("projectKey", key.as_str())?;
        }

        let outcome = found(selected);
        self.inner.log(
            LogLevel::Info,
            "coordinator.incremental.requested",
            "Incremental update requested",
            Some(log_fields([("projects", Value::from(outcome.reindexed_csv()))])),
        );
        Ok(outcome)
    }

    /// Persist a force-full request for the selected project (or every
    /// tracked project) in one batch.
    pub async fn request_full_reindex(
        &self,
        ctx: &RequestContext,
        project: Option<ProjectKey>,
    ) -> Result<ReindexRequestOutcome> {
        let Some(selected) = self.select_projects(ctx, project).await? else {
            return Ok(not_found());
        };

        let now = self.inner.deps.clock.now();
        let writes = selected
            .iter()
            .map(|key| TimestampWrite {
                project_key: key.clone(),
                property: ScheduleProperty::ForcedFullRequestedAt,
                value: now,
            })
            .collect();
        self.inner
            .deps
            .timestamps
            .write_batch(ctx, writes)
            .await
            .with_operation("coordinator.requestFullReindex")?;

        let outcome = found(selected);
        self.inner.log(
            LogLevel::Info,
            "coordinator.forceFull.requested",
            "Full reindex requested",
            Some(log_fields([("projects", Value::from(outcome.reindexed_csv()))])),
        );
        Ok(outcome)
    }

    /// Every tracked project with its persisted schedule state.
    pub async fn list_tracked_projects(&self, ctx: &RequestContext) -> Result<Vec<TrackedProject>> {
        let mut keys = self.inner.deps.projects.list_tracked_project_keys(ctx).await?;
        keys.sort();
        keys.dedup();

        let mut projects = Vec::with_capacity(keys.len());
        for key in keys {
            ctx.ensure_not_cancelled("coordinator.listProjects")?;
            let schedule = self
                .inner
                .deps
                .timestamps
                .read_schedule_state(ctx, key.clone())
                .await
                .with_operation("coordinator.listProjects")
                .with_error_metadata("projectKey", key.as_str())?;
            let in_flight = self.inner.registry.in_flight_kind(&key);
            projects.push(TrackedProject {
                key,
                schedule,
                in_flight,
            });
        }
        Ok(projects)
    }

    /// Final snapshot of the most recent completed run per tracked project.
    #[must_use]
    pub fn last_completed_runs(&self) -> Vec<ProjectRunSnapshot> {
        self.inner.registry.last_completed()
    }

    async fn select_projects(
        &self,
        ctx: &RequestContext,
        project: Option<ProjectKey>,
    ) -> Result<Option<Vec<ProjectKey>>> {
        let mut tracked = self
            .inner
            .deps
            .projects
            .list_tracked_project_keys(ctx)
            .await
            .with_operation("coordinator.selectProjects")?;
        tracked.sort();
        tracked.dedup();

        Ok(match project {
            None => Some(tracked),
            Some(key) if tracked.contains(&key) => Some(vec![key]),
            Some(_) => None,
        })
    }
}

fn not_found() -> ReindexRequestOutcome {
    ReindexRequestOutcome {
        project_found: false,
        reindexed_projects: Vec::new(),
    }
}

fn found(reindexed_projects: Vec<ProjectKey>) -> ReindexRequestOutcome {
    ReindexRequestOutcome {
        project_found: true,
        reindexed_projects,
    }
}
