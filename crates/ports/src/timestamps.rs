//! Persistent per-project timestamp boundary contract.

use crate::BoxFuture;
use chrono::{DateTime, Utc};
use tracker_indexer_domain::{ProjectKey, ScheduleProperty, ScheduleState};
use tracker_indexer_shared::{RequestContext, Result};

/// One write in a batched update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampWrite {
    /// Target project.
    pub project_key: ProjectKey,
    /// Target property.
    pub property: ScheduleProperty,
    /// Value to store.
    pub value: DateTime<Utc>,
}

/// Read/write/delete of named timestamps per project.
///
/// Implementations serialize writes per `(project, property)` pair.
pub trait TimestampStorePort: Send + Sync {
    /// Read one timestamp; `None` when never written or deleted.
    fn read_timestamp(
        &self,
        ctx: &RequestContext,
        project_key: ProjectKey,
        property: ScheduleProperty,
    ) -> BoxFuture<'_, Result<Option<DateTime<Utc>>>>;

    /// Write one timestamp, replacing any previous value.
    fn write_timestamp(
        &self,
        ctx: &RequestContext,
        project_key: ProjectKey,
        property: ScheduleProperty,
        value: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<()>>;

    /// Apply several writes as one unit.
    fn write_batch(
        &self,
        ctx: &RequestContext,
        writes: Vec<TimestampWrite>,
    ) -> BoxFuture<'_, Result<()>>;

    /// Delete one timestamp. Returns true iff a value was removed.
    fn delete_timestamp(
        &self,
        ctx: &RequestContext,
        project_key: ProjectKey,
        property: ScheduleProperty,
    ) -> BoxFuture<'_, Result<bool>>;

    /// Read all schedule properties of one project.
    fn read_schedule_state(
        &self,
        ctx: &RequestContext,
        project_key: ProjectKey,
    ) -> BoxFuture<'_, Result<ScheduleState>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            let mut state = ScheduleState::default();
            for property in ScheduleProperty::ALL {
                let value = self
                    .read_timestamp(&ctx, project_key.clone(), property)
                    .await?;
                state.set(property, value);
            }
            Ok(state)
        })
    }
}
