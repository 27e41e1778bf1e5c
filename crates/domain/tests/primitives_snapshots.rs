//! Integration coverage for domain primitives, snapshots, and cron errors.

use chrono::{TimeZone, Utc};
use tracker_indexer_domain::{
    CronExpression, CronParseError, PrimitiveError, ProjectKey, ProjectRunSnapshot, RunKind,
    RunOutcome, ScheduleProperty, ScheduleState,
};
use tracker_indexer_shared::ErrorEnvelope;

#[test]
fn primitive_errors_map_into_error_envelopes() -> Result<(), PrimitiveError> {
    let Err(error) = ProjectKey::parse(" ") else {
        return Err(PrimitiveError::EmptyProjectKey { input_length: 0 });
    };

    let envelope: ErrorEnvelope = error.into();
    assert_eq!(envelope.code.namespace(), "domain");
    assert_eq!(envelope.code.code(), "invalid_project_key");
    assert_eq!(
        envelope.metadata.get("input_length"),
        Some(&"1".to_string())
    );

    Ok(())
}

#[test]
fn cron_errors_surface_field_metadata() -> Result<(), CronParseError> {
    let Err(error) = CronExpression::parse("0 0 25 * * ?") else {
        return Err(CronParseError::DayFieldConflict);
    };

    let envelope: ErrorEnvelope = error.into();
    assert_eq!(envelope.code.code(), "invalid_cron");
    assert_eq!(envelope.metadata.get("field"), Some(&"hours".to_string()));
    Ok(())
}

#[test]
fn snapshot_round_trips_through_json() -> Result<(), Box<dyn std::error::Error>> {
    let started = Utc
        .with_ymd_and_hms(2024, 5, 1, 8, 0, 0)
        .single()
        .ok_or("invalid timestamp")?;
    let mut snapshot = ProjectRunSnapshot::started(ProjectKey::parse("JBESB")?, RunKind::Full, started);
    snapshot.progress.issues_updated = 12;
    let snapshot = snapshot.finished(RunOutcome::Succeeded, started, None);

    let json = serde_json::to_string(&snapshot)?;
    let decoded: ProjectRunSnapshot = serde_json::from_str(&json)?;
    assert_eq!(decoded, snapshot);
    Ok(())
}

#[test]
fn schedule_state_uses_stored_property_names() -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_value(ScheduleProperty::ForcedFullRequestedAt)?;
    assert_eq!(json, "forceIndexFullUpdateDate");

    let state = ScheduleState::default();
    let json = serde_json::to_value(state)?;
    assert!(json.get("lastIncrementalStart").is_some());
    Ok(())
}
