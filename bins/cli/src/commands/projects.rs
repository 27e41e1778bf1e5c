//! `projects` handler: tracked projects with their schedule state.

use crate::CliOutput;
use crate::error::{CliError, ExitCode};
use crate::format::{OutputMode, ndjson_line, ndjson_summary, pretty_json};
use chrono::{DateTime, SecondsFormat, Utc};
use tracker_indexer_app::{IndexingCoordinator, TrackedProject};
use tracker_indexer_shared::RequestContext;

/// List tracked projects.
pub async fn run_projects(
    mode: OutputMode,
    coordinator: &IndexingCoordinator,
    ctx: &RequestContext,
) -> Result<CliOutput, CliError> {
    let projects = coordinator.list_tracked_projects(ctx).await?;

    let stdout = if mode.is_ndjson() {
        let mut out = String::new();
        for project in &projects {
            let mut value = serde_json::to_value(project)?;
            if let Some(object) = value.as_object_mut() {
                object.insert("type".to_owned(), serde_json::Value::from("project"));
            }
            out.push_str(&ndjson_line(&value)?);
        }
        out.push_str(&ndjson_summary(
            "ok",
            "projects",
            Some(serde_json::json!({ "count": projects.len() })),
        ));
        out
    } else if mode.is_json() {
        pretty_json(&serde_json::json!({
            "status": "ok",
            "projects": projects,
        }))?
    } else {
        format_projects_text(&projects)
    };

    Ok(CliOutput {
        stdout,
        stderr: String::new(),
        exit_code: ExitCode::Ok,
    })
}

fn format_projects_text(projects: &[TrackedProject]) -> String {
    let mut out = format!("status: ok\nprojects: {}\n", projects.len());
    for project in projects {
        let schedule = &project.schedule;
        out.push_str(&format!(
            "{} incremental={} full={} forcedFull={} inFlight={}\n",
            project.key,
            timestamp(schedule.last_incremental_start),
            timestamp(schedule.last_full_complete),
            timestamp(schedule.forced_full_requested_at),
            project.in_flight.map_or("-", |kind| kind.as_str()),
        ));
    }
    out
}

fn timestamp(value: Option<DateTime<Utc>>) -> String {
    value.map_or_else(
        || "-".to_owned(),
        |value| value.to_rfc3339_opts(SecondsFormat::Secs, true),
    )
}
