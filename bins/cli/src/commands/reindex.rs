//! `force-full` and `force-incremental` handlers.

use crate::error::{CliError, ExitCode};
use crate::format::{OutputMode, ndjson_summary, pretty_json};
use crate::{CliOutput, format_error_output, log_info};
use tracker_indexer_app::{IndexingCoordinator, ReindexRequestOutcome};
use tracker_indexer_domain::ProjectKey;
use tracker_indexer_shared::{ErrorCode, ErrorEnvelope, RequestContext};

/// Which reindex the caller asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReindexKind {
    /// Persist a force-full request.
    Full,
    /// Make the project incrementally due.
    Incremental,
}

impl ReindexKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Full => "forceFull",
            Self::Incremental => "forceIncremental",
        }
    }
}

/// Request a reindex of one project, or of every tracked project.
pub async fn run_reindex(
    mode: OutputMode,
    coordinator: &IndexingCoordinator,
    ctx: &RequestContext,
    kind: ReindexKind,
    project: Option<&str>,
) -> Result<CliOutput, CliError> {
    let project = match project.map(ProjectKey::parse).transpose() {
        Ok(project) => project,
        Err(error) => {
            return Ok(format_error_output(
                mode,
                &ErrorEnvelope::from(error),
                ExitCode::InvalidInput,
            ));
        },
    };
    let requested = project.clone();

    let outcome = match kind {
        ReindexKind::Full => coordinator.request_full_reindex(ctx, project).await?,
        ReindexKind::Incremental => coordinator.request_incremental_update(ctx, project).await?,
    };

    if !outcome.project_found {
        let key = requested.as_ref().map_or("", ProjectKey::as_str);
        let error = ErrorEnvelope::expected(
            ErrorCode::not_found(),
            format!("project {key} is not tracked"),
        )
        .with_metadata("project", key);
        return Ok(format_error_output(mode, &error, ExitCode::InvalidInput));
    }

    let mut stderr = String::new();
    log_info(
        &mut stderr,
        &format!("{} requested", kind.as_str()),
        mode.no_progress,
    );

    Ok(CliOutput {
        stdout: format_outcome(mode, kind, &outcome)?,
        stderr,
        exit_code: ExitCode::Ok,
    })
}

fn format_outcome(
    mode: OutputMode,
    kind: ReindexKind,
    outcome: &ReindexRequestOutcome,
) -> Result<String, CliError> {
    if mode.is_ndjson() {
        return Ok(ndjson_summary(
            "ok",
            kind.as_str(),
            Some(serde_json::to_value(outcome)?),
        ));
    }
    if mode.is_json() {
        return Ok(pretty_json(&serde_json::json!({
            "status": "ok",
            "kind": kind.as_str(),
            "outcome": outcome,
        }))?);
    }
    Ok(format!(
        "status: ok\nkind: {}\nprojects: {}\n",
        kind.as_str(),
        outcome.reindexed_csv()
    ))
}
