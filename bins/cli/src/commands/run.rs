//! `run` handler: drive the coordinator loop until interrupted.

use crate::CliOutput;
use crate::error::{CliError, ExitCode};
use crate::format::{OutputMode, ndjson_summary, pretty_json};
use std::future::Future;
use tracker_indexer_app::IndexingCoordinator;
use tracker_indexer_shared::RequestContext;

/// Run the loop until `shutdown` resolves, then report the runs that
/// completed while it was up.
pub async fn run_coordinator(
    mode: OutputMode,
    coordinator: &IndexingCoordinator,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<CliOutput, CliError> {
    let ctx = RequestContext::new_job();
    let stopper = ctx.clone();
    let signal = tokio::spawn(async move {
        shutdown.await;
        tracing::info!(target: "tracker_indexer", event = "cli.shutdown", "Shutdown requested");
        stopper.cancel();
    });

    let result = coordinator.run(&ctx).await;
    signal.abort();
    result?;

    let completed = coordinator.last_completed_runs();
    let stdout = if mode.is_ndjson() {
        ndjson_summary(
            "ok",
            "run",
            Some(serde_json::json!({ "completedRuns": completed.len() })),
        )
    } else if mode.is_json() {
        pretty_json(&serde_json::json!({
            "status": "ok",
            "completedRuns": completed,
        }))?
    } else {
        let mut out = format!("status: ok\ncompletedRuns: {}\n", completed.len());
        for snapshot in &completed {
            out.push_str(&format!(
                "{} {} {} updated={}\n",
                snapshot.project_key,
                snapshot.run_kind.as_str(),
                snapshot.outcome.map_or("unknown", |outcome| outcome.as_str()),
                snapshot.progress.issues_updated,
            ));
        }
        out
    };

    Ok(CliOutput {
        stdout,
        stderr: String::new(),
        exit_code: ExitCode::Ok,
    })
}

/// Resolves on Ctrl-C; never resolves when the handler cannot be installed.
pub async fn ctrl_c() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
