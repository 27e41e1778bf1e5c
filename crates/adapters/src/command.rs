//! Project runs executed as external commands.
//!
//! Each run spawns the configured command with `{project}` and `{kind}`
//! substituted in its arguments. Every newline-delimited stdout record counts
//! as one updated issue, whatever its encoding. Interrupting the run kills the
//! child.

use chrono::{DateTime, Utc};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracker_indexer_config::{
    ValidatedIndexerConfig, WORKER_KIND_PLACEHOLDER, WORKER_PROJECT_PLACEHOLDER,
};
use tracker_indexer_domain::{ProjectKey, ProjectRunSnapshot, RunKind};
use tracker_indexer_ports::{BoxFuture, ProjectRun, ProjectRunFactoryPort};
use tracker_indexer_shared::{ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result};

/// Failures of a command run.
#[derive(Debug, Error)]
pub enum CommandRunError {
    /// The process could not be started.
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        /// Program name.
        program: String,
        /// Underlying error.
        source: std::io::Error,
    },
    /// Reading the child's output or status failed.
    #[error("failed to observe `{program}`: {source}")]
    Io {
        /// Program name.
        program: String,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The process exited unsuccessfully.
    #[error("`{program}` exited with {status}")]
    Exit {
        /// Program name.
        program: String,
        /// Exit status.
        status: ExitStatus,
    },
}

impl From<CommandRunError> for ErrorEnvelope {
    fn from(error: CommandRunError) -> Self {
        let message = error.to_string();
        match error {
            CommandRunError::Spawn { program, .. } => {
                Self::expected(ErrorCode::new("indexer", "spawn_failed"), message)
                    .with_metadata("program", program)
            },
            CommandRunError::Io { program, .. } => {
                Self::unexpected(ErrorCode::io(), message, ErrorClass::Retriable)
                    .with_metadata("program", program)
            },
            CommandRunError::Exit { program, status } => {
                let envelope = Self::expected(ErrorCode::new("indexer", "command_failed"), message)
                    .with_metadata("program", program);
                match status.code() {
                    Some(code) => envelope.with_metadata("exitCode", code.to_string()),
                    None => envelope,
                }
            },
        }
    }
}

/// Creates [`CommandRun`]s for one command template.
#[derive(Debug, Clone, Default)]
pub struct CommandRunFactory {
    command: Arc<[Box<str>]>,
}

impl CommandRunFactory {
    /// Factory for `command` (program followed by arguments). An empty
    /// command yields runs that complete immediately.
    #[must_use]
    pub fn new(command: Vec<Box<str>>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Factory for `worker.command` of a validated config.
    #[must_use]
    pub fn from_config(config: &ValidatedIndexerConfig) -> Self {
        Self::new(config.worker.command.clone())
    }
}

impl ProjectRunFactoryPort for CommandRunFactory {
    fn create(
        &self,
        project_key: ProjectKey,
        run_kind: RunKind,
        started_at: DateTime<Utc>,
    ) -> Result<Arc<dyn ProjectRun>> {
        let argv = render_command(&self.command, &project_key, run_kind);
        Ok(Arc::new(CommandRun {
            snapshot: Mutex::new(ProjectRunSnapshot::started(
                project_key.clone(),
                run_kind,
                started_at,
            )),
            project_key,
            run_kind,
            argv,
        }))
    }
}

/// Substitute placeholders in every argument after the program.
fn render_command(command: &[Box<str>], project_key: &ProjectKey, run_kind: RunKind) -> Vec<String> {
    let mut rendered = Vec::with_capacity(command.len());
    let mut parts = command.iter();
    if let Some(program) = parts.next() {
        rendered.push(program.to_string());
    }
    rendered.extend(parts.map(|arg| {
        arg.replace(WORKER_PROJECT_PLACEHOLDER, project_key.as_str())
            .replace(WORKER_KIND_PLACEHOLDER, run_kind.as_str())
    }));
    rendered
}

/// One external-command run.
#[derive(Debug)]
pub struct CommandRun {
    project_key: ProjectKey,
    run_kind: RunKind,
    argv: Vec<String>,
    snapshot: Mutex<ProjectRunSnapshot>,
}

impl CommandRun {
    /// Program and arguments after placeholder substitution.
    #[must_use]
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    fn record_line(&self) {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .progress
            .issues_updated += 1;
    }

    async fn run_to_completion(&self, ctx: &RequestContext) -> Result<()> {
        let Some((program, args)) = self.argv.split_first() else {
            return Ok(());
        };
        ctx.ensure_not_cancelled("command.spawn")?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CommandRunError::Spawn {
                program: program.clone(),
                source,
            })?;

        let io_error = |source: std::io::Error| CommandRunError::Io {
            program: program.clone(),
            source,
        };

        if let Some(stdout) = child.stdout.take() {
            let mut records = BufReader::new(stdout).split(b'\n');
            loop {
                let line = tokio::select! {
                    () = ctx.cancelled() => None,
                    record = records.next_segment() => Some(record.map_err(io_error)?),
                };
                match line {
                    None => return Err(interrupt(&mut child, program).await),
                    Some(Some(_)) => self.record_line(),
                    Some(None) => break,
                }
            }
        }

        let status = tokio::select! {
            () = ctx.cancelled() => None,
            status = child.wait() => Some(status.map_err(io_error)?),
        };
        let Some(status) = status else {
            return Err(interrupt(&mut child, program).await);
        };
        if !status.success() {
            return Err(CommandRunError::Exit {
                program: program.clone(),
                status,
            }
            .into());
        }
        Ok(())
    }
}

async fn interrupt(child: &mut Child, program: &str) -> ErrorEnvelope {
    if let Err(error) = child.kill().await {
        tracing::warn!(program, %error, "failed to kill interrupted indexing command");
    }
    ErrorEnvelope::cancelled("indexing command interrupted").with_metadata("program", program)
}

impl ProjectRun for CommandRun {
    fn project_key(&self) -> &ProjectKey {
        &self.project_key
    }

    fn run_kind(&self) -> RunKind {
        self.run_kind
    }

    fn execute(self: Arc<Self>, ctx: RequestContext) -> BoxFuture<'static, Result<()>> {
        Box::pin(async move { self.run_to_completion(&ctx).await })
    }

    fn snapshot(&self) -> ProjectRunSnapshot {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(parts: &[&str]) -> Vec<Box<str>> {
        parts.iter().map(|part| Box::from(*part)).collect()
    }

    #[test]
    fn placeholders_are_substituted_in_arguments_only() -> Result<()> {
        let key = ProjectKey::parse("ORG")?;
        let argv = render_command(
            &command(&["{project}-indexer", "--project={project}", "--mode", "{kind}"]),
            &key,
            RunKind::Full,
        );
        assert_eq!(argv, ["{project}-indexer", "--project=ORG", "--mode", "full"]);
        Ok(())
    }

    #[test]
    fn exit_failures_carry_the_exit_code() {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            let envelope = ErrorEnvelope::from(CommandRunError::Exit {
                program: "indexer".to_owned(),
                status: ExitStatus::from_raw(3 << 8),
            });
            assert_eq!(envelope.code, ErrorCode::new("indexer", "command_failed"));
            assert_eq!(envelope.metadata.get("exitCode").map(String::as_str), Some("3"));
        }
    }

    #[tokio::test]
    async fn empty_commands_complete_immediately() -> Result<()> {
        let factory = CommandRunFactory::default();
        let run = factory.create(ProjectKey::parse("AS7")?, RunKind::Incremental, Utc::now())?;
        Arc::clone(&run).execute(RequestContext::new_job()).await?;
        assert_eq!(run.snapshot().progress.issues_updated, 0);
        Ok(())
    }
}
