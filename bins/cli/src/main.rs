//! `tix`: run and manage the issue-tracker indexing coordinator.

mod commands;
mod compose;
mod error;
mod format;
mod logging;

use clap::{Parser, Subcommand};
use commands::{ConfigSyntax, ReindexKind};
use error::{CliError, ExitCode, envelope_exit_code};
use format::{OutputArgs, OutputMode, error_payload, error_text, ndjson_line, pretty_json};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracker_indexer_config::{ValidatedIndexerConfig, load_indexer_config_std_env};
use tracker_indexer_shared::{ErrorEnvelope, RequestContext};

#[derive(Debug, Parser)]
#[command(name = "tix", version, about = "Issue-tracker indexing coordinator")]
struct Cli {
    #[command(flatten)]
    output: OutputArgs,
    /// Config file path (JSON/TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// JSON overrides applied on top of the config file (partial config).
    #[arg(long, global = true)]
    overrides_json: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the coordinator loop until Ctrl-C.
    Run,
    /// Config helpers.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// List tracked projects with their schedule timestamps.
    Projects,
    /// Request a full reindex on the next coordinator cycle.
    ForceFull {
        /// Project key; every tracked project when omitted.
        #[arg(long)]
        project: Option<String>,
    },
    /// Make projects incrementally due on the next coordinator cycle.
    ForceIncremental {
        /// Project key; every tracked project when omitted.
        #[arg(long)]
        project: Option<String>,
    },
    /// Show build information.
    Info,
}

#[derive(Debug, Subcommand)]
enum ConfigCommands {
    /// Validate config loading, merging, and normalization.
    Check,
    /// Show the effective config after file, overrides, and env are merged.
    Show {
        /// Document syntax for text output.
        #[arg(long = "as", value_enum, default_value_t = ConfigSyntax::Toml)]
        syntax: ConfigSyntax,
    },
    /// Print the JSON Schema of the config file.
    Schema,
}

pub(crate) struct CliOutput {
    stdout: String,
    stderr: String,
    exit_code: ExitCode,
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let mode = OutputMode::from_args(&cli.output);
    logging::init_logging(cli.output.log_format);

    match run(&cli, mode) {
        Ok(output) => match write_output(&output) {
            Ok(()) => std::process::ExitCode::from(output.exit_code.as_u8()),
            Err(error) => exit_with_error(&error),
        },
        Err(error) => exit_with_error(&error),
    }
}

fn exit_with_error(error: &CliError) -> std::process::ExitCode {
    let _ = writeln!(io::stderr(), "error: {error}");
    std::process::ExitCode::from(error.exit_code().as_u8())
}

fn run(cli: &Cli, mode: OutputMode) -> Result<CliOutput, CliError> {
    let path = cli.config.as_deref();
    match &cli.command {
        Commands::Info => commands::run_info(mode),
        Commands::Config {
            command: ConfigCommands::Schema,
        } => commands::run_config_schema(),
        command => {
            let config = match load_config(path, cli.overrides_json.as_deref()) {
                Ok(config) => config,
                Err(error) => return Ok(format_error_output(mode, &error, ExitCode::InvalidInput)),
            };
            let output = run_with_config(command, mode, path, &config);
            output.or_else(|error| match error {
                CliError::Indexer(envelope) => {
                    let exit_code = envelope_exit_code(&envelope);
                    Ok(format_error_output(mode, &envelope, exit_code))
                },
                other => Err(other),
            })
        },
    }
}

fn run_with_config(
    command: &Commands,
    mode: OutputMode,
    path: Option<&Path>,
    config: &ValidatedIndexerConfig,
) -> Result<CliOutput, CliError> {
    match command {
        Commands::Config {
            command: ConfigCommands::Check,
        } => commands::run_config_check(mode, path, config),
        Commands::Config {
            command: ConfigCommands::Show { syntax },
        } => commands::run_config_show(mode, path, config, *syntax),
        Commands::Run => {
            let runtime = compose::runtime()?;
            let coordinator = compose::build_coordinator(config, runtime.handle().clone());
            runtime.block_on(commands::run_coordinator(mode, &coordinator, commands::ctrl_c()))
        },
        Commands::Projects => {
            let runtime = compose::runtime()?;
            let coordinator = compose::build_coordinator(config, runtime.handle().clone());
            runtime.block_on(commands::run_projects(
                mode,
                &coordinator,
                &RequestContext::new_request(),
            ))
        },
        Commands::ForceFull { project } => {
            reindex(mode, config, ReindexKind::Full, project.as_deref())
        },
        Commands::ForceIncremental { project } => {
            reindex(mode, config, ReindexKind::Incremental, project.as_deref())
        },
        Commands::Info
        | Commands::Config {
            command: ConfigCommands::Schema,
        } => Err(CliError::InvalidInput(
            "command does not take a config".to_owned(),
        )),
    }
}

fn reindex(
    mode: OutputMode,
    config: &ValidatedIndexerConfig,
    kind: ReindexKind,
    project: Option<&str>,
) -> Result<CliOutput, CliError> {
    let runtime = compose::runtime()?;
    let coordinator = compose::build_coordinator(config, runtime.handle().clone());
    runtime.block_on(commands::run_reindex(
        mode,
        &coordinator,
        &RequestContext::new_request(),
        kind,
        project,
    ))
}

fn load_config(
    path: Option<&Path>,
    overrides_json: Option<&str>,
) -> Result<ValidatedIndexerConfig, ErrorEnvelope> {
    load_indexer_config_std_env(path, overrides_json)
}

pub(crate) fn format_error_output(
    mode: OutputMode,
    error: &ErrorEnvelope,
    exit_code: ExitCode,
) -> CliOutput {
    let mut stderr = String::new();
    log_info(&mut stderr, "command failed", mode.no_progress);

    let stdout = if mode.is_ndjson() {
        ndjson_line(&serde_json::json!({
            "type": "error",
            "status": "error",
            "error": error_payload(error),
        }))
        .unwrap_or_else(|_| {
            "{\"type\":\"error\",\"status\":\"error\",\"error\":{\"code\":\"core:internal\"}}\n"
                .to_owned()
        })
    } else if mode.is_json() {
        // This is a CLI boundary, so JSON serialization errors are internal.
        pretty_json(&serde_json::json!({
            "status": "error",
            "error": error_payload(error),
        }))
        .unwrap_or_else(|_| {
            "{\"status\":\"error\",\"error\":{\"code\":\"core:internal\"}}\n".to_owned()
        })
    } else {
        error_text(error)
    };

    CliOutput {
        stdout,
        stderr,
        exit_code,
    }
}

pub(crate) fn log_info(stderr: &mut String, message: &str, no_progress: bool) {
    if no_progress {
        return;
    }
    stderr.push_str("info: ");
    stderr.push_str(message);
    stderr.push('\n');
}

fn write_output(output: &CliOutput) -> Result<(), CliError> {
    let mut stdout = io::stdout();
    stdout.write_all(output.stdout.as_bytes())?;
    stdout.flush()?;

    if !output.stderr.is_empty() {
        let mut stderr = io::stderr();
        stderr.write_all(output.stderr.as_bytes())?;
        stderr.flush()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{LogFormat, OutputFormat};
    use clap::CommandFactory;
    use tracker_indexer_shared::ErrorCode;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn version_flag_is_supported() {
        let result = Cli::command().try_get_matches_from(["tix", "--version"]);
        let is_version = matches!(
            result,
            Err(error) if error.kind() == clap::error::ErrorKind::DisplayVersion
        );
        assert!(is_version);
    }

    #[test]
    fn force_full_accepts_a_project_and_global_flags() -> Result<(), clap::Error> {
        let cli = Cli::try_parse_from([
            "tix",
            "force-full",
            "--project",
            "ORG",
            "--output",
            "json",
            "--log-format",
            "json",
            "--config",
            "tix.toml",
        ])?;
        assert!(matches!(
            cli.command,
            Commands::ForceFull { project: Some(ref key) } if key == "ORG"
        ));
        assert_eq!(cli.output.output, Some(OutputFormat::Json));
        assert_eq!(cli.output.log_format, LogFormat::Json);
        assert_eq!(cli.config.as_deref(), Some(Path::new("tix.toml")));
        Ok(())
    }

    #[test]
    fn config_show_defaults_to_toml() -> Result<(), clap::Error> {
        let cli = Cli::try_parse_from(["tix", "config", "show"])?;
        assert!(matches!(
            cli.command,
            Commands::Config {
                command: ConfigCommands::Show {
                    syntax: ConfigSyntax::Toml
                }
            }
        ));
        Ok(())
    }

    #[test]
    fn config_errors_render_as_invalid_input() -> Result<(), serde_json::Error> {
        let mode = OutputMode {
            format: OutputFormat::Json,
            no_progress: true,
        };
        let error = ErrorEnvelope::expected(ErrorCode::new("config", "invalid_cron"), "bad cron");
        let output = format_error_output(mode, &error, ExitCode::InvalidInput);

        assert_eq!(output.exit_code, ExitCode::InvalidInput);
        assert!(output.stderr.is_empty());
        let value: serde_json::Value = serde_json::from_str(&output.stdout)?;
        assert_eq!(value["status"], "error");
        assert_eq!(value["error"]["code"], "config:invalid_cron");
        Ok(())
    }
}
