//! CLI integration tests.

use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

type TestResult<T = ()> = Result<T, Box<dyn Error>>;

fn temp_dir(prefix: &str) -> TestResult<PathBuf> {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("{prefix}-{nanos}"));
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn write_config(dir: &Path, body: &str) -> TestResult<String> {
    let path = dir.join("tix.toml");
    std::fs::write(&path, body)?;
    path.to_str()
        .map(str::to_owned)
        .ok_or_else(|| "config path is not UTF-8".into())
}

fn config_with_state(dir: &Path) -> TestResult<String> {
    let state = dir.join("state.json");
    write_config(
        dir,
        &format!(
            "version = 1\n[projects]\nkeys = [\"ORG\", \"AS7\"]\n[storage]\nstateFile = {:?}\n",
            state.to_string_lossy()
        ),
    )
}

fn tix() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_tix"));
    command.env("RUST_LOG", "off");
    for (key, _) in std::env::vars() {
        if key.starts_with("TIX_") {
            command.env_remove(key);
        }
    }
    command
}

fn run_cli(args: &[&str]) -> TestResult<Output> {
    Ok(tix().args(args).output()?)
}

fn stdout_json(output: &Output) -> TestResult<serde_json::Value> {
    Ok(serde_json::from_slice(&output.stdout)?)
}

#[test]
fn info_reports_the_binary() -> TestResult {
    let output = run_cli(&["info", "--output", "json"])?;
    assert!(output.status.success());
    let value = stdout_json(&output)?;
    assert_eq!(value["status"], "ok");
    assert_eq!(value["build"]["name"], "tix");
    Ok(())
}

#[test]
fn config_check_accepts_a_toml_file() -> TestResult {
    let dir = temp_dir("tix-cli-check")?;
    let config = config_with_state(&dir)?;

    let output = run_cli(&["config", "check", "--config", &config])?;
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("status: ok\nconfig: ok\n"));
    assert!(stdout.contains("projects: 2\n"));

    std::fs::remove_dir_all(&dir).ok();
    Ok(())
}

#[test]
fn invalid_cron_exits_with_invalid_input() -> TestResult {
    let dir = temp_dir("tix-cli-cron")?;
    let config = write_config(&dir, "version = 1\n[schedule]\nfullCron = \"not a cron\"\n")?;

    let output = run_cli(&["config", "check", "--output", "json", "--config", &config])?;
    assert_eq!(output.status.code(), Some(2));
    assert_eq!(stdout_json(&output)?["status"], "error");

    std::fs::remove_dir_all(&dir).ok();
    Ok(())
}

#[test]
fn env_overrides_win_over_the_file() -> TestResult {
    let dir = temp_dir("tix-cli-env")?;
    let config = config_with_state(&dir)?;

    let output = tix()
        .args(["config", "show", "--output", "json", "--config", &config])
        .env("TIX_COORDINATOR_MAX_CONCURRENCY", "7")
        .output()?;
    assert!(output.status.success(), "{output:?}");
    let value = stdout_json(&output)?;
    assert_eq!(value["effectiveConfig"]["coordinator"]["maxConcurrency"], 7);

    std::fs::remove_dir_all(&dir).ok();
    Ok(())
}

#[test]
fn config_schema_prints_json_schema() -> TestResult {
    let output = run_cli(&["config", "schema"])?;
    assert!(output.status.success());
    assert!(stdout_json(&output)?.is_object());
    Ok(())
}

#[test]
fn force_full_is_visible_in_projects() -> TestResult {
    let dir = temp_dir("tix-cli-force")?;
    let config = config_with_state(&dir)?;

    let forced = run_cli(&["force-full", "--project", "ORG", "--config", &config])?;
    assert!(forced.status.success(), "{forced:?}");
    assert_eq!(
        String::from_utf8_lossy(&forced.stdout),
        "status: ok\nkind: forceFull\nprojects: ORG\n"
    );

    let listed = run_cli(&["projects", "--output", "json", "--config", &config])?;
    assert!(listed.status.success(), "{listed:?}");
    let value = stdout_json(&listed)?;
    let projects = value["projects"].as_array().ok_or("projects is not an array")?;
    assert_eq!(projects.len(), 2);
    assert_eq!(value["projects"][0]["key"], "AS7");
    assert!(value["projects"][0]["schedule"]["forcedFullRequestedAt"].is_null());
    assert_eq!(value["projects"][1]["key"], "ORG");
    assert!(value["projects"][1]["schedule"]["forcedFullRequestedAt"].is_string());

    std::fs::remove_dir_all(&dir).ok();
    Ok(())
}

#[test]
fn force_incremental_on_an_untracked_project_fails() -> TestResult {
    let dir = temp_dir("tix-cli-untracked")?;
    let config = config_with_state(&dir)?;

    let output = run_cli(&[
        "force-incremental",
        "--project",
        "NOPE",
        "--output",
        "ndjson",
        "--config",
        &config,
    ])?;
    assert_eq!(output.status.code(), Some(2));
    let value = stdout_json(&output)?;
    assert_eq!(value["type"], "error");
    assert_eq!(value["error"]["code"], "core:not_found");
    assert!(!dir.join("state.json").exists());

    std::fs::remove_dir_all(&dir).ok();
    Ok(())
}
