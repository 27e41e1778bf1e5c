//! Environment variable parsing and env-to-config merging.
//!
//! Env parsing is strict: a variable that is present but empty or malformed
//! fails fast. The project CSV normalizes to sorted, deduplicated keys.

use crate::schema::{IndexerConfig, ValidatedIndexerConfig};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use tracker_indexer_shared::{ErrorCode, ErrorEnvelope};

/// Env var: maximum concurrent runs.
pub const ENV_COORDINATOR_MAX_CONCURRENCY: &str = "TIX_COORDINATOR_MAX_CONCURRENCY";
/// Env var: quick wake interval in milliseconds.
pub const ENV_COORDINATOR_QUICK_INTERVAL_MS: &str = "TIX_COORDINATOR_QUICK_INTERVAL_MS";
/// Env var: slow wake interval in milliseconds.
pub const ENV_COORDINATOR_SLOW_INTERVAL_MS: &str = "TIX_COORDINATOR_SLOW_INTERVAL_MS";
/// Env var: incremental period in milliseconds.
pub const ENV_SCHEDULE_INCREMENTAL_PERIOD_MS: &str = "TIX_SCHEDULE_INCREMENTAL_PERIOD_MS";
/// Env var: full period in milliseconds (`0` disables).
pub const ENV_SCHEDULE_FULL_PERIOD_MS: &str = "TIX_SCHEDULE_FULL_PERIOD_MS";
/// Env var: full update cron expression.
pub const ENV_SCHEDULE_FULL_CRON: &str = "TIX_SCHEDULE_FULL_CRON";
/// Env var: tracked project keys (CSV).
pub const ENV_PROJECTS: &str = "TIX_PROJECTS";
/// Env var: timestamp state file path.
pub const ENV_STORAGE_STATE_FILE: &str = "TIX_STORAGE_STATE_FILE";

const MAX_CSV_ITEMS: usize = 10_000;

const ALL_ENV_VARS: [&str; 8] = [
    ENV_COORDINATOR_MAX_CONCURRENCY,
    ENV_COORDINATOR_QUICK_INTERVAL_MS,
    ENV_COORDINATOR_SLOW_INTERVAL_MS,
    ENV_SCHEDULE_INCREMENTAL_PERIOD_MS,
    ENV_SCHEDULE_FULL_PERIOD_MS,
    ENV_SCHEDULE_FULL_CRON,
    ENV_PROJECTS,
    ENV_STORAGE_STATE_FILE,
];

/// Parsed env overrides. `None` means the variable was not set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexerEnv {
    /// `TIX_COORDINATOR_MAX_CONCURRENCY`.
    pub max_concurrency: Option<u32>,
    /// `TIX_COORDINATOR_QUICK_INTERVAL_MS`.
    pub quick_interval_ms: Option<u64>,
    /// `TIX_COORDINATOR_SLOW_INTERVAL_MS`.
    pub slow_interval_ms: Option<u64>,
    /// `TIX_SCHEDULE_INCREMENTAL_PERIOD_MS`.
    pub incremental_period_ms: Option<u64>,
    /// `TIX_SCHEDULE_FULL_PERIOD_MS`.
    pub full_period_ms: Option<u64>,
    /// `TIX_SCHEDULE_FULL_CRON`.
    pub full_cron: Option<Box<str>>,
    /// `TIX_PROJECTS`.
    pub projects: Option<Vec<Box<str>>>,
    /// `TIX_STORAGE_STATE_FILE`.
    pub state_file: Option<PathBuf>,
}

impl IndexerEnv {
    /// Parse env overrides from a key/value map (useful for tests and fixtures).
    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self, EnvParseError> {
        Ok(Self {
            max_concurrency: parse_optional_u32(map, ENV_COORDINATOR_MAX_CONCURRENCY)?,
            quick_interval_ms: parse_optional_u64(map, ENV_COORDINATOR_QUICK_INTERVAL_MS)?,
            slow_interval_ms: parse_optional_u64(map, ENV_COORDINATOR_SLOW_INTERVAL_MS)?,
            incremental_period_ms: parse_optional_u64(map, ENV_SCHEDULE_INCREMENTAL_PERIOD_MS)?,
            full_period_ms: parse_optional_u64(map, ENV_SCHEDULE_FULL_PERIOD_MS)?,
            full_cron: parse_optional_trimmed_string(map, ENV_SCHEDULE_FULL_CRON)?,
            projects: parse_optional_csv(map, ENV_PROJECTS)?,
            state_file: parse_optional_trimmed_string(map, ENV_STORAGE_STATE_FILE)?
                .map(|value| PathBuf::from(value.as_ref())),
        })
    }

    /// Parse env overrides from the process environment.
    pub fn from_std_env() -> Result<Self, EnvParseError> {
        let mut map = BTreeMap::new();
        for name in ALL_ENV_VARS {
            if let Ok(value) = std::env::var(name) {
                map.insert(name.to_string(), value);
            }
        }

        Self::from_map(&map)
    }

    /// Returns true when no override is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.max_concurrency.is_none()
            && self.quick_interval_ms.is_none()
            && self.slow_interval_ms.is_none()
            && self.incremental_period_ms.is_none()
            && self.full_period_ms.is_none()
            && self.full_cron.is_none()
            && self.projects.is_none()
            && self.state_file.is_none()
    }
}

/// Apply env overrides to a base config (env wins over file/default values).
pub fn apply_env_overrides(
    base: IndexerConfig,
    env: &IndexerEnv,
) -> Result<ValidatedIndexerConfig, ErrorEnvelope> {
    let mut config = base;

    set_if_present(&mut config.coordinator.max_concurrency, env.max_concurrency);
    set_if_present(
        &mut config.coordinator.quick_interval_ms,
        env.quick_interval_ms,
    );
    set_if_present(&mut config.coordinator.slow_interval_ms, env.slow_interval_ms);
    set_if_present(
        &mut config.schedule.incremental_period_ms,
        env.incremental_period_ms,
    );
    set_if_present(&mut config.schedule.full_period_ms, env.full_period_ms);
    if let Some(cron) = &env.full_cron {
        config.schedule.full_cron = Some(cron.clone());
    }
    if let Some(projects) = &env.projects {
        config.projects.keys.clone_from(projects);
    }
    if let Some(state_file) = &env.state_file {
        config.storage.state_file.clone_from(state_file);
    }

    config.validate_and_normalize().map_err(Into::into)
}

fn set_if_present<T: Copy>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

/// Validation failures when parsing env variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvParseError {
    /// An env var was present but empty after trimming.
    EmptyValue {
        /// Env var name.
        var: &'static str,
    },
    /// Integer env var had an invalid value.
    InvalidInt {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
    /// CSV list exceeds a safety limit.
    CsvTooLarge {
        /// Env var name.
        var: &'static str,
        /// Number of parsed items.
        len: usize,
        /// Maximum allowed.
        max: usize,
    },
}

impl EnvParseError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::EmptyValue { .. } => ErrorCode::new("config", "empty_env_var"),
            Self::InvalidInt { .. } => ErrorCode::new("config", "invalid_env_int"),
            Self::CsvTooLarge { .. } => ErrorCode::new("config", "invalid_env_csv"),
        }
    }
}

impl fmt::Display for EnvParseError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyValue { var } => write!(formatter, "{var} must be non-empty"),
            Self::InvalidInt { var, .. } => {
                write!(formatter, "{var} must be a non-negative integer")
            },
            Self::CsvTooLarge { var, len, max } => {
                write!(formatter, "{var} is too large ({len} items, max {max})")
            },
        }
    }
}

impl std::error::Error for EnvParseError {}

impl From<EnvParseError> for ErrorEnvelope {
    fn from(error: EnvParseError) -> Self {
        let code = error.error_code();
        let message = error.to_string();
        let envelope = Self::expected(code, message);

        match error {
            EnvParseError::EmptyValue { var } => envelope.with_metadata("env_var", var),
            EnvParseError::InvalidInt { var, value } => envelope
                .with_metadata("env_var", var)
                .with_metadata("value", value),
            EnvParseError::CsvTooLarge { var, len, max } => envelope
                .with_metadata("env_var", var)
                .with_metadata("len", len.to_string())
                .with_metadata("max", max.to_string()),
        }
    }
}

fn parse_optional_trimmed_string(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<Box<str>>, EnvParseError> {
    let Some(raw) = map.get(var) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EnvParseError::EmptyValue { var });
    }
    Ok(Some(trimmed.into()))
}

fn parse_optional_u32(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<u32>, EnvParseError> {
    let Some(raw) = map.get(var) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EnvParseError::EmptyValue { var });
    }

    trimmed
        .parse::<u32>()
        .map(Some)
        .map_err(|_| EnvParseError::InvalidInt {
            var,
            value: raw.clone(),
        })
}

fn parse_optional_u64(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<u64>, EnvParseError> {
    let Some(raw) = map.get(var) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EnvParseError::EmptyValue { var });
    }

    trimmed
        .parse::<u64>()
        .map(Some)
        .map_err(|_| EnvParseError::InvalidInt {
            var,
            value: raw.clone(),
        })
}

fn parse_optional_csv(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<Vec<Box<str>>>, EnvParseError> {
    let Some(raw) = map.get(var) else {
        return Ok(None);
    };
    let mut items = parse_csv(raw);
    if items.is_empty() {
        return Err(EnvParseError::EmptyValue { var });
    }
    items.sort();
    items.dedup();
    if items.len() > MAX_CSV_ITEMS {
        return Err(EnvParseError::CsvTooLarge {
            var,
            len: items.len(),
            max: MAX_CSV_ITEMS,
        });
    }
    Ok(Some(items))
}

fn parse_csv(input: &str) -> Vec<Box<str>> {
    input
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(Box::from)
        .collect()
}
