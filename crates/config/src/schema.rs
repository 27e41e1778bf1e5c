//! Indexer configuration schema, defaults, validation, and normalization.
//!
//! - Deserialization uses `serde` (JSON or TOML).
//! - Validation is manual and returns typed errors mapped to `ErrorEnvelope`.
//! - Normalization trims strings and sorts/dedupes the project list.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracker_indexer_domain::{CronExpression, ProjectKey};
use tracker_indexer_shared::{BoundedU32, BoundedU64, ErrorCode, ErrorEnvelope};

/// Current supported configuration schema version.
pub const CURRENT_CONFIG_VERSION: u32 = 1;

const MAX_CONCURRENCY_MIN: u32 = 1;
const MAX_CONCURRENCY_MAX: u32 = 256;
const QUICK_INTERVAL_MIN_MS: u64 = 100;
const QUICK_INTERVAL_MAX_MS: u64 = 600_000;
const SLOW_INTERVAL_MIN_MS: u64 = 100;
const SLOW_INTERVAL_MAX_MS: u64 = 3_600_000;
const INCREMENTAL_PERIOD_MIN_MS: u64 = 1_000;
const INCREMENTAL_PERIOD_MAX_MS: u64 = 31_536_000_000;
const FULL_PERIOD_MIN_MS: u64 = 60_000;
const FULL_PERIOD_MAX_MS: u64 = 31_536_000_000;

const PROJECT_KEYS_MAX: usize = 10_000;
const WORKER_COMMAND_MAX_ARGS: usize = 256;

/// Placeholder replaced by the project key in worker command arguments.
pub const WORKER_PROJECT_PLACEHOLDER: &str = "{project}";
/// Placeholder replaced by the run kind in worker command arguments.
pub const WORKER_KIND_PLACEHOLDER: &str = "{kind}";

/// Top-level indexer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct IndexerConfig {
    /// Schema version for forward-compatible migrations.
    pub version: u32,
    /// Coordinator loop settings.
    pub coordinator: CoordinatorConfig,
    /// Incremental and full update schedule.
    pub schedule: ScheduleConfig,
    /// Statically tracked projects.
    pub projects: ProjectsConfig,
    /// Timestamp persistence.
    pub storage: StorageConfig,
    /// External worker command.
    pub worker: WorkerConfig,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            version: CURRENT_CONFIG_VERSION,
            coordinator: CoordinatorConfig::default(),
            schedule: ScheduleConfig::default(),
            projects: ProjectsConfig::default(),
            storage: StorageConfig::default(),
            worker: WorkerConfig::default(),
        }
    }
}

impl IndexerConfig {
    /// Validate and normalize the config.
    pub fn validate_and_normalize(mut self) -> Result<ValidatedIndexerConfig, ConfigSchemaError> {
        self.validate_version()?;

        self.coordinator.validate()?;
        self.schedule.normalize();
        let full_cron = self.schedule.validate()?;
        let project_keys = self.projects.normalize_and_validate()?;
        self.storage.validate()?;
        self.worker.validate()?;

        let limits = ConfigLimits::new(&self)?;
        Ok(ValidatedIndexerConfig {
            raw: self,
            limits,
            full_cron,
            project_keys,
        })
    }

    const fn validate_version(&self) -> Result<(), ConfigSchemaError> {
        if self.version != CURRENT_CONFIG_VERSION {
            return Err(ConfigSchemaError::UnsupportedVersion {
                found: self.version,
                supported: CURRENT_CONFIG_VERSION,
            });
        }
        Ok(())
    }
}

/// Validated config wrapper carrying bounded values and parsed fields.
#[derive(Debug, Clone)]
pub struct ValidatedIndexerConfig {
    raw: IndexerConfig,
    limits: ConfigLimits,
    full_cron: Option<CronExpression>,
    project_keys: Vec<ProjectKey>,
}

impl ValidatedIndexerConfig {
    /// Access validated numeric bounds.
    #[must_use]
    pub const fn limits(&self) -> &ConfigLimits {
        &self.limits
    }

    /// Parsed full-update cron expression, if configured.
    #[must_use]
    pub const fn full_cron(&self) -> Option<&CronExpression> {
        self.full_cron.as_ref()
    }

    /// Parsed, sorted, deduplicated project keys.
    #[must_use]
    pub fn project_keys(&self) -> &[ProjectKey] {
        &self.project_keys
    }

    /// Borrow the raw config.
    #[must_use]
    pub const fn as_ref(&self) -> &IndexerConfig {
        &self.raw
    }

    /// Consume the wrapper and return the raw config.
    #[must_use]
    pub fn into_inner(self) -> IndexerConfig {
        self.raw
    }
}

impl AsRef<IndexerConfig> for ValidatedIndexerConfig {
    fn as_ref(&self) -> &IndexerConfig {
        &self.raw
    }
}

impl std::ops::Deref for ValidatedIndexerConfig {
    type Target = IndexerConfig;

    fn deref(&self) -> &Self::Target {
        &self.raw
    }
}

/// Validated numeric limits derived from the config.
#[derive(Debug, Clone, Copy)]
pub struct ConfigLimits {
    /// Maximum concurrent runs.
    pub max_concurrency: BoundedU32<MAX_CONCURRENCY_MIN, MAX_CONCURRENCY_MAX>,
    /// Wake interval while work is queued (ms).
    pub quick_interval_ms: BoundedU64<QUICK_INTERVAL_MIN_MS, QUICK_INTERVAL_MAX_MS>,
    /// Wake interval while idle, also the forced refill period (ms).
    pub slow_interval_ms: BoundedU64<SLOW_INTERVAL_MIN_MS, SLOW_INTERVAL_MAX_MS>,
    /// Incremental update period (ms).
    pub incremental_period_ms: BoundedU64<INCREMENTAL_PERIOD_MIN_MS, INCREMENTAL_PERIOD_MAX_MS>,
    /// Full update period (ms); `None` when disabled.
    pub full_period_ms: Option<BoundedU64<FULL_PERIOD_MIN_MS, FULL_PERIOD_MAX_MS>>,
}

impl ConfigLimits {
    fn new(config: &IndexerConfig) -> Result<Self, ConfigSchemaError> {
        let full_period_ms = match config.schedule.full_period_ms {
            0 => None,
            value => Some(bounded_u64(
                "schedule",
                "fullPeriodMs",
                value,
                FULL_PERIOD_MIN_MS,
                FULL_PERIOD_MAX_MS,
            )?),
        };

        Ok(Self {
            max_concurrency: bounded_u32(
                "coordinator",
                "maxConcurrency",
                config.coordinator.max_concurrency,
                MAX_CONCURRENCY_MIN,
                MAX_CONCURRENCY_MAX,
            )?,
            quick_interval_ms: bounded_u64(
                "coordinator",
                "quickIntervalMs",
                config.coordinator.quick_interval_ms,
                QUICK_INTERVAL_MIN_MS,
                QUICK_INTERVAL_MAX_MS,
            )?,
            slow_interval_ms: bounded_u64(
                "coordinator",
                "slowIntervalMs",
                config.coordinator.slow_interval_ms,
                SLOW_INTERVAL_MIN_MS,
                SLOW_INTERVAL_MAX_MS,
            )?,
            incremental_period_ms: bounded_u64(
                "schedule",
                "incrementalPeriodMs",
                config.schedule.incremental_period_ms,
                INCREMENTAL_PERIOD_MIN_MS,
                INCREMENTAL_PERIOD_MAX_MS,
            )?,
            full_period_ms,
        })
    }
}

/// Parse an indexer config from a JSON string, applying validation and normalization.
pub fn parse_indexer_config_json(input: &str) -> Result<ValidatedIndexerConfig, ErrorEnvelope> {
    let config: IndexerConfig = serde_json::from_str(input).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "invalid_json"),
            format!("invalid config JSON: {error}"),
        )
    })?;

    config.validate_and_normalize().map_err(Into::into)
}

/// Parse an indexer config from a TOML string, applying validation and normalization.
pub fn parse_indexer_config_toml(input: &str) -> Result<ValidatedIndexerConfig, ErrorEnvelope> {
    let config: IndexerConfig = toml::from_str(input).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "invalid_toml"),
            format!("invalid config TOML: {error}"),
        )
    })?;

    config.validate_and_normalize().map_err(Into::into)
}

/// Coordinator loop configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct CoordinatorConfig {
    /// Maximum number of runs in flight at once.
    pub max_concurrency: u32,
    /// Sleep between cycles while work is queued (ms).
    pub quick_interval_ms: u64,
    /// Sleep between cycles while idle (ms); also forces a queue refill when exceeded.
    pub slow_interval_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 2,
            quick_interval_ms: 2_000,
            slow_interval_ms: 15_000,
        }
    }
}

impl CoordinatorConfig {
    fn validate(&self) -> Result<(), ConfigSchemaError> {
        validate_limit_u32(
            "coordinator",
            "maxConcurrency",
            self.max_concurrency,
            MAX_CONCURRENCY_MIN,
            MAX_CONCURRENCY_MAX,
        )?;
        validate_timeout_ms(
            "coordinator",
            "quickIntervalMs",
            self.quick_interval_ms,
            QUICK_INTERVAL_MIN_MS,
            QUICK_INTERVAL_MAX_MS,
        )?;
        validate_timeout_ms(
            "coordinator",
            "slowIntervalMs",
            self.slow_interval_ms,
            SLOW_INTERVAL_MIN_MS,
            SLOW_INTERVAL_MAX_MS,
        )?;
        if self.slow_interval_ms < self.quick_interval_ms {
            return Err(ConfigSchemaError::IntervalOrder {
                quick_ms: self.quick_interval_ms,
                slow_ms: self.slow_interval_ms,
            });
        }
        Ok(())
    }
}

/// Incremental/full update schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct ScheduleConfig {
    /// Minimum time between incremental runs of one project (ms).
    pub incremental_period_ms: u64,
    /// Time between full runs of one project (ms); `0` disables periodic full runs.
    pub full_period_ms: u64,
    /// Quartz-style cron expression for full runs; takes precedence over `fullPeriodMs`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_cron: Option<Box<str>>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            incremental_period_ms: 300_000,
            full_period_ms: 0,
            full_cron: None,
        }
    }
}

impl ScheduleConfig {
    fn normalize(&mut self) {
        normalize_optional_trimmed(&mut self.full_cron);
    }

    fn validate(&self) -> Result<Option<CronExpression>, ConfigSchemaError> {
        validate_timeout_ms(
            "schedule",
            "incrementalPeriodMs",
            self.incremental_period_ms,
            INCREMENTAL_PERIOD_MIN_MS,
            INCREMENTAL_PERIOD_MAX_MS,
        )?;
        if self.full_period_ms != 0 {
            validate_timeout_ms(
                "schedule",
                "fullPeriodMs",
                self.full_period_ms,
                FULL_PERIOD_MIN_MS,
                FULL_PERIOD_MAX_MS,
            )?;
        }

        self.full_cron
            .as_deref()
            .map(|expression| {
                CronExpression::parse(expression).map_err(|error| ConfigSchemaError::InvalidCron {
                    expression: expression.to_owned(),
                    reason: error.to_string(),
                })
            })
            .transpose()
    }
}

/// Statically tracked projects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct ProjectsConfig {
    /// Project keys to index.
    pub keys: Vec<Box<str>>,
}

impl ProjectsConfig {
    fn normalize_and_validate(&mut self) -> Result<Vec<ProjectKey>, ConfigSchemaError> {
        let mut parsed = Vec::with_capacity(self.keys.len());
        for raw in &self.keys {
            let key = ProjectKey::parse(raw).map_err(|error| ConfigSchemaError::InvalidProjectKey {
                key: raw.to_string(),
                reason: error.to_string(),
            })?;
            parsed.push(key);
        }
        parsed.sort();
        parsed.dedup();

        if parsed.len() > PROJECT_KEYS_MAX {
            return Err(ConfigSchemaError::ListTooLarge {
                section: "projects",
                field: "keys",
                len: parsed.len(),
                max: PROJECT_KEYS_MAX,
            });
        }

        self.keys = parsed.iter().map(|key| Box::from(key.as_str())).collect();
        Ok(parsed)
    }
}

/// Timestamp persistence settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct StorageConfig {
    /// JSON file holding per-project schedule timestamps.
    pub state_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_file: PathBuf::from(".tix").join("state.json"),
        }
    }
}

impl StorageConfig {
    fn validate(&self) -> Result<(), ConfigSchemaError> {
        if self.state_file.as_os_str().is_empty() || self.state_file.file_name().is_none() {
            return Err(ConfigSchemaError::InvalidStatePath {
                path: self.state_file.display().to_string(),
            });
        }
        Ok(())
    }
}

/// External worker command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct WorkerConfig {
    /// Program and arguments; `{project}` and `{kind}` are substituted. Empty means no-op runs.
    pub command: Vec<Box<str>>,
}

impl WorkerConfig {
    fn validate(&self) -> Result<(), ConfigSchemaError> {
        if self.command.len() > WORKER_COMMAND_MAX_ARGS {
            return Err(ConfigSchemaError::ListTooLarge {
                section: "worker",
                field: "command",
                len: self.command.len(),
                max: WORKER_COMMAND_MAX_ARGS,
            });
        }
        if let Some(program) = self.command.first() {
            if program.trim().is_empty() {
                return Err(ConfigSchemaError::InvalidWorkerCommand {
                    reason: "program must be non-empty".to_owned(),
                });
            }
            if program.contains(WORKER_PROJECT_PLACEHOLDER) || program.contains(WORKER_KIND_PLACEHOLDER)
            {
                return Err(ConfigSchemaError::InvalidWorkerCommand {
                    reason: "placeholders are only allowed in arguments".to_owned(),
                });
            }
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSchemaError {
    /// The config version is not supported by this binary.
    UnsupportedVersion {
        /// Version found in the config.
        found: u32,
        /// Version supported by this crate.
        supported: u32,
    },
    /// An interval or period is out of bounds.
    TimeoutOutOfRange {
        /// Schema section (e.g. `coordinator`).
        section: &'static str,
        /// Field name in the config file (e.g. `quickIntervalMs`).
        field: &'static str,
        /// Value provided (ms).
        value_ms: u64,
        /// Minimum allowed value (ms).
        min_ms: u64,
        /// Maximum allowed value (ms).
        max_ms: u64,
    },
    /// A numeric limit is out of bounds.
    LimitOutOfRange {
        /// Schema section.
        section: &'static str,
        /// Field name in the config file.
        field: &'static str,
        /// Value provided.
        value: u64,
        /// Minimum allowed value.
        min: u64,
        /// Maximum allowed value.
        max: u64,
    },
    /// A list field exceeds the maximum allowed size.
    ListTooLarge {
        /// Schema section.
        section: &'static str,
        /// Field name in the config file.
        field: &'static str,
        /// Number of entries after normalization/deduplication.
        len: usize,
        /// Maximum allowed number of entries.
        max: usize,
    },
    /// The slow interval is shorter than the quick interval.
    IntervalOrder {
        /// Quick interval (ms).
        quick_ms: u64,
        /// Slow interval (ms).
        slow_ms: u64,
    },
    /// The full-update cron expression does not parse.
    InvalidCron {
        /// Expression as configured.
        expression: String,
        /// Parser message.
        reason: String,
    },
    /// A project key is invalid.
    InvalidProjectKey {
        /// Key as configured.
        key: String,
        /// Validation message.
        reason: String,
    },
    /// The state file path is unusable.
    InvalidStatePath {
        /// Path as configured.
        path: String,
    },
    /// The worker command is unusable.
    InvalidWorkerCommand {
        /// Human readable reason.
        reason: String,
    },
}

impl ConfigSchemaError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::UnsupportedVersion { .. } => ErrorCode::new("config", "unsupported_version"),
            Self::TimeoutOutOfRange { .. } => ErrorCode::new("config", "invalid_timeout"),
            Self::LimitOutOfRange { .. } => ErrorCode::new("config", "invalid_limit"),
            Self::ListTooLarge { .. } => ErrorCode::new("config", "list_too_large"),
            Self::IntervalOrder { .. } => ErrorCode::new("config", "invalid_interval_order"),
            Self::InvalidCron { .. } => ErrorCode::new("config", "invalid_cron"),
            Self::InvalidProjectKey { .. } => ErrorCode::new("config", "invalid_project_key"),
            Self::InvalidStatePath { .. } => ErrorCode::new("config", "invalid_state_path"),
            Self::InvalidWorkerCommand { .. } => ErrorCode::new("config", "invalid_worker_command"),
        }
    }
}

impl fmt::Display for ConfigSchemaError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedVersion { found, supported } => {
                write!(
                    formatter,
                    "unsupported config version: {found} (supported: {supported})"
                )
            },
            Self::TimeoutOutOfRange {
                section,
                field,
                value_ms,
                min_ms,
                max_ms,
            } => write!(
                formatter,
                "{section}.{field} must be within [{min_ms}, {max_ms}] ms (got {value_ms})"
            ),
            Self::LimitOutOfRange {
                section,
                field,
                value,
                min,
                max,
            } => write!(
                formatter,
                "{section}.{field} must be within [{min}, {max}] (got {value})"
            ),
            Self::ListTooLarge {
                section,
                field,
                len,
                max,
            } => write!(
                formatter,
                "{section}.{field} must have at most {max} entries (got {len})"
            ),
            Self::IntervalOrder { quick_ms, slow_ms } => write!(
                formatter,
                "coordinator.slowIntervalMs ({slow_ms}) must be >= coordinator.quickIntervalMs ({quick_ms})"
            ),
            Self::InvalidCron { reason, .. } => {
                write!(formatter, "invalid schedule.fullCron: {reason}")
            },
            Self::InvalidProjectKey { reason, .. } => {
                write!(formatter, "invalid projects.keys entry: {reason}")
            },
            Self::InvalidStatePath { path } => {
                write!(formatter, "invalid storage.stateFile path: {path:?}")
            },
            Self::InvalidWorkerCommand { reason } => {
                write!(formatter, "invalid worker.command: {reason}")
            },
        }
    }
}

impl std::error::Error for ConfigSchemaError {}

impl From<ConfigSchemaError> for ErrorEnvelope {
    fn from(error: ConfigSchemaError) -> Self {
        let code = error.error_code();
        let message = error.to_string();
        let mut envelope = Self::expected(code, message);

        match error {
            ConfigSchemaError::UnsupportedVersion { found, supported } => {
                envelope = envelope
                    .with_metadata("found", found.to_string())
                    .with_metadata("supported", supported.to_string());
            },
            ConfigSchemaError::TimeoutOutOfRange {
                section,
                field,
                value_ms,
                min_ms,
                max_ms,
            } => {
                envelope = envelope
                    .with_metadata("section", section)
                    .with_metadata("field", field)
                    .with_metadata("value_ms", value_ms.to_string())
                    .with_metadata("min_ms", min_ms.to_string())
                    .with_metadata("max_ms", max_ms.to_string());
            },
            ConfigSchemaError::LimitOutOfRange {
                section,
                field,
                value,
                min,
                max,
            } => {
                envelope = envelope
                    .with_metadata("section", section)
                    .with_metadata("field", field)
                    .with_metadata("value", value.to_string())
                    .with_metadata("min", min.to_string())
                    .with_metadata("max", max.to_string());
            },
            ConfigSchemaError::ListTooLarge {
                section,
                field,
                len,
                max,
            } => {
                envelope = envelope
                    .with_metadata("section", section)
                    .with_metadata("field", field)
                    .with_metadata("len", len.to_string())
                    .with_metadata("max", max.to_string());
            },
            ConfigSchemaError::IntervalOrder { quick_ms, slow_ms } => {
                envelope = envelope
                    .with_metadata("section", "coordinator")
                    .with_metadata("quick_ms", quick_ms.to_string())
                    .with_metadata("slow_ms", slow_ms.to_string());
            },
            ConfigSchemaError::InvalidCron { expression, .. } => {
                envelope = envelope
                    .with_metadata("section", "schedule")
                    .with_metadata("field", "fullCron")
                    .with_metadata("expression", expression);
            },
            ConfigSchemaError::InvalidProjectKey { key, .. } => {
                envelope = envelope
                    .with_metadata("section", "projects")
                    .with_metadata("field", "keys")
                    .with_metadata("key", key);
            },
            ConfigSchemaError::InvalidStatePath { path } => {
                envelope = envelope
                    .with_metadata("section", "storage")
                    .with_metadata("field", "stateFile")
                    .with_metadata("path", path);
            },
            ConfigSchemaError::InvalidWorkerCommand { .. } => {
                envelope = envelope
                    .with_metadata("section", "worker")
                    .with_metadata("field", "command");
            },
        }

        envelope
    }
}

const fn validate_timeout_ms(
    section: &'static str,
    field: &'static str,
    value_ms: u64,
    min_ms: u64,
    max_ms: u64,
) -> Result<(), ConfigSchemaError> {
    if value_ms < min_ms || value_ms > max_ms {
        return Err(ConfigSchemaError::TimeoutOutOfRange {
            section,
            field,
            value_ms,
            min_ms,
            max_ms,
        });
    }
    Ok(())
}

fn validate_limit_u32(
    section: &'static str,
    field: &'static str,
    value: u32,
    min: u32,
    max: u32,
) -> Result<(), ConfigSchemaError> {
    if value < min || value > max {
        return Err(ConfigSchemaError::LimitOutOfRange {
            section,
            field,
            value: u64::from(value),
            min: u64::from(min),
            max: u64::from(max),
        });
    }
    Ok(())
}

fn bounded_u32<const MIN: u32, const MAX: u32>(
    section: &'static str,
    field: &'static str,
    value: u32,
    min: u32,
    max: u32,
) -> Result<BoundedU32<MIN, MAX>, ConfigSchemaError> {
    BoundedU32::try_new(value).map_err(|_| ConfigSchemaError::LimitOutOfRange {
        section,
        field,
        value: u64::from(value),
        min: u64::from(min),
        max: u64::from(max),
    })
}

fn bounded_u64<const MIN: u64, const MAX: u64>(
    section: &'static str,
    field: &'static str,
    value: u64,
    min: u64,
    max: u64,
) -> Result<BoundedU64<MIN, MAX>, ConfigSchemaError> {
    BoundedU64::try_new(value).map_err(|_| ConfigSchemaError::TimeoutOutOfRange {
        section,
        field,
        value_ms: value,
        min_ms: min,
        max_ms: max,
    })
}

fn normalize_optional_trimmed(value: &mut Option<Box<str>>) {
    let Some(raw) = value.take() else {
        return;
    };
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        *value = Some(trimmed.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn defaults_validate() -> Result<(), ConfigSchemaError> {
        let config = IndexerConfig::default().validate_and_normalize()?;
        assert_eq!(config.limits().max_concurrency.get(), 2);
        assert_eq!(config.limits().quick_interval_ms.get(), 2_000);
        assert_eq!(config.limits().slow_interval_ms.get(), 15_000);
        assert!(config.limits().full_period_ms.is_none());
        assert!(config.full_cron().is_none());
        Ok(())
    }

    #[test]
    fn project_keys_are_sorted_and_deduped() -> Result<(), ConfigSchemaError> {
        let mut config = IndexerConfig::default();
        config.projects.keys = vec!["ORG".into(), " JBESB ".into(), "ORG".into()];
        let config = config.validate_and_normalize()?;
        let keys: Vec<&str> = config.project_keys().iter().map(ProjectKey::as_str).collect();
        assert_eq!(keys, vec!["JBESB", "ORG"]);
        assert_eq!(config.projects.keys.len(), 2);
        Ok(())
    }

    #[test]
    fn blank_cron_is_treated_as_unset() -> Result<(), ConfigSchemaError> {
        let mut config = IndexerConfig::default();
        config.schedule.full_cron = Some("   ".into());
        let config = config.validate_and_normalize()?;
        assert!(config.schedule.full_cron.is_none());
        Ok(())
    }

    #[test]
    fn invalid_cron_is_rejected_with_metadata() {
        let mut config = IndexerConfig::default();
        config.schedule.full_cron = Some("0 0 25 * * ?".into());
        let envelope = config
            .validate_and_normalize()
            .err()
            .map_or_else(
                || ErrorEnvelope::invariant(ErrorCode::internal(), "invalid cron accepted"),
                ErrorEnvelope::from,
            );
        assert_eq!(envelope.code, ErrorCode::new("config", "invalid_cron"));
        assert_eq!(
            envelope.metadata.get("expression").map(String::as_str),
            Some("0 0 25 * * ?")
        );
    }

    #[test]
    fn slow_interval_must_not_be_shorter_than_quick() {
        let mut config = IndexerConfig::default();
        config.coordinator.quick_interval_ms = 5_000;
        config.coordinator.slow_interval_ms = 1_000;
        assert_eq!(
            config.validate_and_normalize().err(),
            Some(ConfigSchemaError::IntervalOrder {
                quick_ms: 5_000,
                slow_ms: 1_000
            })
        );
    }

    #[test]
    fn worker_program_rejects_placeholders() {
        let mut config = IndexerConfig::default();
        config.worker.command = vec!["{project}".into()];
        assert!(matches!(
            config.validate_and_normalize(),
            Err(ConfigSchemaError::InvalidWorkerCommand { .. })
        ));
    }

    proptest! {
        #[test]
        fn full_period_accepts_zero_or_bounded(value in 0_u64..120_000) {
            let mut config = IndexerConfig::default();
            config.schedule.full_period_ms = value;
            let result = config.validate_and_normalize();
            if value == 0 || value >= FULL_PERIOD_MIN_MS {
                prop_assert!(result.is_ok());
            } else {
                let is_timeout_error =
                    matches!(result, Err(ConfigSchemaError::TimeoutOutOfRange { .. }));
                prop_assert!(is_timeout_error);
            }
        }
    }
}
