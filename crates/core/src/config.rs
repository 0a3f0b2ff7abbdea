//! Configuration: parsing of `logflow.toml` / `logflow.yaml`.
//!
//! [`LogflowConfig`] holds one optional section per stage. A stage process
//! only reads its own section; starting a stage without it is an error. Fields
//! marked required below have no serde default, so a section missing one of
//! them is rejected when the file is parsed rather than at first use.
//!
//! # Precedence
//! 1. CLI flags (applied by the binaries)
//! 2. Environment variables (`LOGFLOW_STORAGE_ROTATION_SIZE_MB=10`)
//! 3. Config file
//! 4. Defaults
//!
//! # Example
//! ```no_run
//! # async fn example() -> Result<(), logflow_core::error::LogflowError> {
//! use logflow_core::config::LogflowConfig;
//!
//! let config = LogflowConfig::load("logflow.toml").await?;
//! let collector = config.collector()?;
//! println!("tailing {}", collector.source_file.display());
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, LogflowError};
use crate::types::ParserFormat;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogflowConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collector: Option<CollectorConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parser: Option<ParserConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<QueryConfig>,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl LogflowConfig {
    /// Reads the file, applies environment overrides and validates.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LogflowError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses the file without environment overrides.
    ///
    /// `.yml`/`.yaml` files are parsed as YAML, everything else as TOML.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LogflowError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LogflowError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                LogflowError::Io(e)
            }
        })?;

        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml")
            });

        let config = if is_yaml {
            Self::parse_yaml(&content)?
        } else {
            Self::parse(&content)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML document.
    pub fn parse(toml_str: &str) -> Result<Self, LogflowError> {
        toml::from_str(toml_str).map_err(|e| {
            LogflowError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// Parses a YAML document.
    pub fn parse_yaml(yaml_str: &str) -> Result<Self, LogflowError> {
        if yaml_str.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml_str).map_err(|e| {
            LogflowError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    pub fn collector(&self) -> Result<&CollectorConfig, ConfigError> {
        self.collector.as_ref().ok_or_else(|| missing("collector"))
    }

    pub fn parser(&self) -> Result<&ParserConfig, ConfigError> {
        self.parser.as_ref().ok_or_else(|| missing("parser"))
    }

    pub fn storage(&self) -> Result<&StorageConfig, ConfigError> {
        self.storage.as_ref().ok_or_else(|| missing("storage"))
    }

    pub fn query(&self) -> Result<&QueryConfig, ConfigError> {
        self.query.as_ref().ok_or_else(|| missing("query"))
    }

    /// Applies `LOGFLOW_{SECTION}_{FIELD}` environment overrides.
    ///
    /// Stage overrides only apply to sections present in the file; an
    /// environment variable cannot conjure a section with required paths.
    pub fn apply_env_overrides(&mut self) {
        override_string(&mut self.general.log_level, "LOGFLOW_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "LOGFLOW_GENERAL_LOG_FORMAT");

        if let Some(collector) = self.collector.as_mut() {
            override_parse(
                &mut collector.poll_interval,
                "LOGFLOW_COLLECTOR_POLL_INTERVAL",
            );
            override_parse(&mut collector.batch_size, "LOGFLOW_COLLECTOR_BATCH_SIZE");
        }

        if let Some(parser) = self.parser.as_mut() {
            override_parse(&mut parser.poll_interval, "LOGFLOW_PARSER_POLL_INTERVAL");
            override_parse(&mut parser.format, "LOGFLOW_PARSER_FORMAT");
        }

        if let Some(storage) = self.storage.as_mut() {
            override_parse(&mut storage.poll_interval, "LOGFLOW_STORAGE_POLL_INTERVAL");
            override_parse(
                &mut storage.rotation_size_mb,
                "LOGFLOW_STORAGE_ROTATION_SIZE_MB",
            );
            override_parse(&mut storage.rotation_hours, "LOGFLOW_STORAGE_ROTATION_HOURS");
            override_parse(
                &mut storage.compression_enabled,
                "LOGFLOW_STORAGE_COMPRESSION_ENABLED",
            );
        }

        if let Some(query) = self.query.as_mut() {
            override_path(&mut query.storage_dir, "LOGFLOW_QUERY_STORAGE_DIR");
            override_parse(&mut query.default_limit, "LOGFLOW_QUERY_DEFAULT_LIMIT");
        }

        override_parse(&mut self.metrics.enabled, "LOGFLOW_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "LOGFLOW_METRICS_LISTEN_ADDR");
        override_parse(&mut self.metrics.port, "LOGFLOW_METRICS_PORT");
    }

    /// Checks value ranges. Regex validity is checked when a stage compiles
    /// its filters.
    pub fn validate(&self) -> Result<(), LogflowError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        if let Some(collector) = &self.collector {
            validate_seconds("collector.poll_interval", collector.poll_interval)?;
            if collector.batch_size == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "collector.batch_size".to_owned(),
                    reason: "must be greater than 0".to_owned(),
                }
                .into());
            }
        }

        if let Some(parser) = &self.parser {
            validate_seconds("parser.poll_interval", parser.poll_interval)?;
        }

        if let Some(storage) = &self.storage {
            validate_seconds("storage.poll_interval", storage.poll_interval)?;
            validate_positive("storage.rotation_size_mb", storage.rotation_size_mb)?;
            validate_positive("storage.rotation_hours", storage.rotation_hours)?;
            validate_seconds(
                "storage.rotation_hours",
                storage.rotation_hours * SECONDS_PER_HOUR,
            )?;
        }

        if let Some(query) = &self.query {
            if query.default_limit == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "query.default_limit".to_owned(),
                    reason: "must be greater than 0".to_owned(),
                }
                .into());
            }
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "metrics.port".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        Ok(())
    }
}

fn missing(section: &str) -> ConfigError {
    ConfigError::MissingSection {
        section: section.to_owned(),
    }
}

fn validate_positive(field: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::InvalidValue {
            field: field.to_owned(),
            reason: format!("must be a positive number, got {value}"),
        });
    }
    Ok(())
}

/// `value` must be positive and representable as a [`Duration`].
fn validate_seconds(field: &str, value: f64) -> Result<(), ConfigError> {
    validate_positive(field, value)?;
    if Duration::try_from_secs_f64(value).is_err() {
        return Err(ConfigError::InvalidValue {
            field: field.to_owned(),
            reason: format!("{value} seconds is out of range"),
        });
    }
    Ok(())
}

/// Converts validated seconds; out-of-range values saturate.
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
}

/// Global settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// trace, debug, info, warn, error
    pub log_level: String,
    /// json, pretty
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// Include or exclude on match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterAction {
    Include,
    Exclude,
}

/// Raw-line filter rule, applied by the collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFilterConfig {
    pub pattern: String,
    pub action: FilterAction,
}

/// Entry filter rule, applied by the parser to one structured field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryFilterConfig {
    pub field: String,
    pub pattern: String,
    pub action: FilterAction,
}

fn default_poll_interval() -> f64 {
    2.0
}

const SECONDS_PER_HOUR: f64 = 3600.0;

fn default_batch_size() -> usize {
    100
}

fn default_rotation_size_mb() -> f64 {
    5.0
}

fn default_rotation_hours() -> f64 {
    24.0
}

fn default_true() -> bool {
    true
}

fn default_query_limit() -> usize {
    50
}

/// `[collector]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// File to tail (required)
    pub source_file: PathBuf,
    /// Directory batch files are published to (required)
    pub output_dir: PathBuf,
    /// Offset state file (required)
    pub state_file: PathBuf,
    /// Seconds between polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval: f64,
    /// Maximum lines per batch file
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Raw-line rules, first match wins
    #[serde(default)]
    pub filters: Vec<RawFilterConfig>,
}

impl CollectorConfig {
    pub fn poll_interval(&self) -> Duration {
        seconds(self.poll_interval)
    }
}

/// `[parser]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Collector output directory (required)
    pub input_dir: PathBuf,
    /// Directory parsed files are published to (required)
    pub output_dir: PathBuf,
    /// Cursor state file (required)
    pub state_file: PathBuf,
    #[serde(default = "default_poll_interval")]
    pub poll_interval: f64,
    /// Entry rules, first match wins
    #[serde(default)]
    pub filters: Vec<EntryFilterConfig>,
    /// Line decoder selection
    #[serde(default)]
    pub format: ParserFormat,
}

impl ParserConfig {
    pub fn poll_interval(&self) -> Duration {
        seconds(self.poll_interval)
    }
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Parser output directory (required)
    pub input_dir: PathBuf,
    /// Segment directory (required)
    pub storage_dir: PathBuf,
    /// Rotation state file (required)
    pub state_file: PathBuf,
    #[serde(default = "default_poll_interval")]
    pub poll_interval: f64,
    /// Rotate once the active segment reaches this many MiB
    #[serde(default = "default_rotation_size_mb")]
    pub rotation_size_mb: f64,
    /// Rotate once the active segment is this many hours old
    #[serde(default = "default_rotation_hours")]
    pub rotation_hours: f64,
    /// Gzip closed segments
    #[serde(default = "default_true")]
    pub compression_enabled: bool,
}

impl StorageConfig {
    pub fn poll_interval(&self) -> Duration {
        seconds(self.poll_interval)
    }

    /// Size threshold in bytes.
    pub fn rotation_size_bytes(&self) -> u64 {
        (self.rotation_size_mb * 1024.0 * 1024.0) as u64
    }

    /// Age threshold.
    pub fn rotation_age(&self) -> Duration {
        seconds(self.rotation_hours * SECONDS_PER_HOUR)
    }
}

/// `[query]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Segment directory to read (required)
    pub storage_dir: PathBuf,
    /// Result limit when a request gives none
    #[serde(default = "default_query_limit")]
    pub default_limit: usize,
}

/// `[metrics]` section: Prometheus exporter for stage daemons.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub listen_addr: String,
    pub port: u16,
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- env override helpers ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_path(target: &mut PathBuf, env_key: &str) {
    if let Some(val) = std::env::var_os(env_key) {
        *target = PathBuf::from(val);
    }
}

fn override_parse<T: FromStr>(target: &mut T, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                expected = std::any::type_name::<T>(),
                "failed to parse env var, ignoring"
            ),
        }
    }
}
