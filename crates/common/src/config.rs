use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use validator::Validate;

// Default constants
pub const DEFAULT_SOURCE_NAME: &str = "tally";
pub const DEFAULT_SOURCE_TYPE: &str = "fixture";
pub const DEFAULT_POOL_SIZE: usize = 5;
pub const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_EXECUTION_TIMEOUT_MS: u64 = 60_000;

pub const DEFAULT_LIMIT: usize = 1000;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY_MS: u64 = 200;
pub const DEFAULT_MAX_DELAY_MS: u64 = 5_000;

pub const DEFAULT_CACHE_MAX_ENTRIES: u64 = 10_000;
pub const DEFAULT_CACHE_MAX_ROWS: usize = 50_000;
pub const DEFAULT_COMPANY_TTL_SECS: u64 = 3_600;
pub const DEFAULT_LEDGER_TTL_SECS: u64 = 300;
pub const DEFAULT_STOCK_ITEM_TTL_SECS: u64 = 300;
pub const DEFAULT_VOUCHER_TTL_SECS: u64 = 60;

pub const DEFAULT_LOG_LEVEL: &str = "info";

pub const SUPPORTED_SOURCE_TYPES: &[&str] = &["fixture", "gateway"];

fn serialize_secret<S>(secret: &Option<SecretString>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match secret {
        Some(_) => serializer.serialize_str("[REDACTED]"),
        None => serializer.serialize_none(),
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    Ok(s.map(SecretString::from))
}

#[derive(Debug, Deserialize, Serialize, Default, Clone, Validate)]
pub struct AppConfig {
    #[serde(default)]
    #[validate(nested)]
    pub source: SourceSettings,
    #[serde(default)]
    #[validate(nested)]
    pub pool: PoolSettings,
    #[serde(default)]
    #[validate(nested)]
    pub execution: ExecutionSettings,
    #[serde(default)]
    #[validate(nested)]
    pub retry: RetrySettings,
    #[serde(default)]
    #[validate(nested)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the external accounting engine lives.
#[derive(Debug, Deserialize, Serialize, Clone, Validate)]
pub struct SourceSettings {
    #[serde(default = "default_source_name")]
    #[validate(length(min = 1))]
    pub name: String,

    #[serde(rename = "type", default = "default_source_type")]
    #[validate(custom(function = "validate_source_type"))]
    pub source_type: String,

    /// Base URL of the ODBC gateway (gateway sources only)
    #[serde(default)]
    #[validate(url)]
    pub url: Option<String>,

    /// YAML/JSON file with fixture tables (fixture sources only)
    #[serde(default)]
    pub fixture_path: Option<String>,

    /// Company loaded in the accounting engine that queries target by default
    #[serde(default)]
    pub company: Option<String>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_secret",
        deserialize_with = "deserialize_secret"
    )]
    pub password: Option<SecretString>,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            name: default_source_name(),
            source_type: default_source_type(),
            url: None,
            fixture_path: None,
            company: None,
            username: None,
            password: None,
        }
    }
}

fn default_source_name() -> String {
    DEFAULT_SOURCE_NAME.to_string()
}

fn default_source_type() -> String {
    DEFAULT_SOURCE_TYPE.to_string()
}

fn validate_source_type(source_type: &str) -> Result<(), validator::ValidationError> {
    if SUPPORTED_SOURCE_TYPES.contains(&source_type) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("unsupported_source_type"))
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Validate)]
pub struct PoolSettings {
    #[serde(default = "default_pool_size")]
    #[validate(range(min = 1, max = 64))]
    pub max_size: usize,

    #[serde(default = "default_acquire_timeout_ms")]
    #[validate(range(min = 1))]
    pub acquire_timeout_ms: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_size: default_pool_size(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
        }
    }
}

fn default_pool_size() -> usize {
    DEFAULT_POOL_SIZE
}

fn default_acquire_timeout_ms() -> u64 {
    DEFAULT_ACQUIRE_TIMEOUT_MS
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Validate)]
pub struct ExecutionSettings {
    #[serde(default = "default_execution_timeout_ms")]
    #[validate(range(min = 1))]
    pub timeout_ms: u64,

    /// Applied when a request carries no limit. Must stay under the whitelist ceiling.
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 5000))]
    pub default_limit: usize,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_execution_timeout_ms(),
            default_limit: default_limit(),
        }
    }
}

fn default_execution_timeout_ms() -> u64 {
    DEFAULT_EXECUTION_TIMEOUT_MS
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Validate)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    #[validate(range(min = 1, max = 10))]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}
fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}
fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}

#[derive(Debug, Deserialize, Serialize, Clone, Validate)]
pub struct CacheSettings {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    #[serde(default = "default_cache_max_entries")]
    #[validate(range(min = 1))]
    pub max_entries: u64,

    /// Result sets larger than this are served but never stored.
    #[serde(default = "default_cache_max_rows")]
    pub max_rows_per_entry: usize,

    #[serde(default)]
    pub ttl: EntityTtls,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            max_entries: default_cache_max_entries(),
            max_rows_per_entry: default_cache_max_rows(),
            ttl: EntityTtls::default(),
        }
    }
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_max_entries() -> u64 {
    DEFAULT_CACHE_MAX_ENTRIES
}

fn default_cache_max_rows() -> usize {
    DEFAULT_CACHE_MAX_ROWS
}

/// Staleness tolerance per entity, in seconds.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct EntityTtls {
    #[serde(default = "default_company_ttl")]
    pub company_secs: u64,
    #[serde(default = "default_ledger_ttl")]
    pub ledger_secs: u64,
    #[serde(default = "default_stock_item_ttl")]
    pub stock_item_secs: u64,
    #[serde(default = "default_voucher_ttl")]
    pub voucher_secs: u64,
}

impl Default for EntityTtls {
    fn default() -> Self {
        Self {
            company_secs: default_company_ttl(),
            ledger_secs: default_ledger_ttl(),
            stock_item_secs: default_stock_item_ttl(),
            voucher_secs: default_voucher_ttl(),
        }
    }
}

fn default_company_ttl() -> u64 {
    DEFAULT_COMPANY_TTL_SECS
}
fn default_ledger_ttl() -> u64 {
    DEFAULT_LEDGER_TTL_SECS
}
fn default_stock_item_ttl() -> u64 {
    DEFAULT_STOCK_ITEM_TTL_SECS
}
fn default_voucher_ttl() -> u64 {
    DEFAULT_VOUCHER_TTL_SECS
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl AppConfig {
    /// Load from an optional YAML file, then apply `TALLYGATE_*` environment overrides.
    ///
    /// `TALLYGATE_POOL__MAX_SIZE=8` maps to `pool.max_size`, and so on.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let builder = config::Config::builder();

        let builder = match path {
            Some(p) if std::path::Path::new(p).exists() => {
                builder.add_source(config::File::with_name(p))
            }
            Some(p) => anyhow::bail!("Configuration file not found: {}", p),
            None => builder,
        };

        let builder = builder.add_source(
            config::Environment::with_prefix("TALLYGATE")
                .separator("__")
                .try_parsing(true),
        );

        let cfg = builder.build().context("Failed to build configuration")?;

        let app_config: AppConfig = cfg
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        app_config
            .validate()
            .map_err(|e| anyhow::anyhow!("Configuration validation failed: {}", e))?;

        Ok(app_config)
    }
}
