//! Configuration structures for the bdagg pipeline.
//!
//! Every component receives the section it needs through its constructor;
//! nothing below reads the process environment.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for a pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Transform pipeline configuration.
    pub pipeline: PipelineConfig,
    /// Exchange rate source configuration.
    pub rates: RatesConfig,
    /// Raw byte source configuration.
    pub storage: StorageConfig,
    /// Analytical store configuration.
    pub warehouse: WarehouseConfig,
    /// Path to the coin catalog JSON file.
    pub coin_list_path: PathBuf,
}

impl Config {
    /// Check the configuration for values that would make a run meaningless.
    pub fn validate(&self) -> Result<()> {
        self.pipeline.validate()?;
        self.rates.validate()?;
        self.storage.validate()?;
        self.warehouse.validate()?;
        if self.coin_list_path.as_os_str().is_empty() {
            return Err(Error::config("coin list path is not set"));
        }
        Ok(())
    }
}

/// Transform pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of row parser workers.
    pub parser_workers: usize,
    /// Number of aggregation shards.
    pub aggregation_workers: usize,
    /// Capacity of the raw row queue.
    pub row_queue_capacity: usize,
    /// Capacity of the parsed event queue.
    pub event_queue_capacity: usize,
    /// Output currency code (e.g., "usd").
    pub output_currency: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            parser_workers: 4,
            aggregation_workers: 4,
            row_queue_capacity: 100,
            event_queue_capacity: 100,
            output_currency: "usd".to_string(),
        }
    }
}

impl PipelineConfig {
    fn validate(&self) -> Result<()> {
        if self.parser_workers == 0 || self.aggregation_workers == 0 {
            return Err(Error::config("worker counts must be at least 1"));
        }
        if self.row_queue_capacity == 0 || self.event_queue_capacity == 0 {
            return Err(Error::config("queue capacities must be at least 1"));
        }
        if self.output_currency.trim().is_empty() {
            return Err(Error::config("output currency is empty"));
        }
        Ok(())
    }
}

/// Exchange rate source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatesConfig {
    /// Base URL of the price API, ending with `/`.
    pub api_url: String,
    /// API key sent with every request.
    pub api_key: String,
    /// Timeout of a single HTTP request (ms).
    pub request_timeout_ms: u64,
    /// Retries after the first failed HTTP attempt.
    pub max_retries: u32,
    /// Wait before the first retry; doubles per retry (ms).
    pub retry_base_delay_ms: u64,
    /// Upper bound of a single retry wait (ms).
    pub retry_max_delay_ms: u64,
    /// Upper bound for the whole fetch of one coin, retries included (ms).
    pub fetch_timeout_ms: u64,
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.coingecko.com/api/v3/".to_string(),
            api_key: String::new(),
            request_timeout_ms: 10_000,
            max_retries: 4,
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 8_000,
            fetch_timeout_ms: 60_000,
        }
    }
}

impl RatesConfig {
    fn validate(&self) -> Result<()> {
        if !self.api_url.ends_with('/') {
            return Err(Error::config(format!(
                "rate API url must end with '/': {}",
                self.api_url
            )));
        }
        if self.request_timeout_ms == 0 || self.fetch_timeout_ms == 0 {
            return Err(Error::config("rate timeouts must be positive"));
        }
        if self.retry_base_delay_ms > self.retry_max_delay_ms {
            return Err(Error::config("retry base delay exceeds max delay"));
        }
        Ok(())
    }
}

/// Where the raw CSV bytes come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// File on the local filesystem.
    Local,
    /// Object in a Google Cloud Storage compatible bucket. Without
    /// `StorageConfig::auth_token` only publicly readable objects can be
    /// downloaded.
    Gcs,
}

impl std::str::FromStr for StorageKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(StorageKind::Local),
            "gcs" => Ok(StorageKind::Gcs),
            other => Err(Error::config(format!("unknown storage type: {other}"))),
        }
    }
}

/// Raw byte source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Source kind.
    pub kind: StorageKind,
    /// Path used by the local source.
    pub local_path: PathBuf,
    /// Base URL of the object store.
    pub object_store_url: String,
    /// Bucket name.
    pub bucket: String,
    /// Object name inside the bucket.
    pub object: String,
    /// OAuth2 access token sent as `Authorization: Bearer`; `None` for
    /// public objects.
    #[serde(default, skip_serializing)]
    pub auth_token: Option<String>,
    /// Timeout of the object download (ms).
    pub download_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: StorageKind::Local,
            local_path: PathBuf::new(),
            object_store_url: "https://storage.googleapis.com".to_string(),
            bucket: String::new(),
            object: String::new(),
            auth_token: None,
            download_timeout_ms: 300_000,
        }
    }
}

impl StorageConfig {
    fn validate(&self) -> Result<()> {
        match self.kind {
            StorageKind::Local if self.local_path.as_os_str().is_empty() => {
                Err(Error::config("local storage path is not set"))
            }
            StorageKind::Gcs if self.bucket.is_empty() || self.object.is_empty() => {
                Err(Error::config("gcs bucket and object must be set"))
            }
            StorageKind::Gcs if self.download_timeout_ms == 0 => {
                Err(Error::config("download timeout must be positive"))
            }
            _ => Ok(()),
        }
    }
}

/// Analytical store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseConfig {
    /// DuckDB database file.
    pub db_path: PathBuf,
    /// Table receiving the aggregates.
    pub table: String,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("bdagg.duckdb"),
            table: "aggregation".to_string(),
        }
    }
}

impl WarehouseConfig {
    fn validate(&self) -> Result<()> {
        if !is_valid_identifier(&self.table) {
            return Err(Error::config(format!("invalid table name: {}", self.table)));
        }
        Ok(())
    }
}

/// A SQL identifier made of ASCII letters, digits and underscores, not starting
/// with a digit.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
