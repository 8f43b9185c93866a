//! Command-line arguments.
//!
//! Every option can also come from a `SEQUENCE_*` environment variable.

use bdagg_core::config::{
    PipelineConfig, RatesConfig, StorageConfig, StorageKind, WarehouseConfig,
};
use bdagg_core::Config;
use clap::Parser;
use std::path::PathBuf;

/// Aggregate marketplace transactions into daily per-project volumes.
#[derive(Debug, Parser)]
#[command(name = "bdagg", author, version, about)]
pub struct Cli {
    /// Where the transaction export lives (local, gcs).
    #[arg(long, env = "SEQUENCE_STORAGE_TYPE", default_value = "local")]
    pub storage_type: StorageKind,

    /// Path of the export when reading from local storage.
    #[arg(long, env = "SEQUENCE_LOCAL_STORAGE_PATH")]
    pub local_path: Option<PathBuf>,

    /// Object store base URL.
    #[arg(
        long,
        env = "SEQUENCE_GOOGLE_CLOUD_STORAGE_URL",
        default_value = "https://storage.googleapis.com"
    )]
    pub object_store_url: String,

    /// Bucket holding the export.
    #[arg(long, env = "SEQUENCE_GCS_BUCKET", default_value = "")]
    pub bucket: String,

    /// Object name of the export.
    #[arg(long, env = "SEQUENCE_GCS_OBJECT", default_value = "")]
    pub object: String,

    /// OAuth2 access token for private objects.
    #[arg(long, env = "SEQUENCE_GCS_TOKEN", hide_env_values = true)]
    pub gcs_token: Option<String>,

    /// Time budget of the export download, in seconds.
    #[arg(long, default_value_t = 300)]
    pub download_timeout_secs: u64,

    /// Price API base URL.
    #[arg(
        long,
        env = "SEQUENCE_COINGECKO_API_URL",
        default_value = "https://api.coingecko.com/api/v3/"
    )]
    pub api_url: String,

    /// Price API key.
    #[arg(long, env = "SEQUENCE_COINGECKO_API_KEY", default_value = "", hide_env_values = true)]
    pub api_key: String,

    /// Coin catalog JSON file.
    #[arg(long, env = "SEQUENCE_COINS_FILE_PATH")]
    pub coins: PathBuf,

    /// Output currency code.
    #[arg(long, env = "SEQUENCE_DEFAULT_CURRENCY", default_value = "usd")]
    pub currency: String,

    /// DuckDB database file.
    #[arg(long, env = "SEQUENCE_DB_PATH", default_value = "bdagg.duckdb")]
    pub db_path: PathBuf,

    /// Table receiving the aggregates.
    #[arg(long, default_value = "aggregation")]
    pub table: String,

    /// Row parser workers.
    #[arg(long, default_value_t = 4)]
    pub parser_workers: usize,

    /// Aggregation shards.
    #[arg(long, default_value_t = 4)]
    pub aggregation_workers: usize,

    /// Capacity of the row and event queues.
    #[arg(long, default_value_t = 100)]
    pub queue_capacity: usize,

    /// Retries per rate request.
    #[arg(long, default_value_t = 4)]
    pub max_retries: u32,

    /// Time budget of one coin's rate fetch, in seconds.
    #[arg(long, default_value_t = 60)]
    pub fetch_timeout_secs: u64,
}

impl Cli {
    pub fn into_config(self) -> Config {
        let rates_defaults = RatesConfig::default();
        Config {
            pipeline: PipelineConfig {
                parser_workers: self.parser_workers,
                aggregation_workers: self.aggregation_workers,
                row_queue_capacity: self.queue_capacity,
                event_queue_capacity: self.queue_capacity,
                output_currency: self.currency.to_ascii_lowercase(),
            },
            rates: RatesConfig {
                api_url: self.api_url,
                api_key: self.api_key,
                max_retries: self.max_retries,
                fetch_timeout_ms: self.fetch_timeout_secs.saturating_mul(1000),
                ..rates_defaults
            },
            storage: StorageConfig {
                kind: self.storage_type,
                local_path: self.local_path.unwrap_or_default(),
                object_store_url: self.object_store_url,
                bucket: self.bucket,
                object: self.object,
                auth_token: self.gcs_token,
                download_timeout_ms: self.download_timeout_secs.saturating_mul(1000),
            },
            warehouse: WarehouseConfig {
                db_path: self.db_path,
                table: self.table,
            },
            coin_list_path: self.coins,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_build_config() {
        let cli = Cli::try_parse_from([
            "bdagg",
            "--storage-type",
            "local",
            "--local-path",
            "events.csv",
            "--coins",
            "coins.json",
            "--currency",
            "EUR",
            "--parser-workers",
            "8",
            "--queue-capacity",
            "16",
            "--fetch-timeout-secs",
            "5",
        ])
        .unwrap();

        let config = cli.into_config();

        assert_eq!(config.storage.kind, StorageKind::Local);
        assert_eq!(config.storage.local_path, PathBuf::from("events.csv"));
        assert_eq!(config.coin_list_path, PathBuf::from("coins.json"));
        assert_eq!(config.pipeline.output_currency, "eur");
        assert_eq!(config.pipeline.parser_workers, 8);
        assert_eq!(config.pipeline.row_queue_capacity, 16);
        assert_eq!(config.pipeline.event_queue_capacity, 16);
        assert_eq!(config.rates.fetch_timeout_ms, 5000);
        assert_eq!(config.warehouse.table, "aggregation");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_gcs_storage_kind() {
        let cli = Cli::try_parse_from([
            "bdagg",
            "--storage-type",
            "GCS",
            "--bucket",
            "exports",
            "--object",
            "events.csv",
            "--coins",
            "coins.json",
        ])
        .unwrap();

        let config = cli.into_config();

        assert_eq!(config.storage.kind, StorageKind::Gcs);
        assert_eq!(config.storage.auth_token, None);
        assert_eq!(config.storage.download_timeout_ms, 300_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_gcs_token_and_download_timeout() {
        let cli = Cli::try_parse_from([
            "bdagg",
            "--storage-type",
            "gcs",
            "--bucket",
            "exports",
            "--object",
            "events.csv",
            "--gcs-token",
            "ya29.token",
            "--download-timeout-secs",
            "30",
            "--coins",
            "coins.json",
        ])
        .unwrap();

        let config = cli.into_config();

        assert_eq!(config.storage.auth_token.as_deref(), Some("ya29.token"));
        assert_eq!(config.storage.download_timeout_ms, 30_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_storage_kind_rejected() {
        let result = Cli::try_parse_from([
            "bdagg",
            "--storage-type",
            "s3",
            "--coins",
            "coins.json",
        ]);
        assert!(result.is_err());
    }
}
