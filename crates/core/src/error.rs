//! Error types for the bdagg pipeline.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the bdagg pipeline.
///
/// Every variant is fatal to a run. Row-level problems are reported through
/// the ingestion crate's `ParseError` and never surface here.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Raw byte source could not be read.
    #[error("Source error: {0}")]
    Source(String),

    /// Coin catalog could not be loaded.
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Exchange rate retrieval failed for a coin.
    #[error("Rate fetch error for {coin_id}: {message}")]
    RateFetch {
        /// Coin whose series could not be fetched.
        coin_id: String,
        /// Underlying failure.
        message: String,
    },

    /// Background task failed to complete.
    #[error("Task error: {0}")]
    Task(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a byte source error.
    pub fn source(msg: impl Into<String>) -> Self {
        Error::Source(msg.into())
    }

    /// Create a catalog error.
    pub fn catalog(msg: impl Into<String>) -> Self {
        Error::Catalog(msg.into())
    }

    /// Create a rate fetch error for a coin.
    pub fn rate_fetch(coin_id: impl Into<String>, msg: impl Into<String>) -> Self {
        Error::RateFetch {
            coin_id: coin_id.into(),
            message: msg.into(),
        }
    }

    /// Create a task error.
    pub fn task(msg: impl Into<String>) -> Self {
        Error::Task(msg.into())
    }

    /// Create a database error.
    pub fn database(msg: impl Into<String>) -> Self {
        Error::Database(msg.into())
    }
}
