//! Rate source capability.

use crate::http::{BoxFuture, HttpError};
use bdagg_core::{RateSeries, TimestampSecs};
use std::time::Duration;
use thiserror::Error;

/// Historical rate query for one coin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateRequest {
    /// Coin to price.
    pub coin_id: String,
    /// Currency the rates are quoted in.
    pub target_currency: String,
    /// Start of the range (epoch seconds).
    pub from: TimestampSecs,
    /// End of the range (epoch seconds).
    pub to: TimestampSecs,
}

impl RateRequest {
    pub fn new(
        coin_id: impl Into<String>,
        target_currency: impl Into<String>,
        from: TimestampSecs,
        to: TimestampSecs,
    ) -> Self {
        Self {
            coin_id: coin_id.into(),
            target_currency: target_currency.into(),
            from,
            to,
        }
    }
}

/// Failure of a single coin's rate retrieval.
#[derive(Error, Debug)]
pub enum RateSourceError {
    /// Transport failure after retries.
    #[error("transport error: {0}")]
    Http(#[from] HttpError),

    /// Non-success HTTP status after retries.
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// Response could not be interpreted.
    #[error("invalid payload: {0}")]
    Payload(String),

    /// The whole fetch exceeded its time budget.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Source-specific failure.
    #[error("{0}")]
    Other(String),
}

/// Something that can produce a historical rate series for a coin.
///
/// Implementations must be shareable across tasks; the fetcher calls `fetch`
/// concurrently, once per coin.
pub trait RateSource: Send + Sync {
    fn fetch(&self, request: RateRequest) -> BoxFuture<'_, Result<RateSeries, RateSourceError>>;
}
