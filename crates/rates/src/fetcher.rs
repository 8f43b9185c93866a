//! Parallel per-coin rate retrieval.

use crate::source::{RateRequest, RateSource, RateSourceError};
use bdagg_core::config::RatesConfig;
use bdagg_core::{CurrencyUsageMap, Error, FetchedExchangeRates, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Fetcher configuration.
#[derive(Debug, Clone, Copy)]
pub struct FetchConfig {
    /// Time budget of one coin's fetch, retries included.
    pub fetch_timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self::from(&RatesConfig::default())
    }
}

impl From<&RatesConfig> for FetchConfig {
    fn from(config: &RatesConfig) -> Self {
        Self {
            fetch_timeout: Duration::from_millis(config.fetch_timeout_ms),
        }
    }
}

/// Retrieves one rate series per coin, one task per coin.
///
/// Fail-fast: the first failure aborts every other outstanding fetch and is
/// returned; nothing fetched so far is kept.
pub struct RateFetcher {
    source: Arc<dyn RateSource>,
    config: FetchConfig,
}

impl RateFetcher {
    pub fn new(source: Arc<dyn RateSource>, config: FetchConfig) -> Self {
        Self { source, config }
    }

    /// Fetch series for every coin in `usage`, quoted in `target_currency`.
    pub async fn fetch_all(
        &self,
        usage: &CurrencyUsageMap,
        target_currency: &str,
    ) -> Result<FetchedExchangeRates> {
        let mut tasks = JoinSet::new();
        for (coin_id, span) in usage {
            let source = Arc::clone(&self.source);
            let request = RateRequest::new(coin_id.as_str(), target_currency, span.from, span.to);
            let timeout = self.config.fetch_timeout;
            tasks.spawn(async move {
                let coin_id = request.coin_id.clone();
                let result = match tokio::time::timeout(timeout, source.fetch(request)).await {
                    Ok(result) => result,
                    Err(_) => Err(RateSourceError::Timeout(timeout)),
                };
                (coin_id, result)
            });
        }

        let mut rates = FetchedExchangeRates::with_capacity(usage.len());
        while let Some(joined) = tasks.join_next().await {
            let (coin_id, result) = match joined {
                Ok(done) => done,
                Err(e) => {
                    tasks.abort_all();
                    return Err(Error::task(format!("rate fetch task failed: {e}")));
                }
            };

            match result {
                Ok(series) => {
                    debug!(coin_id = %coin_id, points = series.len(), "rate series ready");
                    rates.insert(coin_id, series);
                }
                Err(e) => {
                    let pending = tasks.len();
                    tasks.abort_all();
                    warn!(coin_id = %coin_id, error = %e, cancelled = pending, "rate fetch failed");
                    return Err(Error::rate_fetch(coin_id, e.to_string()));
                }
            }
        }

        info!(coins = rates.len(), currency = target_currency, "fetched exchange rates");
        Ok(rates)
    }
}
