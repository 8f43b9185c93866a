//! CoinGecko `market_chart/range` rate source.

use crate::http::{
    BoxFuture, HttpClient, HttpErrorKind, HttpRequest, HttpResponse, ReqwestHttpClient,
};
use crate::retry::RetryPolicy;
use crate::source::{RateRequest, RateSource, RateSourceError};
use bdagg_core::config::RatesConfig;
use bdagg_core::RateSeries;
use reqwest::Url;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

/// Response body of `coins/{id}/market_chart/range`.
#[derive(Debug, Deserialize)]
struct MarketChart {
    #[serde(default)]
    prices: Vec<(serde_json::Number, serde_json::Number)>,
}

/// CoinGecko-backed rate source.
pub struct CoinGeckoSource<C: HttpClient = ReqwestHttpClient> {
    client: Arc<C>,
    api_url: String,
    api_key: String,
    request_timeout_ms: u64,
    retry: RetryPolicy,
}

impl CoinGeckoSource<ReqwestHttpClient> {
    /// Create a source using the reqwest transport.
    pub fn new(config: &RatesConfig) -> Self {
        Self::with_client(config, Arc::new(ReqwestHttpClient::new()))
    }
}

impl<C: HttpClient> CoinGeckoSource<C> {
    /// Create a source over an arbitrary transport.
    pub fn with_client(config: &RatesConfig, client: Arc<C>) -> Self {
        Self {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            request_timeout_ms: config.request_timeout_ms,
            retry: RetryPolicy::from(config),
        }
    }

    fn build_request(&self, request: &RateRequest) -> Result<HttpRequest, RateSourceError> {
        let mut url = Url::parse(&self.api_url)
            .map_err(|e| RateSourceError::Other(format!("invalid rate api url {}: {e}", self.api_url)))?;
        url.path_segments_mut()
            .map_err(|()| RateSourceError::Other(format!("rate api url cannot be a base: {}", self.api_url)))?
            .pop_if_empty()
            .extend(["coins", request.coin_id.as_str(), "market_chart", "range"]);
        url.query_pairs_mut()
            .append_pair("vs_currency", &request.target_currency)
            .append_pair("from", &request.from.to_string())
            .append_pair("to", &request.to.to_string())
            .append_pair("precision", "full");

        Ok(HttpRequest::get(url.as_str())
            .with_header("accept", "application/json")
            .with_header("x-cg-demo-api-key", self.api_key.as_str())
            .with_timeout_ms(self.request_timeout_ms))
    }

    async fn execute_with_retry(
        &self,
        http_request: HttpRequest,
        coin_id: &str,
    ) -> Result<HttpResponse, RateSourceError> {
        let mut attempt = 0;
        loop {
            let outcome = self.client.execute(http_request.clone()).await;
            let retryable = match &outcome {
                Ok(response) => !response.is_success() && RetryPolicy::is_transient(response.status),
                Err(e) => matches!(e.kind(), HttpErrorKind::Timeout | HttpErrorKind::Connect),
            };

            if !retryable || !self.retry.allows(attempt) {
                return match outcome {
                    Ok(response) if response.is_success() => Ok(response),
                    Ok(response) => Err(RateSourceError::Status {
                        status: response.status,
                        body: response.body,
                    }),
                    Err(e) => Err(RateSourceError::Http(e)),
                };
            }

            let delay = self.retry.delay(attempt);
            warn!(coin_id, attempt = attempt + 1, delay_ms = delay.as_millis() as u64, "retrying rate request");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn fetch_series(&self, request: RateRequest) -> Result<RateSeries, RateSourceError> {
        let http_request = self.build_request(&request)?;
        let response = self.execute_with_retry(http_request, &request.coin_id).await?;
        let series = parse_market_chart(&response.body)?;
        debug!(
            coin_id = %request.coin_id,
            currency = %request.target_currency,
            from = request.from,
            to = request.to,
            points = series.len(),
            "fetched exchange rates"
        );
        Ok(series)
    }
}

impl<C: HttpClient + 'static> RateSource for CoinGeckoSource<C> {
    fn fetch(&self, request: RateRequest) -> BoxFuture<'_, Result<RateSeries, RateSourceError>> {
        Box::pin(self.fetch_series(request))
    }
}

/// Parse a `market_chart` body into epoch seconds → rate.
///
/// CoinGecko timestamps are in milliseconds.
pub fn parse_market_chart(body: &str) -> Result<RateSeries, RateSourceError> {
    let chart: MarketChart =
        serde_json::from_str(body).map_err(|e| RateSourceError::Payload(e.to_string()))?;

    let mut series = RateSeries::with_capacity(chart.prices.len());
    for (ts, price) in chart.prices {
        let ts_ms = ts
            .as_i64()
            .or_else(|| ts.as_f64().map(|f| f as i64))
            .ok_or_else(|| RateSourceError::Payload(format!("invalid timestamp: {ts}")))?;
        series.insert(ts_ms.div_euclid(1000), decimal_from_number(&price)?);
    }
    Ok(series)
}

fn decimal_from_number(number: &serde_json::Number) -> Result<Decimal, RateSourceError> {
    let text = number.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|e| RateSourceError::Payload(format!("invalid price {text}: {e}")))
}
