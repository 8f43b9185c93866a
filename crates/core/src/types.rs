//! Core data types for the bdagg pipeline.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Timestamp in seconds since Unix epoch (UTC).
pub type TimestampSecs = i64;

/// Format of the calendar day key.
pub const DAY_FORMAT: &str = "%Y-%m-%d";

/// One resolved marketplace transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Transaction time.
    pub ts: DateTime<Utc>,
    /// `ts` in epoch seconds; the join key for rate matching.
    pub ts_unix: TimestampSecs,
    /// Event kind tag (e.g., "BUY_ITEMS").
    pub kind: String,
    /// Project identifier.
    pub project_id: i64,
    /// Currency symbol as declared in the source row.
    pub currency_symbol: String,
    /// Resolved price-feed identity.
    pub coin_id: String,
    /// Chain the transaction happened on.
    pub chain_id: String,
    /// Transaction hash.
    pub txn_hash: String,
    /// Exchange rate into the output currency, zero until matched.
    pub exchange_rate: Decimal,
    /// Amount in the currency's native unit.
    pub amount: Decimal,
}

impl Event {
    /// Create an event with a zero exchange rate.
    pub fn new(
        ts: DateTime<Utc>,
        kind: impl Into<String>,
        project_id: i64,
        currency_symbol: impl Into<String>,
        coin_id: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        Self {
            ts,
            ts_unix: ts.timestamp(),
            kind: kind.into(),
            project_id,
            currency_symbol: currency_symbol.into(),
            coin_id: coin_id.into(),
            chain_id: String::new(),
            txn_hash: String::new(),
            exchange_rate: Decimal::ZERO,
            amount,
        }
    }

    /// Attach chain id and transaction hash.
    pub fn with_chain(mut self, chain_id: impl Into<String>, txn_hash: impl Into<String>) -> Self {
        self.chain_id = chain_id.into();
        self.txn_hash = txn_hash.into();
        self
    }

    /// UTC calendar day of the event, formatted `YYYY-MM-DD`.
    pub fn day(&self) -> String {
        self.ts.format(DAY_FORMAT).to_string()
    }
}

/// Observed time span of one coin within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyUsage {
    /// Earliest observed timestamp.
    pub from: TimestampSecs,
    /// Latest observed timestamp.
    pub to: TimestampSecs,
}

impl CurrencyUsage {
    /// Usage covering a single instant.
    pub fn at(ts: TimestampSecs) -> Self {
        Self { from: ts, to: ts }
    }

    /// Widen the span to include `ts`.
    #[inline]
    pub fn widen(&mut self, ts: TimestampSecs) {
        self.from = self.from.min(ts);
        self.to = self.to.max(ts);
    }
}

/// Coin ID to observed span.
pub type CurrencyUsageMap = HashMap<String, CurrencyUsage>;

/// Epoch seconds to rate, for one coin. Unordered.
pub type RateSeries = HashMap<TimestampSecs, Decimal>;

/// Coin ID to its fetched rate series.
pub type FetchedExchangeRates = HashMap<String, RateSeries>;

/// Daily totals for one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatePerProject {
    /// Calendar day, `YYYY-MM-DD`.
    pub day: String,
    /// Project identifier.
    pub project_id: i64,
    /// Number of contributing events.
    pub transaction_count: u64,
    /// Summed volume in the output currency, 2 fractional digits.
    pub total_volume: Decimal,
    /// Output currency code.
    pub currency: String,
}

/// One entry of the coin catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coin {
    /// Price-feed identity.
    pub id: String,
    /// Ticker symbol.
    pub symbol: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Platform name to contract address. Catalog files may carry nulls.
    #[serde(default)]
    pub platforms: HashMap<String, Option<String>>,
    /// Decimal places between the smallest denomination and a whole coin,
    /// when amounts for this coin arrive in the smallest denomination.
    #[serde(default)]
    pub decimals: Option<u32>,
}

impl Coin {
    /// Known contract addresses, skipping empty entries.
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.platforms
            .values()
            .filter_map(|a| a.as_deref())
            .filter(|a| !a.is_empty())
    }
}
