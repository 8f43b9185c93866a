//! Raw row parsing.
//!
//! Turns one positional CSV row into an [`Event`], resolving its currency and
//! recording the coin's usage span on success.

use crate::resolver::CurrencyResolver;
use crate::usage::UsageTracker;
use bdagg_core::Event;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Timestamp layout of the `ts` column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

const TS_FIELD: usize = 1;
const KIND_FIELD: usize = 2;
const PROJECT_FIELD: usize = 3;
const PROPS_FIELD: usize = 14;
const NUMS_FIELD: usize = 15;
const MIN_FIELDS: usize = NUMS_FIELD + 1;

/// Why a row was skipped. Never fatal to a run.
#[derive(Error, Debug)]
pub enum ParseError {
    /// Row is shorter than the layout requires.
    #[error("row has {len} fields, expected at least {expected}")]
    MissingField { len: usize, expected: usize },

    /// Bad `ts` column.
    #[error("invalid timestamp '{value}': {source}")]
    Timestamp {
        value: String,
        source: chrono::ParseError,
    },

    /// Bad `project_id` column.
    #[error("invalid project id '{value}': {source}")]
    ProjectId {
        value: String,
        source: std::num::ParseIntError,
    },

    /// Bad `props` document.
    #[error("invalid props JSON: {0}")]
    Props(#[source] serde_json::Error),

    /// Bad `nums` document.
    #[error("invalid nums JSON: {0}")]
    Nums(#[source] serde_json::Error),

    /// Bad decimal amount.
    #[error("invalid currency value '{value}': {source}")]
    Amount {
        value: String,
        source: rust_decimal::Error,
    },

    /// Currency not present in the catalog.
    #[error("no matching coin found for symbol '{symbol}' and address '{address}'")]
    UnresolvedCurrency { symbol: String, address: String },
}

/// Transaction metadata document (`props` column).
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Props {
    #[serde(default)]
    pub chain_id: String,
    #[serde(default)]
    pub txn_hash: String,
    #[serde(default)]
    pub currency_symbol: String,
    #[serde(default)]
    pub currency_address: String,
}

/// Amount document (`nums` column). The value stays a string until it is
/// parsed as a decimal.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nums {
    #[serde(default)]
    pub currency_value_decimal: String,
}

/// Parse a decimal in plain or scientific notation.
pub fn parse_decimal(value: &str) -> Result<Decimal, rust_decimal::Error> {
    let value = value.trim();
    Decimal::from_str(value).or_else(|err| {
        if value.contains(|c: char| c == 'e' || c == 'E') {
            Decimal::from_scientific(value)
        } else {
            Err(err)
        }
    })
}

/// Row parser shared by all workers of a pool.
#[derive(Debug, Clone)]
pub struct RowParser {
    resolver: Arc<CurrencyResolver>,
    usage: UsageTracker,
}

impl RowParser {
    /// Create a parser recording spans into `usage`.
    pub fn new(resolver: Arc<CurrencyResolver>, usage: UsageTracker) -> Self {
        Self { resolver, usage }
    }

    /// Usage tracker this parser writes to.
    pub fn usage(&self) -> &UsageTracker {
        &self.usage
    }

    /// Parse one row.
    ///
    /// On success the coin's usage span has already been widened to include
    /// the event's timestamp.
    pub fn parse_row(&self, row: &[String]) -> Result<Event, ParseError> {
        if row.len() < MIN_FIELDS {
            return Err(ParseError::MissingField {
                len: row.len(),
                expected: MIN_FIELDS,
            });
        }

        let ts_raw = row[TS_FIELD].as_str();
        let ts = NaiveDateTime::parse_from_str(ts_raw, TIMESTAMP_FORMAT)
            .map_err(|source| ParseError::Timestamp {
                value: ts_raw.to_string(),
                source,
            })?
            .and_utc();

        let project_raw = row[PROJECT_FIELD].trim();
        let project_id = project_raw
            .parse::<i64>()
            .map_err(|source| ParseError::ProjectId {
                value: project_raw.to_string(),
                source,
            })?;

        let props: Props = serde_json::from_str(&row[PROPS_FIELD]).map_err(ParseError::Props)?;
        let nums: Nums = serde_json::from_str(&row[NUMS_FIELD]).map_err(ParseError::Nums)?;

        let amount = parse_decimal(&nums.currency_value_decimal).map_err(|source| {
            ParseError::Amount {
                value: nums.currency_value_decimal.clone(),
                source,
            }
        })?;

        let coin_id = self.resolver.resolve(
            &props.currency_symbol,
            &props.currency_address,
            &props.chain_id,
        )?;

        let event = Event::new(
            ts,
            row[KIND_FIELD].as_str(),
            project_id,
            props.currency_symbol,
            coin_id,
            amount,
        )
        .with_chain(props.chain_id, props.txn_hash);

        self.usage.update(&event.coin_id, event.ts_unix);
        Ok(event)
    }
}

/// Sort events ascending by epoch seconds. Stable, so equal timestamps keep
/// their collection order.
pub fn sort_events_by_timestamp(events: &mut [Event]) {
    events.sort_by_key(|e| e.ts_unix);
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use bdagg_core::{Coin, CurrencyUsage};
    use chrono::{Duration, TimeZone, Utc};
    use std::collections::HashMap;

    pub(crate) const SFL_ADDRESS: &str = "0xd1f9c58e33933a993a3891f8acfe05a68e1afc05";

    pub(crate) fn sfl_catalog() -> Vec<Coin> {
        vec![Coin {
            id: "sunflower-land".to_string(),
            symbol: "SFL".to_string(),
            name: "Sunflower Land".to_string(),
            platforms: HashMap::from([("polygon-pos".to_string(), Some(SFL_ADDRESS.to_string()))]),
            decimals: None,
        }]
    }

    /// Build a 16-field row with the given columns filled in.
    pub(crate) fn make_row(ts: &str, project: &str, symbol: &str, address: &str, value: &str) -> Vec<String> {
        let mut row = vec![String::new(); 16];
        row[0] = "seq-market".to_string();
        row[1] = ts.to_string();
        row[2] = "BUY_ITEMS".to_string();
        row[3] = project.to_string();
        row[14] = format!(
            r#"{{"chainId":"137","txnHash":"0xd919","currencySymbol":"{symbol}","currencyAddress":"{address}","marketplaceType":"amm"}}"#
        );
        row[15] = format!(r#"{{"currencyValueDecimal":"{value}","currencyValueRaw":"0"}}"#);
        row
    }

    fn parser() -> RowParser {
        RowParser::new(Arc::new(CurrencyResolver::new(&sfl_catalog())), UsageTracker::new())
    }

    #[test]
    fn test_parse_valid_row() {
        let parser = parser();
        let row = make_row("2024-04-15 02:15:07.167", "4974", "SFL", SFL_ADDRESS, "0.6136203411678249");

        let event = parser.parse_row(&row).unwrap();

        assert_eq!(event.project_id, 4974);
        assert_eq!(event.kind, "BUY_ITEMS");
        assert_eq!(event.currency_symbol, "SFL");
        assert_eq!(event.coin_id, "sunflower-land");
        assert_eq!(event.chain_id, "137");
        assert_eq!(event.txn_hash, "0xd919");
        assert_eq!(event.amount, Decimal::from_str("0.6136203411678249").unwrap());
        assert_eq!(event.exchange_rate, Decimal::ZERO);
        let expected_ts = Utc.with_ymd_and_hms(2024, 4, 15, 2, 15, 7).unwrap() + Duration::milliseconds(167);
        assert_eq!(event.ts, expected_ts);
        assert_eq!(event.ts_unix, 1713147307);
    }

    #[test]
    fn test_success_records_usage() {
        let parser = parser();
        parser
            .parse_row(&make_row("2024-04-15 02:26:37.134", "1", "SFL", SFL_ADDRESS, "2"))
            .unwrap();
        parser
            .parse_row(&make_row("2024-04-15 02:15:07.167", "1", "SFL", SFL_ADDRESS, "1"))
            .unwrap();

        assert_eq!(
            parser.usage().get("sunflower-land"),
            Some(CurrencyUsage { from: 1713147307, to: 1713147997 })
        );
    }

    #[test]
    fn test_bad_timestamp() {
        let row = make_row("2024-04-15T02:15:07Z", "1", "SFL", SFL_ADDRESS, "1");
        assert!(matches!(parser().parse_row(&row), Err(ParseError::Timestamp { .. })));
    }

    #[test]
    fn test_bad_project_id() {
        let row = make_row("2024-04-15 02:15:07.167", "abc", "SFL", SFL_ADDRESS, "1");
        assert!(matches!(parser().parse_row(&row), Err(ParseError::ProjectId { .. })));
    }

    #[test]
    fn test_malformed_props() {
        let mut row = make_row("2024-04-15 02:15:07.167", "1", "SFL", SFL_ADDRESS, "1");
        row[14] = "{not json".to_string();
        assert!(matches!(parser().parse_row(&row), Err(ParseError::Props(_))));
    }

    #[test]
    fn test_bad_amount() {
        let row = make_row("2024-04-15 02:15:07.167", "1", "SFL", SFL_ADDRESS, "lots");
        assert!(matches!(parser().parse_row(&row), Err(ParseError::Amount { .. })));
    }

    #[test]
    fn test_short_row() {
        let row = vec!["a".to_string(); 4];
        assert!(matches!(
            parser().parse_row(&row),
            Err(ParseError::MissingField { len: 4, expected: 16 })
        ));
    }

    #[test]
    fn test_unresolved_currency_leaves_usage_untouched() {
        let parser = parser();
        let row = make_row("2024-04-15 02:15:07.167", "1", "ETH", "address3", "1");
        assert!(matches!(
            parser.parse_row(&row),
            Err(ParseError::UnresolvedCurrency { .. })
        ));
        assert!(parser.usage().snapshot().is_empty());
    }

    #[test]
    fn test_parse_decimal_scientific() {
        assert_eq!(parse_decimal("1e18").unwrap(), Decimal::from(1_000_000_000_000_000_000u64));
        assert_eq!(parse_decimal(" 2.5 ").unwrap(), Decimal::new(25, 1));
        assert!(parse_decimal("").is_err());
    }

    #[test]
    fn test_sort_is_ascending_and_idempotent() {
        let base = Utc.with_ymd_and_hms(2024, 4, 15, 0, 0, 0).unwrap();
        let mut events: Vec<Event> = [30, 10, 20, 10]
            .iter()
            .enumerate()
            .map(|(i, offset)| Event::new(base + Duration::seconds(*offset), "BUY_ITEMS", i as i64, "SFL", "sunflower-land", Decimal::ONE))
            .collect();

        sort_events_by_timestamp(&mut events);
        let once: Vec<(i64, i64)> = events.iter().map(|e| (e.ts_unix, e.project_id)).collect();
        assert!(once.windows(2).all(|w| w[0].0 <= w[1].0));
        // Stable: project 1 came before project 3 at the same instant.
        assert_eq!(once[0].1, 1);
        assert_eq!(once[1].1, 3);

        sort_events_by_timestamp(&mut events);
        let twice: Vec<(i64, i64)> = events.iter().map(|e| (e.ts_unix, e.project_id)).collect();
        assert_eq!(once, twice);
    }
}
