//! Nearest-timestamp rate matching.

use bdagg_core::{Event, FetchedExchangeRates, RateSeries, TimestampSecs};
use rayon::prelude::*;
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Outcome counters of one matching pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchStats {
    /// Events that received a rate from a series.
    pub matched: usize,
    /// Events left at zero because their coin had no series.
    pub unmatched: usize,
}

/// Rate of the point closest to `ts`; ties go to the earlier point.
///
/// Linear scan, the series carries no ordering.
pub fn find_closest_rate(series: &RateSeries, ts: TimestampSecs) -> Option<Decimal> {
    series
        .iter()
        .min_by_key(|(point, _)| (ts.abs_diff(**point), **point))
        .map(|(_, rate)| *rate)
}

/// Assign every event the closest rate of its coin's series.
///
/// Coins without a series (or with an empty one) keep a zero rate; each is
/// reported once.
pub fn match_rates(events: &mut [Event], rates: &FetchedExchangeRates) -> MatchStats {
    let missing: BTreeSet<&str> = events
        .iter()
        .map(|e| e.coin_id.as_str())
        .filter(|coin_id| rates.get(*coin_id).map_or(true, |s| s.is_empty()))
        .collect();
    for coin_id in &missing {
        warn!(coin_id, "no exchange rates for coin, volume will be zero");
    }

    let matched = events
        .par_iter_mut()
        .map(|event| {
            let rate = rates
                .get(&event.coin_id)
                .and_then(|series| find_closest_rate(series, event.ts_unix));
            event.exchange_rate = rate.unwrap_or(Decimal::ZERO);
            usize::from(rate.is_some())
        })
        .sum::<usize>();

    let stats = MatchStats {
        matched,
        unmatched: events.len() - matched,
    };
    debug!(matched = stats.matched, unmatched = stats.unmatched, "matched exchange rates");
    stats
}
