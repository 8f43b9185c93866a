//! Sharded daily per-project aggregation.

use crate::scale::UnitScale;
use bdagg_core::{AggregatePerProject, Event};
use rayon::prelude::*;
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Fractional digits of a finalized volume.
pub const VOLUME_DP: u32 = 2;

/// Running totals of one (day, project) cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Partial {
    count: u64,
    volume: Decimal,
}

impl Partial {
    fn add(&mut self, volume: Decimal) {
        self.count += 1;
        self.volume = saturating_sum(self.volume, volume);
    }

    fn merge(&mut self, other: Partial) {
        self.count += other.count;
        self.volume = saturating_sum(self.volume, other.volume);
    }
}

/// `a + b`, clamped to the representable range.
fn saturating_sum(a: Decimal, b: Decimal) -> Decimal {
    a.checked_add(b).unwrap_or_else(|| {
        warn!(%a, %b, "volume sum overflow, saturating");
        if b.is_sign_negative() {
            Decimal::MIN
        } else {
            Decimal::MAX
        }
    })
}

/// day -> project -> totals
type DayMap = HashMap<String, HashMap<i64, Partial>>;

/// Groups events by UTC day and project, summing counts and volumes.
///
/// Events are split into `workers` contiguous chunks; each chunk is reduced
/// into a private map and then merged into a shared one.
pub struct Aggregator {
    workers: usize,
    scale: UnitScale,
    pool: Option<rayon::ThreadPool>,
}

impl Aggregator {
    pub fn new(workers: usize, scale: UnitScale) -> Self {
        let workers = workers.max(1);
        let pool = match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
            Ok(pool) => Some(pool),
            Err(e) => {
                warn!(error = %e, "failed to build aggregation pool, using global pool");
                None
            }
        };
        Self {
            workers,
            scale,
            pool,
        }
    }

    /// Volume of one event in the output currency, unrounded.
    pub fn volume(&self, event: &Event) -> Decimal {
        let units = self.scale.whole_units(&event.coin_id, event.amount);
        units.checked_mul(event.exchange_rate).unwrap_or_else(|| {
            warn!(
                coin_id = %event.coin_id,
                txn_hash = %event.txn_hash,
                "volume overflow, counting as zero"
            );
            Decimal::ZERO
        })
    }

    /// Aggregate `events` into one record per (day, project), quoted in
    /// `currency`. Output order is unspecified.
    pub fn aggregate(&self, events: &[Event], currency: &str) -> Vec<AggregatePerProject> {
        if events.is_empty() {
            return Vec::new();
        }

        let chunk_size = events.len().div_ceil(self.workers);
        let global = Mutex::new(DayMap::new());
        let run = || {
            events.par_chunks(chunk_size).for_each(|chunk| {
                let local = self.reduce_chunk(chunk);
                let mut global = global.lock().unwrap_or_else(PoisonError::into_inner);
                merge_into(&mut global, local);
            });
        };
        match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        }

        let global = global.into_inner().unwrap_or_else(PoisonError::into_inner);
        let records = finalize(global, currency);
        info!(
            events = events.len(),
            shards = events.len().div_ceil(chunk_size),
            records = records.len(),
            "aggregated events"
        );
        records
    }

    fn reduce_chunk(&self, chunk: &[Event]) -> DayMap {
        let mut local = DayMap::new();
        for event in chunk {
            local
                .entry(event.day())
                .or_default()
                .entry(event.project_id)
                .or_default()
                .add(self.volume(event));
        }
        debug!(events = chunk.len(), days = local.len(), "reduced chunk");
        local
    }
}

fn merge_into(global: &mut DayMap, local: DayMap) {
    for (day, projects) in local {
        let target = global.entry(day).or_default();
        for (project_id, partial) in projects {
            target.entry(project_id).or_default().merge(partial);
        }
    }
}

fn finalize(global: DayMap, currency: &str) -> Vec<AggregatePerProject> {
    global
        .into_iter()
        .flat_map(|(day, projects)| {
            projects
                .into_iter()
                .map(move |(project_id, partial)| AggregatePerProject {
                    day: day.clone(),
                    project_id,
                    transaction_count: partial.count,
                    total_volume: round_volume(partial.volume),
                    currency: currency.to_string(),
                })
        })
        .collect()
}

/// Round a summed volume to its reported precision, half away from zero.
pub fn round_volume(volume: Decimal) -> Decimal {
    volume.round_dp_with_strategy(VOLUME_DP, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{TimeZone, Utc};
    use rust_decimal::prelude::ToPrimitive;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn event(ts: i64, project_id: i64, coin_id: &str, amount: &str, rate: &str) -> Event {
        let ts = Utc.timestamp_opt(ts, 0).unwrap();
        let mut event = Event::new(ts, "BUY_ITEMS", project_id, "X", coin_id, dec(amount));
        event.exchange_rate = dec(rate);
        event
    }

    fn find<'a>(records: &'a [AggregatePerProject], day: &str, project_id: i64) -> &'a AggregatePerProject {
        records
            .iter()
            .find(|r| r.day == day && r.project_id == project_id)
            .unwrap()
    }

    // 2024-04-15 00:00:00 UTC
    const DAY: i64 = 1713139200;

    #[test]
    fn test_scaled_and_unscaled_coins_share_a_cell() {
        let events = vec![
            event(DAY + 10, 1, "matic-network", "1000000000000000000", "1.5"),
            event(DAY + 20, 1, "other-coin", "100", "2.0"),
        ];
        let aggregator = Aggregator::new(4, UnitScale::from_catalog(&[]));

        let records = aggregator.aggregate(&events, "usd");

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.day, "2024-04-15");
        assert_eq!(record.project_id, 1);
        assert_eq!(record.transaction_count, 2);
        assert_eq!(record.total_volume, dec("201.50"));
        assert_eq!(record.currency, "usd");
    }

    #[test]
    fn test_days_and_projects_are_separate_cells() {
        let events = vec![
            event(DAY + 10, 1, "matic-network", "1000000000000000000", "1.5"),
            event(DAY + 20, 1, "other-coin", "100", "2.0"),
            event(DAY + 30, 2, "other-coin", "25", "2.0"),
            event(DAY + 86_400, 1, "other-coin", "10", "3.3"),
        ];
        let aggregator = Aggregator::new(2, UnitScale::from_catalog(&[]));

        let records = aggregator.aggregate(&events, "usd");

        assert_eq!(records.len(), 3);
        assert_eq!(find(&records, "2024-04-15", 1).total_volume, dec("201.5"));
        assert_eq!(find(&records, "2024-04-15", 2).total_volume, dec("50.0"));
        assert_eq!(find(&records, "2024-04-16", 1).total_volume, dec("33.0"));
        assert_relative_eq!(
            find(&records, "2024-04-15", 2).total_volume.to_f64().unwrap(),
            50.0
        );
    }

    #[test]
    fn test_counts_sum_to_event_count() {
        let events: Vec<Event> = (0..1003)
            .map(|i| event(DAY + i * 300, i % 7, "other-coin", "1", if i % 5 == 0 { "0" } else { "0.1" }))
            .collect();

        for workers in [1, 3, 4, 16] {
            let records = Aggregator::new(workers, UnitScale::new()).aggregate(&events, "usd");
            let total: u64 = records.iter().map(|r| r.transaction_count).sum();
            assert_eq!(total, 1003, "workers={workers}");
        }
    }

    #[test]
    fn test_result_independent_of_worker_count() {
        let events: Vec<Event> = (0..500)
            .map(|i| event(DAY + i * 600, i % 3, "other-coin", "1.005", "1"))
            .collect();

        let mut single = Aggregator::new(1, UnitScale::new()).aggregate(&events, "usd");
        let mut sharded = Aggregator::new(8, UnitScale::new()).aggregate(&events, "usd");
        single.sort_by(|a, b| (&a.day, a.project_id).cmp(&(&b.day, b.project_id)));
        sharded.sort_by(|a, b| (&a.day, a.project_id).cmp(&(&b.day, b.project_id)));

        assert_eq!(single, sharded);
    }

    #[test]
    fn test_rounding_happens_once_after_summing() {
        // Per-event rounding would give 0.01 * 3 = 0.03.
        let events = vec![
            event(DAY, 1, "other-coin", "0.005", "1"),
            event(DAY + 1, 1, "other-coin", "0.005", "1"),
            event(DAY + 2, 1, "other-coin", "0.005", "1"),
        ];
        let records = Aggregator::new(3, UnitScale::new()).aggregate(&events, "usd");
        assert_eq!(records[0].total_volume, dec("0.02"));
    }

    #[test]
    fn test_round_half_away_from_zero() {
        assert_eq!(round_volume(dec("0.125")), dec("0.13"));
        assert_eq!(round_volume(dec("-0.125")), dec("-0.13"));
        assert_eq!(round_volume(dec("2.344")), dec("2.34"));
    }

    #[test]
    fn test_zero_rate_events_are_counted() {
        let events = vec![event(DAY, 9, "unknown", "5", "0"), event(DAY + 1, 9, "unknown", "7", "0")];
        let records = Aggregator::new(4, UnitScale::new()).aggregate(&events, "eur");
        assert_eq!(records[0].transaction_count, 2);
        assert_eq!(records[0].total_volume, Decimal::ZERO);
        assert_eq!(records[0].currency, "eur");
    }

    #[test]
    fn test_volume_sum_saturates_instead_of_panicking() {
        let half_max = "50000000000000000000000000000";
        let events = vec![
            event(DAY, 1, "other-coin", half_max, "1"),
            event(DAY + 1, 1, "other-coin", half_max, "1"),
        ];

        let records = Aggregator::new(1, UnitScale::new()).aggregate(&events, "usd");

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].transaction_count, 2);
        assert_eq!(records[0].total_volume, Decimal::MAX);
    }

    #[test]
    fn test_merge_across_shards_saturates() {
        let half_max = "50000000000000000000000000000";
        let events = vec![
            event(DAY, 1, "other-coin", half_max, "1"),
            event(DAY + 1, 1, "other-coin", half_max, "1"),
            event(DAY + 2, 2, "other-coin", &format!("-{half_max}"), "1"),
            event(DAY + 3, 2, "other-coin", &format!("-{half_max}"), "1"),
        ];

        let records = Aggregator::new(4, UnitScale::new()).aggregate(&events, "usd");

        assert_eq!(find(&records, "2024-04-15", 1).total_volume, Decimal::MAX);
        assert_eq!(find(&records, "2024-04-15", 2).total_volume, Decimal::MIN);
        assert_eq!(find(&records, "2024-04-15", 2).transaction_count, 2);
    }

    #[test]
    fn test_empty_input() {
        assert!(Aggregator::new(4, UnitScale::new()).aggregate(&[], "usd").is_empty());
    }
}
