//! Extract, fetch, match and aggregate, in that order.

use bdagg_aggregation::{Aggregator, UnitScale};
use bdagg_core::{AggregatePerProject, Coin, Config, Result};
use bdagg_ingestion::{ExtractStats, ParserPool, PoolConfig};
use bdagg_rates::{match_rates, FetchConfig, MatchStats, RateFetcher, RateSource};
use std::io::Cursor;
use std::sync::Arc;
use tracing::info;

/// What a transform run produced.
#[derive(Debug, Clone)]
pub struct TransformOutput {
    /// One record per (day, project).
    pub records: Vec<AggregatePerProject>,
    /// Events that made it through parsing.
    pub events: usize,
    /// Parser counters.
    pub extract: ExtractStats,
    /// Matcher counters.
    pub matched: MatchStats,
}

/// The in-memory part of a run: raw bytes in, aggregates out.
pub struct Pipeline {
    config: Config,
    rate_source: Arc<dyn RateSource>,
}

impl Pipeline {
    pub fn new(config: Config, rate_source: Arc<dyn RateSource>) -> Self {
        Self {
            config,
            rate_source,
        }
    }

    pub async fn transform(&self, raw: Vec<u8>, coins: &[Coin]) -> Result<TransformOutput> {
        let pipeline = &self.config.pipeline;

        let pool = ParserPool::new(PoolConfig::from(pipeline), coins);
        let extracted = pool.extract(Cursor::new(raw)).await?;
        let mut events = extracted.events;

        let fetcher = RateFetcher::new(
            Arc::clone(&self.rate_source),
            FetchConfig::from(&self.config.rates),
        );
        let rates = fetcher
            .fetch_all(&extracted.usage, &pipeline.output_currency)
            .await?;

        let matched = match_rates(&mut events, &rates);

        let aggregator = Aggregator::new(pipeline.aggregation_workers, UnitScale::from_catalog(coins));
        let records = aggregator.aggregate(&events, &pipeline.output_currency);

        info!(
            events = events.len(),
            records = records.len(),
            skipped = extracted.stats.rows_skipped,
            "transform complete"
        );
        Ok(TransformOutput {
            records,
            events: events.len(),
            extract: extracted.stats,
            matched,
        })
    }
}
