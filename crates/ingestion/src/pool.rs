//! Parser worker pool.
//!
//! A reading stage feeds raw rows through a bounded queue to a fixed set of
//! parser workers, which push events into a second bounded queue drained by
//! the collector:
//!
//! ```text
//! read_rows ──rows(cap)──▶ worker × N ──events(cap)──▶ collector ──▶ sort
//! ```

use crate::parser::{sort_events_by_timestamp, RowParser};
use crate::reader::{read_rows, RawRow, ReadStats};
use crate::resolver::CurrencyResolver;
use crate::usage::UsageTracker;
use bdagg_core::config::PipelineConfig;
use bdagg_core::{Coin, CurrencyUsageMap, Error, Event, Result};
use std::io::Read;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Parser pool sizing.
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    /// Number of parser workers.
    pub workers: usize,
    /// Raw row queue capacity.
    pub row_queue_capacity: usize,
    /// Event queue capacity.
    pub event_queue_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for PoolConfig {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            workers: config.parser_workers.max(1),
            row_queue_capacity: config.row_queue_capacity.max(1),
            event_queue_capacity: config.event_queue_capacity.max(1),
        }
    }
}

/// Counters of one extraction run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractStats {
    /// Rows handed to the workers.
    pub rows_read: u64,
    /// Records rejected by the CSV decoder.
    pub rows_malformed: u64,
    /// Rows turned into events.
    pub rows_parsed: u64,
    /// Rows skipped by the parser.
    pub rows_skipped: u64,
}

/// Result of an extraction run.
#[derive(Debug, Clone)]
pub struct ExtractOutput {
    /// Events sorted ascending by timestamp.
    pub events: Vec<Event>,
    /// Observed span per coin.
    pub usage: CurrencyUsageMap,
    /// Run counters.
    pub stats: ExtractStats,
}

#[derive(Debug, Clone, Copy, Default)]
struct WorkerStats {
    parsed: u64,
    skipped: u64,
}

/// Pool of row parser workers.
pub struct ParserPool {
    config: PoolConfig,
    resolver: Arc<CurrencyResolver>,
}

impl ParserPool {
    /// Create a pool resolving currencies against `coins`.
    pub fn new(config: PoolConfig, coins: &[Coin]) -> Self {
        Self::with_resolver(config, Arc::new(CurrencyResolver::new(coins)))
    }

    /// Create a pool sharing an existing resolver.
    pub fn with_resolver(config: PoolConfig, resolver: Arc<CurrencyResolver>) -> Self {
        Self { config, resolver }
    }

    /// Extract events from CSV bytes.
    ///
    /// The CSV is decoded on a blocking thread; the header row is skipped.
    pub async fn extract<R>(&self, reader: R) -> Result<ExtractOutput>
    where
        R: Read + Send + 'static,
    {
        let (row_tx, row_rx) = mpsc::channel(self.config.row_queue_capacity);
        let reading = tokio::task::spawn_blocking(move || read_rows(reader, row_tx));
        self.run(row_rx, reading).await
    }

    /// Extract events from already split rows. No header is expected.
    pub async fn extract_rows<I>(&self, rows: I) -> Result<ExtractOutput>
    where
        I: IntoIterator<Item = RawRow> + Send + 'static,
        I::IntoIter: Send,
    {
        let (row_tx, row_rx) = mpsc::channel(self.config.row_queue_capacity);
        let reading = tokio::spawn(async move {
            let mut stats = ReadStats::default();
            for row in rows {
                if row_tx.send(row).await.is_err() {
                    break;
                }
                stats.rows_read += 1;
            }
            stats
        });
        self.run(row_rx, reading).await
    }

    async fn run(
        &self,
        row_rx: mpsc::Receiver<RawRow>,
        reading: tokio::task::JoinHandle<ReadStats>,
    ) -> Result<ExtractOutput> {
        let usage = UsageTracker::new();
        let parser = RowParser::new(Arc::clone(&self.resolver), usage.clone());
        let row_rx = Arc::new(Mutex::new(row_rx));
        let (event_tx, mut event_rx) = mpsc::channel(self.config.event_queue_capacity);

        let mut workers = JoinSet::new();
        for worker_id in 0..self.config.workers {
            workers.spawn(parse_worker(
                worker_id,
                parser.clone(),
                Arc::clone(&row_rx),
                event_tx.clone(),
            ));
        }
        // Only worker clones remain, so the queue closes once every worker exits.
        drop(event_tx);

        let mut events = Vec::new();
        while let Some(event) = event_rx.recv().await {
            events.push(event);
        }

        let mut stats = ExtractStats::default();
        while let Some(joined) = workers.join_next().await {
            let worker = joined.map_err(|e| Error::task(format!("parser worker failed: {e}")))?;
            stats.rows_parsed += worker.parsed;
            stats.rows_skipped += worker.skipped;
        }

        let read = reading
            .await
            .map_err(|e| Error::task(format!("row reader failed: {e}")))?;
        stats.rows_read = read.rows_read;
        stats.rows_malformed = read.rows_malformed;

        sort_events_by_timestamp(&mut events);
        usage.log_usage();
        drop(parser);
        let usage = usage.into_map();

        info!(
            rows = stats.rows_read,
            parsed = stats.rows_parsed,
            skipped = stats.rows_skipped + stats.rows_malformed,
            coins = usage.len(),
            "extracted events"
        );

        Ok(ExtractOutput {
            events,
            usage,
            stats,
        })
    }
}

async fn parse_worker(
    worker_id: usize,
    parser: RowParser,
    rows: Arc<Mutex<mpsc::Receiver<RawRow>>>,
    events: mpsc::Sender<Event>,
) -> WorkerStats {
    let mut stats = WorkerStats::default();
    loop {
        let row = rows.lock().await.recv().await;
        let Some(row) = row else { break };

        match parser.parse_row(&row) {
            Ok(event) => {
                if events.send(event).await.is_err() {
                    break;
                }
                stats.parsed += 1;
            }
            Err(e) => {
                warn!(worker = worker_id, error = %e, "failed to parse row");
                stats.skipped += 1;
            }
        }
    }
    debug!(worker = worker_id, parsed = stats.parsed, skipped = stats.skipped, "parser worker done");
    stats
}
