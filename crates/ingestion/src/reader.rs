//! CSV row reading stage.

use std::io::Read;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// A raw positional row.
pub type RawRow = Vec<String>;

/// Counters of the reading stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadStats {
    /// Rows handed to the parser queue.
    pub rows_read: u64,
    /// Records the CSV decoder rejected.
    pub rows_malformed: u64,
}

/// Read CSV records from `reader` into `rows`, skipping the header row.
///
/// Blocks on queue capacity, so run it on a blocking thread. Records the CSV
/// decoder cannot read are logged and skipped. Returns early if the receiving
/// side is dropped.
pub fn read_rows<R: Read>(reader: R, rows: mpsc::Sender<RawRow>) -> ReadStats {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let mut stats = ReadStats::default();

    for (index, record) in csv_reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!(record = index + 1, error = %e, "failed to read CSV row");
                stats.rows_malformed += 1;
                continue;
            }
        };

        let row: RawRow = record.iter().map(str::to_string).collect();
        if rows.blocking_send(row).is_err() {
            debug!("row queue closed, stopping reader");
            break;
        }
        stats.rows_read += 1;
    }

    stats
}
