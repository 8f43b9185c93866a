//! DuckDB-backed aggregate storage.

use bdagg_core::config::is_valid_identifier;
use bdagg_core::{AggregatePerProject, Error, Result};
use duckdb::{Connection, ToSql};
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

/// Destination of finished aggregates, keyed by (day, project_id).
pub trait AggregateSink: Send {
    /// Create `table` if it does not exist.
    fn setup_table(&self, table: &str) -> Result<()>;

    /// Insert or replace `records` in `table`; returns the number written.
    fn upsert(&self, table: &str, records: &[AggregatePerProject]) -> Result<usize>;
}

/// Aggregates stored in a DuckDB file.
pub struct DuckDbSink {
    connection: Connection,
    path: Option<PathBuf>,
}

impl DuckDbSink {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let connection = Connection::open(path).map_err(db_error)?;
        info!(path = %path.display(), "opened warehouse");
        Ok(Self {
            connection,
            path: Some(path.to_path_buf()),
        })
    }

    /// In-memory database, gone when dropped.
    pub fn open_in_memory() -> Result<Self> {
        let connection = Connection::open_in_memory().map_err(db_error)?;
        Ok(Self {
            connection,
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Read back every record of `table`, ordered by day then project.
    pub fn load(&self, table: &str) -> Result<Vec<AggregatePerProject>> {
        let table = checked_table(table)?;
        let sql = format!(
            "SELECT CAST(day AS VARCHAR), project_id, transaction_count, \
             CAST(total_volume AS VARCHAR), currency \
             FROM {table} ORDER BY day, project_id"
        );
        let mut statement = self.connection.prepare(&sql).map_err(db_error)?;
        let rows = statement
            .query_map(duckdb::params![], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .map_err(db_error)?;

        let mut records = Vec::new();
        for row in rows {
            let (day, project_id, count, volume, currency) = row.map_err(db_error)?;
            let total_volume = Decimal::from_str(&volume)
                .map_err(|e| Error::database(format!("invalid volume {volume}: {e}")))?;
            records.push(AggregatePerProject {
                day,
                project_id,
                transaction_count: count.max(0) as u64,
                total_volume,
                currency,
            });
        }
        Ok(records)
    }
}

impl AggregateSink for DuckDbSink {
    fn setup_table(&self, table: &str) -> Result<()> {
        let table = checked_table(table)?;
        self.connection
            .execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    day DATE NOT NULL,
                    project_id BIGINT NOT NULL,
                    transaction_count BIGINT NOT NULL,
                    total_volume DECIMAL(38, 2) NOT NULL,
                    currency VARCHAR NOT NULL,
                    PRIMARY KEY (day, project_id)
                );"
            ))
            .map_err(db_error)?;
        info!(table, "table ready");
        Ok(())
    }

    fn upsert(&self, table: &str, records: &[AggregatePerProject]) -> Result<usize> {
        let table = checked_table(table)?;
        if records.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            "INSERT INTO {table} (day, project_id, transaction_count, total_volume, currency) \
             VALUES (CAST(? AS DATE), ?, ?, CAST(? AS DECIMAL(38, 2)), ?) \
             ON CONFLICT (day, project_id) DO UPDATE SET \
             transaction_count = EXCLUDED.transaction_count, \
             total_volume = EXCLUDED.total_volume, \
             currency = EXCLUDED.currency"
        );

        self.connection.execute_batch("BEGIN TRANSACTION").map_err(db_error)?;
        let result = (|| -> Result<usize> {
            let mut statement = self.connection.prepare(&sql).map_err(db_error)?;
            for record in records {
                let count = i64::try_from(record.transaction_count).map_err(|_| {
                    Error::database(format!("transaction count overflow: {}", record.transaction_count))
                })?;
                let volume = record.total_volume.to_string();
                let params: [&dyn ToSql; 5] = [
                    &record.day,
                    &record.project_id,
                    &count,
                    &volume,
                    &record.currency,
                ];
                statement.execute(params.as_slice()).map_err(db_error)?;
            }
            Ok(records.len())
        })();

        let written = finalize_transaction(&self.connection, result)?;
        info!(table, records = written, "upserted aggregates");
        Ok(written)
    }
}

/// Commit on success, roll back on failure.
fn finalize_transaction<T>(connection: &Connection, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT").map_err(db_error)?;
            Ok(value)
        }
        Err(error) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

fn checked_table(table: &str) -> Result<&str> {
    if is_valid_identifier(table) {
        Ok(table)
    } else {
        Err(Error::database(format!("invalid table name: {table}")))
    }
}

fn db_error(e: duckdb::Error) -> Error {
    Error::database(e.to_string())
}
