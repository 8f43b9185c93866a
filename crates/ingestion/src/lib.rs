//! Raw row ingestion for the bdagg pipeline.
//!
//! This crate handles:
//! - CSV row reading
//! - Row parsing into events
//! - Currency resolution against the coin catalog
//! - Per-coin usage span tracking
//! - The concurrent parser pool tying these together

pub mod parser;
pub mod pool;
pub mod reader;
pub mod resolver;
pub mod usage;

pub use parser::{sort_events_by_timestamp, ParseError, RowParser};
pub use pool::{ExtractOutput, ExtractStats, ParserPool, PoolConfig};
pub use reader::{read_rows, RawRow, ReadStats};
pub use resolver::CurrencyResolver;
pub use usage::UsageTracker;
