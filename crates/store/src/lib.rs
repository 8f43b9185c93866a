//! External collaborators of the bdagg pipeline.
//!
//! This crate provides:
//! - Byte sources for the raw transaction export (local file, object store)
//! - Coin catalog loading
//! - The DuckDB aggregate sink

pub mod catalog;
pub mod source;
pub mod warehouse;

pub use catalog::{load_coins, parse_coins};
pub use source::{open_source, ByteSource, HttpObjectSource, LocalFileSource};
pub use warehouse::{AggregateSink, DuckDbSink};
