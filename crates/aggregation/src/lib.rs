//! Daily per-project volume aggregation.
//!
//! This crate provides:
//! - Unit scaling from a coin's smallest denomination to whole units
//! - Sharded aggregation of rated events into per-day, per-project totals

pub mod aggregator;
pub mod scale;

pub use aggregator::{round_volume, Aggregator, VOLUME_DP};
pub use scale::UnitScale;
