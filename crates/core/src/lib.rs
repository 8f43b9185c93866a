//! Core types and configuration for the bdagg pipeline.
//!
//! This crate provides shared types used across all other crates:
//! - Transaction events, currency usage spans, rate series, aggregates
//! - The coin catalog entry
//! - Configuration structures
//! - Common error types

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use types::*;
