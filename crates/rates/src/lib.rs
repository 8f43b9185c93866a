//! Exchange rate retrieval and matching.
//!
//! This crate provides:
//! - An HTTP transport seam with a reqwest implementation
//! - Retry policy with doubling, jittered backoff
//! - The CoinGecko rate source
//! - Parallel fail-fast fetching of per-coin series
//! - Nearest-timestamp matching of rates onto events

pub mod coingecko;
pub mod fetcher;
pub mod http;
pub mod matcher;
pub mod retry;
pub mod source;

pub use coingecko::CoinGeckoSource;
pub use fetcher::{FetchConfig, RateFetcher};
pub use http::{HttpClient, ReqwestHttpClient};
pub use matcher::{find_closest_rate, match_rates, MatchStats};
pub use retry::RetryPolicy;
pub use source::{RateRequest, RateSource, RateSourceError};
