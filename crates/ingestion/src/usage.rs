//! Per-coin time span tracking shared by the parser workers.

use bdagg_core::{CurrencyUsage, CurrencyUsageMap, TimestampSecs};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Concurrent tracker of the time span each coin was observed over.
///
/// Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct UsageTracker {
    inner: Arc<Mutex<CurrencyUsageMap>>,
}

impl UsageTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CurrencyUsageMap> {
        // A worker panicking mid-update leaves a valid map: `widen` is a pair of
        // independent min/max writes.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Widen (or start) the span for `coin_id` to include `ts`.
    pub fn update(&self, coin_id: &str, ts: TimestampSecs) {
        let mut map = self.lock();
        match map.get_mut(coin_id) {
            Some(usage) => usage.widen(ts),
            None => {
                map.insert(coin_id.to_string(), CurrencyUsage::at(ts));
            }
        }
    }

    /// Span for one coin, if observed.
    pub fn get(&self, coin_id: &str) -> Option<CurrencyUsage> {
        self.lock().get(coin_id).copied()
    }

    /// Copy of the current map.
    pub fn snapshot(&self) -> CurrencyUsageMap {
        self.lock().clone()
    }

    /// Consume the tracker. Copies only if another clone is still alive.
    pub fn into_map(self) -> CurrencyUsageMap {
        match Arc::try_unwrap(self.inner) {
            Ok(mutex) => mutex.into_inner().unwrap_or_else(PoisonError::into_inner),
            Err(shared) => shared.lock().unwrap_or_else(PoisonError::into_inner).clone(),
        }
    }

    /// Log every span at debug level.
    pub fn log_usage(&self) {
        for (coin_id, usage) in self.lock().iter() {
            debug!(coin_id = %coin_id, from = usage.from, to = usage.to, "currency usage");
        }
    }
}
