//! Native-unit to whole-unit conversion per coin.

use bdagg_core::Coin;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::warn;

/// Coins whose amounts arrive in their smallest denomination even when the
/// catalog says nothing about it.
const DEFAULT_DECIMALS: &[(&str, u32)] = &[("matic-network", 18)];

/// Largest scale a `Decimal` can represent.
const MAX_DECIMALS: u32 = 28;

/// Per-coin decimal places between raw amounts and whole units.
///
/// Coins without an entry are taken as already denominated in whole units.
#[derive(Debug, Clone, Default)]
pub struct UnitScale {
    decimals: HashMap<String, u32>,
}

impl UnitScale {
    /// Empty table: every amount is used as-is.
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in defaults overlaid with catalog `decimals`.
    pub fn from_catalog(coins: &[Coin]) -> Self {
        let mut scale = Self::new();
        for &(coin_id, decimals) in DEFAULT_DECIMALS {
            scale.set(coin_id, decimals);
        }
        for coin in coins {
            if let Some(decimals) = coin.decimals {
                scale.set(&coin.id, decimals);
            }
        }
        scale
    }

    /// Register `decimals` for a coin. Zero removes any scaling.
    pub fn set(&mut self, coin_id: &str, decimals: u32) {
        if decimals == 0 {
            self.decimals.remove(coin_id);
            return;
        }
        if decimals > MAX_DECIMALS {
            warn!(coin_id, decimals, "unit scale too large, ignoring");
            return;
        }
        self.decimals.insert(coin_id.to_string(), decimals);
    }

    /// Decimal places registered for a coin, zero when unscaled.
    pub fn decimals(&self, coin_id: &str) -> u32 {
        self.decimals.get(coin_id).copied().unwrap_or(0)
    }

    /// Convert a raw amount into whole units of its coin.
    pub fn whole_units(&self, coin_id: &str, amount: Decimal) -> Decimal {
        match self.decimals.get(coin_id) {
            // 10^28 still fits in 96 bits.
            Some(&decimals) => amount / Decimal::from_i128_with_scale(10_i128.pow(decimals), 0),
            None => amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn coin(id: &str, decimals: Option<u32>) -> Coin {
        Coin {
            id: id.to_string(),
            symbol: id.to_string(),
            name: String::new(),
            platforms: HashMap::new(),
            decimals,
        }
    }

    #[test]
    fn test_matic_scaled_by_default() {
        let scale = UnitScale::from_catalog(&[]);
        let raw = Decimal::from_i128_with_scale(1_000_000_000_000_000_000, 0);
        assert_eq!(scale.whole_units("matic-network", raw), Decimal::ONE);
        assert_eq!(scale.decimals("matic-network"), 18);
    }

    #[test]
    fn test_unknown_coin_is_unscaled() {
        let scale = UnitScale::from_catalog(&[]);
        assert_eq!(scale.whole_units("other-coin", Decimal::from(100)), Decimal::from(100));
        assert_eq!(scale.decimals("other-coin"), 0);
    }

    #[test]
    fn test_catalog_decimals_override_defaults() {
        let scale = UnitScale::from_catalog(&[
            coin("usd-coin", Some(6)),
            coin("matic-network", Some(0)),
            coin("plain", None),
        ]);
        assert_eq!(
            scale.whole_units("usd-coin", Decimal::from(2_500_000)),
            Decimal::new(25, 1)
        );
        assert_eq!(scale.whole_units("matic-network", Decimal::from(7)), Decimal::from(7));
        assert_eq!(scale.whole_units("plain", Decimal::from(7)), Decimal::from(7));
    }

    #[test]
    fn test_oversized_scale_ignored() {
        let mut scale = UnitScale::new();
        scale.set("weird", 40);
        assert_eq!(scale.decimals("weird"), 0);
    }
}
