//! Currency resolution against the coin catalog.
//!
//! Maps a row's declared currency symbol and contract address to the coin's
//! price-feed identity.

use crate::parser::ParseError;
use bdagg_core::Coin;
use std::collections::HashMap;

/// Symbol/chain pairs that resolve without a contract address match.
///
/// Native MATIC on Polygon has no ERC-20 address in the catalog.
const NATIVE_FALLBACKS: &[(&str, &str, &str)] = &[("MATIC", "137", "matic-network")];

#[derive(Debug, Clone)]
struct IndexedCoin {
    id: String,
    addresses: Vec<String>,
}

/// Resolves currencies to coin IDs.
///
/// Candidates sharing a symbol are tried in catalog order; the first whose
/// platform addresses contain the row address wins.
#[derive(Debug, Clone, Default)]
pub struct CurrencyResolver {
    /// Lowercased symbol to candidate coins, in catalog order.
    by_symbol: HashMap<String, Vec<IndexedCoin>>,
}

impl CurrencyResolver {
    /// Build a resolver from the catalog.
    pub fn new(coins: &[Coin]) -> Self {
        let mut by_symbol: HashMap<String, Vec<IndexedCoin>> = HashMap::new();
        for coin in coins {
            by_symbol
                .entry(coin.symbol.to_lowercase())
                .or_default()
                .push(IndexedCoin {
                    id: coin.id.clone(),
                    addresses: coin.addresses().map(str::to_lowercase).collect(),
                });
        }
        Self { by_symbol }
    }

    /// Resolve a currency to its coin ID.
    pub fn resolve(
        &self,
        symbol: &str,
        address: &str,
        chain_id: &str,
    ) -> Result<String, ParseError> {
        let address_lower = address.to_lowercase();
        if let Some(candidates) = self.by_symbol.get(&symbol.to_lowercase()) {
            let matched = candidates
                .iter()
                .find(|coin| coin.addresses.iter().any(|a| *a == address_lower));
            if let Some(coin) = matched {
                return Ok(coin.id.clone());
            }
        }

        NATIVE_FALLBACKS
            .iter()
            .find(|(s, chain, _)| *s == symbol && *chain == chain_id)
            .map(|(_, _, id)| id.to_string())
            .ok_or_else(|| ParseError::UnresolvedCurrency {
                symbol: symbol.to_string(),
                address: address.to_string(),
            })
    }

    /// Number of distinct symbols known.
    pub fn symbol_count(&self) -> usize {
        self.by_symbol.len()
    }
}
