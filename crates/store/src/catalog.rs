//! Coin catalog loading.

use bdagg_core::{Coin, Error, Result};
use std::path::Path;
use tracing::info;

/// Load the coin catalog, a JSON array of coins.
pub async fn load_coins(path: impl AsRef<Path>) -> Result<Vec<Coin>> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| Error::catalog(format!("failed to read {}: {e}", path.display())))?;
    let coins = parse_coins(&bytes)
        .map_err(|e| Error::catalog(format!("failed to parse {}: {e}", path.display())))?;
    info!(path = %path.display(), coins = coins.len(), "loaded coin catalog");
    Ok(coins)
}

/// Parse a catalog from raw JSON bytes.
pub fn parse_coins(bytes: &[u8]) -> Result<Vec<Coin>> {
    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CATALOG: &str = r#"[
        {"id": "sunflower-land", "symbol": "sfl", "name": "Sunflower Land",
         "platforms": {"polygon-pos": "0xd1f9c58e33933a993a3891f8acfe05a68e1afc05"}},
        {"id": "usd-coin", "symbol": "usdc", "name": "USDC",
         "platforms": {"ethereum": "0xa0b8", "": null}, "decimals": 6},
        {"id": "matic-network", "symbol": "matic", "name": "Polygon", "platforms": {}}
    ]"#;

    #[tokio::test]
    async fn test_load_coins() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CATALOG.as_bytes()).unwrap();

        let coins = load_coins(file.path()).await.unwrap();

        assert_eq!(coins.len(), 3);
        assert_eq!(coins[0].id, "sunflower-land");
        assert_eq!(coins[1].decimals, Some(6));
        assert_eq!(coins[1].addresses().collect::<Vec<_>>(), vec!["0xa0b8"]);
        assert!(coins[2].platforms.is_empty());
    }

    #[tokio::test]
    async fn test_missing_catalog_is_catalog_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_coins(dir.path().join("coins.json")).await.unwrap_err();
        assert!(matches!(err, Error::Catalog(_)));
    }

    #[tokio::test]
    async fn test_malformed_catalog_is_catalog_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{\"not\": \"an array\"}").unwrap();
        let err = load_coins(file.path()).await.unwrap_err();
        assert!(matches!(err, Error::Catalog(ref msg) if msg.contains("failed to parse")));
    }
}
