//! Asset catalog: ticker to display-name mapping.
//!
//! Stored as a TOML table of `ticker = "Display Name"` under `[assets]`.
//! Lookups for tickers the catalog does not know fall back to the ticker
//! itself, so the catalog is never required for a run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Ordered ticker → display-name mapping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetCatalog {
    pub assets: BTreeMap<String, String>,
}

impl AssetCatalog {
    /// Load a catalog from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content =
            std::fs::read_to_string(path).map_err(|e| format!("read catalog file: {e}"))?;
        Self::from_toml(&content)
    }

    /// Parse a catalog from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("parse catalog TOML: {e}"))
    }

    /// Serialize the catalog to TOML.
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("serialize catalog: {e}"))
    }

    /// Display name for a ticker, or the ticker itself when unknown.
    pub fn display_name<'a>(&'a self, ticker: &'a str) -> &'a str {
        self.assets.get(ticker).map(|s| s.as_str()).unwrap_or(ticker)
    }

    /// Reverse lookup: ticker for a display name (case-insensitive).
    pub fn ticker_for(&self, name: &str) -> Option<&str> {
        self.assets
            .iter()
            .find(|(_, display)| display.eq_ignore_ascii_case(name))
            .map(|(ticker, _)| ticker.as_str())
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.assets.contains_key(ticker)
    }

    pub fn tickers(&self) -> Vec<&str> {
        self.assets.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Major crypto assets quoted in USD.
    pub fn default_crypto() -> Self {
        let assets = [
            ("BTC-USD", "Bitcoin"),
            ("ETH-USD", "Ethereum"),
            ("SOL-USD", "Solana"),
            ("XMR-USD", "Monero"),
            ("BNB-USD", "BNB"),
            ("XRP-USD", "XRP"),
            ("ADA-USD", "Cardano"),
            ("DOGE-USD", "Dogecoin"),
            ("DOT-USD", "Polkadot"),
            ("LTC-USD", "Litecoin"),
            ("LINK-USD", "Chainlink"),
            ("AVAX-USD", "Avalanche"),
        ]
        .into_iter()
        .map(|(t, n)| (t.to_string(), n.to_string()))
        .collect();

        Self { assets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_knows_the_basket() {
        let c = AssetCatalog::default_crypto();
        assert_eq!(c.display_name("BTC-USD"), "Bitcoin");
        assert_eq!(c.display_name("XMR-USD"), "Monero");
        assert_eq!(c.display_name("SOL-USD"), "Solana");
        assert!(c.len() >= 10);
    }

    #[test]
    fn unknown_ticker_falls_back_to_itself() {
        let c = AssetCatalog::default_crypto();
        assert_eq!(c.display_name("SPY"), "SPY");
    }

    #[test]
    fn reverse_lookup_ignores_case() {
        let c = AssetCatalog::default_crypto();
        assert_eq!(c.ticker_for("monero"), Some("XMR-USD"));
        assert_eq!(c.ticker_for("nope"), None);
    }

    #[test]
    fn toml_roundtrip() {
        let c = AssetCatalog::default_crypto();
        let toml_str = c.to_toml().unwrap();
        let parsed = AssetCatalog::from_toml(&toml_str).unwrap();
        assert_eq!(c.tickers(), parsed.tickers());
    }

    #[test]
    fn parses_hand_written_toml() {
        let c = AssetCatalog::from_toml("[assets]\n\"SPY\" = \"S&P 500 ETF\"\n").unwrap();
        assert_eq!(c.display_name("SPY"), "S&P 500 ETF");
    }
}
