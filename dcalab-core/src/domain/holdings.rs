//! Units held per asset. Only purchases mutate holdings; there is no selling.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fractional units owned of each asset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Holdings {
    units: BTreeMap<String, f64>,
}

impl Holdings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spend `amount` on `asset` at `price`. Returns the units bought.
    ///
    /// Callers guarantee `price > 0` and `amount >= 0`, so units never decrease.
    pub fn buy(&mut self, asset: &str, amount: f64, price: f64) -> f64 {
        let bought = amount / price;
        *self.units.entry(asset.to_string()).or_insert(0.0) += bought;
        bought
    }

    /// Units of `asset` held (0.0 if never bought).
    pub fn units(&self, asset: &str) -> f64 {
        self.units.get(asset).copied().unwrap_or(0.0)
    }

    /// Market value of the position in `asset` at `price`.
    pub fn value_at(&self, asset: &str, price: f64) -> f64 {
        self.units(asset) * price
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.units.iter().map(|(a, u)| (a.as_str(), *u))
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buys_accumulate() {
        let mut h = Holdings::new();
        assert_eq!(h.buy("A", 500.0, 100.0), 5.0);
        assert_eq!(h.buy("A", 100.0, 50.0), 2.0);
        assert_eq!(h.units("A"), 7.0);
        assert_eq!(h.value_at("A", 10.0), 70.0);
    }

    #[test]
    fn unknown_asset_has_no_units() {
        let h = Holdings::new();
        assert_eq!(h.units("A"), 0.0);
        assert!(h.is_empty());
    }
}
