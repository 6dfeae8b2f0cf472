//! Per-date valuation of the portfolio.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Value of every position and of the whole portfolio on one date.
///
/// `total_value == sum(per_asset_value)` by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub date: NaiveDate,
    pub per_asset_value: BTreeMap<String, f64>,
    pub total_value: f64,
}

impl PortfolioSnapshot {
    pub fn new(date: NaiveDate, per_asset_value: BTreeMap<String, f64>) -> Self {
        let total_value = per_asset_value.values().sum();
        Self {
            date,
            per_asset_value,
            total_value,
        }
    }

    /// Fraction of total value held in `asset` (0.0 for an empty portfolio).
    pub fn share_of(&self, asset: &str) -> f64 {
        if self.total_value <= 0.0 {
            return 0.0;
        }
        self.per_asset_value.get(asset).copied().unwrap_or(0.0) / self.total_value
    }
}
