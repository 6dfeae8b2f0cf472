//! Output of one simulation run.

use crate::domain::{Holdings, PortfolioSnapshot, TimeSeries};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Date-indexed series produced by [`super::run`].
///
/// Every series has exactly one point per price-table date, in table order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Total portfolio value per date.
    pub portfolio_value: TimeSeries<f64>,
    /// Cumulative amount contributed up to and including each date.
    pub invested: TimeSeries<f64>,
    /// Value of each position per date.
    pub per_asset_value: TimeSeries<BTreeMap<String, f64>>,
    /// Cumulative return of each position per date, against a weight-scaled
    /// share of the invested series.
    pub per_asset_return: TimeSeries<BTreeMap<String, f64>>,
    /// Dates on which a recurring purchase happened.
    pub contribution_dates: Vec<NaiveDate>,
    /// Units held right after the initial purchase.
    pub initial_holdings: Holdings,
    /// Units held at the end of the run.
    pub final_holdings: Holdings,
}

impl SimulationResult {
    pub fn len(&self) -> usize {
        self.portfolio_value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.portfolio_value.is_empty()
    }

    pub fn contribution_count(&self) -> usize {
        self.contribution_dates.len()
    }

    pub fn final_value(&self) -> f64 {
        self.portfolio_value.last().map(|(_, v)| *v).unwrap_or(0.0)
    }

    pub fn total_invested(&self) -> f64 {
        self.invested.last().map(|(_, v)| *v).unwrap_or(0.0)
    }

    /// One snapshot per date, rebuilt from the per-asset series.
    pub fn snapshots(&self) -> Vec<PortfolioSnapshot> {
        self.per_asset_value
            .iter()
            .map(|(date, values)| PortfolioSnapshot::new(date, values.clone()))
            .collect()
    }
}
