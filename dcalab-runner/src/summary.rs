//! Headline figures for a finished simulation.
//!
//! Plain accounting on the engine's output: what was put in, what it is worth,
//! and how each position did. No risk analytics.

use chrono::NaiveDate;
use dcalab_core::{AllocationWeights, SimulationResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcaSummary {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub trading_days: usize,
    pub contribution_count: usize,
    pub total_invested: f64,
    pub final_value: f64,
    /// `final_value - total_invested`.
    pub profit: f64,
    /// Profit over invested capital; 0.0 when nothing was invested.
    pub total_return: f64,
    pub assets: Vec<AssetSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSummary {
    pub asset: String,
    pub weight: f64,
    pub units: f64,
    /// Weight-scaled share of the total invested.
    pub invested: f64,
    pub final_value: f64,
    pub total_return: f64,
}

impl DcaSummary {
    pub fn from_result(result: &SimulationResult, weights: &AllocationWeights) -> Self {
        let total_invested = result.total_invested();
        let final_value = result.final_value();
        let profit = final_value - total_invested;
        let total_return = if total_invested > 0.0 {
            profit / total_invested
        } else {
            0.0
        };

        let last_values = result.per_asset_value.last().map(|(_, v)| v);
        let last_returns = result.per_asset_return.last().map(|(_, r)| r);

        let assets = weights
            .iter()
            .map(|(asset, weight)| AssetSummary {
                asset: asset.to_string(),
                weight,
                units: result.final_holdings.units(asset),
                invested: total_invested * weight,
                final_value: last_values
                    .and_then(|v| v.get(asset))
                    .copied()
                    .unwrap_or(0.0),
                total_return: last_returns
                    .and_then(|r| r.get(asset))
                    .copied()
                    .unwrap_or(0.0),
            })
            .collect();

        Self {
            start_date: result.portfolio_value.first().map(|(d, _)| d),
            end_date: result.portfolio_value.last().map(|(d, _)| d),
            trading_days: result.len(),
            contribution_count: result.contribution_count(),
            total_invested,
            final_value,
            profit,
            total_return,
            assets,
        }
    }
}
