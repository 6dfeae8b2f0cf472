//! Day-by-day DCA simulation without rebalancing.
//!
//! 1. Initial purchase on the first date: `initial_capital` split by weight.
//! 2. On every contribution date: `recurring_contribution` split by weight.
//! 3. Every date: mark holdings to market, record per-asset and total value.
//!
//! The function is pure. Each call owns its holdings, so independent inputs
//! may be simulated concurrently.

use super::config::SimulationConfig;
use super::result::SimulationResult;
use crate::domain::{Holdings, PriceTable, TimeSeries};
use crate::error::BacktestError;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Run the simulation. Preconditions are checked up front; any violation
/// aborts before a single unit is bought.
pub fn run(
    table: &PriceTable,
    config: &SimulationConfig,
) -> Result<SimulationResult, BacktestError> {
    check_preconditions(table, config)?;

    let dates = table.dates();
    let weights: Vec<(&str, f64)> = table
        .assets()
        .map(|asset| (asset, config.weights.get(asset).unwrap_or(0.0)))
        .collect();

    let mut holdings = Holdings::new();
    purchase(&mut holdings, table, &weights, 0, config.initial_capital);
    let initial_holdings = holdings.clone();

    let flags = config.schedule.contribution_flags(dates);
    let mut contribution_dates = Vec::new();

    let n = dates.len();
    let mut portfolio_value = TimeSeries::with_capacity(n);
    let mut invested = TimeSeries::with_capacity(n);
    let mut per_asset_value = TimeSeries::with_capacity(n);
    let mut per_asset_return = TimeSeries::with_capacity(n);

    for (idx, &date) in dates.iter().enumerate() {
        if idx > 0 && flags[idx] {
            purchase(
                &mut holdings,
                table,
                &weights,
                idx,
                config.recurring_contribution,
            );
            contribution_dates.push(date);
            debug!(%date, amount = config.recurring_contribution, "recurring contribution");
        }

        let invested_to_date = config.initial_capital
            + config.recurring_contribution * contribution_dates.len() as f64;

        let mut values = BTreeMap::new();
        let mut returns = BTreeMap::new();
        for (asset, price) in table.row(idx) {
            let value = holdings.value_at(asset, price);
            let weight = config.weights.get(asset).unwrap_or(0.0);
            returns.insert(asset.to_string(), value / (invested_to_date * weight) - 1.0);
            values.insert(asset.to_string(), value);
        }
        let total: f64 = values.values().sum();

        portfolio_value.push(date, total);
        invested.push(date, invested_to_date);
        per_asset_value.push(date, values);
        per_asset_return.push(date, returns);
    }

    let result = SimulationResult {
        portfolio_value,
        invested,
        per_asset_value,
        per_asset_return,
        contribution_dates,
        initial_holdings,
        final_holdings: holdings,
    };

    info!(
        dates = result.len(),
        contributions = result.contribution_count(),
        final_value = result.final_value(),
        invested = result.total_invested(),
        "simulation complete"
    );

    Ok(result)
}

/// Split `amount` across assets by weight and buy at row `idx` prices.
fn purchase(
    holdings: &mut Holdings,
    table: &PriceTable,
    weights: &[(&str, f64)],
    idx: usize,
    amount: f64,
) {
    for &(asset, weight) in weights {
        if let Some(price) = table.price(asset, idx) {
            holdings.buy(asset, amount * weight, price);
        }
    }
}

fn check_preconditions(table: &PriceTable, config: &SimulationConfig) -> Result<(), BacktestError> {
    config.validate()?;

    if table.is_empty() || table.asset_count() == 0 {
        return Err(BacktestError::EmptyPriceTable);
    }

    config.weights.validate_for(table.assets())?;

    for asset in table.assets() {
        let column = table.column(asset).unwrap_or_default();
        if let Some(idx) = column.iter().position(|p| p.is_nan() || *p <= 0.0) {
            return Err(BacktestError::NonPositivePrice {
                asset: asset.to_string(),
                date: table.dates()[idx],
                price: column[idx],
            });
        }
    }

    Ok(())
}
