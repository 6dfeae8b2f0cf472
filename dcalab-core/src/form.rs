//! Caller-held selection form: date window, chosen assets, weights in percent.
//!
//! The form is plain state owned by whoever drives the UI (CLI, TUI, web).
//! Changing the selection prunes weights of assets that were dropped, so a
//! stale weight can never leak into a later run. [`SelectionForm::validate`]
//! is pure and turns the form into a [`BacktestRequest`] or the first
//! validation error.

use crate::domain::AllocationWeights;
use crate::error::{BacktestError, WeightError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Validated input for one backtest: window, assets, weights as fractions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestRequest {
    pub start: NaiveDate,
    /// Exclusive end of the window.
    pub end: NaiveDate,
    pub assets: Vec<String>,
    pub weights: AllocationWeights,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionForm {
    pub start: NaiveDate,
    pub end: NaiveDate,
    selected: Vec<String>,
    weights_pct: BTreeMap<String, f64>,
}

impl SelectionForm {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start,
            end,
            selected: Vec::new(),
            weights_pct: BTreeMap::new(),
        }
    }

    /// 2021-01-01 to 2024-12-31, BTC 35% / XMR 35% / SOL 30%.
    pub fn default_crypto() -> Self {
        let mut form = Self::new(
            NaiveDate::from_ymd_opt(2021, 1, 1).unwrap_or_default(),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap_or_default(),
        );
        form.select(["BTC-USD", "XMR-USD", "SOL-USD"]);
        form.set_weight("BTC-USD", 35.0);
        form.set_weight("XMR-USD", 35.0);
        form.set_weight("SOL-USD", 30.0);
        form
    }

    /// Replace the selection. Weights for assets no longer selected are
    /// dropped; newly selected assets without a weight get an equal-share
    /// suggestion (100 / n, two decimals).
    pub fn select<I, S>(&mut self, assets: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut selected: Vec<String> = Vec::new();
        for asset in assets {
            let asset = asset.into();
            if !selected.contains(&asset) {
                selected.push(asset);
            }
        }

        self.weights_pct.retain(|asset, _| selected.contains(asset));

        if !selected.is_empty() {
            let suggestion = (10_000.0 / selected.len() as f64).round() / 100.0;
            for asset in &selected {
                self.weights_pct.entry(asset.clone()).or_insert(suggestion);
            }
        }

        self.selected = selected;
    }

    /// Set the weight (percent) for a selected asset. Returns false if the
    /// asset is not part of the current selection.
    pub fn set_weight(&mut self, asset: &str, pct: f64) -> bool {
        if !self.selected.iter().any(|a| a == asset) {
            return false;
        }
        self.weights_pct.insert(asset.to_string(), pct);
        true
    }

    /// Clear the weight field of an asset, leaving it selected.
    /// Returns false if there was no weight to clear.
    pub fn clear_weight(&mut self, asset: &str) -> bool {
        self.weights_pct.remove(asset).is_some()
    }

    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    pub fn weight(&self, asset: &str) -> Option<f64> {
        self.weights_pct.get(asset).copied()
    }

    /// Sum of the entered percentages.
    pub fn total_pct(&self) -> f64 {
        self.weights_pct.values().sum()
    }

    /// Check the form and produce a request.
    ///
    /// Order of checks: date range, empty selection, weight keys against the
    /// selection, weight sum. Key mismatches arise from cleared fields or
    /// from a form restored with serde.
    pub fn validate(&self) -> Result<BacktestRequest, BacktestError> {
        if self.start >= self.end {
            return Err(BacktestError::InvalidDateRange {
                start: self.start,
                end: self.end,
            });
        }
        if self.selected.is_empty() {
            return Err(BacktestError::EmptySelection);
        }
        for asset in &self.selected {
            if !self.weights_pct.contains_key(asset) {
                return Err(WeightError::Missing {
                    asset: asset.clone(),
                }
                .into());
            }
        }
        if let Some(extra) = self
            .weights_pct
            .keys()
            .find(|a| !self.selected.contains(a))
        {
            return Err(WeightError::Extra {
                asset: extra.clone(),
            }
            .into());
        }

        let weights = AllocationWeights::from_percentages(
            self.weights_pct.iter().map(|(a, p)| (a.clone(), *p)),
        )?;

        Ok(BacktestRequest {
            start: self.start,
            end: self.end,
            assets: self.selected.clone(),
            weights,
        })
    }
}
