//! Target allocation weights.
//!
//! Weights are fixed for the whole run. Every purchase (initial and recurring)
//! splits its amount across assets by exactly these fractions.

use crate::error::WeightError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tolerance on `sum(weights) == 1.0`.
pub const WEIGHT_TOLERANCE: f64 = 1e-3;

/// Mapping from asset identifier to a fraction in (0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllocationWeights {
    weights: BTreeMap<String, f64>,
}

impl AllocationWeights {
    /// Weights given as fractions. Each must lie in (0, 1] and the sum must be
    /// within [`WEIGHT_TOLERANCE`] of 1.0.
    pub fn from_fractions<I, S>(pairs: I) -> Result<Self, WeightError>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let weights: BTreeMap<String, f64> =
            pairs.into_iter().map(|(a, w)| (a.into(), w)).collect();
        let w = Self { weights };
        w.check_ranges()?;
        w.check_sum()?;
        Ok(w)
    }

    /// Weights given as percentages (35.0 == 35%). The sum must be 100 within
    /// the same relative tolerance.
    pub fn from_percentages<I, S>(pairs: I) -> Result<Self, WeightError>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self::from_fractions(pairs.into_iter().map(|(a, p)| (a, p / 100.0)))
    }

    /// Any positive numbers, scaled so they sum to 1.0.
    ///
    /// `{BTC: 35, XMR: 35, SOL: 30}` and `{BTC: 7, XMR: 7, SOL: 6}` yield
    /// the same weights.
    pub fn normalized<I, S>(pairs: I) -> Result<Self, WeightError>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let raw: BTreeMap<String, f64> = pairs.into_iter().map(|(a, w)| (a.into(), w)).collect();
        if raw.is_empty() {
            return Err(WeightError::Empty);
        }
        for (asset, w) in &raw {
            if !w.is_finite() || *w <= 0.0 {
                return Err(WeightError::OutOfRange {
                    asset: asset.clone(),
                    weight: *w,
                });
            }
        }
        let total: f64 = raw.values().sum();
        let weights = raw.into_iter().map(|(a, w)| (a, w / total)).collect();
        Ok(Self { weights })
    }

    /// Check these weights against the assets actually present in a price table:
    /// exact key match, each weight in range, sum within tolerance.
    pub fn validate_for<'a, I>(&self, assets: I) -> Result<(), WeightError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let assets: Vec<&str> = assets.into_iter().collect();
        for asset in &assets {
            if !self.weights.contains_key(*asset) {
                return Err(WeightError::Missing {
                    asset: asset.to_string(),
                });
            }
        }
        if let Some(extra) = self.weights.keys().find(|k| !assets.contains(&k.as_str())) {
            return Err(WeightError::Extra {
                asset: extra.clone(),
            });
        }
        self.check_ranges()?;
        self.check_sum()
    }

    pub fn get(&self, asset: &str) -> Option<f64> {
        self.weights.get(asset).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.weights.iter().map(|(a, w)| (a.as_str(), *w))
    }

    pub fn assets(&self) -> impl Iterator<Item = &str> + '_ {
        self.weights.keys().map(|a| a.as_str())
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn sum(&self) -> f64 {
        self.weights.values().sum()
    }

    fn check_ranges(&self) -> Result<(), WeightError> {
        if self.weights.is_empty() {
            return Err(WeightError::Empty);
        }
        for (asset, w) in &self.weights {
            if !w.is_finite() || *w <= 0.0 || *w > 1.0 {
                return Err(WeightError::OutOfRange {
                    asset: asset.clone(),
                    weight: *w,
                });
            }
        }
        Ok(())
    }

    fn check_sum(&self) -> Result<(), WeightError> {
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(WeightError::SumOutOfTolerance {
                sum,
                tolerance: WEIGHT_TOLERANCE,
            });
        }
        Ok(())
    }
}
