//! Simulation parameters.

use crate::domain::AllocationWeights;
use crate::error::BacktestError;
use crate::schedule::ContributionSchedule;
use serde::{Deserialize, Serialize};

/// Everything the engine needs besides the price table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Lump sum invested on the first date of the table.
    pub initial_capital: f64,
    /// Amount invested on every contribution date.
    pub recurring_contribution: f64,
    #[serde(default)]
    pub schedule: ContributionSchedule,
    pub weights: AllocationWeights,
}

impl SimulationConfig {
    pub fn new(
        initial_capital: f64,
        recurring_contribution: f64,
        schedule: ContributionSchedule,
        weights: AllocationWeights,
    ) -> Self {
        Self {
            initial_capital,
            recurring_contribution,
            schedule,
            weights,
        }
    }

    /// Check the amounts: initial capital positive, contribution non-negative.
    pub fn validate(&self) -> Result<(), BacktestError> {
        if !self.initial_capital.is_finite() || self.initial_capital <= 0.0 {
            return Err(BacktestError::InvalidAmount(format!(
                "initial capital must be positive, got {}",
                self.initial_capital
            )));
        }
        if !self.recurring_contribution.is_finite() || self.recurring_contribution < 0.0 {
            return Err(BacktestError::InvalidAmount(format!(
                "recurring contribution must be non-negative, got {}",
                self.recurring_contribution
            )));
        }
        Ok(())
    }
}
