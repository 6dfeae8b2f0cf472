//! Batch runs: many independent simulations over one price table.
//!
//! Each simulation owns its holdings, so configs are evaluated in parallel
//! with rayon. Results always come back in input order.

use rayon::prelude::*;

use dcalab_core::{run, BacktestError, ContributionSchedule, PriceTable, SimulationConfig};

use crate::summary::DcaSummary;

/// Run every config against `table` in parallel.
///
/// One failing config does not stop the others; its slot holds the error.
pub fn run_batch(
    table: &PriceTable,
    configs: &[SimulationConfig],
) -> Vec<Result<DcaSummary, BacktestError>> {
    configs
        .par_iter()
        .map(|config| run(table, config).map(|r| DcaSummary::from_result(&r, &config.weights)))
        .collect()
}

/// Grid of amounts and schedules to compare on one allocation.
#[derive(Debug, Clone)]
pub struct ContributionGrid {
    pub initial_capitals: Vec<f64>,
    pub contributions: Vec<f64>,
    pub schedules: Vec<ContributionSchedule>,
}

impl ContributionGrid {
    /// Lump sum only versus lump sum plus monthly top-ups of the same size.
    pub fn lump_vs_monthly(amount: f64) -> Self {
        Self {
            initial_capitals: vec![amount],
            contributions: vec![0.0, amount],
            schedules: vec![ContributionSchedule::Monthly],
        }
    }

    pub fn size(&self) -> usize {
        self.initial_capitals.len() * self.contributions.len() * self.schedules.len()
    }

    /// Every combination, keeping the weights of `base`. Order: initial
    /// capital, then contribution, then schedule.
    pub fn generate_configs(&self, base: &SimulationConfig) -> Vec<SimulationConfig> {
        let mut configs = Vec::with_capacity(self.size());
        for &initial in &self.initial_capitals {
            for &contribution in &self.contributions {
                for schedule in &self.schedules {
                    configs.push(SimulationConfig::new(
                        initial,
                        contribution,
                        schedule.clone(),
                        base.weights.clone(),
                    ));
                }
            }
        }
        configs
    }
}
