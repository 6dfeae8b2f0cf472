//! TOML run configuration.
//!
//! ```toml
//! [simulation]
//! start = "2021-01-01"
//! end = "2024-12-31"            # exclusive
//! initial_capital = 3000.0
//! recurring_contribution = 3000.0
//! schedule = { type = "monthly" }
//! price_field = "close"
//!
//! [allocation]                  # percentages
//! "BTC-USD" = 35.0
//! "XMR-USD" = 35.0
//! "SOL-USD" = 30.0
//! ```

use chrono::NaiveDate;
use dcalab_core::data::PriceField;
use dcalab_core::form::{BacktestRequest, SelectionForm};
use dcalab_core::{AllocationWeights, BacktestError, ContributionSchedule, SimulationConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Content-addressable id of a run configuration.
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(#[from] BacktestError),
}

/// A complete DCA run description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcaConfig {
    pub simulation: SimulationSection,
    /// Asset → weight in percent.
    pub allocation: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSection {
    pub start: NaiveDate,
    /// Exclusive end of the price window.
    pub end: NaiveDate,
    pub initial_capital: f64,
    pub recurring_contribution: f64,
    #[serde(default)]
    pub price_field: PriceField,
    /// Scale the allocation by its own sum instead of requiring it to add
    /// up to 100.
    #[serde(default)]
    pub normalize_weights: bool,
    #[serde(default)]
    pub schedule: ContributionSchedule,
}

impl DcaConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// 3000 up front, 3000 per month into BTC 35% / XMR 35% / SOL 30%,
    /// 2021 through 2024.
    pub fn default_crypto() -> Self {
        let form = SelectionForm::default_crypto();
        let allocation = form
            .selected()
            .iter()
            .filter_map(|a| form.weight(a).map(|w| (a.clone(), w)))
            .collect();
        Self {
            simulation: SimulationSection {
                start: form.start,
                end: form.end,
                initial_capital: 3_000.0,
                recurring_contribution: 3_000.0,
                price_field: PriceField::Close,
                normalize_weights: false,
                schedule: ContributionSchedule::Monthly,
            },
            allocation,
        }
    }

    /// Assets in the allocation, sorted.
    pub fn assets(&self) -> Vec<String> {
        self.allocation.keys().cloned().collect()
    }

    /// Allocation as entered or, with `normalize_weights`, rescaled to sum to 100.
    fn percentages(&self) -> Result<BTreeMap<String, f64>, BacktestError> {
        if !self.simulation.normalize_weights {
            return Ok(self.allocation.clone());
        }
        let weights = AllocationWeights::normalized(
            self.allocation.iter().map(|(a, w)| (a.clone(), *w)),
        )?;
        Ok(weights.iter().map(|(a, w)| (a.to_string(), w * 100.0)).collect())
    }

    /// Run the allocation through the selection form: date range, selection
    /// and weight checks, in that order.
    pub fn to_request(&self) -> Result<BacktestRequest, ConfigError> {
        let mut form = SelectionForm::new(self.simulation.start, self.simulation.end);
        form.select(self.allocation.keys().cloned());
        for (asset, pct) in self.percentages()? {
            form.set_weight(&asset, pct);
        }
        Ok(form.validate()?)
    }

    /// Engine parameters for this run. Validates the whole config first.
    pub fn to_simulation_config(&self) -> Result<SimulationConfig, ConfigError> {
        let request = self.to_request()?;
        let config = SimulationConfig::new(
            self.simulation.initial_capital,
            self.simulation.recurring_contribution,
            self.simulation.schedule.clone(),
            request.weights,
        );
        config.validate()?;
        Ok(config)
    }

    /// Same config, same id: BLAKE3 over the JSON form.
    pub fn run_id(&self) -> RunId {
        // Plain data with string keys; JSON serialization cannot fail
        let json = serde_json::to_vec(self).unwrap_or_default();
        blake3::hash(&json).to_hex().to_string()
    }
}
