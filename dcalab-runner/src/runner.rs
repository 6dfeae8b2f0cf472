//! DCA runner: wires configuration, data loading, the engine and the summary.
//!
//! Two entry points:
//! - `run_dca()`: loads the price table (cache/download/synthetic), then runs. Used by the CLI.
//! - `run_dca_on_table()`: takes an already-resolved table, no I/O. Used by batch runs and tests.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use dcalab_core::data::{DataSource, DownloadProgress, ParquetCache, PriceProvider};
use dcalab_core::{run, BacktestError, PriceTable, SimulationResult};

use crate::config::{ConfigError, DcaConfig, RunId};
use crate::data_loader::{compute_dataset_hash, load_price_table, LoadError, LoadOptions};
use crate::summary::DcaSummary;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("simulation error: {0}")]
    Simulation(#[from] BacktestError),
}

impl RunError {
    /// The backtest error kind behind this failure, if any.
    pub fn backtest_kind(&self) -> Option<&'static str> {
        match self {
            Self::Config(ConfigError::Invalid(e)) | Self::Simulation(e) => Some(e.kind()),
            Self::Data(e) => e.backtest_kind(),
            Self::Config(_) => None,
        }
    }
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Everything produced by one DCA run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DcaReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub config: DcaConfig,
    pub summary: DcaSummary,
    pub result: SimulationResult,
    pub dataset_hash: String,
    pub has_synthetic: bool,
    #[serde(default)]
    pub sources: BTreeMap<String, DataSource>,
    /// Assets dropped for having no data in the window.
    #[serde(default)]
    pub omitted: Vec<String>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Load prices for the configured assets, then run.
pub fn run_dca(
    config: &DcaConfig,
    cache: &ParquetCache,
    provider: Option<&dyn PriceProvider>,
    progress: Option<&dyn DownloadProgress>,
    opts: &LoadOptions,
) -> Result<DcaReport, RunError> {
    // Reject bad input before touching the network
    let request = config.to_request()?;
    let loaded = load_price_table(
        &request.assets,
        request.start,
        request.end,
        config.simulation.price_field,
        cache,
        provider,
        progress,
        opts,
    )?;

    let mut report = run_dca_on_table(config, &loaded.table)?;
    report.dataset_hash = loaded.dataset_hash;
    report.has_synthetic = loaded.has_synthetic;
    report.sources = loaded.sources;
    report.omitted = loaded.omitted;
    Ok(report)
}

/// Run on a resolved table. No I/O.
pub fn run_dca_on_table(config: &DcaConfig, table: &PriceTable) -> Result<DcaReport, RunError> {
    let sim = config.to_simulation_config()?;
    let result = run(table, &sim)?;
    let summary = DcaSummary::from_result(&result, &sim.weights);

    info!(
        run_id = %config.run_id(),
        final_value = summary.final_value,
        invested = summary.total_invested,
        "DCA run complete"
    );

    Ok(DcaReport {
        schema_version: SCHEMA_VERSION,
        run_id: config.run_id(),
        config: config.clone(),
        summary,
        result,
        dataset_hash: compute_dataset_hash(table),
        has_synthetic: false,
        sources: BTreeMap::new(),
        omitted: Vec::new(),
    })
}
