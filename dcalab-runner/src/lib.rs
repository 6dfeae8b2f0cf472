//! DcaLab Runner: DCA run orchestration on top of `dcalab-core`.
//!
//! This crate provides:
//! - TOML run configuration with a deterministic run id
//! - Data loading with cache/download/synthetic fallback
//! - Single-run reports and headline summaries
//! - Parallel batch runs over one price table
//! - Artifact export (JSON manifest, CSV series, Markdown report)

pub mod batch;
pub mod config;
pub mod data_loader;
pub mod export;
pub mod runner;
pub mod summary;

pub use batch::{run_batch, ContributionGrid};
pub use config::{ConfigError, DcaConfig, RunId, SimulationSection};
pub use data_loader::{load_price_table, LoadError, LoadOptions, LoadedTable};
pub use export::{load_artifacts, save_artifacts};
pub use runner::{run_dca, run_dca_on_table, DcaReport, RunError, SCHEMA_VERSION};
pub use summary::{AssetSummary, DcaSummary};
