//! DCA Lab Core: domain types, contribution schedule, backtest engine and
//! price table providers.
//!
//! - Domain types (price table, weights, holdings, series, snapshots)
//! - Contribution schedule evaluated over the table's trading dates
//! - Pure DCA engine: initial lump purchase plus scheduled contributions,
//!   no rebalancing
//! - Caller-held selection form with pure validation
//! - Providers (Yahoo, CSV), Parquet cache and inner-join alignment

pub mod catalog;
pub mod data;
pub mod domain;
pub mod engine;
pub mod error;
pub mod form;
pub mod schedule;

pub use domain::{AllocationWeights, Holdings, PortfolioSnapshot, PriceTable, TimeSeries};
pub use engine::{run, SimulationConfig, SimulationResult};
pub use error::{BacktestError, WeightError};
pub use schedule::ContributionSchedule;
