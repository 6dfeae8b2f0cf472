//! Backtest engine: DCA simulation over an aligned price table.
//!
//! The engine consumes a [`PriceTable`](crate::domain::PriceTable) and a
//! [`SimulationConfig`] and produces three date-indexed series: total
//! portfolio value, cumulative amount invested, and per-asset value/return.
//! There is no rebalancing, no selling, and no fee or tax model.

pub mod config;
pub mod result;
pub mod simulate;

pub use config::SimulationConfig;
pub use result::SimulationResult;
pub use simulate::run;
