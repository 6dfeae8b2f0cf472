//! Domain types for DCA simulation.

pub mod holdings;
pub mod price_table;
pub mod series;
pub mod snapshot;
pub mod weights;

pub use holdings::Holdings;
pub use price_table::PriceTable;
pub use series::TimeSeries;
pub use snapshot::PortfolioSnapshot;
pub use weights::{AllocationWeights, WEIGHT_TOLERANCE};
