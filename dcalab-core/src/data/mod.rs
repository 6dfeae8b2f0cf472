//! Price Table Provider: fetching, caching and aligning daily closes.
//!
//! Providers answer per-symbol requests over a half-open `[start, end)`
//! window. [`fetch_price_table`] inner-joins their answers into the
//! [`PriceTable`](crate::domain::PriceTable) the engine consumes.

pub mod align;
pub mod cache;
pub mod circuit_breaker;
pub mod csv_import;
pub mod download;
pub mod provider;
pub mod table;
pub mod yahoo;

pub use align::align_closes;
pub use cache::{CacheMeta, CacheStatus, CoverageResult, ParquetCache};
pub use circuit_breaker::CircuitBreaker;
pub use csv_import::CsvProvider;
pub use download::{download_symbols, DownloadSummary};
pub use provider::{
    DailyClose, DataError, DataSource, DownloadProgress, FetchResult, PriceField, PriceProvider,
    StaticProvider, StdoutProgress,
};
pub use table::{fetch_price_table, ResolvedTable, TableError};
pub use yahoo::YahooProvider;
