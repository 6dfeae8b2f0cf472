//! Price provider trait and structured error types.
//!
//! The PriceProvider trait abstracts over data sources (Yahoo Finance, CSV
//! files) so the price-table builder can swap implementations and tests can
//! use in-memory fakes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One daily close from a provider, before alignment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyClose {
    pub date: NaiveDate,
    pub close: f64,
    /// Split/dividend adjusted close. Equal to `close` when the source has no
    /// adjustment data.
    pub adj_close: f64,
}

impl DailyClose {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            close,
            adj_close: close,
        }
    }

    /// The price selected by `field`.
    pub fn price(&self, field: PriceField) -> f64 {
        match field {
            PriceField::Close => self.close,
            PriceField::AdjClose => self.adj_close,
        }
    }
}

/// Which close feeds the price table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceField {
    #[default]
    Close,
    AdjClose,
}

/// Failures while fetching, importing or caching closes.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("could not reach price provider: {0}")]
    NetworkUnreachable(String),

    #[error("provider is throttling requests; retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("unexpected provider response: {0}")]
    ResponseFormatChanged(String),

    #[error("provider has no prices for {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("provider refused further requests; waiting out the cooldown")]
    CircuitBreakerTripped,

    #[error("price cache: {0}")]
    CacheError(String),

    #[error("parquet file: {0}")]
    ParquetError(String),

    #[error("csv file: {0}")]
    CsvError(String),

    #[error("no cached data for symbol '{symbol}'; run `download {symbol}` first")]
    NoCachedData { symbol: String },

    #[error("{0}")]
    Other(String),
}

impl DataError {
    /// True when the provider simply has nothing for the symbol/window,
    /// as opposed to a transport or format failure.
    pub fn is_empty_result(&self) -> bool {
        matches!(
            self,
            Self::SymbolNotFound { .. } | Self::NoCachedData { .. }
        )
    }
}

/// Result of a successful fetch for a single symbol.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub symbol: String,
    pub closes: Vec<DailyClose>,
    pub source: DataSource,
}

/// Provenance of a series, reported per asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    YahooFinance,
    CsvImport,
    Cache,
    Synthetic,
    InMemory,
}

/// Trait for price providers.
///
/// The window is half-open: `start` inclusive, `end` exclusive. An empty
/// `closes` vector is a valid answer meaning "no data in this window".
pub trait PriceProvider: Send + Sync {
    /// Short name recorded in cache metadata.
    fn name(&self) -> &str;

    /// Fetch daily closes for a symbol over `[start, end)`.
    fn fetch(&self, symbol: &str, start: NaiveDate, end: NaiveDate)
        -> Result<FetchResult, DataError>;

    /// False while the provider is refusing requests.
    fn is_available(&self) -> bool;
}

/// Per-symbol progress for loads and downloads that touch several assets.
pub trait DownloadProgress: Send {
    fn on_start(&self, symbol: &str, index: usize, total: usize);

    fn on_complete(&self, symbol: &str, index: usize, total: usize, result: &Result<(), DataError>);

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Progress reporter that prints to stdout.
pub struct StdoutProgress;

impl DownloadProgress for StdoutProgress {
    fn on_start(&self, symbol: &str, index: usize, total: usize) {
        println!("({}/{total}) {symbol}", index + 1);
    }

    fn on_complete(
        &self,
        symbol: &str,
        _index: usize,
        _total: usize,
        result: &Result<(), DataError>,
    ) {
        match result {
            Ok(()) => println!("    ok"),
            Err(e) => println!("    {symbol} failed: {e}"),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        println!("{succeeded}/{total} ready, {failed} not loaded");
    }
}

/// In-memory provider serving fixed closes. Used by tests and offline demos.
#[derive(Debug, Default, Clone)]
pub struct StaticProvider {
    closes: std::collections::HashMap<String, Vec<DailyClose>>,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_symbol(mut self, symbol: &str, closes: Vec<DailyClose>) -> Self {
        self.closes.insert(symbol.to_string(), closes);
        self
    }
}

impl PriceProvider for StaticProvider {
    fn name(&self) -> &str {
        "static"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        let closes = self
            .closes
            .get(symbol)
            .ok_or_else(|| DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            })?
            .iter()
            .filter(|c| c.date >= start && c.date < end)
            .copied()
            .collect();
        Ok(FetchResult {
            symbol: symbol.to_string(),
            closes,
            source: DataSource::InMemory,
        })
    }

    fn is_available(&self) -> bool {
        true
    }
}
