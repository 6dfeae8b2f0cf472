//! Error taxonomy for a DCA backtest run.
//!
//! Every variant is terminal for the run that produced it: there is no
//! partial-result or retry path. The caller fixes the input and re-invokes.

use chrono::NaiveDate;
use thiserror::Error;

/// Why a set of allocation weights was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WeightError {
    #[error("no weights given")]
    Empty,

    #[error("missing weight for selected asset '{asset}'")]
    Missing { asset: String },

    #[error("weight given for unselected asset '{asset}'")]
    Extra { asset: String },

    #[error("weight {weight} for '{asset}' is outside (0, 1]")]
    OutOfRange { asset: String, weight: f64 },

    #[error("weights sum to {sum:.4}, expected 1.0 within {tolerance}")]
    SumOutOfTolerance { sum: f64, tolerance: f64 },
}

/// Structured errors for validation, data resolution and simulation.
///
/// These are displayable in CLI contexts as-is.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BacktestError {
    #[error("invalid date range: start {start} must be before end {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("no assets selected")]
    EmptySelection,

    #[error("invalid weights: {0}")]
    InvalidWeights(#[from] WeightError),

    #[error("no data available for [{}] in {start}..{end}", .assets.join(", "))]
    NoDataAvailable {
        assets: Vec<String>,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("no common trading dates across [{}] after alignment", .assets.join(", "))]
    EmptyAfterAlignment { assets: Vec<String> },

    #[error("price table has no dates or no assets")]
    EmptyPriceTable,

    #[error("invalid price table: {0}")]
    InvalidPriceTable(String),

    #[error("non-positive price {price} for '{asset}' on {date}")]
    NonPositivePrice {
        asset: String,
        date: NaiveDate,
        price: f64,
    },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),
}

impl BacktestError {
    /// Short machine-friendly name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidDateRange { .. } => "invalid_date_range",
            Self::EmptySelection => "empty_selection",
            Self::InvalidWeights(_) => "invalid_weights",
            Self::NoDataAvailable { .. } => "no_data_available",
            Self::EmptyAfterAlignment { .. } => "empty_after_alignment",
            Self::EmptyPriceTable => "empty_price_table",
            Self::InvalidPriceTable(_) => "invalid_price_table",
            Self::NonPositivePrice { .. } => "non_positive_price",
            Self::InvalidAmount(_) => "invalid_amount",
        }
    }
}
