//! Date × asset grid of closing prices, the engine's only market input.

use crate::error::BacktestError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aligned closing prices for a basket of assets.
///
/// Invariants (enforced by [`PriceTable::new`], deserialization included):
/// - at least one date and one asset
/// - dates strictly increasing
/// - every asset column has exactly one finite price per date
///
/// Assets with no data for the window are absent, never NaN-filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPriceTable")]
pub struct PriceTable {
    dates: Vec<NaiveDate>,
    columns: BTreeMap<String, Vec<f64>>,
}

/// Wire shape of [`PriceTable`], validated on the way in.
#[derive(Deserialize)]
struct RawPriceTable {
    dates: Vec<NaiveDate>,
    columns: BTreeMap<String, Vec<f64>>,
}

impl TryFrom<RawPriceTable> for PriceTable {
    type Error = BacktestError;

    fn try_from(raw: RawPriceTable) -> Result<Self, Self::Error> {
        Self::new(raw.dates, raw.columns)
    }
}

impl PriceTable {
    pub fn new(
        dates: Vec<NaiveDate>,
        columns: BTreeMap<String, Vec<f64>>,
    ) -> Result<Self, BacktestError> {
        if dates.is_empty() || columns.is_empty() {
            return Err(BacktestError::EmptyPriceTable);
        }

        if let Some(pair) = dates.windows(2).find(|w| w[0] >= w[1]) {
            return Err(BacktestError::InvalidPriceTable(format!(
                "dates not strictly increasing at {} -> {}",
                pair[0], pair[1]
            )));
        }

        for (asset, prices) in &columns {
            if prices.len() != dates.len() {
                return Err(BacktestError::InvalidPriceTable(format!(
                    "column '{asset}' has {} prices for {} dates",
                    prices.len(),
                    dates.len()
                )));
            }
            if let Some(i) = prices.iter().position(|p| !p.is_finite()) {
                return Err(BacktestError::InvalidPriceTable(format!(
                    "column '{asset}' has a missing price on {}",
                    dates[i]
                )));
            }
        }

        Ok(Self { dates, columns })
    }

    /// Build a table from `(date, price)` rows per asset that are already aligned.
    ///
    /// Convenience for tests and fixtures; every asset must list the same dates.
    pub fn from_rows(rows: &[(NaiveDate, &[(&str, f64)])]) -> Result<Self, BacktestError> {
        let dates: Vec<NaiveDate> = rows.iter().map(|(d, _)| *d).collect();
        let mut columns: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for (_, cells) in rows {
            for (asset, price) in cells.iter() {
                columns.entry(asset.to_string()).or_default().push(*price);
            }
        }
        Self::new(dates, columns)
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Asset identifiers in sorted order.
    pub fn assets(&self) -> impl Iterator<Item = &str> + '_ {
        self.columns.keys().map(|s| s.as_str())
    }

    pub fn asset_count(&self) -> usize {
        self.columns.len()
    }

    pub fn has_asset(&self, asset: &str) -> bool {
        self.columns.contains_key(asset)
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn first_date(&self) -> NaiveDate {
        self.dates[0]
    }

    pub fn last_date(&self) -> NaiveDate {
        self.dates[self.dates.len() - 1]
    }

    /// Full price column for one asset.
    pub fn column(&self, asset: &str) -> Option<&[f64]> {
        self.columns.get(asset).map(|v| v.as_slice())
    }

    /// Price of `asset` at row `idx`.
    pub fn price(&self, asset: &str, idx: usize) -> Option<f64> {
        self.columns.get(asset).and_then(|col| col.get(idx)).copied()
    }

    /// Every `(asset, price)` cell at row `idx`, in asset order.
    pub fn row(&self, idx: usize) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.columns
            .iter()
            .filter_map(move |(asset, col)| col.get(idx).map(|p| (asset.as_str(), *p)))
    }

    /// Row index for an exact date.
    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        self.dates.binary_search(&date).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn builds_from_aligned_rows() {
        let table = PriceTable::from_rows(&[
            (d(2), &[("A", 100.0), ("B", 50.0)]),
            (d(3), &[("A", 200.0), ("B", 50.0)]),
        ])
        .unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.assets().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(table.price("A", 1), Some(200.0));
        assert_eq!(table.first_date(), d(2));
        assert_eq!(table.last_date(), d(3));
        assert_eq!(table.index_of(d(3)), Some(1));
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(
            PriceTable::new(vec![], BTreeMap::new()),
            Err(BacktestError::EmptyPriceTable)
        );
        assert_eq!(
            PriceTable::new(vec![d(2)], BTreeMap::new()),
            Err(BacktestError::EmptyPriceTable)
        );
    }

    #[test]
    fn rejects_unsorted_or_duplicate_dates() {
        let mut cols = BTreeMap::new();
        cols.insert("A".to_string(), vec![1.0, 2.0]);
        assert!(matches!(
            PriceTable::new(vec![d(3), d(2)], cols.clone()),
            Err(BacktestError::InvalidPriceTable(_))
        ));
        assert!(matches!(
            PriceTable::new(vec![d(2), d(2)], cols),
            Err(BacktestError::InvalidPriceTable(_))
        ));
    }

    #[test]
    fn rejects_ragged_or_missing_cells() {
        let mut ragged = BTreeMap::new();
        ragged.insert("A".to_string(), vec![1.0]);
        assert!(PriceTable::new(vec![d(2), d(3)], ragged).is_err());

        let mut holes = BTreeMap::new();
        holes.insert("A".to_string(), vec![1.0, f64::NAN]);
        let err = PriceTable::new(vec![d(2), d(3)], holes).unwrap_err();
        assert!(err.to_string().contains("2024-01-03"));
    }

    #[test]
    fn deserialization_enforces_invariants() {
        let unsorted = r#"{"dates":["2024-01-03","2024-01-02","2024-01-04"],"columns":{"A":[1.0,2.0,3.0]}}"#;
        let err = serde_json::from_str::<PriceTable>(unsorted).unwrap_err();
        assert!(err.to_string().contains("not strictly increasing"));

        let ragged = r#"{"dates":["2024-01-02","2024-01-03"],"columns":{"A":[1.0]}}"#;
        assert!(serde_json::from_str::<PriceTable>(ragged).is_err());

        let sorted = r#"{"dates":["2024-01-02","2024-01-03"],"columns":{"A":[1.0,2.0]}}"#;
        let table: PriceTable = serde_json::from_str(sorted).unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn nan_price_is_rejected_on_deserialization() {
        let err = toml::from_str::<PriceTable>(
            r#"
dates = ["2024-01-02", "2024-01-03"]

[columns]
A = [100.0, nan]
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("missing price on 2024-01-03"));
    }
}
