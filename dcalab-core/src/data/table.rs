//! Price table resolution: fetch every requested asset from a provider and
//! inner-join the results.
//!
//! Assets with nothing in the window are dropped with a warning. Only when
//! every asset comes back empty does the request fail with `NoDataAvailable`.

use super::align::align_closes;
use super::provider::{DataError, DataSource, PriceField, PriceProvider};
use crate::domain::PriceTable;
use crate::error::BacktestError;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::{debug, warn};

/// An aligned table plus where each column came from.
#[derive(Debug, Clone)]
pub struct ResolvedTable {
    pub table: PriceTable,
    pub sources: BTreeMap<String, DataSource>,
    /// Requested assets with no data in the window.
    pub omitted: Vec<String>,
}

#[derive(Debug, Error)]
pub enum TableError {
    #[error(transparent)]
    Backtest(#[from] BacktestError),

    #[error("failed to fetch '{symbol}': {source}")]
    Fetch {
        symbol: String,
        #[source]
        source: DataError,
    },
}

/// Fetch `assets` over `[start, end)` and align them on common dates.
///
/// Provider transport failures are returned as [`TableError::Fetch`]; an empty
/// answer for one asset is not an error.
pub fn fetch_price_table(
    provider: &dyn PriceProvider,
    assets: &[String],
    start: NaiveDate,
    end: NaiveDate,
    field: PriceField,
) -> Result<ResolvedTable, TableError> {
    if start >= end {
        return Err(BacktestError::InvalidDateRange { start, end }.into());
    }
    if assets.is_empty() {
        return Err(BacktestError::EmptySelection.into());
    }

    let mut series = HashMap::new();
    let mut sources = BTreeMap::new();
    let mut omitted = Vec::new();

    for symbol in assets {
        match provider.fetch(symbol, start, end) {
            Ok(result) if result.closes.is_empty() => {
                warn!(symbol = %symbol, provider = provider.name(), "no data in window, omitting asset");
                omitted.push(symbol.clone());
            }
            Ok(result) => {
                debug!(symbol = %symbol, rows = result.closes.len(), "fetched closes");
                sources.insert(symbol.clone(), result.source);
                series.insert(symbol.clone(), result.closes);
            }
            Err(e) if e.is_empty_result() => {
                warn!(symbol = %symbol, provider = provider.name(), error = %e, "no data, omitting asset");
                omitted.push(symbol.clone());
            }
            Err(source) => {
                return Err(TableError::Fetch {
                    symbol: symbol.clone(),
                    source,
                })
            }
        }
    }

    if series.is_empty() {
        return Err(BacktestError::NoDataAvailable {
            assets: assets.to_vec(),
            start,
            end,
        }
        .into());
    }

    let table = match align_closes(&series, field) {
        Ok(table) => table,
        // Every close was non-finite: same as no data
        Err(BacktestError::EmptyPriceTable) => {
            return Err(BacktestError::NoDataAvailable {
                assets: assets.to_vec(),
                start,
                end,
            }
            .into())
        }
        Err(e) => return Err(e.into()),
    };

    // Columns dropped during alignment for having no finite price
    for symbol in series.keys() {
        if !table.has_asset(symbol) {
            warn!(symbol = %symbol, "no usable prices, omitting asset");
            sources.remove(symbol);
            omitted.push(symbol.clone());
        }
    }
    omitted.sort();

    Ok(ResolvedTable {
        table,
        sources,
        omitted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::provider::{DailyClose, FetchResult, StaticProvider};

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    fn assets(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn provider() -> StaticProvider {
        StaticProvider::new()
            .with_symbol(
                "A",
                vec![
                    DailyClose::new(d(1, 2), 100.0),
                    DailyClose::new(d(1, 3), 110.0),
                    DailyClose::new(d(2, 1), 120.0),
                ],
            )
            .with_symbol(
                "B",
                vec![
                    DailyClose::new(d(1, 3), 50.0),
                    DailyClose::new(d(2, 1), 55.0),
                ],
            )
            .with_symbol("LATE", vec![DailyClose::new(d(6, 3), 1.0)])
    }

    #[test]
    fn rejects_inverted_range() {
        let err = fetch_price_table(&provider(), &assets(&["A"]), d(2, 1), d(1, 1), PriceField::Close)
            .unwrap_err();
        assert!(matches!(
            err,
            TableError::Backtest(BacktestError::InvalidDateRange { .. })
        ));
    }

    #[test]
    fn rejects_empty_selection() {
        let err = fetch_price_table(&provider(), &[], d(1, 1), d(3, 1), PriceField::Close)
            .unwrap_err();
        assert!(matches!(err, TableError::Backtest(BacktestError::EmptySelection)));
    }

    #[test]
    fn inner_joins_and_records_sources() {
        let resolved =
            fetch_price_table(&provider(), &assets(&["A", "B"]), d(1, 1), d(3, 1), PriceField::Close)
                .unwrap();
        assert_eq!(resolved.table.dates(), &[d(1, 3), d(2, 1)]);
        assert_eq!(resolved.sources.get("A"), Some(&DataSource::InMemory));
        assert!(resolved.omitted.is_empty());
    }

    #[test]
    fn omits_assets_without_data() {
        let resolved = fetch_price_table(
            &provider(),
            &assets(&["A", "LATE", "UNKNOWN"]),
            d(1, 1),
            d(3, 1),
            PriceField::Close,
        )
        .unwrap();
        assert_eq!(resolved.table.asset_count(), 1);
        assert_eq!(resolved.omitted, assets(&["LATE", "UNKNOWN"]));
    }

    #[test]
    fn nothing_at_all_is_no_data_available() {
        let err = fetch_price_table(&provider(), &assets(&["LATE"]), d(1, 1), d(3, 1), PriceField::Close)
            .unwrap_err();
        assert!(matches!(
            err,
            TableError::Backtest(BacktestError::NoDataAvailable { .. })
        ));
    }

    #[test]
    fn disjoint_assets_are_empty_after_alignment() {
        let p = StaticProvider::new()
            .with_symbol("X", vec![DailyClose::new(d(1, 2), 1.0)])
            .with_symbol("Y", vec![DailyClose::new(d(1, 3), 1.0)]);
        let err = fetch_price_table(&p, &assets(&["X", "Y"]), d(1, 1), d(3, 1), PriceField::Close)
            .unwrap_err();
        assert!(matches!(
            err,
            TableError::Backtest(BacktestError::EmptyAfterAlignment { .. })
        ));
    }

    struct Offline;

    impl PriceProvider for Offline {
        fn name(&self) -> &str {
            "offline"
        }

        fn fetch(&self, _: &str, _: NaiveDate, _: NaiveDate) -> Result<FetchResult, DataError> {
            Err(DataError::NetworkUnreachable("no route to host".into()))
        }

        fn is_available(&self) -> bool {
            false
        }
    }

    #[test]
    fn transport_failure_is_propagated() {
        let err = fetch_price_table(&Offline, &assets(&["A"]), d(1, 1), d(3, 1), PriceField::Close)
            .unwrap_err();
        assert!(matches!(err, TableError::Fetch { ref symbol, .. } if symbol == "A"));
    }
}
