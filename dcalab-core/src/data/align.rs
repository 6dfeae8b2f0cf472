//! Multi-asset date alignment.
//!
//! Per-asset close series are inner-joined on date: a row survives only if
//! every asset has a finite price for it. Nothing is forward-filled.

use super::provider::{DailyClose, PriceField};
use crate::domain::PriceTable;
use crate::error::BacktestError;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Inner-join close series into a [`PriceTable`].
///
/// Assets whose series is empty (or has no finite price) are left out of the
/// table entirely. With no usable asset at all the result is
/// `EmptyPriceTable`; with usable assets but no shared date it is
/// `EmptyAfterAlignment`.
pub fn align_closes(
    series: &HashMap<String, Vec<DailyClose>>,
    field: PriceField,
) -> Result<PriceTable, BacktestError> {
    let per_asset: BTreeMap<&str, BTreeMap<NaiveDate, f64>> = series
        .iter()
        .map(|(asset, closes)| {
            let by_date: BTreeMap<NaiveDate, f64> = closes
                .iter()
                .map(|c| (c.date, c.price(field)))
                .filter(|(_, p)| p.is_finite())
                .collect();
            (asset.as_str(), by_date)
        })
        .filter(|(_, by_date)| !by_date.is_empty())
        .collect();

    let mut iter = per_asset.values();
    let Some(first) = iter.next() else {
        return Err(BacktestError::EmptyPriceTable);
    };

    let mut common: BTreeSet<NaiveDate> = first.keys().copied().collect();
    for by_date in iter {
        common.retain(|d| by_date.contains_key(d));
    }

    if common.is_empty() {
        return Err(BacktestError::EmptyAfterAlignment {
            assets: per_asset.keys().map(|a| a.to_string()).collect(),
        });
    }

    let dates: Vec<NaiveDate> = common.into_iter().collect();
    let columns = per_asset
        .iter()
        .map(|(asset, by_date)| {
            let prices = dates.iter().filter_map(|d| by_date.get(d).copied()).collect();
            (asset.to_string(), prices)
        })
        .collect();

    PriceTable::new(dates, columns)
}
