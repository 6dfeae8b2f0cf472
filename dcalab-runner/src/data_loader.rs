//! Price table loading for the runner.
//!
//! Resolves every requested asset over `[start, end)` with this fallback
//! policy:
//! 1. Cached closes covering the window → use them
//! 2. Not cached and a provider is reachable → download, cache, use
//! 3. Download impossible and `synthetic` set → generate a tagged random walk
//! 4. Otherwise → fail with a clear error
//!
//! A provider that answers with an empty window is not a failure: the asset
//! is omitted from the table, exactly as the price table contract requires.
//! The surviving series are then inner-joined on date.

use chrono::{Datelike, NaiveDate};
use dcalab_core::data::download::sanitize;
use dcalab_core::data::{
    align_closes, CoverageResult, DailyClose, DataError, DataSource, DownloadProgress,
    ParquetCache, PriceField, PriceProvider,
};
use dcalab_core::{BacktestError, PriceTable};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(
        "no cached data for '{symbol}' and no network access (use --synthetic for synthetic data)"
    )]
    NoCachedDataOffline { symbol: String },

    #[error("no cached data for '{symbol}' and download failed: {reason}")]
    DownloadFailed { symbol: String, reason: String },

    #[error(transparent)]
    Backtest(#[from] BacktestError),

    #[error("data error: {0}")]
    Data(#[from] DataError),
}

impl LoadError {
    /// The backtest error kind behind this failure, if any.
    pub fn backtest_kind(&self) -> Option<&'static str> {
        match self {
            Self::Backtest(e) => Some(e.kind()),
            _ => None,
        }
    }
}

/// How the loader may obtain data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Never make network requests.
    pub offline: bool,
    /// Generate synthetic closes when real data cannot be obtained.
    pub synthetic: bool,
    /// Re-download even if the cache covers the window.
    pub force: bool,
}

/// Aligned prices plus provenance.
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub table: PriceTable,
    pub sources: BTreeMap<String, DataSource>,
    /// Requested assets with no data in the window.
    pub omitted: Vec<String>,
    /// BLAKE3 over the aligned table.
    pub dataset_hash: String,
    pub has_synthetic: bool,
}

/// Load and align closes for `assets` over `[start, end)`.
#[allow(clippy::too_many_arguments)]
pub fn load_price_table(
    assets: &[String],
    start: NaiveDate,
    end: NaiveDate,
    field: PriceField,
    cache: &ParquetCache,
    provider: Option<&dyn PriceProvider>,
    progress: Option<&dyn DownloadProgress>,
    opts: &LoadOptions,
) -> Result<LoadedTable, LoadError> {
    if start >= end {
        return Err(BacktestError::InvalidDateRange { start, end }.into());
    }
    if assets.is_empty() {
        return Err(BacktestError::EmptySelection.into());
    }

    let total = assets.len();
    let mut series: HashMap<String, Vec<DailyClose>> = HashMap::new();
    let mut sources: BTreeMap<String, DataSource> = BTreeMap::new();
    let mut omitted = Vec::new();
    let mut has_synthetic = false;

    for (i, symbol) in assets.iter().enumerate() {
        // Step 1: cache
        if !opts.force {
            if let Some(closes) = from_cache(cache, symbol, start, end, provider, opts) {
                debug!(symbol = %symbol, rows = closes.len(), "loaded from cache");
                if let Some(p) = progress {
                    p.on_start(symbol, i, total);
                    p.on_complete(symbol, i, total, &Ok(()));
                }
                series.insert(symbol.clone(), closes);
                sources.insert(symbol.clone(), DataSource::Cache);
                continue;
            }
        }

        // Step 2: download
        let mut failure = None;
        if !opts.offline {
            match provider {
                Some(prov) if prov.is_available() => {
                    if let Some(p) = progress {
                        p.on_start(symbol, i, total);
                    }
                    let fetched = prov.fetch(symbol, start, end);
                    let status = fetched.as_ref().map(|_| ()).map_err(clone_for_progress);
                    if let Some(p) = progress {
                        p.on_complete(symbol, i, total, &status);
                    }
                    match fetched {
                        Ok(result) => {
                            let closes = sanitize(result.closes);
                            if closes.is_empty() {
                                warn!(symbol = %symbol, "no data in window, omitting asset");
                                omitted.push(symbol.clone());
                                continue;
                            }
                            cache.write(symbol, &closes, prov.name())?;
                            series.insert(symbol.clone(), closes);
                            sources.insert(symbol.clone(), result.source);
                            continue;
                        }
                        Err(e) if e.is_empty_result() => {
                            warn!(symbol = %symbol, error = %e, "no data, omitting asset");
                            omitted.push(symbol.clone());
                            continue;
                        }
                        Err(e) => failure = Some(e.to_string()),
                    }
                }
                Some(prov) => failure = Some(format!("{} is unavailable", prov.name())),
                None => failure = Some("no data provider configured".into()),
            }
        }

        // Step 3: synthetic fallback
        if opts.synthetic {
            warn!(symbol = %symbol, "generating synthetic data; results will be tagged as synthetic");
            let closes = generate_synthetic_closes(symbol, start, end);
            series.insert(symbol.clone(), closes);
            sources.insert(symbol.clone(), DataSource::Synthetic);
            has_synthetic = true;
            continue;
        }

        // Step 4: fail
        if opts.offline {
            return Err(LoadError::NoCachedDataOffline {
                symbol: symbol.clone(),
            });
        }
        return Err(LoadError::DownloadFailed {
            symbol: symbol.clone(),
            reason: failure.unwrap_or_else(|| "data not cached and download failed".into()),
        });
    }

    if let Some(p) = progress {
        p.on_batch_complete(series.len(), omitted.len(), total);
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

    for symbol in series.keys() {
        if !table.has_asset(symbol) {
            sources.remove(symbol);
            omitted.push(symbol.clone());
        }
    }
    omitted.sort();

    let dataset_hash = compute_dataset_hash(&table);
    info!(
        assets = table.asset_count(),
        dates = table.len(),
        omitted = omitted.len(),
        synthetic = has_synthetic,
        "price table ready"
    );

    Ok(LoadedTable {
        table,
        sources,
        omitted,
        dataset_hash,
        has_synthetic,
    })
}

/// Cached closes for the window, if the cache is good enough to use.
///
/// A partially covered window is only accepted when no download can
/// complete it.
fn from_cache(
    cache: &ParquetCache,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
    provider: Option<&dyn PriceProvider>,
    opts: &LoadOptions,
) -> Option<Vec<DailyClose>> {
    let can_download = !opts.offline && provider.is_some_and(|p| p.is_available());
    match cache.covers_range(symbol, start, end) {
        CoverageResult::NotCached => return None,
        CoverageResult::PartiallyCovered { .. } if can_download => return None,
        _ => {}
    }
    cache
        .load_range(symbol, start, end)
        .ok()
        .filter(|closes| !closes.is_empty())
}

/// `DataError` is not `Clone`; progress reporting only needs its message.
fn clone_for_progress(e: &DataError) -> DataError {
    DataError::Other(e.to_string())
}

/// Deterministic BLAKE3 hash over the aligned table.
///
/// Assets are visited in the table's sorted order, so the hash does not depend
/// on fetch order.
pub fn compute_dataset_hash(table: &PriceTable) -> String {
    let mut hasher = blake3::Hasher::new();
    for date in table.dates() {
        hasher.update(date.to_string().as_bytes());
    }
    for asset in table.assets() {
        hasher.update(asset.as_bytes());
        for price in table.column(asset).unwrap_or_default() {
            hasher.update(&price.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}

/// Random-walk closes for development without network access.
///
/// Seeded from the symbol name, so the same symbol and window always give
/// the same series. Weekends are skipped.
pub fn generate_synthetic_closes(symbol: &str, start: NaiveDate, end: NaiveDate) -> Vec<DailyClose> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let mut closes = Vec::new();
    let mut price = 100.0_f64;
    let mut current = start;

    while current < end {
        let weekday = current.weekday();
        if weekday != chrono::Weekday::Sat && weekday != chrono::Weekday::Sun {
            let daily_return: f64 = rng.gen_range(-0.03..0.03);
            price *= 1.0 + daily_return;
            closes.push(DailyClose::new(current, price));
        }
        current += chrono::Duration::days(1);
    }

    closes
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcalab_core::data::StaticProvider;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn sample_closes() -> Vec<DailyClose> {
        vec![
            DailyClose::new(d(1, 2), 101.0),
            DailyClose::new(d(1, 3), 102.0),
            DailyClose::new(d(1, 4), 103.0),
        ]
    }

    fn offline() -> LoadOptions {
        LoadOptions {
            offline: true,
            ..Default::default()
        }
    }

    #[test]
    fn load_from_cache_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        cache.write("SPY", &sample_closes(), "test").unwrap();

        let loaded = load_price_table(
            &names(&["SPY"]),
            d(1, 1),
            d(1, 5),
            PriceField::Close,
            &cache,
            None,
            None,
            &offline(),
        )
        .unwrap();

        assert_eq!(loaded.table.len(), 3);
        assert_eq!(loaded.sources["SPY"], DataSource::Cache);
        assert!(!loaded.has_synthetic);
        assert_eq!(loaded.dataset_hash.len(), 64);
    }

    #[test]
    fn offline_no_cache_fails_without_synthetic() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());

        let err = load_price_table(
            &names(&["SPY"]),
            d(1, 1),
            d(12, 31),
            PriceField::Close,
            &cache,
            None,
            None,
            &offline(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("no cached data"));
    }

    #[test]
    fn download_writes_through_to_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        let provider = StaticProvider::new().with_symbol("BTC-USD", sample_closes());

        let loaded = load_price_table(
            &names(&["BTC-USD"]),
            d(1, 1),
            d(1, 5),
            PriceField::Close,
            &cache,
            Some(&provider),
            None,
            &LoadOptions::default(),
        )
        .unwrap();

        assert_eq!(loaded.sources["BTC-USD"], DataSource::InMemory);
        assert_eq!(cache.load("BTC-USD").unwrap().len(), 3);
    }

    #[test]
    fn empty_provider_answer_omits_asset() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        let provider = StaticProvider::new()
            .with_symbol("BTC-USD", sample_closes())
            .with_symbol("NEW-USD", Vec::new());

        let loaded = load_price_table(
            &names(&["BTC-USD", "NEW-USD", "GONE-USD"]),
            d(1, 1),
            d(1, 5),
            PriceField::Close,
            &cache,
            Some(&provider),
            None,
            &LoadOptions::default(),
        )
        .unwrap();

        assert_eq!(loaded.table.asset_count(), 1);
        assert_eq!(loaded.omitted, names(&["GONE-USD", "NEW-USD"]));
    }

    #[test]
    fn all_assets_empty_is_no_data_available() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        let provider = StaticProvider::new().with_symbol("BTC-USD", sample_closes());

        let err = load_price_table(
            &names(&["BTC-USD"]),
            d(6, 1),
            d(7, 1),
            PriceField::Close,
            &cache,
            Some(&provider),
            None,
            &LoadOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.backtest_kind(), Some("no_data_available"));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        let err = load_price_table(
            &names(&["BTC-USD"]),
            d(2, 1),
            d(1, 1),
            PriceField::Close,
            &cache,
            None,
            None,
            &offline(),
        )
        .unwrap_err();
        assert_eq!(err.backtest_kind(), Some("invalid_date_range"));
    }

    #[test]
    fn synthetic_fallback_produces_tagged_data() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        let opts = LoadOptions {
            offline: true,
            synthetic: true,
            force: false,
        };

        let loaded = load_price_table(
            &names(&["FAKE"]),
            d(1, 1),
            d(4, 1),
            PriceField::Close,
            &cache,
            None,
            None,
            &opts,
        )
        .unwrap();

        assert!(loaded.has_synthetic);
        assert_eq!(loaded.sources["FAKE"], DataSource::Synthetic);
        assert!(!loaded.table.is_empty());
    }

    #[test]
    fn synthetic_data_is_deterministic_and_weekday_only() {
        let a = generate_synthetic_closes("BTC-USD", d(1, 1), d(2, 1));
        let b = generate_synthetic_closes("BTC-USD", d(1, 1), d(2, 1));
        let other = generate_synthetic_closes("ETH-USD", d(1, 1), d(2, 1));

        assert_eq!(a, b);
        assert_eq!(a.len(), 23);
        assert_ne!(a[0].close, other[0].close);
        assert!(a.iter().all(|c| c.date.weekday().num_days_from_monday() < 5));
        assert!(a.iter().all(|c| c.date < d(2, 1)));
    }

    #[test]
    fn dataset_hash_is_deterministic() {
        let table = PriceTable::from_rows(&[(d(1, 2), &[("A", 1.0), ("B", 2.0)])]).unwrap();
        let same = PriceTable::from_rows(&[(d(1, 2), &[("B", 2.0), ("A", 1.0)])]).unwrap();
        let moved = PriceTable::from_rows(&[(d(1, 2), &[("A", 1.5), ("B", 2.0)])]).unwrap();
        assert_eq!(compute_dataset_hash(&table), compute_dataset_hash(&same));
        assert_ne!(compute_dataset_hash(&table), compute_dataset_hash(&moved));
    }
}
