//! Parquet cache of daily closes with Hive-style partitioning.
//!
//! Layout: `{cache_dir}/symbol={SYMBOL}/{year}.parquet` plus a `meta.json`
//! sidecar per symbol.
//!
//! - Writes are atomic (write `.tmp`, then rename)
//! - Loads validate schema and row count
//! - Corrupt files are renamed to `{file}.quarantined` and skipped

use super::provider::{DailyClose, DataError};
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Metadata sidecar for a cached symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMeta {
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub row_count: usize,
    pub data_hash: String,
    pub source: String,
    pub cached_at: chrono::NaiveDateTime,
}

/// Cache status for a single symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatus {
    pub symbol: String,
    pub cached: bool,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub row_count: Option<usize>,
}

/// How well the cache covers a requested window.
#[derive(Debug, Clone, PartialEq)]
pub enum CoverageResult {
    NotCached,
    FullyCovered,
    PartiallyCovered {
        cached_start: NaiveDate,
        cached_end: NaiveDate,
    },
}

/// Calendar days a cached range may fall short of a requested bound.
const COVERAGE_SLACK_DAYS: i64 = 7;

pub struct ParquetCache {
    cache_dir: PathBuf,
}

impl ParquetCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn symbol_dir(&self, symbol: &str) -> PathBuf {
        self.cache_dir.join(format!("symbol={symbol}"))
    }

    fn year_path(&self, symbol: &str, year: i32) -> PathBuf {
        self.symbol_dir(symbol).join(format!("{year}.parquet"))
    }

    fn meta_path(&self, symbol: &str) -> PathBuf {
        self.symbol_dir(symbol).join("meta.json")
    }

    /// Write closes for a symbol, one Parquet file per calendar year.
    ///
    /// New closes are merged into what is already cached, replacing rows
    /// on the same date. When the new window neither overlaps nor touches
    /// the cached range (within a week) the old rows are dropped, so the
    /// metadata range never spans a hole.
    pub fn write(&self, symbol: &str, closes: &[DailyClose], source: &str) -> Result<(), DataError> {
        let (Some(first), Some(last)) = (closes.first(), closes.last()) else {
            return Err(DataError::CacheError("no closes to cache".into()));
        };

        let sym_dir = self.symbol_dir(symbol);
        fs::create_dir_all(&sym_dir)
            .map_err(|e| DataError::CacheError(format!("failed to create dir: {e}")))?;

        let mut merged: BTreeMap<NaiveDate, DailyClose> = BTreeMap::new();
        let slack = chrono::Duration::days(COVERAGE_SLACK_DAYS);
        match self.get_meta(symbol) {
            Some(meta) if first.date <= meta.end_date + slack && last.date + slack >= meta.start_date => {
                if let Ok(existing) = self.load(symbol) {
                    merged.extend(existing.into_iter().map(|c| (c.date, c)));
                }
            }
            Some(_) => {
                debug!(symbol, "new window is disjoint from cache, replacing");
                self.remove_partitions(symbol)?;
            }
            None => {}
        }
        merged.extend(closes.iter().map(|c| (c.date, *c)));

        let mut by_year: BTreeMap<i32, Vec<&DailyClose>> = BTreeMap::new();
        for c in merged.values() {
            by_year.entry(c.date.year()).or_default().push(c);
        }

        for (year, year_closes) in &by_year {
            let df = closes_to_dataframe(year_closes)?;
            let path = self.year_path(symbol, *year);
            let tmp_path = path.with_extension("parquet.tmp");

            write_parquet(&df, &tmp_path)?;
            fs::rename(&tmp_path, &path).map_err(|e| {
                let _ = fs::remove_file(&tmp_path);
                DataError::CacheError(format!("atomic rename failed: {e}"))
            })?;
        }

        let all: Vec<DailyClose> = merged.into_values().collect();
        let (Some(start), Some(end)) = (all.first(), all.last()) else {
            return Err(DataError::CacheError("no closes to cache".into()));
        };
        let meta = CacheMeta {
            symbol: symbol.to_string(),
            start_date: start.date,
            end_date: end.date,
            row_count: all.len(),
            data_hash: blake3::hash(
                &serde_json::to_vec(&all)
                    .map_err(|e| DataError::CacheError(format!("hash serialization: {e}")))?,
            )
            .to_hex()
            .to_string(),
            source: source.to_string(),
            cached_at: chrono::Local::now().naive_local(),
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::CacheError(format!("meta serialization: {e}")))?;
        fs::write(self.meta_path(symbol), meta_json)
            .map_err(|e| DataError::CacheError(format!("meta write: {e}")))?;

        debug!(symbol, new_rows = closes.len(), rows = all.len(), "cached closes");
        Ok(())
    }

    fn remove_partitions(&self, symbol: &str) -> Result<(), DataError> {
        let entries = fs::read_dir(self.symbol_dir(symbol))
            .map_err(|e| DataError::CacheError(format!("read dir: {e}")))?;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("parquet") {
                fs::remove_file(&path)
                    .map_err(|e| DataError::CacheError(format!("remove partition: {e}")))?;
            }
        }
        Ok(())
    }

    /// Load every cached close for a symbol, sorted by date.
    pub fn load(&self, symbol: &str) -> Result<Vec<DailyClose>, DataError> {
        let sym_dir = self.symbol_dir(symbol);
        if !sym_dir.exists() {
            return Err(DataError::NoCachedData {
                symbol: symbol.to_string(),
            });
        }

        let entries =
            fs::read_dir(&sym_dir).map_err(|e| DataError::CacheError(format!("read dir: {e}")))?;

        let mut all = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| DataError::CacheError(format!("dir entry: {e}")))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("parquet") {
                continue;
            }

            match load_and_validate_parquet(&path) {
                Ok(closes) => all.extend(closes),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "quarantining corrupt cache file");
                    let _ = fs::rename(&path, path.with_extension("parquet.quarantined"));
                }
            }
        }

        if all.is_empty() {
            return Err(DataError::NoCachedData {
                symbol: symbol.to_string(),
            });
        }

        all.sort_by_key(|c| c.date);
        all.dedup_by_key(|c| c.date);
        Ok(all)
    }

    /// Cached closes for a symbol within `[start, end)`.
    pub fn load_range(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyClose>, DataError> {
        Ok(self
            .load(symbol)?
            .into_iter()
            .filter(|c| c.date >= start && c.date < end)
            .collect())
    }

    pub fn get_meta(&self, symbol: &str) -> Option<CacheMeta> {
        let content = fs::read_to_string(self.meta_path(symbol)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Every symbol with a cache directory, sorted.
    pub fn symbols(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.cache_dir) else {
            return Vec::new();
        };
        let mut symbols: Vec<String> = entries
            .flatten()
            .filter_map(|e| {
                e.file_name()
                    .to_str()
                    .and_then(|n| n.strip_prefix("symbol="))
                    .map(str::to_string)
            })
            .collect();
        symbols.sort();
        symbols
    }

    pub fn status(&self, symbols: &[&str]) -> Vec<CacheStatus> {
        symbols
            .iter()
            .map(|sym| {
                let meta = self.get_meta(sym);
                CacheStatus {
                    symbol: sym.to_string(),
                    cached: meta.is_some(),
                    start_date: meta.as_ref().map(|m| m.start_date),
                    end_date: meta.as_ref().map(|m| m.end_date),
                    row_count: meta.as_ref().map(|m| m.row_count),
                }
            })
            .collect()
    }

    /// Whether the cache covers `[start, end)`.
    ///
    /// The first and last trading days of a window may sit a few days
    /// inside it (weekends, holidays), so both cached bounds only have to
    /// reach within a week of the requested ones.
    pub fn covers_range(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> CoverageResult {
        match self.get_meta(symbol) {
            None => CoverageResult::NotCached,
            Some(meta) => {
                let slack = chrono::Duration::days(COVERAGE_SLACK_DAYS);
                if meta.start_date <= start + slack && meta.end_date >= end - slack {
                    CoverageResult::FullyCovered
                } else {
                    CoverageResult::PartiallyCovered {
                        cached_start: meta.start_date,
                        cached_end: meta.end_date,
                    }
                }
            }
        }
    }
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

/// 1970-01-01, the zero point of Polars' `Date` type.
fn epoch() -> NaiveDate {
    NaiveDate::default()
}

fn closes_to_dataframe(closes: &[&DailyClose]) -> Result<DataFrame, DataError> {
    let dates: Vec<i32> = closes
        .iter()
        .map(|c| (c.date - epoch()).num_days() as i32)
        .collect();
    let close: Vec<f64> = closes.iter().map(|c| c.close).collect();
    let adj_close: Vec<f64> = closes.iter().map(|c| c.adj_close).collect();

    DataFrame::new(vec![
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| DataError::ParquetError(format!("date cast: {e}")))?,
        Column::new("close".into(), close),
        Column::new("adj_close".into(), adj_close),
    ])
    .map_err(|e| DataError::ParquetError(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &DataFrame, path: &Path) -> Result<(), DataError> {
    let file =
        fs::File::create(path).map_err(|e| DataError::ParquetError(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))?;
    Ok(())
}

fn load_and_validate_parquet(path: &Path) -> Result<Vec<DailyClose>, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::ParquetError(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::ParquetError(format!("read: {e}")))?;

    if df.height() == 0 {
        return Err(DataError::CacheError("empty parquet file".into()));
    }

    let col_err = |name: &str, e: PolarsError| DataError::ParquetError(format!("{name}: {e}"));
    let dates = df
        .column("date")
        .and_then(|c| c.date().cloned())
        .map_err(|e| col_err("date", e))?;
    let close = df
        .column("close")
        .and_then(|c| c.f64().cloned())
        .map_err(|e| col_err("close", e))?;
    let adj_close = df
        .column("adj_close")
        .and_then(|c| c.f64().cloned())
        .map_err(|e| col_err("adj_close", e))?;

    let mut out = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let days = dates
            .get(i)
            .ok_or_else(|| DataError::ParquetError(format!("null date at row {i}")))?;
        let Some(c) = close.get(i) else {
            continue;
        };
        out.push(DailyClose {
            date: epoch() + chrono::Duration::days(days as i64),
            close: c,
            adj_close: adj_close.get(i).unwrap_or(c),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn sample() -> Vec<DailyClose> {
        vec![
            DailyClose::new(d(2023, 12, 29), 42_000.0),
            DailyClose {
                date: d(2024, 1, 2),
                close: 45_000.0,
                adj_close: 44_900.0,
            },
            DailyClose::new(d(2024, 1, 3), 43_000.0),
        ]
    }

    #[test]
    fn write_and_load_across_year_partitions() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        cache.write("BTC-USD", &sample(), "test").unwrap();

        assert!(dir.path().join("symbol=BTC-USD/2023.parquet").exists());
        assert!(dir.path().join("symbol=BTC-USD/2024.parquet").exists());

        let loaded = cache.load("BTC-USD").unwrap();
        assert_eq!(loaded, sample());
    }

    #[test]
    fn load_range_is_half_open() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        cache.write("BTC-USD", &sample(), "test").unwrap();

        let loaded = cache
            .load_range("BTC-USD", d(2024, 1, 1), d(2024, 1, 3))
            .unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].date, d(2024, 1, 2));
    }

    #[test]
    fn missing_symbol_is_no_cached_data() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        assert!(matches!(
            cache.load("NOPE"),
            Err(DataError::NoCachedData { .. })
        ));
    }

    #[test]
    fn meta_and_status() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        cache.write("BTC-USD", &sample(), "yahoo_finance").unwrap();

        let meta = cache.get_meta("BTC-USD").unwrap();
        assert_eq!(meta.row_count, 3);
        assert_eq!(meta.start_date, d(2023, 12, 29));
        assert_eq!(meta.source, "yahoo_finance");

        let status = cache.status(&["BTC-USD", "ETH-USD"]);
        assert!(status[0].cached);
        assert!(!status[1].cached);
        assert_eq!(cache.symbols(), vec!["BTC-USD".to_string()]);
    }

    #[test]
    fn coverage_check() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        cache.write("BTC-USD", &sample(), "test").unwrap();

        assert_eq!(
            cache.covers_range("BTC-USD", d(2023, 12, 29), d(2024, 1, 4)),
            CoverageResult::FullyCovered
        );
        assert!(matches!(
            cache.covers_range("BTC-USD", d(2023, 1, 1), d(2024, 1, 4)),
            CoverageResult::PartiallyCovered { .. }
        ));
        assert_eq!(
            cache.covers_range("ETH-USD", d(2023, 1, 1), d(2024, 1, 4)),
            CoverageResult::NotCached
        );
    }

    #[test]
    fn coverage_allows_non_trading_days_at_window_start() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        // 2021-01-04 is the first trading day of the year
        let closes: Vec<DailyClose> = (0..20)
            .map(|i| DailyClose::new(d(2021, 1, 4) + chrono::Duration::days(i), 100.0))
            .collect();
        cache.write("SPY", &closes, "test").unwrap();

        assert_eq!(
            cache.covers_range("SPY", d(2021, 1, 1), d(2021, 1, 24)),
            CoverageResult::FullyCovered
        );
        assert!(matches!(
            cache.covers_range("SPY", d(2020, 12, 20), d(2021, 1, 24)),
            CoverageResult::PartiallyCovered { .. }
        ));
    }

    fn daily(from: NaiveDate, to: NaiveDate, price: f64) -> Vec<DailyClose> {
        from.iter_days()
            .take_while(|day| *day < to)
            .map(|day| DailyClose::new(day, price))
            .collect()
    }

    #[test]
    fn overlapping_write_keeps_previously_cached_rows() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());

        // GIVEN: all of 2022 cached
        cache
            .write("BTC-USD", &daily(d(2022, 1, 1), d(2023, 1, 1), 100.0), "test")
            .unwrap();

        // WHEN: a window reaching back into 2021 overlaps the start of 2022
        cache
            .write("BTC-USD", &daily(d(2021, 6, 1), d(2022, 3, 1), 200.0), "test")
            .unwrap();

        // THEN: the rest of 2022 survives and the metadata spans the union
        let in_2022 = cache
            .load_range("BTC-USD", d(2022, 1, 1), d(2023, 1, 1))
            .unwrap();
        assert_eq!(in_2022.len(), 365);
        assert_eq!(in_2022[0].close, 200.0);
        assert_eq!(in_2022.last().unwrap().close, 100.0);

        let meta = cache.get_meta("BTC-USD").unwrap();
        assert_eq!(meta.start_date, d(2021, 6, 1));
        assert_eq!(meta.end_date, d(2022, 12, 31));
        assert_eq!(meta.row_count, cache.load("BTC-USD").unwrap().len());
        assert_eq!(
            cache.covers_range("BTC-USD", d(2021, 6, 1), d(2023, 1, 1)),
            CoverageResult::FullyCovered
        );
    }

    #[test]
    fn disjoint_write_replaces_cached_rows() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        cache
            .write("BTC-USD", &daily(d(2020, 1, 1), d(2020, 3, 1), 100.0), "test")
            .unwrap();
        cache
            .write("BTC-USD", &daily(d(2022, 1, 1), d(2022, 2, 1), 200.0), "test")
            .unwrap();

        let meta = cache.get_meta("BTC-USD").unwrap();
        assert_eq!(meta.start_date, d(2022, 1, 1));
        assert_eq!(meta.row_count, 31);
        assert!(!dir.path().join("symbol=BTC-USD/2020.parquet").exists());
    }

    #[test]
    fn corrupt_file_is_quarantined() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        cache.write("BTC-USD", &sample(), "test").unwrap();
        let bad = dir.path().join("symbol=BTC-USD/2023.parquet");
        std::fs::write(&bad, b"not parquet").unwrap();

        let loaded = cache.load("BTC-USD").unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(dir
            .path()
            .join("symbol=BTC-USD/2023.parquet.quarantined")
            .exists());
    }
}
