//! Download orchestrator: fetch several symbols, clean them up and write them
//! to the cache, reporting progress as it goes.

use super::cache::{CoverageResult, ParquetCache};
use super::provider::{DailyClose, DataError, DownloadProgress, PriceProvider};
use chrono::NaiveDate;
use tracing::{info, warn};

/// Outcome of a batch download.
#[derive(Debug, Default)]
pub struct DownloadSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Symbols the provider had nothing for in the window. Counted as succeeded.
    pub empty: Vec<String>,
    pub errors: Vec<(String, DataError)>,
}

impl DownloadSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Download `symbols` over `[start, end)` into `cache`.
///
/// Symbols already fully covered by the cache are skipped unless `force` is
/// set. Once the provider reports itself unavailable (circuit breaker open),
/// the remaining symbols are marked failed without a request.
pub fn download_symbols(
    provider: &dyn PriceProvider,
    cache: &ParquetCache,
    symbols: &[&str],
    start: NaiveDate,
    end: NaiveDate,
    force: bool,
    progress: &dyn DownloadProgress,
) -> DownloadSummary {
    let total = symbols.len();
    let mut summary = DownloadSummary {
        total,
        ..Default::default()
    };

    for (i, symbol) in symbols.iter().enumerate() {
        progress.on_start(symbol, i, total);

        if !force && cache.covers_range(symbol, start, end) == CoverageResult::FullyCovered {
            progress.on_complete(symbol, i, total, &Ok(()));
            summary.succeeded += 1;
            continue;
        }

        let result = download_single(provider, cache, symbol, start, end);
        let rows = result.as_ref().ok().copied();
        let status = result.map(|_| ());
        progress.on_complete(symbol, i, total, &status);

        match (status, rows) {
            (Ok(()), Some(0)) => {
                warn!(symbol, "provider returned no data in window");
                summary.empty.push(symbol.to_string());
                summary.succeeded += 1;
            }
            (Ok(()), _) => summary.succeeded += 1,
            (Err(e), _) => {
                summary.errors.push((symbol.to_string(), e));
                summary.failed += 1;
            }
        }

        if !provider.is_available() {
            for sym in &symbols[(i + 1)..] {
                summary
                    .errors
                    .push((sym.to_string(), DataError::CircuitBreakerTripped));
                summary.failed += 1;
            }
            break;
        }
    }

    progress.on_batch_complete(summary.succeeded, summary.failed, total);
    info!(
        total,
        succeeded = summary.succeeded,
        failed = summary.failed,
        "download finished"
    );
    summary
}

/// Fetch, clean and cache one symbol. Returns the number of rows cached.
fn download_single(
    provider: &dyn PriceProvider,
    cache: &ParquetCache,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<usize, DataError> {
    let fetched = provider.fetch(symbol, start, end)?;
    let closes = sanitize(fetched.closes);
    if closes.is_empty() {
        return Ok(0);
    }
    cache.write(symbol, &closes, provider.name())?;
    Ok(closes.len())
}

/// Drop rows without a finite close, then sort and dedupe by date.
pub fn sanitize(mut closes: Vec<DailyClose>) -> Vec<DailyClose> {
    closes.retain(|c| c.close.is_finite());
    for c in &mut closes {
        if !c.adj_close.is_finite() {
            c.adj_close = c.close;
        }
    }
    closes.sort_by_key(|c| c.date);
    closes.dedup_by_key(|c| c.date);
    closes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::provider::StaticProvider;

    struct Quiet;

    impl DownloadProgress for Quiet {
        fn on_start(&self, _: &str, _: usize, _: usize) {}
        fn on_complete(&self, _: &str, _: usize, _: usize, _: &Result<(), DataError>) {}
        fn on_batch_complete(&self, _: usize, _: usize, _: usize) {}
    }

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    #[test]
    fn downloads_into_cache_and_reports_failures() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        let provider = StaticProvider::new()
            .with_symbol("A", vec![DailyClose::new(d(1, 2), 10.0)])
            .with_symbol("EMPTY", Vec::new());

        let summary = download_symbols(
            &provider,
            &cache,
            &["A", "EMPTY", "MISSING"],
            d(1, 1),
            d(2, 1),
            false,
            &Quiet,
        );

        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.empty, vec!["EMPTY".to_string()]);
        assert!(!summary.all_succeeded());
        assert_eq!(cache.load("A").unwrap().len(), 1);
        assert_eq!(cache.get_meta("A").unwrap().source, "static");
    }

    #[test]
    fn sanitize_drops_nan_and_duplicates() {
        let closes = vec![
            DailyClose::new(d(1, 3), 2.0),
            DailyClose::new(d(1, 2), f64::NAN),
            DailyClose::new(d(1, 3), 3.0),
            DailyClose {
                date: d(1, 4),
                close: 4.0,
                adj_close: f64::NAN,
            },
        ];
        let clean = sanitize(closes);
        assert_eq!(clean.len(), 2);
        assert_eq!(clean[0].close, 2.0);
        assert_eq!(clean[1].adj_close, 4.0);
    }
}
