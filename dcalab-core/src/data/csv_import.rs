//! CSV import provider.
//!
//! Reads `{dir}/{SYMBOL}.csv` with a header row. Required columns are
//! `date` (YYYY-MM-DD) and `close`; `adj_close` is optional. Rows with an
//! empty close are skipped.

use super::provider::{DailyClose, DataError, DataSource, FetchResult, PriceProvider};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: NaiveDate,
    close: Option<f64>,
    #[serde(default)]
    adj_close: Option<f64>,
}

pub struct CsvProvider {
    dir: PathBuf,
}

impl CsvProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{symbol}.csv"))
    }

    /// Parse every row of a CSV file, sorted by date.
    pub fn read_file(path: &Path) -> Result<Vec<DailyClose>, DataError> {
        let mut reader = csv::Reader::from_path(path)
            .map_err(|e| DataError::CsvError(format!("{}: {e}", path.display())))?;

        let mut closes = Vec::new();
        for (line, row) in reader.deserialize::<CsvRow>().enumerate() {
            let row = row.map_err(|e| {
                DataError::CsvError(format!("{} row {}: {e}", path.display(), line + 2))
            })?;
            let Some(close) = row.close else {
                continue;
            };
            closes.push(DailyClose {
                date: row.date,
                close,
                adj_close: row.adj_close.unwrap_or(close),
            });
        }

        closes.sort_by_key(|c| c.date);
        closes.dedup_by_key(|c| c.date);
        Ok(closes)
    }
}

impl PriceProvider for CsvProvider {
    fn name(&self) -> &str {
        "csv_import"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        let path = self.path_for(symbol);
        if !path.exists() {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }

        let closes = Self::read_file(&path)?
            .into_iter()
            .filter(|c| c.date >= start && c.date < end)
            .collect();

        Ok(FetchResult {
            symbol: symbol.to_string(),
            closes,
            source: DataSource::CsvImport,
        })
    }

    fn is_available(&self) -> bool {
        self.dir.is_dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    #[test]
    fn reads_window_from_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("BTC-USD.csv"),
            "date,close,adj_close\n2024-01-03,101.0,100.0\n2024-01-02,100.0,\n2024-01-04,,\n2024-02-01,110.0,110.0\n",
        )
        .unwrap();

        let provider = CsvProvider::new(dir.path());
        let result = provider.fetch("BTC-USD", d(1, 1), d(2, 1)).unwrap();

        assert_eq!(result.source, DataSource::CsvImport);
        assert_eq!(result.closes.len(), 2);
        assert_eq!(result.closes[0].date, d(1, 2));
        assert_eq!(result.closes[0].adj_close, 100.0);
        assert_eq!(result.closes[1].adj_close, 100.0);
    }

    #[test]
    fn close_only_files_are_accepted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("A.csv"), "date,close\n2024-01-02,5.5\n").unwrap();
        let closes = CsvProvider::read_file(&dir.path().join("A.csv")).unwrap();
        assert_eq!(closes, vec![DailyClose::new(d(1, 2), 5.5)]);
    }

    #[test]
    fn missing_file_is_symbol_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CsvProvider::new(dir.path());
        let err = provider.fetch("NOPE", d(1, 1), d(2, 1)).unwrap_err();
        assert!(err.is_empty_result());
    }

    #[test]
    fn malformed_row_reports_line() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("A.csv"), "date,close\nnot-a-date,1.0\n").unwrap();
        let err = CsvProvider::read_file(&dir.path().join("A.csv")).unwrap_err();
        assert!(err.to_string().contains("row 2"));
    }
}
