//! Offline price provider backed by per-symbol CSV files.
//!
//! Layout: `{dir}/{SYMBOL}.csv` with header
//! `date,open,high,low,close,volume[,adj_close]`. A missing `adj_close`
//! column falls back to `close`.

use super::provider::{PriceProvider, ProviderError};
use crate::domain::PriceBar;
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    #[serde(default)]
    adj_close: Option<f64>,
}

pub struct CsvPriceProvider {
    dir: PathBuf,
}

impl CsvPriceProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn symbol_path(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{symbol}.csv"))
    }
}

impl PriceProvider for CsvPriceProvider {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, ProviderError> {
        let path = self.symbol_path(symbol);
        if !path.exists() {
            return Err(ProviderError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }

        let mut rdr = csv::Reader::from_path(&path)?;
        let mut bars = Vec::new();
        for row in rdr.deserialize::<CsvRow>() {
            let row = row?;
            if row.date < start || row.date >= end {
                continue;
            }
            bars.push(PriceBar {
                date: row.date,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                // volumes are sometimes written as floats ("1234.0")
                volume: row.volume.max(0.0) as u64,
                adj_close: row.adj_close.unwrap_or(row.close),
            });
        }
        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_fixture(dir: &Path) {
        std::fs::write(
            dir.join("AAPL.csv"),
            "date,open,high,low,close,volume\n\
             2020-01-02,74.06,75.15,73.80,75.09,135480400\n\
             2020-01-03,74.29,75.14,74.13,74.36,146322800\n\
             2020-01-06,73.45,74.99,73.19,74.95,118387200\n",
        )
        .unwrap();
    }

    #[test]
    fn end_is_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());
        let provider = CsvPriceProvider::new(dir.path());

        let bars = provider
            .fetch(
                "AAPL",
                NaiveDate::from_ymd_opt(2020, 1, 2).unwrap(),
                NaiveDate::from_ymd_opt(2020, 1, 6).unwrap(),
            )
            .unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].close, 74.36);
        assert_eq!(bars[0].adj_close, 75.09);
    }

    #[test]
    fn missing_file_is_symbol_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CsvPriceProvider::new(dir.path());
        let err = provider
            .fetch(
                "NOPE",
                NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2020, 2, 1).unwrap(),
            )
            .unwrap_err();
        assert!(matches!(err, ProviderError::SymbolNotFound { .. }));
    }
}
