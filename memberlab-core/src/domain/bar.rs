//! Price bars and the annotated output record.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily OHLCV bar as returned by a price provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub adj_close: f64,
}

impl PriceBar {
    /// Returns true if any OHLC field is NaN (the provider sent a partial row).
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }
}

/// Bars for one ticker, sorted by date.
#[derive(Debug, Clone, PartialEq)]
pub struct TickerBars {
    pub ticker: String,
    pub bars: Vec<PriceBar>,
}

impl TickerBars {
    pub fn new(ticker: impl Into<String>, mut bars: Vec<PriceBar>) -> Self {
        bars.sort_by_key(|b| b.date);
        bars.dedup_by_key(|b| b.date);
        Self {
            ticker: ticker.into(),
            bars,
        }
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }
}

/// One row of the annotated price dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub date: NaiveDate,
    pub ticker: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    /// Close-to-close change from the previous trading day; `None` on the first row.
    pub daily_return: Option<f64>,
    /// Set on the last trading row of each month; `None` elsewhere.
    pub monthly_return: Option<f64>,
    pub is_index_member: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(day: u32, close: f64) -> PriceBar {
        PriceBar {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1_000,
            adj_close: close,
        }
    }

    #[test]
    fn ticker_bars_sorted_and_deduped() {
        let tb = TickerBars::new("SPY", vec![bar(4, 3.0), bar(2, 1.0), bar(4, 9.0), bar(3, 2.0)]);
        let days: Vec<u32> = tb.bars.iter().map(|b| chrono::Datelike::day(&b.date)).collect();
        assert_eq!(days, vec![2, 3, 4]);
        assert_eq!(tb.first_date(), Some(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()));
        assert_eq!(tb.last_date(), Some(NaiveDate::from_ymd_opt(2024, 1, 4).unwrap()));
    }

    #[test]
    fn void_bar_detection() {
        let mut b = bar(2, 10.0);
        assert!(!b.is_void());
        b.close = f64::NAN;
        assert!(b.is_void());
    }
}
