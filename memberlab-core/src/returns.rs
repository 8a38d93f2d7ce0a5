//! Return and membership annotation of fetched prices.
//!
//! - Daily returns are close-to-close changes within one ticker's series.
//! - Monthly returns compare the last available close of each calendar
//!   month with the previous month's, after carrying closes forward over
//!   months with no bars.
//! - The membership flag is a direct `(ticker, date)` lookup against either
//!   monthly survivor sets or the daily presence matrix. Anything the lookup
//!   does not know about is "not a member".
//!
//! Returns are fractions (0.01 == 1%).

use crate::data::PriceBatch;
use crate::domain::{Month, MonthlySurvivorRecord, PriceBar, PriceRecord, TickerBars};
use crate::matrix::PresenceMatrix;
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Close-to-close change for each close, `None` for the first.
///
/// Non-finite closes yield `None` and are skipped as a reference: the next
/// finite close is compared with the last finite one.
pub fn daily_returns(closes: &[f64]) -> Vec<Option<f64>> {
    let mut prev: Option<f64> = None;
    closes
        .iter()
        .map(|&close| {
            if !close.is_finite() {
                return None;
            }
            let ret = prev.filter(|p| *p != 0.0).map(|p| close / p - 1.0);
            prev = Some(close);
            ret
        })
        .collect()
}

/// Month-end close and change for one ticker and month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyReturn {
    pub ticker: String,
    pub month: Month,
    /// Last available close of the month, carried from earlier months when the month has no bars.
    pub close: f64,
    pub monthly_return: Option<f64>,
    pub carried: bool,
}

/// Monthly returns from the first to the last month with bars. `bars` must be sorted by date.
pub fn monthly_returns(ticker: &str, bars: &[PriceBar]) -> Vec<MonthlyReturn> {
    let mut last_close: BTreeMap<Month, f64> = BTreeMap::new();
    for bar in bars.iter().filter(|b| b.close.is_finite()) {
        last_close.insert(Month::of(bar.date), bar.close);
    }

    let (Some(first), Some(last)) = (
        last_close.keys().next().copied(),
        last_close.keys().next_back().copied(),
    ) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    let mut prev: Option<f64> = None;
    for month in Month::range_inclusive(first, last) {
        let (close, carried) = match last_close.get(&month) {
            Some(c) => (*c, false),
            // range starts at an observed month, so prev is set here
            None => (prev.unwrap_or(f64::NAN), true),
        };
        let monthly_return = prev.filter(|p| *p != 0.0).map(|p| close / p - 1.0);
        out.push(MonthlyReturn {
            ticker: ticker.to_string(),
            month,
            close,
            monthly_return,
            carried,
        });
        prev = Some(close);
    }
    out
}

/// Monthly returns for every fetched ticker.
pub fn monthly_return_table(batch: &PriceBatch) -> Vec<MonthlyReturn> {
    batch
        .fetched
        .iter()
        .flat_map(|t| monthly_returns(&t.ticker, &t.bars))
        .collect()
}

/// Was `ticker` an index member on `date`?
pub trait MembershipLookup: Send + Sync {
    fn is_member(&self, ticker: &str, date: NaiveDate) -> bool;
}

/// Month -> member tickers, from monthly survivor records.
#[derive(Debug, Clone, Default)]
pub struct MonthlyMembership {
    by_month: HashMap<Month, HashSet<String>>,
}

impl MonthlyMembership {
    pub fn from_records(records: &[MonthlySurvivorRecord]) -> Self {
        Self {
            by_month: records
                .iter()
                .map(|r| (r.month, r.surviving.iter().cloned().collect()))
                .collect(),
        }
    }

    pub fn members(&self, month: Month) -> Option<&HashSet<String>> {
        self.by_month.get(&month)
    }
}

impl MembershipLookup for MonthlyMembership {
    fn is_member(&self, ticker: &str, date: NaiveDate) -> bool {
        self.by_month
            .get(&Month::of(date))
            .is_some_and(|set| set.contains(ticker))
    }
}

/// Membership read from a presence matrix.
///
/// A date between two sampled rows (a day whose lookup failed) takes the
/// nearest earlier row. Dates before the first row and tickers missing from
/// the matrix are not members.
#[derive(Debug, Clone, Copy)]
pub struct PresenceMembership<'a> {
    matrix: &'a PresenceMatrix,
}

impl<'a> PresenceMembership<'a> {
    pub fn new(matrix: &'a PresenceMatrix) -> Self {
        Self { matrix }
    }
}

impl MembershipLookup for PresenceMembership<'_> {
    fn is_member(&self, ticker: &str, date: NaiveDate) -> bool {
        let Some(col) = self.matrix.col_index(ticker) else {
            return false;
        };
        let row = match self.matrix.dates().binary_search(&date) {
            Ok(row) => row,
            Err(0) => return false,
            Err(next) => next - 1,
        };
        self.matrix.value(row, col) == 1
    }
}

/// Annotate one ticker's bars. `bars` must be sorted by date.
pub fn annotate_ticker(series: &TickerBars, lookup: &dyn MembershipLookup) -> Vec<PriceRecord> {
    let closes: Vec<f64> = series.bars.iter().map(|b| b.close).collect();
    let daily = daily_returns(&closes);

    let by_month: HashMap<Month, Option<f64>> = monthly_returns(&series.ticker, &series.bars)
        .into_iter()
        .map(|m| (m.month, m.monthly_return))
        .collect();

    series
        .bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let month = Month::of(bar.date);
            let last_of_month = series
                .bars
                .get(i + 1)
                .map_or(true, |next| Month::of(next.date) != month);
            let monthly_return = if last_of_month {
                by_month.get(&month).copied().flatten()
            } else {
                None
            };

            PriceRecord {
                date: bar.date,
                ticker: series.ticker.clone(),
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
                volume: bar.volume,
                daily_return: daily[i],
                monthly_return,
                is_index_member: lookup.is_member(&series.ticker, bar.date),
            }
        })
        .collect()
}

/// Annotate every fetched ticker; rows are ordered by `(ticker, date)`.
pub fn annotate(batch: &PriceBatch, lookup: &dyn MembershipLookup) -> Vec<PriceRecord> {
    let mut records: Vec<PriceRecord> = batch
        .fetched
        .iter()
        .flat_map(|series| annotate_ticker(series, lookup))
        .collect();
    records.sort_by(|a, b| a.ticker.cmp(&b.ticker).then(a.date.cmp(&b.date)));
    records
}

/// Convert annotated records to a Polars DataFrame.
pub fn records_to_dataframe(records: &[PriceRecord]) -> PolarsResult<DataFrame> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
    let dates: Vec<i32> = records
        .iter()
        .map(|r| (r.date - epoch).num_days() as i32)
        .collect();
    let tickers: Vec<&str> = records.iter().map(|r| r.ticker.as_str()).collect();
    let opens: Vec<f64> = records.iter().map(|r| r.open).collect();
    let highs: Vec<f64> = records.iter().map(|r| r.high).collect();
    let lows: Vec<f64> = records.iter().map(|r| r.low).collect();
    let closes: Vec<f64> = records.iter().map(|r| r.close).collect();
    let volumes: Vec<u64> = records.iter().map(|r| r.volume).collect();
    let daily: Vec<Option<f64>> = records.iter().map(|r| r.daily_return).collect();
    let monthly: Vec<Option<f64>> = records.iter().map(|r| r.monthly_return).collect();
    let member: Vec<bool> = records.iter().map(|r| r.is_index_member).collect();

    DataFrame::new(vec![
        Column::new("date".into(), dates).cast(&DataType::Date)?,
        Column::new("ticker".into(), tickers),
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("volume".into(), volumes),
        Column::new("daily_return".into(), daily),
        Column::new("monthly_return".into(), monthly),
        Column::new("is_index_member".into(), member),
    ])
}
