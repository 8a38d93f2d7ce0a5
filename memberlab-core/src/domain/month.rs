//! Calendar month key used by every per-month structure.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A calendar month, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Month {
    year: i32,
    month: u32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MonthError {
    #[error("month out of range: {0}")]
    OutOfRange(u32),

    #[error("year out of range: {0}")]
    YearOutOfRange(i32),

    #[error("invalid month '{0}' (expected YYYY-MM)")]
    Parse(String),
}

impl Month {
    pub fn new(year: i32, month: u32) -> Result<Self, MonthError> {
        if !(1..=12).contains(&month) {
            return Err(MonthError::OutOfRange(month));
        }
        // one year of margin keeps next()/prev() of any valid month representable
        if year <= NaiveDate::MIN.year() || year >= NaiveDate::MAX.year() {
            return Err(MonthError::YearOutOfRange(year));
        }
        Ok(Self { year, month })
    }

    /// The month containing `date`.
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> NaiveDate {
        // Month::new and Month::of only produce years chrono can represent
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(&self) -> NaiveDate {
        self.next()
            .first_day()
            .pred_opt()
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn prev(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        Self::of(date) == *self
    }

    /// Every month from `first` through `last`, inclusive. Empty if `last < first`.
    pub fn range_inclusive(first: Month, last: Month) -> Vec<Month> {
        let mut months = Vec::new();
        let mut current = first;
        while current <= last {
            months.push(current);
            current = current.next();
        }
        months
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Month {
    type Err = MonthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (y, m) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| MonthError::Parse(s.to_string()))?;
        let year = y.parse().map_err(|_| MonthError::Parse(s.to_string()))?;
        let month = m.parse().map_err(|_| MonthError::Parse(s.to_string()))?;
        Self::new(year, month)
    }
}

impl TryFrom<String> for Month {
    type Error = MonthError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Month> for String {
    fn from(value: Month) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn month_boundaries() {
        let feb = Month::new(2020, 2).unwrap();
        assert_eq!(feb.first_day(), d(2020, 2, 1));
        assert_eq!(feb.last_day(), d(2020, 2, 29)); // leap year
        assert_eq!(Month::new(2021, 2).unwrap().last_day(), d(2021, 2, 28));
    }

    #[test]
    fn december_rolls_over() {
        let dec = Month::new(2019, 12).unwrap();
        assert_eq!(dec.next(), Month::new(2020, 1).unwrap());
        assert_eq!(dec.last_day(), d(2019, 12, 31));
        assert_eq!(Month::new(2020, 1).unwrap().prev(), dec);
    }

    #[test]
    fn range_is_inclusive() {
        let months = Month::range_inclusive(
            Month::new(2019, 11).unwrap(),
            Month::new(2020, 2).unwrap(),
        );
        let labels: Vec<String> = months.iter().map(|m| m.to_string()).collect();
        assert_eq!(labels, vec!["2019-11", "2019-12", "2020-01", "2020-02"]);
    }

    #[test]
    fn empty_range_when_reversed() {
        let months = Month::range_inclusive(
            Month::new(2020, 2).unwrap(),
            Month::new(2020, 1).unwrap(),
        );
        assert!(months.is_empty());
    }

    #[test]
    fn parse_and_display() {
        let m: Month = "2013-07".parse().unwrap();
        assert_eq!(m, Month::new(2013, 7).unwrap());
        assert_eq!(m.to_string(), "2013-07");
        assert!("2013-13".parse::<Month>().is_err());
        assert!("201307".parse::<Month>().is_err());
    }

    #[test]
    fn years_outside_chrono_range_are_rejected() {
        assert_eq!(
            Month::new(i32::MAX, 1),
            Err(MonthError::YearOutOfRange(i32::MAX))
        );
        assert!(Month::new(NaiveDate::MAX.year(), 1).is_err());
        let edge = Month::new(NaiveDate::MAX.year() - 1, 12).unwrap();
        assert_eq!(edge.next().first_day().year(), NaiveDate::MAX.year());
        assert!("999999-01".parse::<Month>().is_err());
    }

    #[test]
    fn of_date() {
        let m = Month::of(d(2020, 1, 31));
        assert!(m.contains(d(2020, 1, 1)));
        assert!(!m.contains(d(2020, 2, 1)));
    }
}
