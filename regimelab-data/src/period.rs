//! Fetch periods: relative lookback windows and explicit date ranges.
//!
//! A lookback window ("10y") resolves against today at fetch time but keys
//! the cache by the window name alone, so a cached "10y" entry satisfies
//! later "10y" requests. Staleness is the caller's responsibility — the
//! cache has no automatic expiry.

use crate::provider::DataError;
use chrono::{Duration, NaiveDate};
use std::fmt;
use std::str::FromStr;

/// A requested fetch window: relative to today, or an explicit date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Lookback(Lookback),
    Range { start: NaiveDate, end: NaiveDate },
}

/// Supported relative windows, matching the upstream period vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookback {
    OneDay,
    FiveDays,
    OneMonth,
    ThreeMonths,
    SixMonths,
    OneYear,
    TwoYears,
    FiveYears,
    TenYears,
    Max,
}

impl Lookback {
    /// Calendar days back from the end date. "max" is ~30 years.
    fn days(self) -> i64 {
        match self {
            Lookback::OneDay => 1,
            Lookback::FiveDays => 5,
            Lookback::OneMonth => 30,
            Lookback::ThreeMonths => 90,
            Lookback::SixMonths => 180,
            Lookback::OneYear => 365,
            Lookback::TwoYears => 730,
            Lookback::FiveYears => 1825,
            Lookback::TenYears => 3650,
            Lookback::Max => 10950,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Lookback::OneDay => "1d",
            Lookback::FiveDays => "5d",
            Lookback::OneMonth => "1mo",
            Lookback::ThreeMonths => "3mo",
            Lookback::SixMonths => "6mo",
            Lookback::OneYear => "1y",
            Lookback::TwoYears => "2y",
            Lookback::FiveYears => "5y",
            Lookback::TenYears => "10y",
            Lookback::Max => "max",
        }
    }
}

impl Period {
    /// Default window for historical fetches.
    pub fn ten_years() -> Self {
        Period::Lookback(Lookback::TenYears)
    }

    /// Resolve to a concrete inclusive date range, anchored at `today`
    /// for lookback windows.
    pub fn resolve(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        match self {
            Period::Lookback(window) => (today - Duration::days(window.days()), today),
            Period::Range { start, end } => (*start, *end),
        }
    }

    /// Stable string used as the cache key component for this period.
    pub fn cache_key(&self) -> String {
        match self {
            Period::Lookback(window) => window.as_str().to_string(),
            Period::Range { start, end } => {
                format!("{}-{}", start.format("%Y%m%d"), end.format("%Y%m%d"))
            }
        }
    }
}

impl FromStr for Period {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let window = match s {
            "1d" => Lookback::OneDay,
            "5d" => Lookback::FiveDays,
            "1mo" => Lookback::OneMonth,
            "3mo" => Lookback::ThreeMonths,
            "6mo" => Lookback::SixMonths,
            "1y" => Lookback::OneYear,
            "2y" => Lookback::TwoYears,
            "5y" => Lookback::FiveYears,
            "10y" => Lookback::TenYears,
            "max" => Lookback::Max,
            _ => {
                return Err(DataError::Validation(format!(
                    "unknown period '{s}' (expected 1d, 5d, 1mo, 3mo, 6mo, 1y, 2y, 5y, 10y, or max)"
                )))
            }
        };
        Ok(Period::Lookback(window))
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cache_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_windows() {
        assert_eq!("1y".parse::<Period>().unwrap().cache_key(), "1y");
        assert_eq!("10y".parse::<Period>().unwrap().cache_key(), "10y");
        assert_eq!("max".parse::<Period>().unwrap().cache_key(), "max");
    }

    #[test]
    fn parse_unknown_window_fails() {
        assert!("7w".parse::<Period>().is_err());
        assert!("".parse::<Period>().is_err());
    }

    #[test]
    fn lookback_resolves_against_today() {
        let today = NaiveDate::from_ymd_opt(2026, 8, 28).unwrap();
        let (start, end) = "1y".parse::<Period>().unwrap().resolve(today);
        assert_eq!(end, today);
        assert_eq!(start, today - Duration::days(365));
    }

    #[test]
    fn range_resolves_to_itself() {
        let start = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let period = Period::Range { start, end };
        let today = NaiveDate::from_ymd_opt(2026, 8, 28).unwrap();
        assert_eq!(period.resolve(today), (start, end));
        assert_eq!(period.cache_key(), "20200102-20241231");
    }
}
