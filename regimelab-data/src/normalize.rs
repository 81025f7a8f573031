//! Canonical normalization of raw provider rows.
//!
//! Regardless of source schema, the output series always has all six
//! OHLCV fields populated, sorted strictly ascending by date with no
//! duplicate dates.
//!
//! Policy for rows that violate the bar invariants: reject and log.
//! The single documented repair is substituting the unadjusted close for
//! a missing adjusted close.

use crate::provider::{DailyBar, DataError, OhlcvSeries, ProviderKind, RawBar};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::warn;

/// Counters describing what normalization changed or dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub input_rows: usize,
    /// Rows rejected for violating the bar invariants (non-finite or
    /// negative prices, low/high ordering).
    pub dropped_invalid: usize,
    /// Rows dropped because an earlier row already claimed their date.
    pub duplicates: usize,
    /// Input rows that arrived out of date order (kept, but counted).
    pub out_of_order: usize,
    /// Rows where adj_close was missing and set equal to close.
    pub adj_close_backfilled: usize,
}

/// Normalize raw bars into a canonical series.
///
/// Fails with `Validation` if no valid rows remain.
pub fn normalize(
    symbol: &str,
    source: ProviderKind,
    raw: Vec<RawBar>,
) -> Result<(OhlcvSeries, NormalizeReport), DataError> {
    let mut report = NormalizeReport {
        input_rows: raw.len(),
        ..Default::default()
    };

    let mut by_date: BTreeMap<NaiveDate, DailyBar> = BTreeMap::new();
    let mut last_seen: Option<NaiveDate> = None;

    for row in raw {
        if let Some(prev) = last_seen {
            if row.date < prev {
                report.out_of_order += 1;
            }
        }
        last_seen = Some(row.date);

        let adj_missing = !row.adj_close.is_finite();
        let bar = DailyBar {
            date: row.date,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
            adj_close: if adj_missing { row.close } else { row.adj_close },
        };

        if !bar.is_valid() {
            report.dropped_invalid += 1;
            continue;
        }

        // First occurrence per date wins; later duplicates are dropped.
        if by_date.contains_key(&bar.date) {
            report.duplicates += 1;
            continue;
        }
        if adj_missing {
            report.adj_close_backfilled += 1;
        }
        by_date.insert(bar.date, bar);
    }

    if by_date.is_empty() {
        return Err(DataError::Validation(format!(
            "no valid rows for {symbol} after normalization ({} input rows)",
            report.input_rows
        )));
    }

    if report.dropped_invalid > 0 {
        warn!(
            symbol,
            dropped = report.dropped_invalid,
            "rejected rows violating OHLCV invariants"
        );
    }

    let series = OhlcvSeries {
        symbol: symbol.to_string(),
        source,
        bars: by_date.into_values().collect(),
    };
    Ok((series, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    fn raw(day: u32, open: f64, high: f64, low: f64, close: f64, adj: f64) -> RawBar {
        RawBar {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open,
            high,
            low,
            close,
            volume: 1000,
            adj_close: adj,
        }
    }

    #[test]
    fn valid_rows_pass_through() {
        let rows = vec![
            raw(2, 100.0, 102.0, 99.0, 101.0, 100.5),
            raw(3, 101.0, 103.0, 100.0, 102.0, 101.5),
        ];
        let (series, report) = normalize("AAPL", ProviderKind::Yahoo, rows).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(report.dropped_invalid, 0);
        assert_eq!(report.adj_close_backfilled, 0);
    }

    #[test]
    fn invalid_rows_are_rejected() {
        let rows = vec![
            raw(2, 100.0, 95.0, 105.0, 101.0, 100.5), // inverted high/low
            raw(3, 101.0, 103.0, 100.0, 102.0, 101.5),
            raw(4, f64::NAN, 103.0, 100.0, 102.0, 101.5),
        ];
        let (series, report) = normalize("AAPL", ProviderKind::Yahoo, rows).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(report.dropped_invalid, 2);
    }

    #[test]
    fn missing_adj_close_falls_back_to_close() {
        let rows = vec![raw(2, 100.0, 102.0, 99.0, 101.0, f64::NAN)];
        let (series, report) = normalize("AAPL", ProviderKind::Factset, rows).unwrap();
        assert_eq!(series.bars[0].adj_close, 101.0);
        assert_eq!(report.adj_close_backfilled, 1);
    }

    #[test]
    fn out_of_order_input_is_sorted() {
        let rows = vec![
            raw(4, 100.0, 102.0, 99.0, 101.0, 101.0),
            raw(2, 100.0, 102.0, 99.0, 101.0, 101.0),
            raw(3, 100.0, 102.0, 99.0, 101.0, 101.0),
        ];
        let (series, report) = normalize("AAPL", ProviderKind::Yahoo, rows).unwrap();
        assert_eq!(report.out_of_order, 1);
        let dates: Vec<_> = series.bars.iter().map(|b| b.date.day0()).collect();
        assert_eq!(dates, vec![1, 2, 3]); // Jan 2, 3, 4 (zero-based day)
        for window in series.bars.windows(2) {
            assert!(window[0].date < window[1].date);
        }
    }

    #[test]
    fn duplicate_dates_keep_first() {
        let rows = vec![
            raw(2, 100.0, 102.0, 99.0, 101.0, 101.0),
            raw(2, 200.0, 202.0, 199.0, 201.0, 201.0),
        ];
        let (series, report) = normalize("AAPL", ProviderKind::Yahoo, rows).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(report.duplicates, 1);
        assert_eq!(series.bars[0].open, 100.0);
    }

    #[test]
    fn all_invalid_is_an_error() {
        let rows = vec![raw(2, -1.0, 102.0, 99.0, 101.0, 101.0)];
        let result = normalize("AAPL", ProviderKind::Yahoo, rows);
        assert!(matches!(result, Err(DataError::Validation(_))));
    }

    #[test]
    fn empty_input_is_an_error() {
        let result = normalize("AAPL", ProviderKind::Yahoo, Vec::new());
        assert!(matches!(result, Err(DataError::Validation(_))));
    }
}
