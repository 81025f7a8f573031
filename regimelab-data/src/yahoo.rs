//! Yahoo Finance public provider.
//!
//! Fetches daily OHLCV bars from Yahoo's v8 chart API. No credential is
//! required, but the feed is unofficial and rate limited, so every request
//! goes through the shared pacer and transient failures are retried with
//! bounded backoff.

use crate::pacing::RequestPacer;
use crate::provider::{DataError, MarketDataProvider, ProviderKind, RawBar};
use crate::retry::RetryPolicy;
use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

/// Yahoo Finance data provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    pacer: RequestPacer,
    retry: RetryPolicy,
}

impl YahooProvider {
    pub fn new() -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            pacer: RequestPacer::yahoo_default(),
            retry: RetryPolicy::default(),
        }
    }

    fn chart_url(symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        let start_ts = start.and_hms_opt(0, 0, 0).unwrap().and_utc().timestamp();
        let end_ts = end.and_hms_opt(23, 59, 59).unwrap().and_utc().timestamp();
        format!(
            "https://query2.finance.yahoo.com/v8/finance/chart/{symbol}\
             ?period1={start_ts}&period2={end_ts}&interval=1d\
             &includeAdjustedClose=true"
        )
    }

    /// One paced HTTP round trip. Status codes map to the error taxonomy;
    /// retrying is the caller's (RetryPolicy's) concern.
    fn request_chart(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawBar>, DataError> {
        self.pacer.wait();

        let url = Self::chart_url(symbol, start, end);
        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| DataError::UpstreamUnavailable(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(DataError::RateLimited {
                retry_after_secs: retry_after,
            });
        }
        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(DataError::AuthFailed(format!("HTTP {status} for {symbol}")));
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        if !status.is_success() {
            return Err(DataError::UpstreamUnavailable(format!(
                "HTTP {status} for {symbol}"
            )));
        }

        let chart: ChartResponse = resp.json().map_err(|e| {
            DataError::Parse(format!("failed to parse chart response for {symbol}: {e}"))
        })?;

        parse_chart(symbol, chart)
    }
}

impl Default for YahooProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MarketDataProvider for YahooProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Yahoo
    }

    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch_raw(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawBar>, DataError> {
        self.retry.run(|| self.request_chart(symbol, start, end))
    }
}

/// Turn a chart response into raw bars.
///
/// Yahoo marks holidays and half-days with all-null rows; those are
/// skipped. A missing adjclose track leaves adj_close NaN for the
/// normalize step to backfill.
fn parse_chart(symbol: &str, resp: ChartResponse) -> Result<Vec<RawBar>, DataError> {
    let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
        Some(err) if err.code == "Not Found" => DataError::SymbolNotFound {
            symbol: symbol.to_string(),
        },
        Some(err) => DataError::Parse(format!("{}: {}", err.code, err.description)),
        None => DataError::Parse("empty result with no error".into()),
    })?;

    let data = result
        .into_iter()
        .next()
        .ok_or_else(|| DataError::Parse("result array is empty".into()))?;

    let timestamps = data
        .timestamp
        .ok_or_else(|| DataError::Parse("no timestamps".into()))?;

    let quote = data
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| DataError::Parse("no quote data".into()))?;

    let adj_closes = data
        .indicators
        .adjclose
        .and_then(|v| v.into_iter().next())
        .map(|a| a.adjclose);

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let date = chrono::DateTime::from_timestamp(ts, 0)
            .map(|dt| dt.naive_utc().date())
            .ok_or_else(|| DataError::Parse(format!("invalid timestamp: {ts}")))?;

        let open = quote.open.get(i).copied().flatten();
        let high = quote.high.get(i).copied().flatten();
        let low = quote.low.get(i).copied().flatten();
        let close = quote.close.get(i).copied().flatten();
        let volume = quote.volume.get(i).copied().flatten();
        let adj_close = adj_closes.as_ref().and_then(|v| v.get(i).copied().flatten());

        if open.is_none() && high.is_none() && low.is_none() && close.is_none() && volume.is_none()
        {
            continue;
        }

        bars.push(RawBar {
            date,
            open: open.unwrap_or(f64::NAN),
            high: high.unwrap_or(f64::NAN),
            low: low.unwrap_or(f64::NAN),
            close: close.unwrap_or(f64::NAN),
            volume: volume.unwrap_or(0),
            adj_close: adj_close.unwrap_or(f64::NAN),
        });
    }

    if bars.is_empty() {
        return Err(DataError::SymbolNotFound {
            symbol: symbol.to_string(),
        });
    }

    Ok(bars)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chart_json(body: &str) -> ChartResponse {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn parses_well_formed_chart() {
        let resp = chart_json(
            r#"{"chart":{"result":[{
                "timestamp":[1704153600,1704240000],
                "indicators":{
                    "quote":[{"open":[100.0,101.0],"high":[102.0,103.0],
                              "low":[99.0,100.0],"close":[101.0,102.0],
                              "volume":[1000,1100]}],
                    "adjclose":[{"adjclose":[100.5,101.5]}]
                }}],"error":null}}"#,
        );
        let bars = parse_chart("AAPL", resp).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].open, 100.0);
        assert_eq!(bars[0].adj_close, 100.5);
        assert_eq!(bars[1].volume, 1100);
    }

    #[test]
    fn missing_adjclose_track_leaves_nan() {
        let resp = chart_json(
            r#"{"chart":{"result":[{
                "timestamp":[1704153600],
                "indicators":{
                    "quote":[{"open":[100.0],"high":[102.0],
                              "low":[99.0],"close":[101.0],"volume":[1000]}]
                }}],"error":null}}"#,
        );
        let bars = parse_chart("AAPL", resp).unwrap();
        assert!(bars[0].adj_close.is_nan());
    }

    #[test]
    fn all_null_rows_are_skipped() {
        let resp = chart_json(
            r#"{"chart":{"result":[{
                "timestamp":[1704153600,1704240000],
                "indicators":{
                    "quote":[{"open":[100.0,null],"high":[102.0,null],
                              "low":[99.0,null],"close":[101.0,null],
                              "volume":[1000,null]}]
                }}],"error":null}}"#,
        );
        let bars = parse_chart("AAPL", resp).unwrap();
        assert_eq!(bars.len(), 1);
    }

    #[test]
    fn not_found_error_maps_to_symbol_not_found() {
        let resp = chart_json(
            r#"{"chart":{"result":null,
                "error":{"code":"Not Found","description":"No data found"}}}"#,
        );
        match parse_chart("ZZZQQQ", resp) {
            Err(DataError::SymbolNotFound { symbol }) => assert_eq!(symbol, "ZZZQQQ"),
            other => panic!("expected SymbolNotFound, got {other:?}"),
        }
    }

    #[test]
    fn other_chart_error_maps_to_parse() {
        let resp = chart_json(
            r#"{"chart":{"result":null,
                "error":{"code":"Internal","description":"boom"}}}"#,
        );
        assert!(matches!(parse_chart("AAPL", resp), Err(DataError::Parse(_))));
    }

    #[test]
    fn chart_url_encodes_range() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let url = YahooProvider::chart_url("SPY", start, end);
        assert!(url.contains("/chart/SPY"));
        assert!(url.contains("interval=1d"));
        assert!(url.contains("includeAdjustedClose=true"));
    }
}
