//! FactSet institutional provider.
//!
//! Bearer-authenticated client for the FactSet prices endpoint. Requires
//! an API key at construction — there is no anonymous mode. Responses
//! carry split-adjusted prices in `priceAdj`; when that field is absent
//! the normalize step substitutes the unadjusted close.

use crate::pacing::RequestPacer;
use crate::provider::{DataError, MarketDataProvider, ProviderKind, RawBar};
use crate::retry::RetryPolicy;
use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;

const FACTSET_BASE_URL: &str = "https://api.factset.com/content/factset-prices/v1";

/// Environment variable holding the FactSet API key.
pub const FACTSET_API_KEY_VAR: &str = "FACTSET_API_KEY";

#[derive(Debug, Deserialize)]
struct PricesResponse {
    data: Option<Vec<PriceRecord>>,
}

#[derive(Debug, Deserialize)]
struct PriceRecord {
    date: NaiveDate,
    #[serde(rename = "priceOpen")]
    open: Option<f64>,
    #[serde(rename = "priceHigh")]
    high: Option<f64>,
    #[serde(rename = "priceLow")]
    low: Option<f64>,
    #[serde(rename = "price")]
    close: Option<f64>,
    #[serde(rename = "priceAdj")]
    adj_close: Option<f64>,
    volume: Option<f64>,
}

/// FactSet data provider.
pub struct FactsetProvider {
    client: reqwest::blocking::Client,
    base_url: String,
    pacer: RequestPacer,
    retry: RetryPolicy,
}

impl FactsetProvider {
    /// Build a client around the given API key.
    ///
    /// Fails with `MissingCredential` when the key is absent or blank, and
    /// with `AuthFailed` when the key cannot be carried in an HTTP header.
    pub fn new(api_key: Option<String>) -> Result<Self, DataError> {
        let key = api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or(DataError::MissingCredential)?;

        let mut auth = reqwest::header::HeaderValue::from_str(&format!("Bearer {key}"))
            .map_err(|_| {
                DataError::AuthFailed("API key contains characters invalid in a header".into())
            })?;
        auth.set_sensitive(true);

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(reqwest::header::AUTHORIZATION, auth);

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .default_headers(headers)
            .build()
            .map_err(|e| DataError::UpstreamUnavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: FACTSET_BASE_URL.to_string(),
            pacer: RequestPacer::factset_default(),
            retry: RetryPolicy::default(),
        })
    }

    /// Build a client from the `FACTSET_API_KEY` environment variable.
    pub fn from_env() -> Result<Self, DataError> {
        Self::new(std::env::var(FACTSET_API_KEY_VAR).ok())
    }

    fn request_prices(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawBar>, DataError> {
        self.pacer.wait();

        let url = format!("{}/prices", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("ids", symbol),
                ("startDate", &start.format("%Y-%m-%d").to_string()),
                ("endDate", &end.format("%Y-%m-%d").to_string()),
                ("frequency", "D"),
                ("calendar", "FIVEDAY"),
                ("adjust", "SPLIT_ADJ"),
            ])
            .send()
            .map_err(|e| DataError::UpstreamUnavailable(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(DataError::AuthFailed(format!(
                "HTTP {status} — check {FACTSET_API_KEY_VAR}"
            )));
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
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
        if !status.is_success() {
            return Err(DataError::UpstreamUnavailable(format!(
                "HTTP {status} for {symbol}"
            )));
        }

        let body: PricesResponse = resp.json().map_err(|e| {
            DataError::Parse(format!("failed to parse prices response for {symbol}: {e}"))
        })?;

        parse_prices(symbol, body)
    }
}

impl MarketDataProvider for FactsetProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Factset
    }

    fn name(&self) -> &str {
        "factset"
    }

    fn fetch_raw(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawBar>, DataError> {
        self.retry.run(|| self.request_prices(symbol, start, end))
    }
}

fn parse_prices(symbol: &str, body: PricesResponse) -> Result<Vec<RawBar>, DataError> {
    let records = body.data.unwrap_or_default();
    if records.is_empty() {
        return Err(DataError::SymbolNotFound {
            symbol: symbol.to_string(),
        });
    }

    let bars = records
        .into_iter()
        .map(|r| RawBar {
            date: r.date,
            open: r.open.unwrap_or(f64::NAN),
            high: r.high.unwrap_or(f64::NAN),
            low: r.low.unwrap_or(f64::NAN),
            close: r.close.unwrap_or(f64::NAN),
            volume: r.volume.map(|v| v.max(0.0) as u64).unwrap_or(0),
            adj_close: r.adj_close.unwrap_or(f64::NAN),
        })
        .collect();

    Ok(bars)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_rejected() {
        assert!(matches!(
            FactsetProvider::new(None),
            Err(DataError::MissingCredential)
        ));
        assert!(matches!(
            FactsetProvider::new(Some("   ".into())),
            Err(DataError::MissingCredential)
        ));
    }

    #[test]
    fn key_with_invalid_header_bytes_is_rejected() {
        assert!(matches!(
            FactsetProvider::new(Some("bad\nkey".into())),
            Err(DataError::AuthFailed(_))
        ));
    }

    #[test]
    fn valid_key_constructs() {
        let provider = FactsetProvider::new(Some("test-key".into())).unwrap();
        assert_eq!(provider.kind(), ProviderKind::Factset);
        assert_eq!(provider.name(), "factset");
    }

    #[test]
    fn parses_price_records() {
        let body: PricesResponse = serde_json::from_str(
            r#"{"data":[
                {"date":"2024-01-02","priceOpen":100.0,"priceHigh":102.0,
                 "priceLow":99.0,"price":101.0,"priceAdj":100.5,"volume":1000.0},
                {"date":"2024-01-03","priceOpen":101.0,"priceHigh":103.0,
                 "priceLow":100.0,"price":102.0,"volume":1100.0}
            ]}"#,
        )
        .unwrap();
        let bars = parse_prices("AAPL", body).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].adj_close, 100.5);
        assert!(bars[1].adj_close.is_nan()); // backfilled later by normalize
        assert_eq!(bars[1].volume, 1100);
    }

    #[test]
    fn empty_data_maps_to_symbol_not_found() {
        let body: PricesResponse = serde_json::from_str(r#"{"data":[]}"#).unwrap();
        match parse_prices("ZZZQQQ", body) {
            Err(DataError::SymbolNotFound { symbol }) => assert_eq!(symbol, "ZZZQQQ"),
            other => panic!("expected SymbolNotFound, got {other:?}"),
        }
    }
}
