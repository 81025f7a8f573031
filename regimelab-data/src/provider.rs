//! Provider trait, canonical bar types, and structured error types.
//!
//! The MarketDataProvider trait abstracts over upstream feeds (FactSet,
//! Yahoo Finance) so the fetch pipeline and the tests can swap
//! implementations. The cache layer sits above this trait — providers
//! don't know about the cache.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw daily bar as a provider returned it, before normalization.
///
/// Prices may be NaN where the upstream row had gaps; `adj_close` is NaN
/// when the source carries no adjusted close.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub adj_close: f64,
}

/// One trading-day observation after normalization.
///
/// All six fields are populated and satisfy the bar invariants
/// (see [`DailyBar::is_valid`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub adj_close: f64,
}

impl DailyBar {
    /// Bar invariants: finite non-negative prices, `low <= {open, close} <= high`.
    pub fn is_valid(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close, self.adj_close];
        prices.iter().all(|p| p.is_finite() && *p >= 0.0)
            && self.low <= self.open
            && self.low <= self.close
            && self.open <= self.high
            && self.close <= self.high
    }
}

/// Upstream provider variant. Feeds differ in coverage and adjustment
/// methodology, so the cache keys entries by variant and never conflates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderKind {
    Factset,
    Yahoo,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Factset => "factset",
            ProviderKind::Yahoo => "yahoo",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized per-symbol series: strictly increasing by date, no duplicates.
#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvSeries {
    pub symbol: String,
    pub source: ProviderKind,
    pub bars: Vec<DailyBar>,
}

impl OhlcvSeries {
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }
}

/// Structured error types for the ingestion layer.
///
/// These are designed to be displayable in both CLI and library contexts.
#[derive(Debug, Clone, Error)]
pub enum DataError {
    #[error("institutional provider requires an API key (set FACTSET_API_KEY)")]
    MissingCredential,

    #[error("authentication rejected by provider: {0}")]
    AuthFailed(String),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("unknown sector '{name}' (known sectors: {known})")]
    UnknownSector { name: String, known: String },

    #[error("cache error: {0}")]
    CacheIo(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unexpected response format: {0}")]
    Parse(String),

    #[error("fetch cancelled")]
    Cancelled,
}

impl DataError {
    /// Whether a retry could plausibly succeed. Auth failures, missing
    /// symbols, and parameter errors are never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DataError::UpstreamUnavailable(_) | DataError::RateLimited { .. }
        )
    }
}

/// Trait for upstream market-data providers.
///
/// Implementations handle the wire specifics of one feed, including their
/// own request pacing and retry policy. They return raw bars; validation
/// and canonicalization happen in the normalize step above this trait.
pub trait MarketDataProvider: Send + Sync {
    /// Which variant this provider is (drives the cache key).
    fn kind(&self) -> ProviderKind;

    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch raw daily bars for one symbol over an inclusive date range.
    fn fetch_raw(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawBar>, DataError>;
}

/// Progress callback for multi-symbol operations.
///
/// One event per completed ticker; reporting never blocks, retries, or
/// alters the fetch result.
pub trait DownloadProgress: Send + Sync {
    /// Called when starting to fetch a symbol.
    fn on_start(&self, symbol: &str, index: usize, total: usize);

    /// Called when a symbol fetch completes.
    fn on_complete(&self, symbol: &str, index: usize, total: usize, result: &Result<(), DataError>);

    /// Called when the entire batch is done.
    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Simple progress reporter that prints to stdout.
pub struct StdoutProgress;

impl DownloadProgress for StdoutProgress {
    fn on_start(&self, symbol: &str, index: usize, total: usize) {
        println!("[{}/{}] Fetching {symbol}...", index + 1, total);
    }

    fn on_complete(
        &self,
        symbol: &str,
        _index: usize,
        _total: usize,
        result: &Result<(), DataError>,
    ) {
        match result {
            Ok(()) => println!("  OK: {symbol}"),
            Err(e) => println!("  FAIL: {symbol}: {e}"),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        println!("\nDownload complete: {succeeded}/{total} succeeded, {failed} failed");
    }
}

/// Silent progress sink, used when progress reporting is disabled.
pub struct NoProgress;

impl DownloadProgress for NoProgress {
    fn on_start(&self, _symbol: &str, _index: usize, _total: usize) {}

    fn on_complete(
        &self,
        _symbol: &str,
        _index: usize,
        _total: usize,
        _result: &Result<(), DataError>,
    ) {
    }

    fn on_batch_complete(&self, _succeeded: usize, _failed: usize, _total: usize) {}
}
