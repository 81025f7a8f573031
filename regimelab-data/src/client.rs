//! Fetch pipeline: cache-first single fetch and bulk orchestration.
//!
//! The client is handed explicitly to callers — there is no process-wide
//! "current provider". Single fetches consult the cache before the
//! network; bulk fetches isolate per-ticker failures and always return a
//! complete result table.

use crate::cache::ParquetCache;
use crate::normalize::normalize;
use crate::period::Period;
use crate::provider::{
    DataError, DownloadProgress, MarketDataProvider, NoProgress, OhlcvSeries, ProviderKind,
    StdoutProgress,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Cooperative cancellation for bulk fetches.
///
/// Cancelling finishes the in-flight ticker and marks the rest of the
/// batch `Cancelled`; it never interrupts a single request mid-flight.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Result table of a bulk fetch: every input ticker maps to a series or
/// a failure marker. Produced fresh per call and never persisted as a
/// unit — only the per-ticker cache entries persist.
#[derive(Debug)]
pub struct BulkReport {
    pub results: BTreeMap<String, Result<OhlcvSeries, DataError>>,
    pub succeeded: usize,
    pub failed: usize,
}

impl BulkReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }

    pub fn series(&self, symbol: &str) -> Option<&OhlcvSeries> {
        match self.results.get(symbol) {
            Some(Ok(series)) => Some(series),
            _ => None,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &DataError)> {
        self.results.iter().filter_map(|(symbol, result)| {
            result.as_ref().err().map(|e| (symbol.as_str(), e))
        })
    }
}

/// A data client: one provider behind the shared capability contract,
/// plus the cache it consults before any network call.
pub struct DataClient {
    provider: Box<dyn MarketDataProvider>,
    cache: ParquetCache,
}

impl DataClient {
    pub fn new(provider: Box<dyn MarketDataProvider>, cache: ParquetCache) -> Self {
        Self { provider, cache }
    }

    /// Which provider variant backs this client.
    pub fn provider_kind(&self) -> ProviderKind {
        self.provider.kind()
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn cache(&self) -> &ParquetCache {
        &self.cache
    }

    /// Fetch one symbol for a period.
    ///
    /// Cache hit: returns the cached series with no network call.
    /// Cache miss: one upstream fetch (the provider retries transient
    /// failures internally), normalization, then a cache write-back. A
    /// failing cache never blocks the fresh data — read errors degrade to
    /// a miss and write errors only log a warning.
    pub fn fetch_ticker(&self, symbol: &str, period: &Period) -> Result<OhlcvSeries, DataError> {
        let kind = self.provider.kind();

        match self.cache.get(symbol, period, kind) {
            Ok(Some(bars)) => {
                debug!(symbol, period = %period, "cache hit");
                return Ok(OhlcvSeries {
                    symbol: symbol.to_string(),
                    source: kind,
                    bars,
                });
            }
            Ok(None) => {}
            Err(e) => {
                warn!(symbol, error = %e, "cache read failed; fetching upstream");
            }
        }

        let today = chrono::Local::now().date_naive();
        let (start, end) = period.resolve(today);
        debug!(symbol, %start, %end, provider = self.provider.name(), "fetching upstream");

        let raw = self.provider.fetch_raw(symbol, start, end)?;
        let (series, report) = normalize(symbol, kind, raw)?;
        debug!(
            symbol,
            bars = series.len(),
            dropped = report.dropped_invalid,
            "normalized upstream response"
        );

        if let Err(e) = self.cache.put(&series, period) {
            warn!(symbol, error = %e, "cache write failed; returning fresh data anyway");
        }

        Ok(series)
    }

    /// Fetch many symbols, collecting per-ticker outcomes.
    ///
    /// `show_progress` only toggles stdout reporting; it never changes the
    /// result. See [`DataClient::fetch_bulk_with_progress`] for the policy.
    pub fn fetch_bulk(
        &self,
        symbols: &[&str],
        period: &Period,
        show_progress: bool,
        cancel: &CancelToken,
    ) -> BulkReport {
        if show_progress {
            self.fetch_bulk_with_progress(symbols, period, &StdoutProgress, cancel)
        } else {
            self.fetch_bulk_with_progress(symbols, period, &NoProgress, cancel)
        }
    }

    /// Bulk fetch with a caller-supplied progress sink.
    ///
    /// Partial-failure policy: a single ticker's failure is recorded as
    /// that ticker's marker and the batch continues. The returned table's
    /// keys are exactly the input set — cancellation marks the unfetched
    /// remainder `Cancelled` rather than dropping it.
    pub fn fetch_bulk_with_progress(
        &self,
        symbols: &[&str],
        period: &Period,
        progress: &dyn DownloadProgress,
        cancel: &CancelToken,
    ) -> BulkReport {
        let total = symbols.len();
        let mut results: BTreeMap<String, Result<OhlcvSeries, DataError>> = BTreeMap::new();
        let mut succeeded = 0;
        let mut failed = 0;

        for (i, symbol) in symbols.iter().enumerate() {
            if cancel.is_cancelled() {
                for rest in &symbols[i..] {
                    if results
                        .insert(rest.to_string(), Err(DataError::Cancelled))
                        .is_none()
                    {
                        failed += 1;
                    }
                }
                break;
            }

            if results.contains_key(*symbol) {
                continue; // duplicate input ticker, already resolved
            }

            progress.on_start(symbol, i, total);
            let result = self.fetch_ticker(symbol, period);

            match result {
                Ok(series) => {
                    succeeded += 1;
                    progress.on_complete(symbol, i, total, &Ok(()));
                    results.insert(symbol.to_string(), Ok(series));
                }
                Err(e) => {
                    failed += 1;
                    progress.on_complete(symbol, i, total, &Err(e.clone()));
                    results.insert(symbol.to_string(), Err(e));
                }
            }
        }

        progress.on_batch_complete(succeeded, failed, total);

        BulkReport {
            results,
            succeeded,
            failed,
        }
    }
}
