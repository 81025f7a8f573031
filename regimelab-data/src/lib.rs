//! RegimeLab data layer — multi-source market-data ingestion with
//! automatic fallback and local caching.
//!
//! This crate is the ingestion foundation for the wider platform:
//! - Universe registry: static top-200 liquid US equity list with
//!   sector lookup
//! - Provider clients: FactSet (institutional, API key) and Yahoo
//!   Finance (public, rate limited) behind one trait
//! - Parquet cache keyed by (symbol, period, provider variant)
//! - Client factory with credential-driven fallback
//! - Bulk fetch with per-ticker failure isolation and cooperative
//!   cancellation

pub mod cache;
pub mod client;
pub mod factory;
pub mod factset;
pub mod normalize;
pub mod pacing;
pub mod period;
pub mod provider;
mod retry;
pub mod universe;
pub mod yahoo;

pub use cache::{CacheEntryStatus, CacheMeta, ParquetCache};
pub use client::{BulkReport, CancelToken, DataClient};
pub use factory::{create, create_with_key, Source};
pub use normalize::{normalize, NormalizeReport};
pub use period::Period;
pub use provider::{
    DailyBar, DataError, DownloadProgress, MarketDataProvider, NoProgress, OhlcvSeries,
    ProviderKind, RawBar, StdoutProgress,
};
pub use universe::Universe;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: the client and its building blocks are
    /// Send + Sync, so bulk fetch workers can share them.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<DailyBar>();
        require_sync::<DailyBar>();
        require_send::<OhlcvSeries>();
        require_sync::<OhlcvSeries>();
        require_send::<DataError>();
        require_sync::<DataError>();
        require_send::<Period>();
        require_sync::<Period>();
        require_send::<Universe>();
        require_sync::<Universe>();
        require_send::<ParquetCache>();
        require_sync::<ParquetCache>();
        require_send::<DataClient>();
        require_sync::<DataClient>();
        require_send::<CancelToken>();
        require_sync::<CancelToken>();
        require_send::<yahoo::YahooProvider>();
        require_sync::<yahoo::YahooProvider>();
        require_send::<factset::FactsetProvider>();
        require_sync::<factset::FactsetProvider>();
    }
}
