//! Parquet cache keyed by (symbol, period, provider variant).
//!
//! Layout: `{cache_dir}/source={provider}/symbol={SYMBOL}/{period}.parquet`
//! with a `{period}.meta.json` sidecar per entry.
//!
//! Institutional and public data may differ in coverage and adjustment
//! methodology, so the provider variant is part of the key and entries are
//! never conflated across sources.
//!
//! Features:
//! - Atomic writes (write to .tmp, rename into place)
//! - Integrity validation on load (schema check, row count > 0)
//! - Quarantine for corrupt files ({filename}.quarantined), treated as a miss
//! - No eviction: the store grows until the operator clears it

use crate::period::Period;
use crate::provider::{DailyBar, DataError, OhlcvSeries, ProviderKind};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Metadata sidecar for one cached entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMeta {
    pub symbol: String,
    pub source: String,
    pub period: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub bar_count: usize,
    pub data_hash: String,
    pub cached_at: chrono::NaiveDateTime,
}

/// One row of the cache status report.
#[derive(Debug, Clone)]
pub struct CacheEntryStatus {
    pub symbol: String,
    pub source: String,
    pub period: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub bar_count: usize,
    pub size_bytes: u64,
}

/// The Parquet cache.
pub struct ParquetCache {
    cache_dir: PathBuf,
}

impl ParquetCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Root directory of the cache.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn entry_dir(&self, kind: ProviderKind, symbol: &str) -> PathBuf {
        self.cache_dir
            .join(format!("source={}", kind.as_str()))
            .join(format!("symbol={symbol}"))
    }

    fn data_path(&self, kind: ProviderKind, symbol: &str, period: &Period) -> PathBuf {
        self.entry_dir(kind, symbol)
            .join(format!("{}.parquet", period.cache_key()))
    }

    fn meta_path(&self, kind: ProviderKind, symbol: &str, period: &Period) -> PathBuf {
        self.entry_dir(kind, symbol)
            .join(format!("{}.meta.json", period.cache_key()))
    }

    /// Look up a cached series for an exact (symbol, period, provider) key.
    ///
    /// Returns `Ok(None)` on a miss. A corrupt entry is quarantined and
    /// reported as a miss so the caller refetches; only genuinely
    /// unreadable storage surfaces as `CacheIo`.
    pub fn get(
        &self,
        symbol: &str,
        period: &Period,
        kind: ProviderKind,
    ) -> Result<Option<Vec<DailyBar>>, DataError> {
        let path = self.data_path(kind, symbol, period);
        if !path.exists() {
            return Ok(None);
        }

        match load_and_validate_parquet(&path) {
            Ok(bars) => Ok(Some(bars)),
            Err(e) => {
                let quarantine = path.with_extension("parquet.quarantined");
                warn!(
                    symbol,
                    path = %path.display(),
                    error = %e,
                    "quarantining corrupt cache entry"
                );
                fs::rename(&path, &quarantine)
                    .map_err(|e| DataError::CacheIo(format!("quarantine rename: {e}")))?;
                Ok(None)
            }
        }
    }

    /// Persist a normalized series under its (symbol, period, provider) key.
    ///
    /// The write is atomic (tmp + rename); concurrent writers for the same
    /// key are last-write-wins, which is acceptable because refetching the
    /// same upstream window is idempotent at the row level.
    pub fn put(&self, series: &OhlcvSeries, period: &Period) -> Result<(), DataError> {
        if series.bars.is_empty() {
            return Err(DataError::CacheIo("refusing to cache empty series".into()));
        }

        let dir = self.entry_dir(series.source, &series.symbol);
        fs::create_dir_all(&dir)
            .map_err(|e| DataError::CacheIo(format!("failed to create cache dir: {e}")))?;

        let df = bars_to_dataframe(&series.bars)?;
        let path = self.data_path(series.source, &series.symbol, period);
        let tmp_path = path.with_extension("parquet.tmp");

        write_parquet(&df, &tmp_path)?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            DataError::CacheIo(format!("atomic rename failed: {e}"))
        })?;

        let meta = CacheMeta {
            symbol: series.symbol.clone(),
            source: series.source.as_str().to_string(),
            period: period.cache_key(),
            start_date: series.bars[0].date,
            end_date: series.bars[series.bars.len() - 1].date,
            bar_count: series.bars.len(),
            data_hash: blake3::hash(
                &serde_json::to_vec(&series.bars)
                    .map_err(|e| DataError::CacheIo(format!("hash serialization: {e}")))?,
            )
            .to_hex()
            .to_string(),
            cached_at: chrono::Local::now().naive_local(),
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::CacheIo(format!("meta serialization: {e}")))?;
        fs::write(self.meta_path(series.source, &series.symbol, period), meta_json)
            .map_err(|e| DataError::CacheIo(format!("meta write: {e}")))?;

        Ok(())
    }

    /// Metadata for one entry, if present and parseable.
    pub fn get_meta(
        &self,
        symbol: &str,
        period: &Period,
        kind: ProviderKind,
    ) -> Option<CacheMeta> {
        let content = fs::read_to_string(self.meta_path(kind, symbol, period)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Walk the cache and report every entry with a readable sidecar.
    pub fn status(&self) -> Result<Vec<CacheEntryStatus>, DataError> {
        let mut entries = Vec::new();
        if !self.cache_dir.exists() {
            return Ok(entries);
        }

        for source_dir in read_dirs_with_prefix(&self.cache_dir, "source=")? {
            for symbol_dir in read_dirs_with_prefix(&source_dir, "symbol=")? {
                let listing = fs::read_dir(&symbol_dir)
                    .map_err(|e| DataError::CacheIo(format!("read cache dir: {e}")))?;
                for file in listing {
                    let file = file.map_err(|e| DataError::CacheIo(format!("dir entry: {e}")))?;
                    let path = file.path();
                    let name = file.file_name().to_string_lossy().to_string();
                    let Some(period_key) = name.strip_suffix(".meta.json") else {
                        continue;
                    };

                    let Ok(content) = fs::read_to_string(&path) else {
                        continue;
                    };
                    let Ok(meta) = serde_json::from_str::<CacheMeta>(&content) else {
                        continue;
                    };

                    let data_path = symbol_dir.join(format!("{period_key}.parquet"));
                    let size_bytes = fs::metadata(&data_path).map(|m| m.len()).unwrap_or(0);

                    entries.push(CacheEntryStatus {
                        symbol: meta.symbol,
                        source: meta.source,
                        period: meta.period,
                        start_date: meta.start_date,
                        end_date: meta.end_date,
                        bar_count: meta.bar_count,
                        size_bytes,
                    });
                }
            }
        }

        entries.sort_by(|a, b| (&a.source, &a.symbol).cmp(&(&b.source, &b.symbol)));
        Ok(entries)
    }
}

fn read_dirs_with_prefix(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>, DataError> {
    let mut dirs = Vec::new();
    let listing =
        fs::read_dir(dir).map_err(|e| DataError::CacheIo(format!("read cache dir: {e}")))?;
    for entry in listing {
        let entry = entry.map_err(|e| DataError::CacheIo(format!("dir entry: {e}")))?;
        if entry.file_name().to_string_lossy().starts_with(prefix)
            && entry.path().is_dir()
        {
            dirs.push(entry.path());
        }
    }
    Ok(dirs)
}

// Parquet I/O helpers

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()
}

fn bars_to_dataframe(bars: &[DailyBar]) -> Result<DataFrame, DataError> {
    let dates: Vec<i32> = bars
        .iter()
        .map(|b| (b.date - epoch()).num_days() as i32)
        .collect();
    let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<u64> = bars.iter().map(|b| b.volume).collect();
    let adj_closes: Vec<f64> = bars.iter().map(|b| b.adj_close).collect();

    DataFrame::new(vec![
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| DataError::CacheIo(format!("date cast: {e}")))?,
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("volume".into(), volumes),
        Column::new("adj_close".into(), adj_closes),
    ])
    .map_err(|e| DataError::CacheIo(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &DataFrame, path: &Path) -> Result<(), DataError> {
    let file =
        fs::File::create(path).map_err(|e| DataError::CacheIo(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(|e| DataError::CacheIo(format!("write parquet: {e}")))?;
    Ok(())
}

fn load_and_validate_parquet(path: &Path) -> Result<Vec<DailyBar>, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::CacheIo(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::CacheIo(format!("read: {e}")))?;

    if df.height() == 0 {
        return Err(DataError::Validation("empty parquet file".into()));
    }

    for col_name in ["date", "open", "high", "low", "close", "volume", "adj_close"] {
        if df.column(col_name).is_err() {
            return Err(DataError::Validation(format!("missing column '{col_name}'")));
        }
    }

    dataframe_to_bars(&df)
}

fn dataframe_to_bars(df: &DataFrame) -> Result<Vec<DailyBar>, DataError> {
    let col = |name: &str| {
        df.column(name)
            .map_err(|e| DataError::CacheIo(format!("column read: {e}")))
    };

    let date_ca = col("date")?
        .date()
        .map_err(|e| DataError::CacheIo(format!("date column type: {e}")))?
        .clone();
    let f64_ca = |name: &str| -> Result<Float64Chunked, DataError> {
        Ok(col(name)?
            .f64()
            .map_err(|e| DataError::CacheIo(format!("{name} column type: {e}")))?
            .clone())
    };
    let open_ca = f64_ca("open")?;
    let high_ca = f64_ca("high")?;
    let low_ca = f64_ca("low")?;
    let close_ca = f64_ca("close")?;
    let adj_ca = f64_ca("adj_close")?;
    let vol_ca = col("volume")?
        .u64()
        .map_err(|e| DataError::CacheIo(format!("volume column type: {e}")))?
        .clone();

    let epoch = epoch();
    let n = df.height();
    let mut bars = Vec::with_capacity(n);

    for i in 0..n {
        let date_days = date_ca
            .get(i)
            .ok_or_else(|| DataError::CacheIo(format!("null date at row {i}")))?;
        bars.push(DailyBar {
            date: epoch + chrono::Duration::days(date_days as i64),
            open: open_ca.get(i).unwrap_or(f64::NAN),
            high: high_ca.get(i).unwrap_or(f64::NAN),
            low: low_ca.get(i).unwrap_or(f64::NAN),
            close: close_ca.get(i).unwrap_or(f64::NAN),
            volume: vol_ca.get(i).unwrap_or(0),
            adj_close: adj_ca.get(i).unwrap_or(f64::NAN),
        });
    }

    Ok(bars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_cache_dir() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = env::temp_dir().join(format!("regimelab_cache_{}_{id}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn sample_series(kind: ProviderKind) -> OhlcvSeries {
        OhlcvSeries {
            symbol: "AAPL".into(),
            source: kind,
            bars: vec![
                DailyBar {
                    date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                    open: 100.0,
                    high: 102.0,
                    low: 99.0,
                    close: 101.0,
                    volume: 1000,
                    adj_close: 101.0,
                },
                DailyBar {
                    date: NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
                    open: 101.0,
                    high: 103.0,
                    low: 100.0,
                    close: 102.0,
                    volume: 1100,
                    adj_close: 102.0,
                },
            ],
        }
    }

    #[test]
    fn put_and_get_roundtrip() {
        let dir = temp_cache_dir();
        let cache = ParquetCache::new(&dir);
        let period: Period = "1y".parse().unwrap();

        cache.put(&sample_series(ProviderKind::Yahoo), &period).unwrap();
        let bars = cache
            .get("AAPL", &period, ProviderKind::Yahoo)
            .unwrap()
            .unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(bars[1].close, 102.0);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn miss_returns_none() {
        let dir = temp_cache_dir();
        let cache = ParquetCache::new(&dir);
        let period: Period = "1y".parse().unwrap();

        assert!(cache
            .get("MSFT", &period, ProviderKind::Yahoo)
            .unwrap()
            .is_none());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn provider_variants_do_not_collide() {
        let dir = temp_cache_dir();
        let cache = ParquetCache::new(&dir);
        let period: Period = "1y".parse().unwrap();

        cache.put(&sample_series(ProviderKind::Yahoo), &period).unwrap();

        assert!(cache
            .get("AAPL", &period, ProviderKind::Factset)
            .unwrap()
            .is_none());
        assert!(cache
            .get("AAPL", &period, ProviderKind::Yahoo)
            .unwrap()
            .is_some());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn periods_do_not_collide() {
        let dir = temp_cache_dir();
        let cache = ParquetCache::new(&dir);
        let one_year: Period = "1y".parse().unwrap();
        let ten_years: Period = "10y".parse().unwrap();

        cache.put(&sample_series(ProviderKind::Yahoo), &one_year).unwrap();

        assert!(cache
            .get("AAPL", &ten_years, ProviderKind::Yahoo)
            .unwrap()
            .is_none());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn meta_sidecar_roundtrip() {
        let dir = temp_cache_dir();
        let cache = ParquetCache::new(&dir);
        let period: Period = "1y".parse().unwrap();

        cache.put(&sample_series(ProviderKind::Yahoo), &period).unwrap();
        let meta = cache.get_meta("AAPL", &period, ProviderKind::Yahoo).unwrap();

        assert_eq!(meta.symbol, "AAPL");
        assert_eq!(meta.source, "yahoo");
        assert_eq!(meta.period, "1y");
        assert_eq!(meta.bar_count, 2);
        assert!(!meta.data_hash.is_empty());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn corrupt_entry_is_quarantined_and_reported_as_miss() {
        let dir = temp_cache_dir();
        let cache = ParquetCache::new(&dir);
        let period: Period = "1y".parse().unwrap();

        let entry_dir = dir.join("source=yahoo").join("symbol=AAPL");
        fs::create_dir_all(&entry_dir).unwrap();
        fs::write(entry_dir.join("1y.parquet"), b"not parquet at all").unwrap();

        let result = cache.get("AAPL", &period, ProviderKind::Yahoo).unwrap();
        assert!(result.is_none());
        assert!(entry_dir.join("1y.parquet.quarantined").exists());
        assert!(!entry_dir.join("1y.parquet").exists());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn status_lists_entries() {
        let dir = temp_cache_dir();
        let cache = ParquetCache::new(&dir);
        let period: Period = "1y".parse().unwrap();

        cache.put(&sample_series(ProviderKind::Yahoo), &period).unwrap();
        let mut other = sample_series(ProviderKind::Factset);
        other.symbol = "MSFT".into();
        cache.put(&other, &period).unwrap();

        let status = cache.status().unwrap();
        assert_eq!(status.len(), 2);
        assert!(status.iter().any(|s| s.symbol == "AAPL" && s.source == "yahoo"));
        assert!(status.iter().any(|s| s.symbol == "MSFT" && s.source == "factset"));
        assert!(status.iter().all(|s| s.size_bytes > 0 && s.bar_count == 2));

        let _ = fs::remove_dir_all(&dir);
    }
}
