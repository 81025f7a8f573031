//! RegimeLab data CLI — download market data and manage the local cache.
//!
//! Commands:
//! - `download` — bulk-fetch OHLCV data for tickers, a sector, or the full universe
//! - `universe sectors` — list the sector groups
//! - `universe tickers` — list tickers, optionally for one sector
//! - `cache status` — report cached entries, date ranges, and sizes

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use regimelab_data::{factory, CancelToken, Period, Source, Universe};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "regimelab",
    about = "RegimeLab data CLI — multi-source market data ingestion"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download daily OHLCV data and cache it as Parquet.
    Download {
        /// Symbols to download (e.g., SPY QQQ AAPL). Omit to use --sector or --universe.
        symbols: Vec<String>,

        /// Download every ticker in one sector group.
        #[arg(long, conflicts_with = "universe")]
        sector: Option<String>,

        /// Download the full top-200 universe.
        #[arg(long, default_value_t = false)]
        universe: bool,

        /// Lookback period: 1d, 5d, 1mo, 3mo, 6mo, 1y, 2y, 5y, 10y, max.
        #[arg(long, default_value = "10y")]
        period: String,

        /// Explicit start date (YYYY-MM-DD); requires --end, overrides --period.
        #[arg(long, requires = "end")]
        start: Option<String>,

        /// Explicit end date (YYYY-MM-DD); requires --start.
        #[arg(long, requires = "start")]
        end: Option<String>,

        /// Data source: auto, factset, or yahoo.
        #[arg(long, default_value = "auto")]
        source: String,

        /// Cache directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        cache_dir: PathBuf,
    },
    /// Universe inspection commands.
    Universe {
        #[command(subcommand)]
        action: UniverseAction,
    },
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum UniverseAction {
    /// List the sector groups and their ticker counts.
    Sectors,
    /// List tickers, for the whole universe or one sector.
    Tickers {
        /// Restrict to one sector group.
        #[arg(long)]
        sector: Option<String>,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Report cached entries, date ranges, and sizes.
    Status {
        /// Cache directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        cache_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Download {
            symbols,
            sector,
            universe,
            period,
            start,
            end,
            source,
            cache_dir,
        } => run_download(
            symbols,
            sector,
            universe,
            &period,
            start.as_deref(),
            end.as_deref(),
            &source,
            cache_dir,
        ),
        Commands::Universe { action } => match action {
            UniverseAction::Sectors => run_universe_sectors(),
            UniverseAction::Tickers { sector } => run_universe_tickers(sector.as_deref()),
        },
        Commands::Cache { action } => match action {
            CacheAction::Status { cache_dir } => run_cache_status(&cache_dir),
        },
    }
}

#[allow(clippy::too_many_arguments)]
fn run_download(
    symbols: Vec<String>,
    sector: Option<String>,
    universe: bool,
    period: &str,
    start: Option<&str>,
    end: Option<&str>,
    source: &str,
    cache_dir: PathBuf,
) -> Result<()> {
    let registry = Universe::top_liquid_us();

    let tickers: Vec<String> = if universe {
        if !symbols.is_empty() {
            bail!("--universe cannot be combined with explicit symbols");
        }
        registry.all_tickers().iter().map(|t| t.to_string()).collect()
    } else if let Some(name) = sector {
        if !symbols.is_empty() {
            bail!("--sector cannot be combined with explicit symbols");
        }
        registry.tickers_for_sector(&name)?.to_vec()
    } else if symbols.is_empty() {
        bail!("no symbols given (pass symbols, --sector, or --universe)");
    } else {
        symbols
    };

    let period: Period = match (start, end) {
        (Some(start), Some(end)) => Period::Range {
            start: chrono::NaiveDate::parse_from_str(start, "%Y-%m-%d")
                .context("invalid --start date")?,
            end: chrono::NaiveDate::parse_from_str(end, "%Y-%m-%d")
                .context("invalid --end date")?,
        },
        _ => period.parse()?,
    };
    let source: Source = source.parse()?;

    let client = factory::create(source, cache_dir).context("failed to construct data client")?;
    println!(
        "Fetching {} ticker(s) over {period} via {}",
        tickers.len(),
        client.provider_name()
    );

    let refs: Vec<&str> = tickers.iter().map(|s| s.as_str()).collect();
    let report = client.fetch_bulk(&refs, &period, true, &CancelToken::new());

    if !report.all_succeeded() {
        for (symbol, err) in report.failures() {
            eprintln!("Error for {symbol}: {err}");
        }
        std::process::exit(1);
    }

    Ok(())
}

fn run_universe_sectors() -> Result<()> {
    let registry = Universe::top_liquid_us();
    println!("{} sectors, {} tickers", registry.sector_names().len(), registry.ticker_count());
    println!();
    for name in registry.sector_names() {
        let count = registry.tickers_for_sector(name)?.len();
        println!("{name:<28} {count} tickers");
    }
    Ok(())
}

fn run_universe_tickers(sector: Option<&str>) -> Result<()> {
    let registry = Universe::top_liquid_us();
    match sector {
        Some(name) => {
            for ticker in registry.tickers_for_sector(name)? {
                println!("{ticker}");
            }
        }
        None => {
            for ticker in registry.all_tickers() {
                println!("{ticker}");
            }
        }
    }
    Ok(())
}

fn run_cache_status(cache_dir: &Path) -> Result<()> {
    if !cache_dir.exists() {
        println!("Cache directory does not exist: {}", cache_dir.display());
        return Ok(());
    }

    let cache = regimelab_data::ParquetCache::new(cache_dir);
    let entries = cache.status()?;

    if entries.is_empty() {
        println!("Cache is empty: {}", cache_dir.display());
        return Ok(());
    }

    let total_size: u64 = entries.iter().map(|e| e.size_bytes).sum();

    println!("Cache: {}", cache_dir.display());
    println!("Entries: {}", entries.len());
    println!("Total size: {}", format_size(total_size));
    println!();
    println!(
        "{:<8} {:<9} {:<10} {:<25} {:<12} {:>10}",
        "Symbol", "Source", "Period", "Date Range", "Bars", "Size"
    );
    println!("{}", "-".repeat(78));
    for entry in &entries {
        println!(
            "{:<8} {:<9} {:<10} {:<25} {:<12} {:>10}",
            entry.symbol,
            entry.source,
            entry.period,
            format!("{} to {}", entry.start_date, entry.end_date),
            format!("{} bars", entry.bar_count),
            format_size(entry.size_bytes)
        );
    }

    Ok(())
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
