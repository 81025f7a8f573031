//! Universe registry — the static top-200 liquid US equity list,
//! organized by sector.
//!
//! The registry is a fixed dataset, not user-editable at runtime. Sector
//! lookup is a case-sensitive exact match.

use crate::provider::DataError;
use std::collections::BTreeMap;

const TECHNOLOGY: &[&str] = &[
    "AAPL", "MSFT", "GOOGL", "AMZN", "NVDA", "META", "TSLA", "AVGO", "ORCL", "ADBE", "CRM", "AMD",
    "INTC", "CSCO", "QCOM", "TXN", "AMAT", "MU", "LRCX", "KLAC",
];

const COMMUNICATION: &[&str] = &[
    "NFLX", "PYPL", "SNOW", "NOW", "PANW", "CRWD", "ZS", "DDOG", "NET", "TEAM", "UBER", "ABNB",
    "LYFT", "DASH", "COIN", "SQ", "SHOP", "MELI", "SE", "BABA",
];

const FINANCIALS: &[&str] = &[
    "JPM", "BAC", "WFC", "C", "GS", "MS", "BLK", "SCHW", "AXP", "SPGI", "CME", "ICE", "BX", "KKR",
    "V", "MA", "FIS", "FISV", "ADP", "TFC",
];

const HEALTHCARE: &[&str] = &[
    "UNH", "JNJ", "LLY", "ABBV", "MRK", "TMO", "ABT", "DHR", "PFE", "BMY", "AMGN", "GILD", "REGN",
    "VRTX", "BIIB", "MRNA", "ISRG", "SYK", "BSX", "MDT",
];

const CONSUMER_DISCRETIONARY: &[&str] = &[
    "HD", "NKE", "MCD", "SBUX", "TGT", "LOW", "BKNG", "MAR", "GM", "F", "RIVN", "LCID", "CMG",
    "YUM", "DRI", "ULTA", "LULU", "ROST", "HLT", "DG",
];

const CONSUMER_STAPLES: &[&str] = &[
    "PG", "KO", "PEP", "WMT", "COST", "PM", "MO", "CL", "MDLZ", "KHC", "GIS", "K", "HSY", "CAG",
    "CPB", "MKC", "SJM", "KMB", "CLX", "CHD",
];

const ENERGY: &[&str] = &[
    "XOM", "CVX", "COP", "SLB", "EOG", "MPC", "PSX", "VLO", "OXY", "HAL", "DVN", "FANG", "PXD",
    "HES", "MRO", "APA", "BKR", "NOV", "FTI", "WMB",
];

const INDUSTRIALS: &[&str] = &[
    "BA", "HON", "UNP", "CAT", "RTX", "LMT", "GE", "DE", "MMM", "UPS", "FDX", "NSC", "CSX", "EMR",
    "ETN", "ITW", "PH", "CARR", "PCAR", "ROK",
];

const MATERIALS: &[&str] = &[
    "LIN", "APD", "ECL", "SHW", "DD", "NEM", "FCX", "DOW", "ALB", "CE", "PPG", "NUE", "VMC", "MLM",
    "CF", "MOS", "IFF", "FMC", "EMN", "IP",
];

const UTILITIES_REAL_ESTATE: &[&str] = &[
    "AMT", "PLD", "CCI", "EQIX", "PSA", "SPG", "O", "WELL", "DLR", "AVB", "NEE", "DUK", "SO", "D",
    "AEP", "EXC", "SRE", "XEL", "WEC", "ES",
];

/// The complete universe: sector name → ordered ticker list.
#[derive(Debug, Clone)]
pub struct Universe {
    sectors: BTreeMap<String, Vec<String>>,
}

impl Universe {
    /// The default 200-symbol fetch set: liquid large and mid-cap US
    /// equities across ten sectors.
    pub fn top_liquid_us() -> Self {
        let mut sectors = BTreeMap::new();
        for (name, tickers) in [
            ("Technology", TECHNOLOGY),
            ("Communication", COMMUNICATION),
            ("Financials", FINANCIALS),
            ("Healthcare", HEALTHCARE),
            ("Consumer Discretionary", CONSUMER_DISCRETIONARY),
            ("Consumer Staples", CONSUMER_STAPLES),
            ("Energy", ENERGY),
            ("Industrials", INDUSTRIALS),
            ("Materials", MATERIALS),
            ("Utilities & Real Estate", UTILITIES_REAL_ESTATE),
        ] {
            sectors.insert(
                name.to_string(),
                tickers.iter().map(|t| t.to_string()).collect(),
            );
        }
        Self { sectors }
    }

    /// All tickers across all sectors, in a stable fixed order
    /// (sectors alphabetically, tickers in their defined order).
    pub fn all_tickers(&self) -> Vec<&str> {
        self.sectors
            .values()
            .flat_map(|tickers| tickers.iter().map(|t| t.as_str()))
            .collect()
    }

    /// Tickers for a specific sector (case-sensitive exact match).
    pub fn tickers_for_sector(&self, name: &str) -> Result<&[String], DataError> {
        self.sectors
            .get(name)
            .map(|v| v.as_slice())
            .ok_or_else(|| DataError::UnknownSector {
                name: name.to_string(),
                known: self.sector_names().join(", "),
            })
    }

    /// The list of sector names.
    pub fn sector_names(&self) -> Vec<&str> {
        self.sectors.keys().map(|s| s.as_str()).collect()
    }

    /// Total number of tickers.
    pub fn ticker_count(&self) -> usize {
        self.sectors.values().map(|v| v.len()).sum()
    }
}
