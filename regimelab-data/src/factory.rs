//! Client factory: credential-driven provider selection with fallback.
//!
//! Selection is an explicit decision table over the requested source:
//! - `factset`: construct the institutional client or fail loudly —
//!   an explicit request is never silently downgraded.
//! - `yahoo`: always the public client.
//! - `auto`: institutional when a credential is configured and the client
//!   constructs; otherwise the public client, with a warning when a
//!   configured credential could not be used.

use crate::cache::ParquetCache;
use crate::client::DataClient;
use crate::factset::{FactsetProvider, FACTSET_API_KEY_VAR};
use crate::provider::{DataError, MarketDataProvider};
use crate::yahoo::YahooProvider;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, warn};

/// Which upstream source to construct a client for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Source {
    #[default]
    Auto,
    Factset,
    Yahoo,
}

impl FromStr for Source {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Source::Auto),
            "factset" => Ok(Source::Factset),
            "yahoo" => Ok(Source::Yahoo),
            _ => Err(DataError::Validation(format!(
                "unknown data source '{s}' (expected auto, factset, or yahoo)"
            ))),
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Source::Auto => "auto",
            Source::Factset => "factset",
            Source::Yahoo => "yahoo",
        })
    }
}

/// Create a client, reading the institutional credential from the
/// process environment.
pub fn create(source: Source, cache_dir: impl Into<PathBuf>) -> Result<DataClient, DataError> {
    create_with_key(source, cache_dir, std::env::var(FACTSET_API_KEY_VAR).ok())
}

/// Create a client with an explicit (possibly absent) credential.
///
/// The returned client satisfies the full fetch contract regardless of
/// which provider was selected.
pub fn create_with_key(
    source: Source,
    cache_dir: impl Into<PathBuf>,
    api_key: Option<String>,
) -> Result<DataClient, DataError> {
    let provider: Box<dyn MarketDataProvider> = match source {
        Source::Factset => Box::new(FactsetProvider::new(api_key)?),
        Source::Yahoo => Box::new(YahooProvider::new()),
        Source::Auto => match api_key {
            None => {
                debug!("no institutional credential configured; using public provider");
                Box::new(YahooProvider::new())
            }
            Some(key) => match FactsetProvider::new(Some(key)) {
                Ok(provider) => Box::new(provider),
                Err(e) => {
                    warn!(error = %e, "institutional client unavailable; falling back to public provider");
                    Box::new(YahooProvider::new())
                }
            },
        },
    };

    Ok(DataClient::new(provider, ParquetCache::new(cache_dir)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderKind;
    use std::path::Path;

    fn cache_dir() -> &'static Path {
        Path::new("target/test-cache")
    }

    #[test]
    fn parse_sources() {
        assert_eq!("auto".parse::<Source>().unwrap(), Source::Auto);
        assert_eq!("factset".parse::<Source>().unwrap(), Source::Factset);
        assert_eq!("yahoo".parse::<Source>().unwrap(), Source::Yahoo);
        assert!("bloomberg".parse::<Source>().is_err());
    }

    #[test]
    fn auto_without_credential_is_public() {
        let client = create_with_key(Source::Auto, cache_dir(), None).unwrap();
        assert_eq!(client.provider_kind(), ProviderKind::Yahoo);
    }

    #[test]
    fn auto_with_credential_is_institutional() {
        let client = create_with_key(Source::Auto, cache_dir(), Some("test-key".into())).unwrap();
        assert_eq!(client.provider_kind(), ProviderKind::Factset);
    }

    #[test]
    fn auto_with_unusable_credential_falls_back() {
        // Newlines cannot be carried in an Authorization header, so the
        // institutional client fails its construction check.
        let client =
            create_with_key(Source::Auto, cache_dir(), Some("bad\nkey".into())).unwrap();
        assert_eq!(client.provider_kind(), ProviderKind::Yahoo);
    }

    #[test]
    fn explicit_factset_without_credential_fails_loudly() {
        let result = create_with_key(Source::Factset, cache_dir(), None);
        assert!(matches!(result, Err(DataError::MissingCredential)));
    }

    #[test]
    fn explicit_yahoo_ignores_credential() {
        let client = create_with_key(Source::Yahoo, cache_dir(), Some("test-key".into())).unwrap();
        assert_eq!(client.provider_kind(), ProviderKind::Yahoo);
    }
}
