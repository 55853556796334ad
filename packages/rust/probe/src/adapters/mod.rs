//! Provider adapter trait and built-in market-data adapters.
//!
//! An adapter wraps one external quote API and answers a single question per
//! feed: does this provider serve it? Provider payloads never leave the adapter;
//! the rest of the pipeline only sees [`ProbeOutcome`].

mod coingecko;
mod finnhub;
mod http;
mod static_list;
mod yahoo;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use feedgen_shared::{AdapterConfig, FeedDefinition, ProbeConfig, ProbeOutcome, Result};
use tracing::{debug, warn};

pub use coingecko::CoinGeckoAdapter;
pub use finnhub::FinnhubAdapter;
pub use static_list::StaticAdapter;
pub use yahoo::YahooAdapter;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Uniform support-probe capability over one market-data provider.
///
/// `probe` must not fail for an ordinary "not carried" answer: that is
/// [`ProbeOutcome::Unsupported`]. Network trouble and malformed payloads are
/// [`ProbeOutcome::TransientError`]; broken configuration is
/// [`ProbeOutcome::FatalError`].
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Name used as the adapter's key in the support matrix.
    fn name(&self) -> &str;

    /// Per-call timeout; `None` falls back to the probe config default.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    /// Wait for provider-side request budget. Not counted against the call timeout.
    async fn throttle(&self) {}

    /// Check whether the provider supports the feed.
    async fn probe(&self, feed: &FeedDefinition) -> ProbeOutcome;
}

// ---------------------------------------------------------------------------
// Misconfigured adapter
// ---------------------------------------------------------------------------

/// Stands in for an adapter whose configuration could not be turned into a
/// working client. Every probe reports the configuration error as fatal.
pub struct FailedAdapter {
    name: String,
    reason: String,
}

impl FailedAdapter {
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for FailedAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn probe(&self, _feed: &FeedDefinition) -> ProbeOutcome {
        ProbeOutcome::fatal(self.reason.clone())
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Holds registered adapters in registration order.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn ProviderAdapter>>,
}

impl AdapterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every configured adapter.
    ///
    /// Never fails: an entry that cannot be built is registered as a
    /// [`FailedAdapter`] so the problem shows up in diagnostics for every feed.
    pub fn from_config(configs: &[AdapterConfig], probe: &ProbeConfig) -> Self {
        let mut registry = Self::new();
        for config in configs {
            match build_adapter(config, probe) {
                Ok(adapter) => {
                    debug!(adapter = %config.name, kind = %config.kind, "registered adapter");
                    registry.register(adapter);
                }
                Err(e) => {
                    warn!(adapter = %config.name, error = %e, "adapter misconfigured");
                    registry.register(Arc::new(FailedAdapter::new(&config.name, e.to_string())));
                }
            }
        }
        registry
    }

    /// Append an adapter.
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.push(adapter);
    }

    pub fn adapters(&self) -> &[Arc<dyn ProviderAdapter>] {
        &self.adapters
    }

    /// Adapter names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.adapters.iter().map(|a| a.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

/// Construct the adapter implementation named by `config.kind`.
fn build_adapter(config: &AdapterConfig, probe: &ProbeConfig) -> Result<Arc<dyn ProviderAdapter>> {
    let adapter: Arc<dyn ProviderAdapter> = match config.kind.as_str() {
        "yahoo" => Arc::new(YahooAdapter::new(config, probe)?),
        "finnhub" => Arc::new(FinnhubAdapter::new(config, probe)?),
        "coingecko" => Arc::new(CoinGeckoAdapter::new(config, probe)?),
        "static" => Arc::new(StaticAdapter::new(&config.name, config.symbols.iter().cloned())),
        other => {
            return Err(feedgen_shared::FeedgenError::config(format!(
                "unknown adapter kind '{other}'"
            )));
        }
    };
    Ok(adapter)
}

/// Provider-specific symbol for a feed: `metadata.<key>` when present, else the canonical symbol.
pub(crate) fn provider_symbol<'a>(feed: &'a FeedDefinition, key: &str) -> &'a str {
    feed.metadata
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(&feed.symbol)
}
