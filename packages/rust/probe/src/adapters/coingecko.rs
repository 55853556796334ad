//! CoinGecko simple-price adapter.
//!
//! A `BASE-QUOTE` symbol is probed as `/simple/price?ids=<id>&vs_currencies=<quote>`,
//! where `<id>` is `metadata.coingecko_id` or the lowercased base.
//! CoinGecko answers unknown ids with an empty object.

use std::time::Duration;

use async_trait::async_trait;
use feedgen_shared::{
    AdapterConfig, FeedDefinition, ProbeConfig, ProbeOutcome, Result, resolve_secret,
};

use super::http::{Fetched, HttpProbe};
use super::{ProviderAdapter, provider_symbol};

const BASE_URL: &str = "https://api.coingecko.com/api/v3";
const ID_KEY: &str = "coingecko_id";
const DEFAULT_QUOTE: &str = "usd";

/// CoinGecko adapter. The demo API key is optional.
pub struct CoinGeckoAdapter {
    name: String,
    http: HttpProbe,
    api_key: Option<String>,
}

impl CoinGeckoAdapter {
    pub fn new(config: &AdapterConfig, probe: &ProbeConfig) -> Result<Self> {
        let api_key = match &config.api_key_env {
            Some(var) => Some(resolve_secret(var)?),
            None => None,
        };
        Ok(Self {
            name: config.name.clone(),
            http: HttpProbe::new(config, BASE_URL, probe)?,
            api_key,
        })
    }

    fn interpret(&self, body: &str, id: &str, quote: &str) -> ProbeOutcome {
        let prices: serde_json::Map<String, serde_json::Value> = match serde_json::from_str(body) {
            Ok(prices) => prices,
            Err(e) => return ProbeOutcome::transient(format!("malformed price response: {e}")),
        };

        let Some(entry) = prices.get(id) else {
            return ProbeOutcome::Unsupported;
        };
        match entry.get(quote) {
            None | Some(serde_json::Value::Null) => ProbeOutcome::Unsupported,
            Some(value) => match value.as_f64() {
                Some(price) => self.http.price_outcome(Some(price)),
                None => ProbeOutcome::transient(format!("malformed price response: {value}")),
            },
        }
    }
}

/// Split `BASE-QUOTE` (or `BASE/QUOTE`) into lowercase parts; quote defaults to USD.
fn split_pair(symbol: &str) -> (String, String) {
    match symbol.split_once(['-', '/']) {
        Some((base, quote)) if !quote.is_empty() => (base.to_lowercase(), quote.to_lowercase()),
        Some((base, _)) => (base.to_lowercase(), DEFAULT_QUOTE.into()),
        None => (symbol.to_lowercase(), DEFAULT_QUOTE.into()),
    }
}

#[async_trait]
impl ProviderAdapter for CoinGeckoAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn timeout(&self) -> Option<Duration> {
        Some(self.http.timeout())
    }

    async fn throttle(&self) {
        self.http.throttle().await;
    }

    async fn probe(&self, feed: &FeedDefinition) -> ProbeOutcome {
        let (base, quote) = split_pair(&feed.symbol);
        let id = match provider_symbol(feed, ID_KEY) {
            explicit if explicit != feed.symbol => explicit.to_string(),
            _ => base,
        };

        let url = match self.http.endpoint(&["simple", "price"]) {
            Ok(url) => url,
            Err(outcome) => return outcome,
        };

        let mut request = self
            .http
            .get(url)
            .query(&[("ids", id.as_str()), ("vs_currencies", quote.as_str())]);
        if let Some(key) = &self.api_key {
            request = request.header("x-cg-demo-api-key", key);
        }

        match self.http.send(request).await {
            Ok(Fetched::Body(body)) => self.interpret(&body, &id, &quote),
            Ok(Fetched::NotFound) => ProbeOutcome::Unsupported,
            Err(outcome) => outcome,
        }
    }
}
