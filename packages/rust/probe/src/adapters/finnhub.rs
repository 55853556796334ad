//! Finnhub quote adapter.
//!
//! Probes `/quote?symbol=..`. Finnhub answers unknown symbols with HTTP 200
//! and an all-zero quote instead of an error, so `c == 0 && o == 0` is
//! treated as "not carried".

use std::time::Duration;

use async_trait::async_trait;
use feedgen_shared::{
    AdapterConfig, FeedDefinition, ProbeConfig, ProbeOutcome, Result, resolve_secret,
};
use serde::Deserialize;

use super::http::{Fetched, HttpProbe};
use super::{ProviderAdapter, provider_symbol};

const BASE_URL: &str = "https://finnhub.io/api/v1";
const DEFAULT_API_KEY_ENV: &str = "FINNHUB_API_KEY";
const SYMBOL_KEY: &str = "finnhub_symbol";

/// Response from /quote.
#[derive(Debug, Deserialize)]
struct QuoteResponse {
    /// Current price
    c: Option<f64>,
    /// Open price of the day
    o: Option<f64>,
}

/// Finnhub adapter. Requires an API key.
pub struct FinnhubAdapter {
    name: String,
    http: HttpProbe,
    api_key: String,
}

impl FinnhubAdapter {
    pub fn new(config: &AdapterConfig, probe: &ProbeConfig) -> Result<Self> {
        let key_env = config.api_key_env.as_deref().unwrap_or(DEFAULT_API_KEY_ENV);
        Ok(Self {
            name: config.name.clone(),
            http: HttpProbe::new(config, BASE_URL, probe)?,
            api_key: resolve_secret(key_env)?,
        })
    }

    /// Build with an explicit key instead of reading the environment.
    pub fn with_api_key(
        config: &AdapterConfig,
        probe: &ProbeConfig,
        api_key: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            name: config.name.clone(),
            http: HttpProbe::new(config, BASE_URL, probe)?,
            api_key: api_key.into(),
        })
    }

    fn interpret(&self, body: &str) -> ProbeOutcome {
        let quote: QuoteResponse = match serde_json::from_str(body) {
            Ok(quote) => quote,
            Err(e) => return ProbeOutcome::transient(format!("malformed quote response: {e}")),
        };

        if quote.c == Some(0.0) && quote.o.unwrap_or(0.0) == 0.0 {
            return ProbeOutcome::Unsupported;
        }

        self.http.price_outcome(quote.c)
    }
}

#[async_trait]
impl ProviderAdapter for FinnhubAdapter {
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
        let url = match self.http.endpoint(&["quote"]) {
            Ok(url) => url,
            Err(outcome) => return outcome,
        };

        // Key goes in a header, not the query string.
        let request = self
            .http
            .get(url)
            .query(&[("symbol", provider_symbol(feed, SYMBOL_KEY))])
            .header("X-Finnhub-Token", &self.api_key);

        match self.http.send(request).await {
            Ok(Fetched::Body(body)) => self.interpret(&body),
            Ok(Fetched::NotFound) => ProbeOutcome::Unsupported,
            Err(outcome) => outcome,
        }
    }
}
