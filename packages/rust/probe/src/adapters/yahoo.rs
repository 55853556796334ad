//! Yahoo Finance chart adapter.
//!
//! Probes `/v8/finance/chart/{symbol}` and checks `meta.regularMarketPrice`.
//! Unknown symbols come back as HTTP 404 or `chart.error.code == "Not Found"`.

use std::time::Duration;

use async_trait::async_trait;
use feedgen_shared::{AdapterConfig, FeedDefinition, ProbeConfig, ProbeOutcome, Result};
use serde::Deserialize;

use super::http::{Fetched, HttpProbe};
use super::{ProviderAdapter, provider_symbol};

const BASE_URL: &str = "https://query1.finance.yahoo.com";

/// Metadata key that overrides the symbol sent to Yahoo (e.g. `EURUSD=X`).
const SYMBOL_KEY: &str = "yahoo_symbol";

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default)]
    regular_market_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: Option<String>,
}

/// Yahoo Finance adapter. No API key required.
pub struct YahooAdapter {
    name: String,
    http: HttpProbe,
}

impl YahooAdapter {
    pub fn new(config: &AdapterConfig, probe: &ProbeConfig) -> Result<Self> {
        Ok(Self {
            name: config.name.clone(),
            http: HttpProbe::new(config, BASE_URL, probe)?,
        })
    }

    fn interpret(&self, body: &str) -> ProbeOutcome {
        let envelope: ChartEnvelope = match serde_json::from_str(body) {
            Ok(envelope) => envelope,
            Err(e) => return ProbeOutcome::transient(format!("malformed chart response: {e}")),
        };

        if let Some(error) = envelope.chart.error {
            if error.code.eq_ignore_ascii_case("not found") {
                return ProbeOutcome::Unsupported;
            }
            let detail = error.description.unwrap_or_default();
            return ProbeOutcome::transient(format!("chart error {}: {detail}", error.code));
        }

        match envelope.chart.result.as_deref() {
            Some([first, ..]) => self.http.price_outcome(first.meta.regular_market_price),
            _ => ProbeOutcome::transient("malformed chart response: empty result"),
        }
    }
}

#[async_trait]
impl ProviderAdapter for YahooAdapter {
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
        let symbol = provider_symbol(feed, SYMBOL_KEY);
        let url = match self.http.endpoint(&["v8", "finance", "chart", symbol]) {
            Ok(url) => url,
            Err(outcome) => return outcome,
        };

        let request = self
            .http
            .get(url)
            .query(&[("range", "1d"), ("interval", "1d")]);

        match self.http.send(request).await {
            Ok(Fetched::Body(body)) => self.interpret(&body),
            Ok(Fetched::NotFound) => ProbeOutcome::Unsupported,
            Err(outcome) => outcome,
        }
    }
}
