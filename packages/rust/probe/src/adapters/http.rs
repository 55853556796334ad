//! HTTP plumbing shared by the quote-API adapters.

use std::num::NonZeroU32;
use std::time::Duration;

use feedgen_shared::{
    AdapterConfig, FeedgenError, PricePolicy, ProbeConfig, ProbeOutcome, Result, bounded_timeout,
};
use governor::clock::DefaultClock;
use governor::state::InMemoryState;
use governor::state::direct::NotKeyed;
use governor::{Quota, RateLimiter};
use reqwest::{Client, RequestBuilder};
use tracing::debug;
use url::Url;

/// User-Agent string for probe requests.
const USER_AGENT: &str = concat!("feedgen/", env!("CARGO_PKG_VERSION"));

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Response body, or the provider's "no such symbol" answer.
pub(crate) enum Fetched {
    Body(String),
    NotFound,
}

/// Client, base URL, request budget, and price policy for one adapter instance.
pub(crate) struct HttpProbe {
    client: Client,
    base_url: Url,
    limiter: Option<DirectRateLimiter>,
    timeout: Duration,
    non_positive_price: PricePolicy,
}

impl HttpProbe {
    pub(crate) fn new(config: &AdapterConfig, default_base: &str, probe: &ProbeConfig) -> Result<Self> {
        let base = config.base_url.as_deref().unwrap_or(default_base);
        let base_url = Url::parse(base).map_err(|e| {
            FeedgenError::config(format!(
                "adapter '{}': invalid base_url '{base}': {e}",
                config.name
            ))
        })?;
        if base_url.scheme() != "http" && base_url.scheme() != "https" {
            return Err(FeedgenError::config(format!(
                "adapter '{}': base_url must be http(s), got '{base}'",
                config.name
            )));
        }

        let timeout = config.timeout_ms.map(bounded_timeout).unwrap_or(probe.timeout);

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| FeedgenError::Network(format!("failed to build HTTP client: {e}")))?;

        let limiter = config
            .requests_per_minute
            .and_then(NonZeroU32::new)
            .map(|rpm| RateLimiter::direct(Quota::per_minute(rpm)));

        Ok(Self {
            client,
            base_url,
            limiter,
            timeout,
            non_positive_price: probe.non_positive_price,
        })
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.timeout
    }

    pub(crate) async fn throttle(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    /// Base URL with `segments` appended as percent-encoded path segments.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> std::result::Result<Url, ProbeOutcome> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| ProbeOutcome::fatal(format!("base URL {} cannot take a path", self.base_url)))?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    pub(crate) fn get(&self, url: Url) -> RequestBuilder {
        self.client.get(url)
    }

    /// Send a request and map transport/status failures to probe outcomes.
    pub(crate) async fn send(&self, request: RequestBuilder) -> std::result::Result<Fetched, ProbeOutcome> {
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return Err(ProbeOutcome::transient("request timed out")),
            Err(e) => return Err(ProbeOutcome::transient(format!("request failed: {e}"))),
        };

        let status = response.status();
        debug!(url = %response.url(), %status, "provider responded");

        match status.as_u16() {
            200..=299 => {}
            400 | 404 | 422 => return Ok(Fetched::NotFound),
            401 | 403 => {
                return Err(ProbeOutcome::fatal(format!("credentials rejected (HTTP {status})")));
            }
            429 => return Err(ProbeOutcome::transient("rate limited (HTTP 429)")),
            _ => return Err(ProbeOutcome::transient(format!("HTTP {status}"))),
        }

        response
            .text()
            .await
            .map(Fetched::Body)
            .map_err(|e| ProbeOutcome::transient(format!("failed to read body: {e}")))
    }

    /// Classify a quoted price under this adapter's policy.
    pub(crate) fn price_outcome(&self, price: Option<f64>) -> ProbeOutcome {
        classify_price(price, self.non_positive_price)
    }
}

/// A quote is usable when its price exists and is finite and positive.
///
/// Missing or non-finite prices look like a malformed payload and are
/// transient; non-positive prices follow `policy`.
pub(crate) fn classify_price(price: Option<f64>, policy: PricePolicy) -> ProbeOutcome {
    match price {
        None => ProbeOutcome::transient("malformed quote: missing price"),
        Some(p) if !p.is_finite() => ProbeOutcome::transient(format!("malformed quote: price {p}")),
        Some(p) if p <= 0.0 => match policy {
            PricePolicy::Unsupported => ProbeOutcome::Unsupported,
            PricePolicy::Transient => ProbeOutcome::transient(format!("non-positive price {p}")),
        },
        Some(_) => ProbeOutcome::Supported,
    }
}
