//! Static allow-list adapter for manually maintained or offline providers.

use std::collections::HashSet;

use async_trait::async_trait;
use feedgen_shared::{FeedDefinition, ProbeOutcome};

use super::ProviderAdapter;

/// Supports exactly the configured symbols. Never errors.
pub struct StaticAdapter {
    name: String,
    symbols: HashSet<String>,
}

impl StaticAdapter {
    pub fn new(name: impl Into<String>, symbols: impl IntoIterator<Item = String>) -> Self {
        Self {
            name: name.into(),
            symbols: symbols.into_iter().collect(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for StaticAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn probe(&self, feed: &FeedDefinition) -> ProbeOutcome {
        if self.symbols.contains(&feed.symbol) {
            ProbeOutcome::Supported
        } else {
            ProbeOutcome::Unsupported
        }
    }
}
