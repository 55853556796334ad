//! The versioned feed config artifact (`feeds.json`).

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use feedgen_shared::{
    ArtifactFeed, CURRENT_SCHEMA_VERSION, ConfigArtifact, FeedCatalog, FeedDecision, Result,
};
use tracing::{info, instrument};

use crate::writer::{ArtifactMeta, write_json};

/// Value of the artifact's `generator` field.
pub const GENERATOR: &str = concat!("feedgen/", env!("CARGO_PKG_VERSION"));

/// Build the artifact from the catalog and per-feed decisions.
///
/// Only supported feeds are included, in catalog order. A catalog feed with
/// no decision is treated as unsupported.
pub fn build_config_artifact(
    catalog: &FeedCatalog,
    decisions: &[FeedDecision],
    generated_at: DateTime<Utc>,
) -> ConfigArtifact {
    let by_symbol: HashMap<&str, &FeedDecision> =
        decisions.iter().map(|d| (d.symbol.as_str(), d)).collect();

    let feeds = catalog
        .feeds
        .iter()
        .filter_map(|feed| {
            let decision = by_symbol.get(feed.symbol.as_str())?;
            if !decision.supported {
                return None;
            }
            Some(ArtifactFeed {
                symbol: feed.symbol.clone(),
                display_name: feed.display_name.clone(),
                metadata: feed.metadata.clone(),
                supporting_adapters: decision.supporting_adapters.iter().cloned().collect(),
            })
        })
        .collect();

    ConfigArtifact {
        schema_version: CURRENT_SCHEMA_VERSION,
        generator: GENERATOR.to_string(),
        generated_at,
        feeds,
    }
}

/// Overwrite `path` with the artifact as pretty JSON.
#[instrument(skip_all, fields(path = %path.display(), feeds = artifact.feeds.len()))]
pub fn emit_feed_config(path: &Path, artifact: &ConfigArtifact) -> Result<ArtifactMeta> {
    let meta = write_json(path, artifact)?;
    info!(sha256 = %meta.sha256, "feed config written");
    Ok(meta)
}
