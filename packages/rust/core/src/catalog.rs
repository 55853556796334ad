//! Feed catalog loading and validation.
//!
//! The catalog is loaded once per run. Any violation is fatal before probing
//! starts.

use std::collections::HashSet;
use std::path::Path;

use regex::Regex;
use tracing::{debug, info, instrument};

use feedgen_shared::{CATALOG_SCHEMA_VERSION, FeedCatalog, FeedgenError, Result};

/// Allowed feed symbol shape.
pub const SYMBOL_PATTERN: &str = r"^[A-Za-z0-9][A-Za-z0-9._/:-]*$";

/// Load and validate a catalog file.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_catalog(path: &Path) -> Result<FeedCatalog> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        FeedgenError::catalog(format!("cannot read {}: {e}", path.display()))
    })?;

    let catalog = parse_catalog(&content)?;
    info!(feeds = catalog.len(), "catalog loaded");
    Ok(catalog)
}

/// Parse and validate catalog JSON.
pub fn parse_catalog(content: &str) -> Result<FeedCatalog> {
    let catalog: FeedCatalog = serde_json::from_str(content)
        .map_err(|e| FeedgenError::catalog(format!("invalid catalog JSON: {e}")))?;
    validate_catalog(&catalog)?;
    Ok(catalog)
}

/// Check schema version and symbol rules (non-empty, well-formed, unique).
pub fn validate_catalog(catalog: &FeedCatalog) -> Result<()> {
    if catalog.schema_version != CATALOG_SCHEMA_VERSION {
        return Err(FeedgenError::catalog(format!(
            "unsupported schema_version: {} (expected {})",
            catalog.schema_version, CATALOG_SCHEMA_VERSION
        )));
    }

    let pattern = Regex::new(SYMBOL_PATTERN)
        .map_err(|e| FeedgenError::catalog(format!("invalid symbol pattern: {e}")))?;

    let mut seen = HashSet::with_capacity(catalog.len());
    for (idx, feed) in catalog.feeds.iter().enumerate() {
        if feed.symbol.is_empty() {
            return Err(FeedgenError::catalog(format!("feed #{idx} has an empty symbol")));
        }
        if !pattern.is_match(&feed.symbol) {
            return Err(FeedgenError::catalog(format!(
                "feed #{idx}: invalid symbol '{}'",
                feed.symbol
            )));
        }
        if !seen.insert(feed.symbol.as_str()) {
            return Err(FeedgenError::catalog(format!(
                "duplicate symbol '{}'",
                feed.symbol
            )));
        }
    }

    debug!(feeds = catalog.len(), "catalog valid");
    Ok(())
}
