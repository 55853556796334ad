//! Core domain types for the feed configuration pipeline.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current schema version for the emitted feed config artifact.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Schema version accepted for the feed catalog input.
pub const CATALOG_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one pipeline run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Feed catalog
// ---------------------------------------------------------------------------

/// One canonical feed definition. Identity is the symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeedDefinition {
    /// Canonical symbol, e.g. `BTC-USD`.
    pub symbol: String,
    /// Human-readable label used by downstream navigation.
    pub display_name: String,
    /// Opaque display metadata, passed through untouched.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// The `catalog.json` input document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeedCatalog {
    /// Schema version for forward compatibility.
    pub schema_version: u32,
    /// Feeds in canonical (display) order.
    pub feeds: Vec<FeedDefinition>,
}

impl FeedCatalog {
    /// Iterate over the catalog symbols in order.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.feeds.iter().map(|f| f.symbol.as_str())
    }

    /// Number of feeds in the catalog.
    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    /// Whether the catalog has no feeds.
    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }
}

// ---------------------------------------------------------------------------
// ProbeOutcome
// ---------------------------------------------------------------------------

/// Result of a single (feed, adapter) support probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum ProbeOutcome {
    /// The provider serves a usable quote for the symbol.
    Supported,
    /// The provider answered and does not carry the symbol.
    Unsupported,
    /// Network, timeout, throttling, or malformed payload.
    TransientError(String),
    /// Not retryable: bad adapter configuration, rejected credentials.
    FatalError(String),
}

impl ProbeOutcome {
    pub fn transient(reason: impl Into<String>) -> Self {
        Self::TransientError(reason.into())
    }

    pub fn fatal(reason: impl Into<String>) -> Self {
        Self::FatalError(reason.into())
    }

    /// Whether this outcome is a transient or fatal error.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::TransientError(_) | Self::FatalError(_))
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientError(_))
    }

    /// Error reason, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::TransientError(r) | Self::FatalError(r) => Some(r),
            _ => None,
        }
    }

    /// Short status label for logs and text output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Supported => "supported",
            Self::Unsupported => "unsupported",
            Self::TransientError(_) => "transient_error",
            Self::FatalError(_) => "fatal_error",
        }
    }
}

impl std::fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.reason() {
            Some(reason) => write!(f, "{}: {reason}", self.label()),
            None => f.write_str(self.label()),
        }
    }
}

// ---------------------------------------------------------------------------
// Decisions and diagnostics
// ---------------------------------------------------------------------------

/// An error recorded against one adapter for one feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterFailure {
    pub adapter: String,
    pub reason: String,
}

/// Per-feed support decision derived from the support matrix.
///
/// Invariant: `supported == !supporting_adapters.is_empty()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedDecision {
    pub symbol: String,
    pub supported: bool,
    pub supporting_adapters: BTreeSet<String>,
    /// Transient and fatal errors in adapter registration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<AdapterFailure>,
}

/// One adapter's outcome for a dropped feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterOutcome {
    pub adapter: String,
    pub outcome: ProbeOutcome,
}

/// A catalog feed that no adapter supports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedFeed {
    pub symbol: String,
    /// Every non-supported outcome, in adapter registration order.
    pub outcomes: Vec<AdapterOutcome>,
}

/// Error tallies for one adapter across the whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureCounts {
    pub transient: usize,
    pub fatal: usize,
}

/// Operator-facing report of everything that was not cleanly supported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Set when the run had no adapters registered at all.
    #[serde(default)]
    pub no_adapters: bool,
    /// Dropped feeds in catalog order.
    pub dropped: Vec<DroppedFeed>,
    /// Only adapters with at least one error appear here.
    pub adapter_failures: BTreeMap<String, FailureCounts>,
}

impl Diagnostics {
    /// Total number of fatal outcomes across all adapters.
    pub fn fatal_count(&self) -> usize {
        self.adapter_failures.values().map(|c| c.fatal).sum()
    }

    /// Whether anything needs operator attention.
    pub fn is_clean(&self) -> bool {
        !self.no_adapters && self.dropped.is_empty() && self.fatal_count() == 0
    }
}

// ---------------------------------------------------------------------------
// Config artifact
// ---------------------------------------------------------------------------

/// A supported feed as written to the config artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactFeed {
    pub symbol: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// Sorted adapter names that returned `Supported`.
    pub supporting_adapters: Vec<String>,
}

/// The versioned `feeds.json` output document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigArtifact {
    /// Lets consumers detect incompatible shape changes.
    pub schema_version: u32,
    /// Tool name and version that produced the file.
    pub generator: String,
    pub generated_at: DateTime<Utc>,
    /// Supported feeds only, in catalog order.
    pub feeds: Vec<ArtifactFeed>,
}

// ---------------------------------------------------------------------------
// Networks
// ---------------------------------------------------------------------------

/// One entry of the network registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDescriptor {
    pub network_name: String,
    pub chain_id: u64,
    pub rpc_env_var_name: String,
}
