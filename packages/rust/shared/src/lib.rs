//! Shared types, error model, and configuration for feedgen.
//!
//! This crate is the foundation depended on by all other feedgen crates.
//! It provides:
//! - [`FeedgenError`]: the unified error type
//! - Domain types ([`FeedDefinition`], [`ProbeOutcome`], [`FeedDecision`], [`ConfigArtifact`])
//! - Configuration ([`AppConfig`], [`ProbeConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AdapterConfig, AppConfig, MAX_PROBE_TIMEOUT_MS, OutputConfig, PricePolicy, ProbeConfig,
    ProbeSection, bounded_timeout, config_dir, config_file_path, init_config, init_config_at,
    load_config, load_config_from, resolve_secret, validate_config,
};
pub use error::{FeedgenError, Result};
pub use types::{
    AdapterFailure, AdapterOutcome, ArtifactFeed, CATALOG_SCHEMA_VERSION, CURRENT_SCHEMA_VERSION,
    ConfigArtifact, Diagnostics, DroppedFeed, FailureCounts, FeedCatalog, FeedDecision,
    FeedDefinition, NetworkDescriptor, ProbeOutcome, RunId,
};
