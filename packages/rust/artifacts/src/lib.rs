//! Artifact emission for feedgen.
//!
//! This crate provides:
//! - [`feed_config`]: the versioned `feeds.json` artifact
//! - [`env_template`]: per-network environment variable templates
//! - [`meta`]: key-preserving merge into existing metadata files
//! - [`report`]: the `diagnostics.json` report
//!
//! Every file is written via temp file + rename and yields an [`ArtifactMeta`].

pub mod env_template;
pub mod feed_config;
pub mod meta;
pub mod report;
pub mod writer;

pub use env_template::{emit_env_template, owner_var_name, render_env_template};
pub use feed_config::{GENERATOR, build_config_artifact, emit_feed_config};
pub use meta::{merge_meta, merge_meta_file, meta_fragment, read_meta};
pub use report::emit_diagnostics;
pub use writer::{ArtifactMeta, sha256_hex, write_atomic, write_json};
