//! Core pipeline orchestration for feedgen.
//!
//! This crate ties together catalog loading, support probing, aggregation,
//! and artifact emission into the end-to-end `generate` run.

pub mod aggregator;
pub mod catalog;
pub mod pipeline;

pub use aggregator::{Aggregation, aggregate};
pub use catalog::{SYMBOL_PATTERN, load_catalog, parse_catalog, validate_catalog};
pub use pipeline::{
    ArtifactKind, EmissionFailure, PipelineConfig, ProgressReporter, RunReport, RunStatus,
    SilentProgress, Stage, probe_catalog, run_pipeline, run_with_registry,
};
