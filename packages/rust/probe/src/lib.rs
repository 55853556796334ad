//! Provider adapters and the concurrent support-probing engine.
//!
//! This crate provides:
//! - [`adapters`]: the [`ProviderAdapter`] trait, built-in quote-API adapters, and the [`AdapterRegistry`]
//! - [`engine`]: [`MatrixBuilder`], which probes every (feed, adapter) pair into a [`SupportMatrix`]
//! - [`retry`]: backoff policy for transient probe failures

pub mod adapters;
pub mod engine;
pub mod retry;

pub use adapters::{
    AdapterRegistry, CoinGeckoAdapter, FailedAdapter, FinnhubAdapter, ProviderAdapter,
    StaticAdapter, YahooAdapter,
};
pub use engine::{
    DEADLINE_EXCEEDED, MatrixBuilder, MatrixRow, ProbeProgress, SilentProbeProgress,
    SupportMatrix, TASK_FAILED, probe_with_retry,
};
pub use retry::{Backoff, RetryPolicy};
