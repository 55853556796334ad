//! Concurrent support-matrix builder.
//!
//! Every (feed, adapter) pair is probed exactly once (plus retries) under a
//! semaphore-bounded pool. Results come back to the joining task as
//! `(slot, outcome)` pairs and are written into a dense, write-once matrix, so
//! the final contents never depend on pool width or completion order.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use feedgen_shared::{
    AdapterOutcome, FeedCatalog, FeedDefinition, FeedgenError, ProbeConfig, ProbeOutcome, Result,
};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, instrument, warn};

use crate::adapters::{AdapterRegistry, ProviderAdapter};
use crate::retry::RetryPolicy;

/// Reason recorded for pairs still unfinished when the run deadline fires.
pub const DEADLINE_EXCEEDED: &str = "run deadline exceeded";

/// Reason recorded for a pair whose probe task panicked.
pub const TASK_FAILED: &str = "probe task failed";

// ---------------------------------------------------------------------------
// SupportMatrix
// ---------------------------------------------------------------------------

/// All probe outcomes for one run, keyed by (feed symbol, adapter name).
///
/// Feeds keep catalog order and adapters keep registration order.
#[derive(Debug, Clone, PartialEq)]
pub struct SupportMatrix {
    symbols: Vec<String>,
    adapters: Vec<String>,
    /// Row-major: `slots[feed_idx * adapters.len() + adapter_idx]`.
    slots: Vec<ProbeOutcome>,
}

/// One feed's outcomes in adapter order.
#[derive(Debug, Clone, Serialize)]
pub struct MatrixRow {
    pub symbol: String,
    pub outcomes: Vec<AdapterOutcome>,
}

impl SupportMatrix {
    /// Assemble a matrix from keyed outcomes.
    ///
    /// Fails if a key is unknown, written twice, or missing.
    pub fn from_outcomes<I>(symbols: Vec<String>, adapters: Vec<String>, outcomes: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String, ProbeOutcome)>,
    {
        let feed_index: HashMap<&str, usize> = symbols
            .iter()
            .enumerate()
            .map(|(i, s)| (s.as_str(), i))
            .collect();
        let adapter_index: HashMap<&str, usize> = adapters
            .iter()
            .enumerate()
            .map(|(i, a)| (a.as_str(), i))
            .collect();

        let mut slots: Vec<Option<ProbeOutcome>> = vec![None; symbols.len() * adapters.len()];
        for (symbol, adapter, outcome) in outcomes {
            let (Some(&f), Some(&a)) = (
                feed_index.get(symbol.as_str()),
                adapter_index.get(adapter.as_str()),
            ) else {
                return Err(FeedgenError::validation(format!(
                    "outcome for unknown pair ({symbol}, {adapter})"
                )));
            };
            let slot = &mut slots[f * adapters.len() + a];
            if slot.is_some() {
                return Err(FeedgenError::validation(format!(
                    "outcome for ({symbol}, {adapter}) written twice"
                )));
            }
            *slot = Some(outcome);
        }

        let slots = slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| {
                slot.ok_or_else(|| {
                    let (f, a) = (i / adapters.len(), i % adapters.len());
                    FeedgenError::validation(format!(
                        "missing outcome for ({}, {})",
                        symbols[f], adapters[a]
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            symbols,
            adapters,
            slots,
        })
    }

    /// Feed symbols in catalog order.
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Adapter names in registration order.
    pub fn adapters(&self) -> &[String] {
        &self.adapters
    }

    pub fn get(&self, symbol: &str, adapter: &str) -> Option<&ProbeOutcome> {
        let f = self.symbols.iter().position(|s| s == symbol)?;
        let a = self.adapters.iter().position(|n| n == adapter)?;
        self.slots.get(f * self.adapters.len() + a)
    }

    /// Outcomes for the feed at `feed_idx`, in adapter order.
    pub fn row(&self, feed_idx: usize) -> impl Iterator<Item = (&str, &ProbeOutcome)> {
        let width = self.adapters.len();
        let start = (feed_idx * width).min(self.slots.len());
        let end = (start + width).min(self.slots.len());
        self.adapters
            .iter()
            .map(String::as_str)
            .zip(self.slots[start..end].iter())
    }

    /// Owned rows, for display and JSON output.
    pub fn rows(&self) -> Vec<MatrixRow> {
        self.symbols
            .iter()
            .enumerate()
            .map(|(f, symbol)| MatrixRow {
                symbol: symbol.clone(),
                outcomes: self
                    .row(f)
                    .map(|(adapter, outcome)| AdapterOutcome {
                        adapter: adapter.to_string(),
                        outcome: outcome.clone(),
                    })
                    .collect(),
            })
            .collect()
    }

    /// Number of (feed, adapter) pairs.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for probe runs.
pub trait ProbeProgress: Send + Sync {
    /// Called on the joining task after each pair reaches a terminal outcome.
    fn probe_finished(&self, done: usize, total: usize);
}

/// No-op progress reporter.
pub struct SilentProbeProgress;

impl ProbeProgress for SilentProbeProgress {
    fn probe_finished(&self, _done: usize, _total: usize) {}
}

// ---------------------------------------------------------------------------
// MatrixBuilder
// ---------------------------------------------------------------------------

/// Runs every (feed, adapter) probe under bounded concurrency.
pub struct MatrixBuilder {
    registry: AdapterRegistry,
    config: ProbeConfig,
    retry: RetryPolicy,
}

impl MatrixBuilder {
    pub fn new(registry: AdapterRegistry, config: ProbeConfig) -> Self {
        let retry = RetryPolicy::from(&config);
        Self {
            registry,
            config,
            retry,
        }
    }

    /// Probe every pair and return the completed matrix.
    ///
    /// Never fails: per-pair trouble is recorded as an error outcome.
    #[instrument(skip_all, fields(feeds = catalog.len(), adapters = self.registry.len()))]
    pub async fn build(&self, catalog: &FeedCatalog, progress: &dyn ProbeProgress) -> SupportMatrix {
        let start = Instant::now();
        let adapters = self.registry.adapters();
        let width = adapters.len();
        let total = catalog.len() * width;
        let mut slots: Vec<Option<ProbeOutcome>> = vec![None; total];

        info!(
            pairs = total,
            concurrency = self.config.concurrency,
            max_retries = self.retry.max_retries,
            "probing support matrix"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut tasks: JoinSet<(usize, ProbeOutcome)> = JoinSet::new();
        let mut done = 0usize;

        let run = async {
            for (f, feed) in catalog.feeds.iter().enumerate() {
                for (a, adapter) in adapters.iter().enumerate() {
                    // Acquire before spawning so in-flight tasks never exceed the pool width.
                    let Ok(permit) = semaphore.clone().acquire_owned().await else {
                        return;
                    };
                    let slot = f * width + a;
                    let adapter = Arc::clone(adapter);
                    let feed = feed.clone();
                    let retry = self.retry.clone();
                    let timeout = self.config.timeout;

                    tasks.spawn(async move {
                        let _permit = permit;
                        let outcome = probe_with_retry(adapter.as_ref(), &feed, timeout, &retry).await;
                        (slot, outcome)
                    });

                    while let Some(joined) = tasks.try_join_next() {
                        record(&mut slots, joined, &mut done, total, progress);
                    }
                }
            }
            while let Some(joined) = tasks.join_next().await {
                record(&mut slots, joined, &mut done, total, progress);
            }
        };

        let deadline_hit = match self.config.deadline {
            Some(deadline) => tokio::time::timeout(deadline, run).await.is_err(),
            None => {
                run.await;
                false
            }
        };

        if deadline_hit {
            warn!(
                unfinished = total - done,
                "run deadline exceeded, aborting in-flight probes"
            );
            tasks.abort_all();
            collect_finished(&mut tasks, &mut slots, &mut done, total, progress);
        }
        drop(tasks);

        let fill = if deadline_hit {
            ProbeOutcome::transient(DEADLINE_EXCEEDED)
        } else {
            ProbeOutcome::fatal(TASK_FAILED)
        };
        let slots: Vec<ProbeOutcome> = slots
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| fill.clone()))
            .collect();

        info!(
            pairs = total,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "support matrix complete"
        );

        SupportMatrix {
            symbols: catalog.feeds.iter().map(|f| f.symbol.clone()).collect(),
            adapters: self.registry.names(),
            slots,
        }
    }
}

/// Store one joined task result. A panicked task leaves its slot empty.
fn record(
    slots: &mut [Option<ProbeOutcome>],
    joined: std::result::Result<(usize, ProbeOutcome), JoinError>,
    done: &mut usize,
    total: usize,
    progress: &dyn ProbeProgress,
) {
    match joined {
        Ok((slot, outcome)) => {
            if let Some(entry) = slots.get_mut(slot) {
                if entry.is_none() {
                    *entry = Some(outcome);
                }
            }
        }
        Err(e) => warn!(error = %e, "probe task failed"),
    }
    *done += 1;
    progress.probe_finished(*done, total);
}

/// Record tasks that completed but were never joined. Cancelled tasks are skipped.
fn collect_finished(
    tasks: &mut JoinSet<(usize, ProbeOutcome)>,
    slots: &mut [Option<ProbeOutcome>],
    done: &mut usize,
    total: usize,
    progress: &dyn ProbeProgress,
) {
    while let Some(joined) = tasks.try_join_next() {
        if let Ok(pair) = joined {
            record(slots, Ok(pair), done, total, progress);
        }
    }
}

/// Probe one pair, retrying transient outcomes per `retry`.
///
/// Each attempt is bounded by the adapter's timeout (or `default_timeout`).
/// Throttling happens outside the timeout.
pub async fn probe_with_retry(
    adapter: &dyn ProviderAdapter,
    feed: &FeedDefinition,
    default_timeout: Duration,
    retry: &RetryPolicy,
) -> ProbeOutcome {
    let limit = adapter.timeout().unwrap_or(default_timeout);
    let mut attempt = 0u32;

    loop {
        adapter.throttle().await;
        let outcome = match tokio::time::timeout(limit, adapter.probe(feed)).await {
            Ok(outcome) => outcome,
            Err(_) => ProbeOutcome::transient(format!(
                "probe timed out after {} ms",
                limit.as_millis()
            )),
        };

        if !outcome.is_transient() || attempt >= retry.max_retries {
            debug!(
                symbol = %feed.symbol,
                adapter = adapter.name(),
                attempt,
                outcome = outcome.label(),
                "probe finished"
            );
            return outcome;
        }

        let delay = retry.delay_for_attempt(attempt);
        debug!(
            symbol = %feed.symbol,
            adapter = adapter.name(),
            attempt,
            delay_ms = delay.as_millis() as u64,
            reason = outcome.reason().unwrap_or_default(),
            "transient probe failure, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
