//! Reduces a support matrix into per-feed decisions and diagnostics.

use std::collections::BTreeSet;

use tracing::{debug, info};

use feedgen_probe::SupportMatrix;
use feedgen_shared::{
    AdapterFailure, AdapterOutcome, Diagnostics, DroppedFeed, FeedDecision, ProbeOutcome,
};

/// Decisions in catalog order plus the diagnostics report.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub decisions: Vec<FeedDecision>,
    pub diagnostics: Diagnostics,
}

impl Aggregation {
    pub fn supported_count(&self) -> usize {
        self.decisions.iter().filter(|d| d.supported).count()
    }
}

/// A feed is supported iff at least one adapter returned `Supported`.
///
/// Error outcomes never count as support. With no adapters every feed is
/// dropped and `no_adapters` is set.
pub fn aggregate(matrix: &SupportMatrix) -> Aggregation {
    let mut diagnostics = Diagnostics {
        no_adapters: matrix.adapters().is_empty(),
        ..Diagnostics::default()
    };
    let mut decisions = Vec::with_capacity(matrix.symbols().len());

    for (idx, symbol) in matrix.symbols().iter().enumerate() {
        let mut supporting_adapters = BTreeSet::new();
        let mut errors = Vec::new();

        for (adapter, outcome) in matrix.row(idx) {
            match outcome {
                ProbeOutcome::Supported => {
                    supporting_adapters.insert(adapter.to_string());
                }
                ProbeOutcome::Unsupported => {}
                ProbeOutcome::TransientError(reason) => {
                    diagnostics
                        .adapter_failures
                        .entry(adapter.to_string())
                        .or_default()
                        .transient += 1;
                    errors.push(AdapterFailure {
                        adapter: adapter.to_string(),
                        reason: reason.clone(),
                    });
                }
                ProbeOutcome::FatalError(reason) => {
                    diagnostics
                        .adapter_failures
                        .entry(adapter.to_string())
                        .or_default()
                        .fatal += 1;
                    errors.push(AdapterFailure {
                        adapter: adapter.to_string(),
                        reason: reason.clone(),
                    });
                }
            }
        }

        let supported = !supporting_adapters.is_empty();
        if !supported {
            debug!(%symbol, "feed dropped: no supporting adapter");
            diagnostics.dropped.push(DroppedFeed {
                symbol: symbol.clone(),
                outcomes: matrix
                    .row(idx)
                    .map(|(adapter, outcome)| AdapterOutcome {
                        adapter: adapter.to_string(),
                        outcome: outcome.clone(),
                    })
                    .collect(),
            });
        }

        decisions.push(FeedDecision {
            symbol: symbol.clone(),
            supported,
            supporting_adapters,
            errors,
        });
    }

    let aggregation = Aggregation {
        decisions,
        diagnostics,
    };
    info!(
        feeds = aggregation.decisions.len(),
        supported = aggregation.supported_count(),
        dropped = aggregation.diagnostics.dropped.len(),
        "aggregation complete"
    );
    aggregation
}
