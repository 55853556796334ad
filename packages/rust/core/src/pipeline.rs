//! End-to-end `generate` pipeline: catalog → probe → aggregate → emit.
//!
//! Stages run strictly in order (`Loaded → Probing → Aggregated → Emitted →
//! Done`). Only catalog loading can abort a run; probe and emission failures
//! are collected into the [`RunReport`].

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

use feedgen_artifacts::{
    ArtifactMeta, build_config_artifact, emit_diagnostics, emit_env_template, emit_feed_config,
    merge_meta_file, meta_fragment,
};
use feedgen_probe::{AdapterRegistry, MatrixBuilder, ProbeProgress, SupportMatrix};
use feedgen_shared::{
    AdapterConfig, AppConfig, ConfigArtifact, Diagnostics, FeedCatalog, FeedDecision,
    NetworkDescriptor, OutputConfig, ProbeConfig, Result, RunId,
};

use crate::aggregator::{Aggregation, aggregate};
use crate::catalog::load_catalog;

/// Configuration for one pipeline run, merged from config file and CLI flags.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Feed catalog JSON.
    pub catalog_path: PathBuf,
    pub probe: ProbeConfig,
    pub adapters: Vec<AdapterConfig>,
    pub networks: Vec<NetworkDescriptor>,
    pub output: OutputConfig,
    /// Probe and aggregate, but write nothing.
    pub dry_run: bool,
}

impl PipelineConfig {
    pub fn from_app_config(config: &AppConfig, catalog_path: impl Into<PathBuf>) -> Self {
        Self {
            catalog_path: catalog_path.into(),
            probe: ProbeConfig::from(config),
            adapters: config.adapters.clone(),
            networks: config.networks.clone(),
            output: config.output.clone(),
            dry_run: false,
        }
    }
}

/// Pipeline stage, reported to [`ProgressReporter::stage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Loaded,
    Probing,
    Aggregated,
    Emitted,
    Done,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Loaded => "Catalog loaded",
            Self::Probing => "Probing providers",
            Self::Aggregated => "Aggregated decisions",
            Self::Emitted => "Artifacts emitted",
            Self::Done => "Done",
        };
        f.write_str(name)
    }
}

/// Overall outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every feed supported, no fatal probe errors, every artifact written.
    Succeeded,
    /// Completed with dropped feeds, fatal probe errors, or a failed secondary artifact.
    Degraded,
    /// Catalog could not be loaded, or the feed config could not be written.
    Aborted,
}

impl RunStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Succeeded => 0,
            Self::Aborted => 1,
            Self::Degraded => 2,
        }
    }
}

/// Which output an artifact path belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    FeedConfig,
    EnvTemplate,
    Meta,
    Diagnostics,
}

/// An artifact that could not be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmissionFailure {
    pub kind: ArtifactKind,
    pub artifact: String,
    pub reason: String,
}

/// Result of a pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub status: RunStatus,
    pub decisions: Vec<FeedDecision>,
    pub diagnostics: Diagnostics,
    pub emitted: Vec<ArtifactMeta>,
    pub emission_errors: Vec<EmissionFailure>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn supported_count(&self) -> usize {
        self.decisions.iter().filter(|d| d.supported).count()
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when a stage completes or, for `Probing`, starts.
    fn stage(&self, stage: Stage);
    /// Called after each (feed, adapter) pair finishes.
    fn probe_finished(&self, done: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, report: &RunReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage(&self, _stage: Stage) {}
    fn probe_finished(&self, _done: usize, _total: usize) {}
    fn done(&self, _report: &RunReport) {}
}

/// Adapts a `ProgressReporter` to the probe engine's progress interface.
struct PipelineProbeProgress<'a> {
    inner: &'a dyn ProgressReporter,
}

impl ProbeProgress for PipelineProbeProgress<'_> {
    fn probe_finished(&self, done: usize, total: usize) {
        self.inner.probe_finished(done, total);
    }
}

/// Run the full pipeline with adapters built from `config.adapters`.
#[instrument(skip_all, fields(catalog = %config.catalog_path.display(), dry_run = config.dry_run))]
pub async fn run_pipeline(
    config: &PipelineConfig,
    progress: &dyn ProgressReporter,
) -> Result<RunReport> {
    let catalog = load_catalog(&config.catalog_path)?;
    let registry = AdapterRegistry::from_config(&config.adapters, &config.probe);
    Ok(run_with_registry(config, &catalog, registry, progress).await)
}

/// Run everything after catalog loading against an explicit adapter registry.
pub async fn run_with_registry(
    config: &PipelineConfig,
    catalog: &FeedCatalog,
    registry: AdapterRegistry,
    progress: &dyn ProgressReporter,
) -> RunReport {
    let start = Instant::now();
    let run_id = RunId::new();

    info!(%run_id, feeds = catalog.len(), adapters = registry.len(), "starting run");
    progress.stage(Stage::Loaded);

    // --- Probing ---
    progress.stage(Stage::Probing);
    let builder = MatrixBuilder::new(registry, config.probe.clone());
    let matrix = builder
        .build(catalog, &PipelineProbeProgress { inner: progress })
        .await;

    // --- Aggregation ---
    let Aggregation {
        decisions,
        diagnostics,
    } = aggregate(&matrix);
    progress.stage(Stage::Aggregated);

    // --- Emission ---
    let generated_at = Utc::now();
    let artifact = build_config_artifact(catalog, &decisions, generated_at);
    let (emitted, emission_errors) = if config.dry_run {
        info!(feeds = artifact.feeds.len(), "dry run, skipping emission");
        (Vec::new(), Vec::new())
    } else {
        emit_all(config, &run_id, generated_at, &artifact, &diagnostics)
    };
    progress.stage(Stage::Emitted);

    let status = run_status(&diagnostics, &emission_errors);

    let report = RunReport {
        run_id,
        status,
        decisions,
        diagnostics,
        emitted,
        emission_errors,
        elapsed: start.elapsed(),
    };

    progress.stage(Stage::Done);
    progress.done(&report);

    info!(
        run_id = %report.run_id,
        status = ?report.status,
        supported = report.supported_count(),
        dropped = report.diagnostics.dropped.len(),
        emitted = report.emitted.len(),
        emission_errors = report.emission_errors.len(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "run complete"
    );

    report
}

/// Load the catalog and probe it without aggregating or emitting.
#[instrument(skip_all, fields(catalog = %config.catalog_path.display()))]
pub async fn probe_catalog(
    config: &PipelineConfig,
    progress: &dyn ProbeProgress,
) -> Result<SupportMatrix> {
    let catalog = load_catalog(&config.catalog_path)?;
    let registry = AdapterRegistry::from_config(&config.adapters, &config.probe);
    Ok(MatrixBuilder::new(registry, config.probe.clone())
        .build(&catalog, progress)
        .await)
}

/// Transient errors on feeds another adapter supports do not degrade a run.
fn run_status(diagnostics: &Diagnostics, emission_errors: &[EmissionFailure]) -> RunStatus {
    if emission_errors
        .iter()
        .any(|e| e.kind == ArtifactKind::FeedConfig)
    {
        RunStatus::Aborted
    } else if diagnostics.is_clean() && emission_errors.is_empty() {
        RunStatus::Succeeded
    } else {
        RunStatus::Degraded
    }
}

/// Write every configured artifact. A failure is recorded and the rest are still attempted.
fn emit_all(
    config: &PipelineConfig,
    run_id: &RunId,
    generated_at: DateTime<Utc>,
    artifact: &ConfigArtifact,
    diagnostics: &Diagnostics,
) -> (Vec<ArtifactMeta>, Vec<EmissionFailure>) {
    let output = &config.output;
    let mut emitted = Vec::new();
    let mut errors = Vec::new();

    let mut record = |kind: ArtifactKind, path: &Path, result: Result<ArtifactMeta>| match result {
        Ok(meta) => emitted.push(meta),
        Err(e) => {
            warn!(artifact = %path.display(), ?kind, error = %e, "artifact emission failed");
            errors.push(EmissionFailure {
                kind,
                artifact: path.display().to_string(),
                reason: e.to_string(),
            });
        }
    };

    let config_path = Path::new(&output.config_path);
    record(
        ArtifactKind::FeedConfig,
        config_path,
        emit_feed_config(config_path, artifact),
    );

    if let Some(env_path) = &output.env_template_path {
        let env_path = Path::new(env_path);
        record(
            ArtifactKind::EnvTemplate,
            env_path,
            emit_env_template(env_path, &config.networks),
        );
    }

    let fragment = meta_fragment(&output.meta_key, artifact);
    for meta_path in &output.meta_files {
        let meta_path = Path::new(meta_path);
        record(
            ArtifactKind::Meta,
            meta_path,
            merge_meta_file(meta_path, &fragment, &output.meta_owned_keys),
        );
    }

    if let Some(diag_path) = &output.diagnostics_path {
        let diag_path = Path::new(diag_path);
        record(
            ArtifactKind::Diagnostics,
            diag_path,
            emit_diagnostics(diag_path, run_id, generated_at, diagnostics),
        );
    }

    (emitted, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use feedgen_probe::ProviderAdapter;
    use feedgen_shared::{FeedDefinition, ProbeOutcome};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Adapter answering from a fixed table; unknown symbols are unsupported.
    struct Table {
        name: &'static str,
        answers: HashMap<&'static str, ProbeOutcome>,
    }

    #[async_trait]
    impl ProviderAdapter for Table {
        fn name(&self) -> &str {
            self.name
        }

        async fn probe(&self, feed: &FeedDefinition) -> ProbeOutcome {
            self.answers
                .get(feed.symbol.as_str())
                .cloned()
                .unwrap_or(ProbeOutcome::Unsupported)
        }
    }

    #[derive(Default)]
    struct Recording(Mutex<Vec<Stage>>);

    impl ProgressReporter for Recording {
        fn stage(&self, stage: Stage) {
            self.0.lock().unwrap().push(stage);
        }
        fn probe_finished(&self, _done: usize, _total: usize) {}
        fn done(&self, _report: &RunReport) {}
    }

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("fg-pipeline-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn catalog(symbols: &[&str]) -> FeedCatalog {
        FeedCatalog {
            schema_version: 1,
            feeds: symbols
                .iter()
                .map(|s| FeedDefinition {
                    symbol: s.to_string(),
                    display_name: format!("{s} feed"),
                    metadata: Default::default(),
                })
                .collect(),
        }
    }

    fn config_in(root: &Path) -> PipelineConfig {
        let path = |name: &str| root.join(name).display().to_string();
        let mut config = PipelineConfig::from_app_config(&AppConfig::default(), root.join("catalog.json"));
        config.output = OutputConfig {
            config_path: path("generated/feeds.json"),
            env_template_path: Some(path("generated/.env.example")),
            meta_files: vec![path("docs/_meta.json")],
            diagnostics_path: Some(path("generated/diagnostics.json")),
            ..OutputConfig::default()
        };
        config.networks = vec![NetworkDescriptor {
            network_name: "ethereum".into(),
            chain_id: 1,
            rpc_env_var_name: "ETHEREUM_RPC_URL".into(),
        }];
        config.probe.backoff = Duration::from_millis(1);
        config
    }

    fn scenario_registry() -> AdapterRegistry {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(Table {
            name: "a",
            answers: HashMap::from([
                ("BTC-USD", ProbeOutcome::Supported),
                ("ZZZ-FAKE", ProbeOutcome::transient("HTTP 503")),
            ]),
        }));
        registry.register(Arc::new(Table {
            name: "b",
            answers: HashMap::new(),
        }));
        registry
    }

    fn read_json(path: &str) -> serde_json::Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn supported_and_dropped_feeds_end_to_end() {
        let root = temp_dir();
        let config = config_in(&root);
        std::fs::create_dir_all(root.join("docs")).unwrap();
        std::fs::write(root.join("docs/_meta.json"), r#"{"foo": 1}"#).unwrap();
        let progress = Recording::default();

        let report = run_with_registry(
            &config,
            &catalog(&["BTC-USD", "ZZZ-FAKE"]),
            scenario_registry(),
            &progress,
        )
        .await;

        assert_eq!(report.status, RunStatus::Degraded);
        assert_eq!(report.status.exit_code(), 2);
        assert_eq!(
            *progress.0.lock().unwrap(),
            vec![
                Stage::Loaded,
                Stage::Probing,
                Stage::Aggregated,
                Stage::Emitted,
                Stage::Done
            ]
        );

        let feeds = read_json(&config.output.config_path);
        assert_eq!(feeds["feeds"].as_array().unwrap().len(), 1);
        assert_eq!(feeds["feeds"][0]["symbol"], "BTC-USD");
        assert_eq!(feeds["feeds"][0]["supporting_adapters"], serde_json::json!(["a"]));

        let dropped = &report.diagnostics.dropped;
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].symbol, "ZZZ-FAKE");
        assert_eq!(dropped[0].outcomes[0].adapter, "a");
        assert!(dropped[0].outcomes[0].outcome.is_error());
        assert_eq!(dropped[0].outcomes[1].adapter, "b");
        assert_eq!(dropped[0].outcomes[1].outcome, ProbeOutcome::Unsupported);

        let meta = read_json(&config.output.meta_files[0]);
        assert_eq!(
            meta,
            serde_json::json!({
                "foo": 1,
                "feeds": [{ "symbol": "BTC-USD", "title": "BTC-USD feed" }]
            })
        );

        let env = std::fs::read_to_string(config.output.env_template_path.as_ref().unwrap()).unwrap();
        assert!(env.contains("ETHEREUM_OWNER_ADDRESSES=\"\""));

        let diag = read_json(config.output.diagnostics_path.as_ref().unwrap());
        assert_eq!(diag["dropped"][0]["symbol"], "ZZZ-FAKE");

        assert_eq!(report.emitted.len(), 4);
        assert!(report.emission_errors.is_empty());

        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn all_supported_run_succeeds() {
        let root = temp_dir();
        let config = config_in(&root);
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(Table {
            name: "a",
            answers: HashMap::from([
                ("BTC-USD", ProbeOutcome::Supported),
                ("ETH-USD", ProbeOutcome::Supported),
            ]),
        }));

        let report = run_with_registry(
            &config,
            &catalog(&["BTC-USD", "ETH-USD"]),
            registry,
            &SilentProgress,
        )
        .await;

        assert_eq!(report.status, RunStatus::Succeeded);
        assert_eq!(report.supported_count(), 2);

        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn transient_error_beside_support_still_succeeds() {
        let root = temp_dir();
        let config = config_in(&root);
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(Table {
            name: "a",
            answers: HashMap::from([("BTC-USD", ProbeOutcome::Supported)]),
        }));
        registry.register(Arc::new(Table {
            name: "b",
            answers: HashMap::from([("BTC-USD", ProbeOutcome::transient("HTTP 503"))]),
        }));

        let report =
            run_with_registry(&config, &catalog(&["BTC-USD"]), registry, &SilentProgress).await;

        assert_eq!(report.diagnostics.adapter_failures["b"].transient, 1);
        assert_eq!(report.diagnostics.fatal_count(), 0);
        assert_eq!(report.status, RunStatus::Succeeded);
        assert_eq!(report.status.exit_code(), 0);

        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn fatal_error_beside_support_degrades() {
        let root = temp_dir();
        let config = config_in(&root);
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(Table {
            name: "a",
            answers: HashMap::from([("BTC-USD", ProbeOutcome::Supported)]),
        }));
        registry.register(Arc::new(Table {
            name: "b",
            answers: HashMap::from([("BTC-USD", ProbeOutcome::fatal("HTTP 401"))]),
        }));

        let report =
            run_with_registry(&config, &catalog(&["BTC-USD"]), registry, &SilentProgress).await;

        assert!(report.diagnostics.dropped.is_empty());
        assert_eq!(report.status, RunStatus::Degraded);

        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn unwritable_feed_config_aborts_run() {
        let root = temp_dir();
        let config = config_in(&root);
        std::fs::create_dir_all(&config.output.config_path).unwrap();

        let report = run_with_registry(
            &config,
            &catalog(&["BTC-USD"]),
            scenario_registry(),
            &SilentProgress,
        )
        .await;

        assert_eq!(report.status, RunStatus::Aborted);
        assert_eq!(report.status.exit_code(), 1);
        assert_eq!(report.emission_errors.len(), 1);
        assert_eq!(report.emission_errors[0].kind, ArtifactKind::FeedConfig);
        assert!(Path::new(config.output.env_template_path.as_ref().unwrap()).exists());

        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn zero_adapters_emits_empty_artifact() {
        let root = temp_dir();
        let config = config_in(&root);

        let report = run_with_registry(
            &config,
            &catalog(&["BTC-USD", "ETH-USD"]),
            AdapterRegistry::new(),
            &SilentProgress,
        )
        .await;

        assert_eq!(report.status, RunStatus::Degraded);
        assert!(report.diagnostics.no_adapters);
        assert_eq!(report.diagnostics.dropped.len(), 2);

        let feeds = read_json(&config.output.config_path);
        assert_eq!(feeds["feeds"], serde_json::json!([]));

        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn repeated_runs_are_identical_except_timestamp() {
        let root = temp_dir();
        let config = config_in(&root);
        let feeds = catalog(&["BTC-USD", "ZZZ-FAKE"]);
        let strip = |s: String| {
            s.lines()
                .filter(|l| !l.contains("generated_at"))
                .collect::<Vec<_>>()
                .join("\n")
        };

        run_with_registry(&config, &feeds, scenario_registry(), &SilentProgress).await;
        let first = std::fs::read_to_string(&config.output.config_path).unwrap();
        let first_meta = std::fs::read_to_string(&config.output.meta_files[0]).unwrap();

        run_with_registry(&config, &feeds, scenario_registry(), &SilentProgress).await;
        let second = std::fs::read_to_string(&config.output.config_path).unwrap();
        let second_meta = std::fs::read_to_string(&config.output.meta_files[0]).unwrap();

        assert_eq!(strip(first), strip(second));
        assert_eq!(first_meta, second_meta);

        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn emission_error_does_not_stop_other_artifacts() {
        let root = temp_dir();
        let config = config_in(&root);
        std::fs::create_dir_all(root.join("docs")).unwrap();
        std::fs::write(root.join("docs/_meta.json"), "not json").unwrap();

        let report = run_with_registry(
            &config,
            &catalog(&["BTC-USD"]),
            scenario_registry(),
            &SilentProgress,
        )
        .await;

        assert_eq!(report.status, RunStatus::Degraded);
        assert_eq!(report.emission_errors.len(), 1);
        assert_eq!(report.emission_errors[0].kind, ArtifactKind::Meta);
        assert_eq!(report.emission_errors[0].artifact, config.output.meta_files[0]);
        assert_eq!(report.emitted.len(), 3);
        assert!(Path::new(&config.output.config_path).exists());
        assert!(Path::new(config.output.diagnostics_path.as_ref().unwrap()).exists());
        assert_eq!(
            std::fs::read_to_string(root.join("docs/_meta.json")).unwrap(),
            "not json"
        );

        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn dry_run_writes_nothing() {
        let root = temp_dir();
        let mut config = config_in(&root);
        config.dry_run = true;

        let report = run_with_registry(
            &config,
            &catalog(&["BTC-USD"]),
            scenario_registry(),
            &SilentProgress,
        )
        .await;

        assert!(report.emitted.is_empty());
        assert_eq!(report.supported_count(), 1);
        assert!(!Path::new(&config.output.config_path).exists());

        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn invalid_catalog_aborts_before_probing() {
        let root = temp_dir();
        let config = config_in(&root);
        std::fs::write(&config.catalog_path, r#"{"schema_version":1,"feeds":[{"symbol":""}]}"#)
            .unwrap();

        let result = run_pipeline(&config, &SilentProgress).await;
        assert!(result.is_err());
        assert!(!Path::new(&config.output.config_path).exists());

        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn probe_catalog_uses_configured_adapters() {
        let root = temp_dir();
        let mut config = config_in(&root);
        config.adapters = vec![AdapterConfig {
            name: "manual".into(),
            symbols: vec!["BTC-USD".into()],
            ..AdapterConfig::of_kind("static")
        }];
        std::fs::write(
            &config.catalog_path,
            r#"{"schema_version":1,"feeds":[
                {"symbol":"BTC-USD","display_name":"Bitcoin"},
                {"symbol":"ETH-USD","display_name":"Ether"}]}"#,
        )
        .unwrap();

        let matrix = probe_catalog(&config, &feedgen_probe::SilentProbeProgress)
            .await
            .unwrap();

        assert_eq!(matrix.get("BTC-USD", "manual"), Some(&ProbeOutcome::Supported));
        assert_eq!(matrix.get("ETH-USD", "manual"), Some(&ProbeOutcome::Unsupported));

        std::fs::remove_dir_all(&root).ok();
    }
}
