//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use feedgen_artifacts::{emit_env_template, render_env_template};
use feedgen_core::{
    PipelineConfig, ProgressReporter, RunReport, RunStatus, Stage, probe_catalog, run_pipeline,
};
use feedgen_probe::{ProbeProgress, SupportMatrix};
use feedgen_shared::{
    AppConfig, ProbeOutcome, config_file_path, init_config, init_config_at, load_config,
    load_config_from,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// feedgen: generate market-data feed configuration from live provider support.
#[derive(Parser)]
#[command(
    name = "feedgen",
    version,
    about = "Probe market-data providers and generate feed configuration artifacts.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.feedgen/feedgen.toml).
    #[arg(long, global = true, env = "FEEDGEN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Output format for the `probe` command.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum MatrixFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Probe every feed and write the configured artifacts.
    Generate {
        /// Feed catalog JSON.
        #[arg(long)]
        catalog: PathBuf,

        /// Maximum concurrent probes (overrides probe.concurrency).
        #[arg(long)]
        concurrency: Option<u32>,

        /// Probe and aggregate without writing any file.
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the support matrix without emitting artifacts.
    Probe {
        /// Feed catalog JSON.
        #[arg(long)]
        catalog: PathBuf,

        /// Maximum concurrent probes (overrides probe.concurrency).
        #[arg(long)]
        concurrency: Option<u32>,

        /// Output format: text or json.
        #[arg(long, default_value = "text")]
        format: MatrixFormat,
    },

    /// Print or write the per-network environment template.
    Env {
        /// Output file (defaults to output.env_template_path, else stdout).
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. `RUST_LOG` wins over `-v`.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "feedgen=info",
        1 => "feedgen=debug",
        _ => "feedgen=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // stdout carries command output (matrix, env template); logs go to stderr.
    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command and return the process exit code.
pub(crate) async fn run(cli: Cli) -> Result<i32> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Generate {
            catalog,
            concurrency,
            dry_run,
        } => cmd_generate(config_path, catalog, concurrency, dry_run).await,
        Command::Probe {
            catalog,
            concurrency,
            format,
        } => cmd_probe(config_path, catalog, concurrency, format).await,
        Command::Env { out } => cmd_env(config_path, out.as_deref()),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(config_path),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

/// Load `--config` when given (must exist), else the default location.
fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

fn pipeline_config(
    config_path: Option<&Path>,
    catalog: PathBuf,
    concurrency: Option<u32>,
) -> Result<PipelineConfig> {
    let config = resolve_config(config_path)?;
    let mut pipeline = PipelineConfig::from_app_config(&config, catalog);
    if let Some(width) = concurrency {
        pipeline.probe.concurrency = width.max(1) as usize;
    }
    Ok(pipeline)
}

// ---------------------------------------------------------------------------
// generate
// ---------------------------------------------------------------------------

async fn cmd_generate(
    config_path: Option<&Path>,
    catalog: PathBuf,
    concurrency: Option<u32>,
    dry_run: bool,
) -> Result<i32> {
    let mut pipeline = pipeline_config(config_path, catalog, concurrency)?;
    pipeline.dry_run = dry_run;

    info!(
        catalog = %pipeline.catalog_path.display(),
        adapters = pipeline.adapters.len(),
        concurrency = pipeline.probe.concurrency,
        dry_run,
        "generating feed configuration"
    );

    let reporter = CliProgress::new();
    let report = match run_pipeline(&pipeline, &reporter).await {
        Ok(report) => report,
        Err(e) => {
            reporter.finish();
            error!(error = %e, "run aborted before probing");
            eprintln!("Error: {e}");
            return Ok(RunStatus::Aborted.exit_code());
        }
    };

    print_report(&report, dry_run);
    Ok(report.status.exit_code())
}

fn print_report(report: &RunReport, dry_run: bool) {
    let status = match report.status {
        RunStatus::Succeeded => "succeeded",
        RunStatus::Degraded => "degraded",
        RunStatus::Aborted => "aborted",
    };

    println!();
    println!("  Run:       {}", report.run_id);
    println!("  Status:    {status}");
    println!(
        "  Supported: {} / {}",
        report.supported_count(),
        report.decisions.len()
    );
    println!("  Dropped:   {}", report.diagnostics.dropped.len());
    println!("  Time:      {:.1}s", report.elapsed.as_secs_f64());

    if report.diagnostics.no_adapters {
        println!();
        println!("  No adapters configured: every feed was dropped.");
    }

    if !report.diagnostics.dropped.is_empty() {
        println!();
        println!("  Dropped feeds:");
        for dropped in &report.diagnostics.dropped {
            let outcomes: Vec<String> = dropped
                .outcomes
                .iter()
                .map(|o| format!("{}={}", o.adapter, o.outcome))
                .collect();
            println!("    {:<16} {}", dropped.symbol, outcomes.join(", "));
        }
    }

    if !report.diagnostics.adapter_failures.is_empty() {
        println!();
        println!("  Adapter errors:");
        for (adapter, counts) in &report.diagnostics.adapter_failures {
            println!(
                "    {adapter:<16} transient={} fatal={}",
                counts.transient, counts.fatal
            );
        }
    }

    if dry_run {
        println!();
        println!("  Dry run: no files written.");
    } else if !report.emitted.is_empty() {
        println!();
        println!("  Written:");
        for meta in &report.emitted {
            let short = meta.sha256.get(..12).unwrap_or(&meta.sha256);
            println!("    {}  {short}  {} bytes", meta.filename, meta.size_bytes);
        }
    }

    if !report.emission_errors.is_empty() {
        println!();
        println!("  Failed to write:");
        for failure in &report.emission_errors {
            println!("    {}: {}", failure.artifact, failure.reason);
        }
    }
    println!();
}

// ---------------------------------------------------------------------------
// probe
// ---------------------------------------------------------------------------

async fn cmd_probe(
    config_path: Option<&Path>,
    catalog: PathBuf,
    concurrency: Option<u32>,
    format: MatrixFormat,
) -> Result<i32> {
    let pipeline = pipeline_config(config_path, catalog, concurrency)?;

    let reporter = CliProgress::new();
    let matrix = probe_catalog(&pipeline, &reporter).await?;
    reporter.finish();

    match format {
        MatrixFormat::Text => print!("{}", format_matrix(&matrix)),
        MatrixFormat::Json => println!("{}", serde_json::to_string_pretty(&matrix.rows())?),
    }
    Ok(0)
}

/// Render the matrix as an aligned table, one row per feed.
fn format_matrix(matrix: &SupportMatrix) -> String {
    let symbol_width = matrix
        .symbols()
        .iter()
        .map(String::len)
        .chain(std::iter::once("SYMBOL".len()))
        .max()
        .unwrap_or(6);

    let mut out = format!("{:<symbol_width$}", "SYMBOL");
    for adapter in matrix.adapters() {
        out.push_str(&format!("  {:<12}", adapter));
    }
    out.push('\n');

    for (idx, symbol) in matrix.symbols().iter().enumerate() {
        out.push_str(&format!("{symbol:<symbol_width$}"));
        let mut reasons = Vec::new();
        for (adapter, outcome) in matrix.row(idx) {
            out.push_str(&format!("  {:<12}", cell(outcome)));
            if let Some(reason) = outcome.reason() {
                reasons.push(format!("{adapter}: {reason}"));
            }
        }
        if !reasons.is_empty() {
            out.push_str(&format!("  ({})", reasons.join("; ")));
        }
        out.push('\n');
    }
    out
}

fn cell(outcome: &ProbeOutcome) -> &'static str {
    match outcome {
        ProbeOutcome::Supported => "yes",
        ProbeOutcome::Unsupported => "no",
        ProbeOutcome::TransientError(_) => "transient",
        ProbeOutcome::FatalError(_) => "fatal",
    }
}

// ---------------------------------------------------------------------------
// env
// ---------------------------------------------------------------------------

fn cmd_env(config_path: Option<&Path>, out: Option<&Path>) -> Result<i32> {
    let config = resolve_config(config_path)?;
    let target = out
        .map(Path::to_path_buf)
        .or_else(|| config.output.env_template_path.as_ref().map(PathBuf::from));

    match target {
        Some(path) => {
            let meta = emit_env_template(&path, &config.networks)?;
            println!(
                "Environment template written to {} ({} networks)",
                meta.filename,
                config.networks.len()
            );
        }
        None => print!("{}", render_env_template(&config.networks)),
    }
    Ok(0)
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn cmd_config_init(config_path: Option<&Path>) -> Result<i32> {
    let path = match config_path {
        Some(path) => {
            init_config_at(path)?;
            path.to_path_buf()
        }
        None => init_config()?,
    };
    println!("Config initialized at: {}", path.display());
    Ok(0)
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<i32> {
    let config = resolve_config(config_path)?;
    let source = match config_path {
        Some(path) => path.to_path_buf(),
        None => config_file_path()?,
    };
    let toml_str = toml::to_string_pretty(&config)
        .map_err(|e| eyre!("failed to render config: {e}"))?;
    println!("# {}", source.display());
    println!("{toml_str}");
    Ok(0)
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProbeProgress for CliProgress {
    fn probe_finished(&self, done: usize, total: usize) {
        self.spinner
            .set_message(format!("Probing providers [{done}/{total}]"));
    }
}

impl ProgressReporter for CliProgress {
    fn stage(&self, stage: Stage) {
        self.spinner.set_message(stage.to_string());
    }

    fn probe_finished(&self, done: usize, total: usize) {
        ProbeProgress::probe_finished(self, done, total);
    }

    fn done(&self, _report: &RunReport) {
        self.finish();
    }
}
