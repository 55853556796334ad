//! Application configuration for feedgen.
//!
//! User config lives at `~/.feedgen/feedgen.toml` unless `--config` points elsewhere.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FeedgenError, Result};
use crate::types::NetworkDescriptor;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "feedgen.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".feedgen";

/// Upper bound for any per-call probe timeout.
pub const MAX_PROBE_TIMEOUT_MS: u64 = 60_000;

// ---------------------------------------------------------------------------
// Config structs (matching feedgen.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Probe engine settings.
    #[serde(default)]
    pub probe: ProbeSection,

    /// Artifact output locations.
    #[serde(default)]
    pub output: OutputConfig,

    /// Registered provider adapters, in registration order.
    #[serde(default = "default_adapters")]
    pub adapters: Vec<AdapterConfig>,

    /// Network registry used for environment templates.
    #[serde(default)]
    pub networks: Vec<NetworkDescriptor>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            probe: ProbeSection::default(),
            output: OutputConfig::default(),
            adapters: default_adapters(),
            networks: Vec::new(),
        }
    }
}

/// How a finite quote price `<= 0` is classified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricePolicy {
    /// The provider lists the symbol but has no market for it.
    #[default]
    Unsupported,
    /// Treat as provider flakiness and retry.
    Transient,
}

/// `[probe]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeSection {
    /// Maximum concurrent probes.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Retries for a transient failure (total attempts = retries + 1).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff between retries, doubled per attempt.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// Per-call timeout used when an adapter does not set its own.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Global deadline for the whole probing phase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_secs: Option<u64>,

    /// Classification of zero or negative prices.
    #[serde(default)]
    pub non_positive_price: PricePolicy,
}

impl Default for ProbeSection {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
            timeout_ms: default_timeout_ms(),
            deadline_secs: None,
            non_positive_price: PricePolicy::default(),
        }
    }
}

fn default_concurrency() -> u32 {
    16
}
fn default_max_retries() -> u32 {
    2
}
fn default_backoff_ms() -> u64 {
    250
}
fn default_timeout_ms() -> u64 {
    10_000
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Feed config artifact path.
    #[serde(default = "default_config_path")]
    pub config_path: String,

    /// Environment template path; the `env` command prints to stdout when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_template_path: Option<String>,

    /// MetaFiles that receive the generated navigation keys.
    #[serde(default)]
    pub meta_files: Vec<String>,

    /// Key under which the feed navigation list is merged.
    #[serde(default = "default_meta_key")]
    pub meta_key: String,

    /// Extra keys owned by the pipeline; removed when no longer generated.
    #[serde(default)]
    pub meta_owned_keys: Vec<String>,

    /// Diagnostics report path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics_path: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            config_path: default_config_path(),
            env_template_path: None,
            meta_files: Vec::new(),
            meta_key: default_meta_key(),
            meta_owned_keys: Vec::new(),
            diagnostics_path: None,
        }
    }
}

fn default_config_path() -> String {
    "generated/feeds.json".into()
}
fn default_meta_key() -> String {
    "feeds".into()
}

/// `[[adapters]]` entry.
///
/// `kind` stays a free string: an unknown kind must not fail config loading,
/// it becomes an adapter that reports a fatal error for every probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Name used in the matrix, the artifact, and diagnostics.
    pub name: String,

    /// Adapter implementation: `yahoo`, `finnhub`, `coingecko`, or `static`.
    pub kind: String,

    /// Override for the provider's API base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Client-side request budget.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests_per_minute: Option<u32>,

    /// Per-call timeout for this adapter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Allow-list for the `static` adapter.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub symbols: Vec<String>,
}

impl AdapterConfig {
    /// Minimal entry of the given kind, named after it.
    pub fn of_kind(kind: &str) -> Self {
        Self {
            name: kind.to_string(),
            kind: kind.to_string(),
            base_url: None,
            api_key_env: None,
            requests_per_minute: None,
            timeout_ms: None,
            symbols: Vec::new(),
        }
    }
}

fn default_adapters() -> Vec<AdapterConfig> {
    vec![
        AdapterConfig {
            requests_per_minute: Some(120),
            ..AdapterConfig::of_kind("yahoo")
        },
        AdapterConfig {
            requests_per_minute: Some(30),
            ..AdapterConfig::of_kind("coingecko")
        },
    ]
}

// ---------------------------------------------------------------------------
// Probe config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime probe configuration, merged from config file and CLI flags.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Worker pool width, always at least 1.
    pub concurrency: usize,
    /// Retries for transient failures.
    pub max_retries: u32,
    /// Initial retry backoff.
    pub backoff: Duration,
    /// Default per-call timeout, bounded by [`MAX_PROBE_TIMEOUT_MS`].
    pub timeout: Duration,
    /// Global deadline for the probing phase.
    pub deadline: Option<Duration>,
    /// Classification of zero or negative prices.
    pub non_positive_price: PricePolicy,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ProbeConfig {
    fn from(config: &AppConfig) -> Self {
        let probe = &config.probe;
        Self {
            concurrency: probe.concurrency.max(1) as usize,
            max_retries: probe.max_retries,
            backoff: Duration::from_millis(probe.backoff_ms),
            timeout: bounded_timeout(probe.timeout_ms),
            deadline: probe.deadline_secs.map(Duration::from_secs),
            non_positive_price: probe.non_positive_price,
        }
    }
}

/// Clamp a configured timeout into `1..=MAX_PROBE_TIMEOUT_MS` milliseconds.
pub fn bounded_timeout(timeout_ms: u64) -> Duration {
    Duration::from_millis(timeout_ms.clamp(1, MAX_PROBE_TIMEOUT_MS))
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.feedgen/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| FeedgenError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.feedgen/feedgen.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| FeedgenError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        FeedgenError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Reject configurations the pipeline cannot run with at all.
///
/// Per-adapter problems (unknown kind, missing key) are not rejected here;
/// they surface as fatal probe outcomes for that adapter only.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for adapter in &config.adapters {
        if adapter.name.trim().is_empty() {
            return Err(FeedgenError::config("adapter name must not be empty"));
        }
        if !seen.insert(adapter.name.as_str()) {
            return Err(FeedgenError::config(format!(
                "duplicate adapter name '{}'",
                adapter.name
            )));
        }
    }

    if config.output.meta_key.trim().is_empty() {
        return Err(FeedgenError::config("output.meta_key must not be empty"));
    }

    for network in &config.networks {
        if !network.network_name.chars().any(|c| c.is_ascii_alphanumeric()) {
            return Err(FeedgenError::config(format!(
                "network name '{}' must contain an ASCII letter or digit",
                network.network_name
            )));
        }
        if network.rpc_env_var_name.trim().is_empty() {
            return Err(FeedgenError::config(format!(
                "network '{}' has an empty rpc_env_var_name",
                network.network_name
            )));
        }
    }

    Ok(())
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let path = config_file_path()?;
    init_config_at(&path)?;
    Ok(path)
}

/// Write a default config file at an explicit location, creating parent directories.
pub fn init_config_at(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| FeedgenError::io(dir, e))?;
    }

    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| FeedgenError::config(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| FeedgenError::io(path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(())
}

/// Read a secret from the named environment variable.
///
/// Called once per adapter while the registry is built, never inside a probe.
pub fn resolve_secret(var_name: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(FeedgenError::config(format!(
            "API key not found. Set the {var_name} environment variable."
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("concurrency"));
        assert!(toml_str.contains("generated/feeds.json"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.probe.max_retries, 2);
        assert_eq!(parsed.adapters.len(), 2);
        assert_eq!(parsed.adapters[0].kind, "yahoo");
    }

    #[test]
    fn config_with_adapters_and_networks() {
        let toml_str = r#"
[probe]
concurrency = 4
non_positive_price = "transient"

[[adapters]]
name = "fh"
kind = "finnhub"
api_key_env = "FINNHUB_API_KEY"

[[networks]]
network_name = "ethereum"
chain_id = 1
rpc_env_var_name = "ETHEREUM_RPC_URL"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.adapters.len(), 1);
        assert_eq!(config.adapters[0].api_key_env.as_deref(), Some("FINNHUB_API_KEY"));
        assert_eq!(config.networks[0].chain_id, 1);
        assert_eq!(config.probe.non_positive_price, PricePolicy::Transient);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn explicit_empty_adapter_list_is_kept() {
        let config: AppConfig = toml::from_str("adapters = []").expect("parse");
        assert!(config.adapters.is_empty());
    }

    #[test]
    fn duplicate_adapter_names_rejected() {
        let mut config = AppConfig::default();
        config.adapters.push(AdapterConfig::of_kind("yahoo"));
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("duplicate adapter name"));
    }

    #[test]
    fn network_name_without_ascii_alphanumerics_rejected() {
        let mut config = AppConfig::default();
        config.networks = vec![NetworkDescriptor {
            network_name: "Ζήτα".into(),
            chain_id: 7777,
            rpc_env_var_name: "ZETA_RPC_URL".into(),
        }];
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("ASCII letter or digit"));
    }

    #[test]
    fn probe_config_from_app_config() {
        let mut app = AppConfig::default();
        app.probe.concurrency = 0;
        app.probe.timeout_ms = 600_000;
        app.probe.deadline_secs = Some(30);

        let probe = ProbeConfig::from(&app);
        assert_eq!(probe.concurrency, 1);
        assert_eq!(probe.timeout, Duration::from_millis(MAX_PROBE_TIMEOUT_MS));
        assert_eq!(probe.deadline, Some(Duration::from_secs(30)));
        assert_eq!(probe.backoff, Duration::from_millis(250));
    }

    #[test]
    fn missing_secret_is_config_error() {
        let result = resolve_secret("FEEDGEN_TEST_NONEXISTENT_KEY_12345");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}
