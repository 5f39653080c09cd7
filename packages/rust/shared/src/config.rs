//! Application configuration for TopicDoc.
//!
//! User config lives at `~/.topicdoc/topicdoc.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TopicDocError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "topicdoc.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".topicdoc";

// ---------------------------------------------------------------------------
// Config structs (matching topicdoc.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// OpenRouter settings.
    #[serde(default)]
    pub openrouter: OpenRouterConfig,

    /// Web search backend settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Page fetch settings.
    #[serde(default)]
    pub fetch: FetchConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// URLs requested from each discovery query.
    #[serde(default = "default_results_per_query")]
    pub results_per_query: usize,

    /// Maximum pages fetched at once.
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,

    /// Aggregated characters needed before synthesis is grounded in sources.
    #[serde(default = "default_min_grounding_chars")]
    pub min_grounding_chars: usize,

    /// A subtopic whose extracted fragments total this many characters or
    /// fewer falls back to model knowledge.
    #[serde(default)]
    pub min_fragment_chars: usize,

    /// Per-source cap applied while aggregating fetched content.
    #[serde(default = "default_max_source_chars")]
    pub max_source_chars: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            results_per_query: default_results_per_query(),
            fetch_concurrency: default_fetch_concurrency(),
            min_grounding_chars: default_min_grounding_chars(),
            min_fragment_chars: 0,
            max_source_chars: default_max_source_chars(),
        }
    }
}

fn default_results_per_query() -> usize {
    2
}
fn default_fetch_concurrency() -> usize {
    4
}
fn default_min_grounding_chars() -> usize {
    500
}
fn default_max_source_chars() -> usize {
    12_000
}

/// `[openrouter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model used for every generation call.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// API root; `/chat/completions` is appended.
    #[serde(default = "default_openrouter_url")]
    pub base_url: String,

    /// Per-call timeout in seconds.
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            default_model: default_model(),
            base_url: default_openrouter_url(),
            timeout_secs: default_generation_timeout(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_model() -> String {
    "google/gemini-2.0-flash-001".into()
}
fn default_openrouter_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_generation_timeout() -> u64 {
    120
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// DuckDuckGo HTML endpoint root.
    #[serde(default = "default_search_url")]
    pub base_url: String,

    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: default_search_url(),
            timeout_secs: default_search_timeout(),
        }
    }
}

fn default_search_url() -> String {
    "https://html.duckduckgo.com".into()
}
fn default_search_timeout() -> u64 {
    15
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Page-load timeout in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,

    /// Pause after a page loads, before its text is extracted.
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,

    /// Permit loopback and private-network targets.
    #[serde(default)]
    pub allow_private_hosts: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout(),
            settle_delay_ms: default_settle_delay(),
            allow_private_hosts: false,
        }
    }
}

fn default_fetch_timeout() -> u64 {
    30
}
fn default_settle_delay() -> u64 {
    1000
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.topicdoc/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| TopicDocError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.topicdoc/topicdoc.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| TopicDocError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| TopicDocError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| TopicDocError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| TopicDocError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| TopicDocError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the OpenRouter API key from the configured env var.
pub fn resolve_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.openrouter.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(TopicDocError::config(format!(
            "OpenRouter API key not found. Set the {var_name} environment variable.\n\
             Get a key at https://openrouter.ai/keys"
        ))),
    }
}

/// Check that the OpenRouter API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    resolve_api_key(config).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("results_per_query"));
        assert!(toml_str.contains("OPENROUTER_API_KEY"));
        assert!(toml_str.contains("settle_delay_ms"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.results_per_query, 2);
        assert_eq!(parsed.defaults.min_grounding_chars, 500);
        assert_eq!(parsed.fetch.timeout_secs, 30);
        assert_eq!(parsed.openrouter.api_key_env, "OPENROUTER_API_KEY");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[defaults]
fetch_concurrency = 8

[fetch]
allow_private_hosts = true
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.fetch_concurrency, 8);
        assert_eq!(config.defaults.results_per_query, 2);
        assert_eq!(config.defaults.min_fragment_chars, 0);
        assert!(config.fetch.allow_private_hosts);
        assert_eq!(config.fetch.settle_delay_ms, 1000);
        assert_eq!(config.search.base_url, "https://html.duckduckgo.com");
    }

    #[test]
    fn load_config_from_missing_file_is_io_error() {
        let err = load_config_from(Path::new("/nonexistent/topicdoc.toml")).unwrap_err();
        assert!(matches!(err, TopicDocError::Io { .. }));
    }

    #[test]
    fn api_key_validation() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.openrouter.api_key_env = "TOPICDOC_TEST_NONEXISTENT_KEY_12345".into();
        let result = validate_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}
