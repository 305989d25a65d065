//! TOML configuration.
//!
//! Every section is optional; a missing file falls back to
//! [`Config::minimal`]. Secrets never live in the file: it names the
//! environment variables that hold them.
//!
//! ```toml
//! [agent]
//! model = "gemini-2.5-flash"
//! api_key_env = "GEMINI_API_KEY"
//!
//! [discogs]
//! token_env = "DISCOGS_TOKEN"
//!
//! [collection]
//! path = "./data/collection.json"
//!
//! [export]
//! output_dir = "./exports"
//!
//! [hosting]
//! provider = "imgbb"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub discogs: DiscogsConfig,
    #[serde(default)]
    pub collection: CollectionConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub hosting: HostingConfig,
}

impl Config {
    /// Defaults for every section, used when no config file exists.
    pub fn minimal() -> Self {
        Self::default()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_gemini_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
    /// Reasoning token budget; `0` leaves it to the model.
    #[serde(default = "default_thinking_budget")]
    pub thinking_budget: u32,
    #[serde(default = "default_agent_timeout_secs")]
    pub timeout_secs: u64,
    /// Most photos accepted in one identification batch.
    #[serde(default = "default_max_images")]
    pub max_images: usize,
    #[serde(default = "default_true")]
    pub web_search: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key_env: default_gemini_key_env(),
            base_url: default_gemini_base_url(),
            thinking_budget: default_thinking_budget(),
            timeout_secs: default_agent_timeout_secs(),
            max_images: default_max_images(),
            web_search: true,
        }
    }
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_gemini_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}
fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_thinking_budget() -> u32 {
    8192
}
fn default_agent_timeout_secs() -> u64 {
    120
}
fn default_max_images() -> usize {
    10
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct DiscogsConfig {
    #[serde(default = "default_discogs_token_env")]
    pub token_env: String,
    #[serde(default = "default_discogs_base_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
    /// Page size for collection listings (Discogs caps it at 100).
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    /// Folder that new releases are added to (1 = "Uncategorized").
    #[serde(default = "default_write_folder")]
    pub folder_id: u64,
}

impl Default for DiscogsConfig {
    fn default() -> Self {
        Self {
            token_env: default_discogs_token_env(),
            base_url: default_discogs_base_url(),
            user_agent: default_user_agent(),
            timeout_secs: default_http_timeout_secs(),
            per_page: default_per_page(),
            folder_id: default_write_folder(),
        }
    }
}

impl DiscogsConfig {
    /// The token from the configured environment variable, if set and
    /// non-empty.
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

fn default_discogs_token_env() -> String {
    "DISCOGS_TOKEN".to_string()
}
fn default_discogs_base_url() -> String {
    "https://api.discogs.com".to_string()
}
fn default_user_agent() -> String {
    format!("crate-digger/{}", env!("CARGO_PKG_VERSION"))
}
fn default_http_timeout_secs() -> u64 {
    30
}
fn default_per_page() -> u32 {
    50
}
fn default_write_folder() -> u64 {
    1
}

#[derive(Debug, Deserialize, Clone)]
pub struct CollectionConfig {
    #[serde(default = "default_collection_path")]
    pub path: PathBuf,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            path: default_collection_path(),
        }
    }
}

fn default_collection_path() -> PathBuf {
    PathBuf::from("./data/collection.json")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExportConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
    /// Include the remote Discogs collection when a token is available.
    #[serde(default = "default_true")]
    pub include_discogs: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            timeout_secs: default_http_timeout_secs(),
            include_discogs: true,
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./exports")
}

#[derive(Debug, Deserialize, Clone)]
pub struct HostingConfig {
    /// `disabled` or `imgbb`.
    #[serde(default = "default_hosting_provider")]
    pub provider: String,
    #[serde(default = "default_imgbb_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_imgbb_url")]
    pub upload_url: String,
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HostingConfig {
    fn default() -> Self {
        Self {
            provider: default_hosting_provider(),
            api_key_env: default_imgbb_key_env(),
            upload_url: default_imgbb_url(),
            timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl HostingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_hosting_provider() -> String {
    "disabled".to_string()
}
fn default_imgbb_key_env() -> String {
    "IMGBB_API_KEY".to_string()
}
fn default_imgbb_url() -> String {
    "https://api.imgbb.com/1/upload".to_string()
}

/// Load and validate the config file. A missing file yields
/// [`Config::minimal`]; an unreadable or invalid one is an error.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(Config::minimal());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config = parse_config(&content)?;
    Ok(config)
}

/// Parse and validate config text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.agent.max_images == 0 {
        anyhow::bail!("agent.max_images must be >= 1");
    }
    if config.agent.model.trim().is_empty() {
        anyhow::bail!("agent.model must not be empty");
    }

    for (name, secs) in [
        ("agent.timeout_secs", config.agent.timeout_secs),
        ("discogs.timeout_secs", config.discogs.timeout_secs),
        ("export.timeout_secs", config.export.timeout_secs),
        ("hosting.timeout_secs", config.hosting.timeout_secs),
    ] {
        if secs == 0 {
            anyhow::bail!("{} must be > 0", name);
        }
    }

    if !(1..=100).contains(&config.discogs.per_page) {
        anyhow::bail!("discogs.per_page must be in [1, 100]");
    }

    match config.hosting.provider.as_str() {
        "disabled" | "imgbb" => {}
        other => anyhow::bail!(
            "Unknown hosting provider: '{}'. Must be disabled or imgbb.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.agent.model, "gemini-2.5-flash");
        assert_eq!(config.agent.max_images, 10);
        assert_eq!(config.discogs.base_url, "https://api.discogs.com");
        assert_eq!(config.discogs.per_page, 50);
        assert!(!config.hosting.is_enabled());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = parse_config(
            r#"
[agent]
model = "gemini-2.5-pro"

[collection]
path = "/tmp/records.json"
"#,
        )
        .unwrap();
        assert_eq!(config.agent.model, "gemini-2.5-pro");
        assert_eq!(config.agent.api_key_env, "GEMINI_API_KEY");
        assert_eq!(config.collection.path, PathBuf::from("/tmp/records.json"));
    }

    #[test]
    fn test_zero_max_images_rejected() {
        let err = parse_config("[agent]\nmax_images = 0\n").unwrap_err();
        assert!(err.to_string().contains("max_images"));
    }

    #[test]
    fn test_per_page_bounds() {
        assert!(parse_config("[discogs]\nper_page = 101\n").is_err());
        assert!(parse_config("[discogs]\nper_page = 100\n").is_ok());
    }

    #[test]
    fn test_unknown_hosting_provider_rejected() {
        let err = parse_config("[hosting]\nprovider = \"s3\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown hosting provider"));
    }

    #[test]
    fn test_missing_file_is_minimal() {
        let config = load_config(Path::new("/nonexistent/digger.toml")).unwrap();
        assert_eq!(config.export.output_dir, PathBuf::from("./exports"));
    }
}
