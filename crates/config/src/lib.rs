//! Configuration for the GAIA runner
//!
//! Loads the JSON config file, overlays environment variables (optionally
//! from a `.env` file) and resolves the system prompt.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Once;
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod paths;
pub mod prompt;

pub use paths::{config_path, data_dir, expand_home};
pub use prompt::DEFAULT_SYSTEM_PROMPT;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid prompt YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("prompt file {0} has no `system_prompt` key")]
    MissingPromptKey(PathBuf),

    #[error("config not found: {0}")]
    NotFound(PathBuf),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Which URL scheme the model endpoint speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EndpointFlavor {
    #[default]
    Openai,
    Azure,
}

/// Remote chat-completion endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub flavor: EndpointFlavor,
    #[serde(default)]
    pub api_key: String,
    /// Base URL for `openai`, resource endpoint for `azure`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /// Model name, or deployment name for `azure`
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            flavor: EndpointFlavor::default(),
            api_key: String::new(),
            api_base: None,
            model: default_model(),
            api_version: default_api_version(),
            max_tokens: default_max_tokens(),
            temperature: 0.0,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_api_version() -> String {
    "2024-08-01-preview".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_request_timeout() -> u64 {
    120
}

/// Control loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_max_round_trips")]
    pub max_round_trips: u32,
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,
    /// YAML file with a `system_prompt` key; built-in prompt when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_path: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_round_trips: default_max_round_trips(),
            tool_timeout_secs: default_tool_timeout(),
            system_prompt_path: None,
        }
    }
}

fn default_max_round_trips() -> u32 {
    12
}

fn default_tool_timeout() -> u64 {
    60
}

/// Tool set settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub tavily_api_key: String,
    #[serde(default = "default_search_max_results")]
    pub search_max_results: u32,
    #[serde(default = "default_wiki_max_chars")]
    pub wiki_max_chars: usize,
    #[serde(default = "default_scrape_max_chars")]
    pub scrape_max_chars: usize,
    #[serde(default = "default_code_timeout")]
    pub code_timeout_secs: u64,
    /// Falls back to the chat model when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vision_model: Option<String>,
    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            tavily_api_key: String::new(),
            search_max_results: default_search_max_results(),
            wiki_max_chars: default_wiki_max_chars(),
            scrape_max_chars: default_scrape_max_chars(),
            code_timeout_secs: default_code_timeout(),
            vision_model: None,
            transcription_model: default_transcription_model(),
        }
    }
}

fn default_search_max_results() -> u32 {
    3
}

fn default_wiki_max_chars() -> usize {
    4000
}

fn default_scrape_max_chars() -> usize {
    20000
}

fn default_code_timeout() -> u64 {
    30
}

fn default_transcription_model() -> String {
    "whisper-1".to_string()
}

/// Session driver settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

fn default_concurrency() -> usize {
    1
}

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub driver: DriverConfig,
}

static ENV_LOADER: Once = Once::new();

/// Load `.env` from the working directory once per process
pub fn load_env_file() {
    ENV_LOADER.call_once(|| match dotenvy::dotenv() {
        Ok(path) => debug!("loaded environment from {:?}", path),
        Err(e) if e.not_found() => {}
        Err(e) => warn!("failed to read .env: {}", e),
    });
}

impl Config {
    /// Load from the default location, then apply `.env` and process environment
    pub async fn load() -> Result<Self> {
        load_env_file();
        let mut config = Self::load_from(&config_path()).await?;
        config.apply_env();
        Ok(config)
    }

    /// Load from a specific file; a missing file yields defaults
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("no config at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        debug!("reading config from {:?}", path);
        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save to a specific file, creating parent directories
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        debug!("writing config to {:?}", path);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Overlay process environment variables
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Overlay variables from an arbitrary lookup.
    ///
    /// `MODEL_ENDPOINT` / `MODEL_KEY` / `MODEL_NAME` / `MODEL_API_VERSION`
    /// describe an Azure deployment and switch the flavor when the endpoint
    /// is present. `OPENAI_API_KEY` fills the key only when none is set yet.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(endpoint) = get("MODEL_ENDPOINT") {
            self.model.flavor = EndpointFlavor::Azure;
            self.model.api_base = Some(endpoint);
        }
        if let Some(key) = get("MODEL_KEY") {
            self.model.api_key = key;
        }
        if let Some(name) = get("MODEL_NAME") {
            self.model.model = name;
        }
        if let Some(version) = get("MODEL_API_VERSION") {
            self.model.api_version = version;
        }
        if self.model.api_key.is_empty() {
            if let Some(key) = get("OPENAI_API_KEY") {
                self.model.api_key = key;
            }
        }
        if let Some(key) = get("TAVILY_API_KEY") {
            self.tools.tavily_api_key = key;
        }
    }

    pub fn has_api_key(&self) -> bool {
        !self.model.api_key.is_empty()
    }

    pub fn tavily_api_key(&self) -> Option<String> {
        let key = &self.tools.tavily_api_key;
        if key.is_empty() {
            None
        } else {
            Some(key.clone())
        }
    }

    /// Model used by the image tool
    pub fn vision_model(&self) -> String {
        self.tools
            .vision_model
            .clone()
            .unwrap_or_else(|| self.model.model.clone())
    }

    /// Resolve the system prompt: YAML file if configured, built-in otherwise
    pub async fn system_prompt(&self) -> Result<String> {
        match &self.agent.system_prompt_path {
            Some(path) => prompt::load_prompt_file(&expand_home(path)).await,
            None => Ok(DEFAULT_SYSTEM_PROMPT.to_string()),
        }
    }
}

/// Write a default config if none exists and return the effective config
pub async fn init() -> Result<Config> {
    let config_path = config_path();

    if config_path.exists() {
        warn!("config already exists at {:?}", config_path);
    } else {
        Config::default().save_to(&config_path).await?;
        info!("wrote default config to {:?}", config_path);
    }

    tokio::fs::create_dir_all(data_dir()).await?;
    Config::load().await
}
