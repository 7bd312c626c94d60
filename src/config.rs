//! TOML configuration.
//!
//! Every section is optional and falls back to its defaults, so an empty
//! file is a valid configuration. See `config/textgpt.example.toml`.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use textgpt_core::{Error, SessionOptions};

/// Where `--config` points when the flag is not given.
pub const DEFAULT_CONFIG_PATH: &str = "./config/textgpt.toml";

pub const EMBEDDING_PROVIDERS: &[&str] = &["openai", "ollama", "hash", "local"];
pub const LLM_PROVIDERS: &[&str] = &["openai", "ollama"];

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub index: IndexConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub credentials: CredentialsConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IndexConfig {
    /// Directory holding `index.sqlite`.
    pub path: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/index"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 4 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    /// Provider default when unset; required for `ollama`.
    pub model: Option<String>,
    /// Provider default when unset; required for `ollama`.
    pub dims: Option<usize>,
    /// Base URL; provider default when unset.
    pub url: Option<String>,
    pub batch_size: usize,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: None,
            dims: None,
            url: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    pub url: Option<String>,
    pub temperature: f32,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            url: None,
            temperature: 0.0,
            max_retries: 3,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Environment variable holding the OpenAI API key.
    pub api_key_env: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

impl Config {
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            chunk_size: self.chunking.chunk_size,
            chunk_overlap: self.chunking.chunk_overlap,
            top_k: self.retrieval.top_k,
            batch_size: self.embedding.batch_size,
        }
    }

    /// Whether any provider talks to the OpenAI API and so needs a key.
    pub fn needs_api_key(&self) -> bool {
        self.embedding.provider == "openai" || self.llm.provider == "openai"
    }

    /// The API key from the configured environment variable.
    pub fn api_key(&self) -> Result<String> {
        let var = &self.credentials.api_key_env;
        match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(Error::Config(format!(
                "{} environment variable not set; it is required when a provider is 'openai'",
                var
            ))
            .into()),
        }
    }

    /// Check every constraint that can be checked without the network.
    pub fn validate(&self) -> Result<()> {
        self.session_options().validate()?;

        if !EMBEDDING_PROVIDERS.contains(&self.embedding.provider.as_str()) {
            bail!(
                "Unknown embedding provider: '{}'. Must be one of: {}",
                self.embedding.provider,
                EMBEDDING_PROVIDERS.join(", ")
            );
        }
        if !LLM_PROVIDERS.contains(&self.llm.provider.as_str()) {
            bail!(
                "Unknown llm provider: '{}'. Must be one of: {}",
                self.llm.provider,
                LLM_PROVIDERS.join(", ")
            );
        }

        if self.embedding.dims == Some(0) {
            bail!("embedding.dims must be > 0");
        }
        if self.embedding.provider == "ollama"
            && (self.embedding.model.is_none() || self.embedding.dims.is_none())
        {
            bail!("embedding.model and embedding.dims must be specified when provider is 'ollama'");
        }

        if self.llm.model.trim().is_empty() {
            bail!("llm.model must not be empty");
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            bail!("llm.temperature must be in [0.0, 2.0]");
        }

        if self.needs_api_key() {
            self.api_key()?;
        }

        Ok(())
    }
}

/// Load and validate the configuration at `path`.
///
/// A missing file at [`DEFAULT_CONFIG_PATH`] means "use defaults"; any
/// other missing path is an error.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = if !path.exists() && path == Path::new(DEFAULT_CONFIG_PATH) {
        Config::default()
    } else {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        parse_config(&content)?
    };

    config.validate()?;
    Ok(config)
}

/// Parse configuration text without validating it.
pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).context("Failed to parse config file")
}
