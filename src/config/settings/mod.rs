#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::embeddings::ollama::DEFAULT_EMBEDDING_DIMENSION;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub provision: ProvisionConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub model: String,
    pub embedding_dimension: u32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            model: "nomic-embed-text:latest".to_string(),
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
        }
    }
}

/// Where the vector collection lives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndexConfig {
    /// LanceDB URI. A local directory or a remote `db://` URI. When unset the
    /// collection is stored under `<config dir>/vectors`.
    pub uri: Option<String>,
    pub collection: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            uri: None,
            collection: "documents".to_string(),
        }
    }
}

/// Query-time tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    /// Weight applied to the averaged reference vector before it is added to
    /// the text vector.
    pub blend_weight: f32,
    /// HNSW search effort. Higher values trade latency for recall.
    pub hnsw_ef: usize,
    /// Skip the ANN index and scan every vector.
    pub exact: bool,
    pub default_limit: usize,
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            blend_weight: 0.3,
            hnsw_ef: 128,
            exact: false,
            default_limit: 10,
            timeout_secs: 30,
        }
    }
}

impl SearchConfig {
    #[inline]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProvisionConfig {
    /// Number of upload chunks in flight at once
    pub parallelism: usize,
    /// Retries per chunk after the first attempt
    pub max_retries: u32,
    pub chunk_size: usize,
    pub retry_backoff_ms: u64,
    /// Category used by the post-load verification search
    pub verification_category: String,
    pub verification_limit: usize,
    /// Collections smaller than this are searched exactly and get no ANN index
    pub vector_index_min_rows: usize,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            parallelism: 4,
            max_retries: 3,
            chunk_size: 256,
            retry_backoff_ms: 500,
            verification_category: "sports-watch".to_string(),
            verification_limit: 5,
            vector_index_min_rows: 10_000,
        }
    }
}

impl ProvisionConfig {
    #[inline]
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid embedding dimension: {0} (must be between 2 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid collection name: {0:?} (must be non-empty and contain only letters, digits, '_' or '-')")]
    InvalidCollection(String),
    #[error("Invalid blend weight: {0} (must be finite and between 0 and 1)")]
    InvalidBlendWeight(f32),
    #[error("Invalid hnsw_ef: {0} (must be between 1 and 4096)")]
    InvalidHnswEf(usize),
    #[error("Invalid default limit: {0} (must be between 1 and 1000)")]
    InvalidDefaultLimit(usize),
    #[error("Invalid search timeout: {0} (must be between 1 and 600 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid upload parallelism: {0} (must be between 1 and 64)")]
    InvalidParallelism(usize),
    #[error("Invalid max retries: {0} (must be at most 10)")]
    InvalidMaxRetries(u32),
    #[error("Invalid chunk size: {0} (must be between 1 and 100000)")]
    InvalidChunkSize(usize),
    #[error("Invalid verification category: {0:?} (cannot be empty)")]
    InvalidVerificationCategory(String),
    #[error("Invalid verification limit: {0} (must be between 1 and 100)")]
    InvalidVerificationLimit(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Default configuration directory, `~/.semsearch`
    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(".semsearch"))
            .or_else(|| dirs::data_dir().map(|data| data.join("semsearch")))
            .ok_or(ConfigError::DirectoryError)
    }

    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Get the base directory for the application
    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ollama.validate()?;
        self.index.validate()?;
        self.search.validate()?;
        self.provision.validate()?;
        Ok(())
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join("config.toml")
    }

    /// URI handed to LanceDB. Falls back to a `vectors` directory under the
    /// base directory.
    #[inline]
    pub fn index_uri(&self) -> String {
        self.index.uri.clone().unwrap_or_else(|| {
            self.get_base_dir()
                .join("vectors")
                .to_string_lossy()
                .into_owned()
        })
    }

    #[inline]
    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        self.ollama.ollama_url()
    }
}

impl OllamaConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))?;

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if !(2..=4096).contains(&self.embedding_dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.embedding_dimension,
            ));
        }

        Ok(())
    }

    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }

    pub fn set_host(&mut self, host: String) -> Result<(), ConfigError> {
        let temp_config = OllamaConfig {
            host: host.clone(),
            ..self.clone()
        };
        temp_config.validate()?;
        self.host = host;
        Ok(())
    }

    pub fn set_port(&mut self, port: u16) -> Result<(), ConfigError> {
        if port == 0 {
            return Err(ConfigError::InvalidPort(port));
        }
        self.port = port;
        Ok(())
    }
}

impl IndexConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_collection_name(&self.collection)
    }
}

/// Collection names end up inside LanceDB table paths, so keep them to a
/// conservative character set.
#[inline]
pub fn validate_collection_name(name: &str) -> Result<(), ConfigError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidCollection(name.to_string()))
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.blend_weight.is_finite() || !(0.0..=1.0).contains(&self.blend_weight) {
            return Err(ConfigError::InvalidBlendWeight(self.blend_weight));
        }

        if !(1..=4096).contains(&self.hnsw_ef) {
            return Err(ConfigError::InvalidHnswEf(self.hnsw_ef));
        }

        if !(1..=1000).contains(&self.default_limit) {
            return Err(ConfigError::InvalidDefaultLimit(self.default_limit));
        }

        if !(1..=600).contains(&self.timeout_secs) {
            return Err(ConfigError::InvalidTimeout(self.timeout_secs));
        }

        Ok(())
    }
}

impl ProvisionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=64).contains(&self.parallelism) {
            return Err(ConfigError::InvalidParallelism(self.parallelism));
        }

        if self.max_retries > 10 {
            return Err(ConfigError::InvalidMaxRetries(self.max_retries));
        }

        if !(1..=100_000).contains(&self.chunk_size) {
            return Err(ConfigError::InvalidChunkSize(self.chunk_size));
        }

        if self.verification_category.trim().is_empty() {
            return Err(ConfigError::InvalidVerificationCategory(
                self.verification_category.clone(),
            ));
        }

        if !(1..=100).contains(&self.verification_limit) {
            return Err(ConfigError::InvalidVerificationLimit(
                self.verification_limit,
            ));
        }

        Ok(())
    }
}
