// Configuration management module
// Handles the TOML configuration file and its validated settings

pub mod settings;


use anyhow::Result;
use console::style;

pub use settings::{
    Config, ConfigError, IndexConfig, OllamaConfig, ProvisionConfig, SearchConfig,
    validate_collection_name,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::config_dir()
}

/// Render the effective configuration for display
#[inline]
pub fn format_config(config: &Config) -> String {
    let mut out = Vec::new();

    out.push(style("Current Configuration").bold().cyan().to_string());
    out.push(String::new());

    out.push(style("Ollama Settings:").bold().yellow().to_string());
    out.push(format!("  Model: {}", style(&config.ollama.model).cyan()));
    out.push(format!(
        "  Embedding Dimension: {}",
        style(config.ollama.embedding_dimension).cyan()
    ));
    match config.ollama_url() {
        Ok(url) => out.push(format!("  Ollama URL: {}", style(url).cyan())),
        Err(e) => out.push(format!("  Ollama URL: {} ({})", style("Invalid").red(), e)),
    }

    out.push(String::new());
    out.push(style("Index Settings:").bold().yellow().to_string());
    out.push(format!("  URI: {}", style(config.index_uri()).cyan()));
    out.push(format!(
        "  Collection: {}",
        style(&config.index.collection).cyan()
    ));

    out.push(String::new());
    out.push(style("Search Settings:").bold().yellow().to_string());
    out.push(format!(
        "  Blend Weight: {}",
        style(config.search.blend_weight).cyan()
    ));
    out.push(format!("  HNSW ef: {}", style(config.search.hnsw_ef).cyan()));
    out.push(format!("  Exact: {}", style(config.search.exact).cyan()));
    out.push(format!(
        "  Default Limit: {}",
        style(config.search.default_limit).cyan()
    ));

    out.push(String::new());
    out.push(style("Provisioning Settings:").bold().yellow().to_string());
    out.push(format!(
        "  Parallelism: {}",
        style(config.provision.parallelism).cyan()
    ));
    out.push(format!(
        "  Max Retries: {}",
        style(config.provision.max_retries).cyan()
    ));
    out.push(format!(
        "  Chunk Size: {}",
        style(config.provision.chunk_size).cyan()
    ));
    out.push(format!(
        "  Verification Category: {}",
        style(&config.provision.verification_category).cyan()
    ));

    out.push(String::new());
    out.push(format!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    ));

    out.join("\n")
}

/// Print the effective configuration to stderr
#[inline]
pub fn show_config(config: &Config) {
    eprintln!("{}", format_config(config));
}

/// Write the configuration file if it does not exist yet. Returns whether a
/// file was written.
#[inline]
pub fn init_config(config: &Config) -> Result<bool> {
    if config.config_file_path().exists() {
        return Ok(false);
    }
    config.save()?;
    Ok(true)
}
