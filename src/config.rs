use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default)]
    pub embeddings: EmbeddingsConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

/// Catalog / watch-directory configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    /// Root directory watched by the sync engine.
    pub watch_dir: PathBuf,
    pub db_path: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Layout-analysis / OCR service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ParserConfig {
    #[serde(default = "default_layout_url")]
    pub layout_url: String,
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_lang")]
    pub lang: String,
    /// Layout/OCR parsing can take minutes on large scans.
    #[serde(default = "default_parse_timeout")]
    pub timeout_secs: u64,
}

/// Embedding service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingsConfig {
    #[serde(default = "default_embed_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_embed_model")]
    pub model: String,
    /// Name of the env var holding the bearer token. Empty = no auth header
    /// (self-hosted embedding servers are commonly authless).
    #[serde(default)]
    pub api_key_env: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    #[serde(default = "default_embed_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

/// Chunking configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size_tokens: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap_tokens: usize,
}

/// Default ownership attributes stamped on ingested documents
#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_dept_id")]
    pub dept_id: i64,
    #[serde(default = "default_role_id")]
    pub role_id: i64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_layout_url() -> String {
    "http://localhost:9000".to_string()
}

fn default_backend() -> String {
    "pipeline".to_string()
}

fn default_lang() -> String {
    "en".to_string()
}

fn default_parse_timeout() -> u64 {
    600
}

fn default_embed_endpoint() -> String {
    "http://localhost:8080/v1/embeddings".to_string()
}

fn default_embed_model() -> String {
    "intfloat/multilingual-e5-large".to_string()
}

fn default_batch_size() -> usize {
    32
}

fn default_dimensions() -> usize {
    1024
}

fn default_max_retries() -> usize {
    3
}

fn default_embed_timeout() -> u64 {
    30
}

fn default_cache_capacity() -> usize {
    1000
}

fn default_chunk_size() -> usize {
    512
}

fn default_chunk_overlap() -> usize {
    50
}

fn default_dept_id() -> i64 {
    1
}

fn default_role_id() -> i64 {
    3
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            layout_url: default_layout_url(),
            backend: default_backend(),
            lang: default_lang(),
            timeout_secs: default_parse_timeout(),
        }
    }
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            endpoint: default_embed_endpoint(),
            model: default_embed_model(),
            api_key_env: String::new(),
            batch_size: default_batch_size(),
            dimensions: default_dimensions(),
            max_retries: default_max_retries(),
            timeout_secs: default_embed_timeout(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size_tokens: default_chunk_size(),
            chunk_overlap_tokens: default_chunk_overlap(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            dept_id: default_dept_id(),
            role_id: default_role_id(),
        }
    }
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in DOCDEX_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // Load .env file if it exists (ignore errors - file is optional)
        let _ = dotenv::dotenv();

        let config_path = std::env::var("DOCDEX_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&config_str)
            .context("Failed to parse config.toml")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    ///
    /// The watch directory is deliberately not required to exist here: the
    /// scan/ingest binaries may target other roots, and the sync engine
    /// reports a missing watch directory as its own error at run time.
    fn validate(&self) -> Result<()> {
        if self.catalog.watch_dir.as_os_str().is_empty() {
            anyhow::bail!("catalog.watch_dir must not be empty");
        }

        if !self.embeddings.api_key_env.is_empty() {
            std::env::var(&self.embeddings.api_key_env).with_context(|| {
                format!(
                    "Environment variable {} not set. Set it in your .env file or unset embeddings.api_key_env for an authless endpoint.",
                    self.embeddings.api_key_env
                )
            })?;
        }

        if self.embeddings.batch_size == 0 {
            anyhow::bail!("embeddings.batch_size must be greater than 0");
        }

        if self.embeddings.dimensions == 0 {
            anyhow::bail!("embeddings.dimensions must be greater than 0");
        }

        if self.chunking.chunk_size_tokens == 0 {
            anyhow::bail!("chunking.chunk_size_tokens must be greater than 0");
        }

        if self.chunking.chunk_overlap_tokens >= self.chunking.chunk_size_tokens {
            anyhow::bail!("chunking.chunk_overlap_tokens must be less than chunk_size_tokens");
        }

        Ok(())
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.catalog.db_path
    }

    /// Get the watched documents root
    pub fn watch_dir(&self) -> &Path {
        &self.catalog.watch_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serialize config tests that mutate process-wide env so they don't race.
    static CONFIG_TEST_LOCK: Mutex<()> = Mutex::new(());

    fn write_config(temp_dir: &TempDir, body: &str) -> PathBuf {
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, body).unwrap();
        path
    }

    fn with_config_env(config_path: &Path, f: impl FnOnce()) {
        let original = std::env::var("DOCDEX_CONFIG").ok();
        std::env::set_var("DOCDEX_CONFIG", config_path.to_str().unwrap());
        f();
        match original {
            Some(val) => std::env::set_var("DOCDEX_CONFIG", val),
            None => std::env::remove_var("DOCDEX_CONFIG"),
        }
    }

    #[test]
    fn test_config_load_success() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = write_config(
            &temp_dir,
            r#"
[catalog]
watch_dir = "/data/documents"
db_path = "./docdex.db"
log_level = "debug"

[embeddings]
batch_size = 16
dimensions = 1024

[chunking]
chunk_size_tokens = 512
chunk_overlap_tokens = 50
"#,
        );
        with_config_env(&config_path, || {
            let config = Config::load();
            assert!(config.is_ok(), "Config::load() failed: {:?}", config.err());
            let config = config.unwrap();
            assert_eq!(config.catalog.log_level, "debug");
            assert_eq!(config.embeddings.batch_size, 16);
            assert_eq!(config.chunking.chunk_size_tokens, 512);
            // Defaulted sections
            assert_eq!(config.parser.backend, "pipeline");
            assert_eq!(config.ingest.dept_id, 1);
            assert_eq!(config.ingest.role_id, 3);
        });
    }

    #[test]
    fn test_config_rejects_overlap_not_less_than_size() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = write_config(
            &temp_dir,
            r#"
[catalog]
watch_dir = "/data/documents"
db_path = "./docdex.db"

[chunking]
chunk_size_tokens = 50
chunk_overlap_tokens = 50
"#,
        );
        with_config_env(&config_path, || {
            let config = Config::load();
            assert!(config.is_err());
            assert!(config
                .unwrap_err()
                .to_string()
                .contains("chunk_overlap_tokens"));
        });
    }

    #[test]
    fn test_config_invalid_path() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let original = std::env::var("DOCDEX_CONFIG").ok();
        std::env::set_var("DOCDEX_CONFIG", "nonexistent.toml");
        let config = Config::load();
        assert!(config.is_err());
        match original {
            Some(v) => std::env::set_var("DOCDEX_CONFIG", v),
            None => std::env::remove_var("DOCDEX_CONFIG"),
        }
    }
}
