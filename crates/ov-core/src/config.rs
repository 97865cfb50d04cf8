//! Configuration types and loader for OpenViking.

use crate::error::{OvError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level OpenViking configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct OpenVikingConfig {
    /// Storage backend configuration (AGFS + vector index).
    #[serde(default)]
    pub storage: StorageConfig,
    /// Embedding model configuration.
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Vision-language model configuration, used by the semantic
    /// processor for image-bearing sections.
    #[serde(default)]
    pub vlm: VlmConfig,
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Parser configuration.
    #[serde(default)]
    pub parser: ParserConfig,
    /// Rerank configuration.
    #[serde(default)]
    pub rerank: RerankConfig,
}

/// Storage backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StorageConfig {
    /// Vector database settings.
    #[serde(default)]
    pub vectordb: VectorDbConfig,
    /// AGFS (content store) settings.
    #[serde(default)]
    pub agfs: AgfsConfig,
}

/// Vector database configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorDbConfig {
    /// Collection name.
    #[serde(default = "default_collection_name")]
    pub name: String,
    /// Backend type (e.g. "hnsw", "flat").
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Weight given to the sparse component when both dense and sparse
    /// vectors are configured, in `[0.0, 1.0]`. `0.0` is dense-only.
    #[serde(default = "default_sparse_weight")]
    pub sparse_weight: f32,
}

/// Dense embedding configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DenseEmbeddingConfig {
    /// Vector dimension.
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    /// Embedding provider name.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model name.
    #[serde(default)]
    pub model: String,
    /// L2-normalize vectors before they reach the index.
    #[serde(default = "default_true")]
    pub normalize: bool,
    /// HTTP endpoint the dense embedder calls. Empty means "not
    /// configured"; ingestion commands that need one fail with
    /// `InvalidInput` rather than silently falling back to a stub.
    #[serde(default)]
    pub endpoint: String,
}

/// Sparse embedding configuration. Absent (`enabled = false`) by
/// default — hybrid search is opt-in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SparseEmbeddingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub endpoint: String,
}

/// Embedding model configuration: dense is always present, sparse is
/// optional.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub dense: DenseEmbeddingConfig,
    #[serde(default)]
    pub sparse: SparseEmbeddingConfig,
    /// Batch size for embedding calls.
    #[serde(default = "default_embedding_batch")]
    pub batch_size: usize,
}

/// Vision-language model configuration for image-bearing document
/// sections.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct VlmConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub model: String,
    /// Maximum images batched into a single VLM call.
    #[serde(default = "default_max_images_per_call")]
    pub max_images_per_call: usize,
    #[serde(default)]
    pub endpoint: String,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,
    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// AGFS (content store) configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgfsConfig {
    /// Backend kind: "local" or "http".
    #[serde(default = "default_agfs_backend")]
    pub backend: String,
    /// AGFS service URL, used when `backend = "http"`.
    #[serde(default = "default_agfs_url")]
    pub url: String,
    /// Local root directory, used when `backend = "local"`.
    #[serde(default = "default_agfs_root")]
    pub root: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

/// Parser configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ParserConfig {
    /// Maximum file size in bytes.
    #[serde(default)]
    pub max_file_size: Option<u64>,
    /// Supported file extensions.
    #[serde(default)]
    pub supported_extensions: Vec<String>,
}

/// Rerank configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RerankConfig {
    /// Whether a reranker is configured at all. The reranker is only
    /// actually invoked for `search` calls, never `find` (see the
    /// retrieval module).
    #[serde(default)]
    pub enabled: bool,
    /// Rerank model provider.
    #[serde(default)]
    pub provider: String,
    /// Top-k after reranking.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub endpoint: String,
}

// --- Defaults ---
fn default_collection_name() -> String { "openviking".into() }
fn default_backend() -> String { "hnsw".into() }
fn default_sparse_weight() -> f32 { 0.0 }
fn default_dimension() -> usize { 1024 }
fn default_provider() -> String { "openai".into() }
fn default_embedding_batch() -> usize { 16 }
fn default_max_images_per_call() -> usize { 10 }
fn default_host() -> String { "0.0.0.0".into() }
fn default_port() -> u16 { 8080 }
fn default_agfs_backend() -> String { "local".into() }
fn default_agfs_url() -> String { "http://localhost:8080".into() }
fn default_agfs_root() -> String { ".openviking/agfs".into() }
fn default_timeout() -> u64 { 10 }
fn default_true() -> bool { true }
fn default_top_k() -> usize { 10 }

impl Default for VectorDbConfig {
    fn default() -> Self {
        Self {
            name: default_collection_name(),
            backend: default_backend(),
            sparse_weight: default_sparse_weight(),
        }
    }
}

impl Default for DenseEmbeddingConfig {
    fn default() -> Self {
        Self {
            dimension: default_dimension(),
            provider: default_provider(),
            model: String::new(),
            normalize: true,
            endpoint: String::new(),
        }
    }
}

impl Default for SparseEmbeddingConfig {
    fn default() -> Self {
        Self { enabled: false, provider: String::new(), model: String::new(), endpoint: String::new() }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dense: DenseEmbeddingConfig::default(),
            sparse: SparseEmbeddingConfig::default(),
            batch_size: default_embedding_batch(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for AgfsConfig {
    fn default() -> Self {
        Self {
            backend: default_agfs_backend(),
            url: default_agfs_url(),
            root: default_agfs_root(),
            timeout: default_timeout(),
        }
    }
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: String::new(),
            top_k: default_top_k(),
            endpoint: String::new(),
        }
    }
}

// --- Config Loader ---

/// Default config directory: `~/.openviking/`.
pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".openviking")
}

const OPENVIKING_CONFIG_ENV: &str = "OPENVIKING_CONFIG_FILE";
const OPENVIKING_CLI_CONFIG_ENV: &str = "OPENVIKING_CLI_CONFIG_FILE";
const DEFAULT_OV_CONF: &str = "ov.conf";

/// Resolve a config file path using a three-level chain:
/// 1. Explicit path
/// 2. Environment variable
/// 3. `~/.openviking/<default_filename>`
pub fn resolve_config_path(
    explicit_path: Option<&str>,
    env_var: &str,
    default_filename: &str,
) -> Option<PathBuf> {
    if let Some(p) = explicit_path {
        let path = PathBuf::from(p);
        if path.exists() {
            return Some(path);
        }
        return None;
    }
    if let Ok(val) = std::env::var(env_var) {
        let path = PathBuf::from(val);
        if path.exists() {
            return Some(path);
        }
        return None;
    }
    let path = default_config_dir().join(default_filename);
    if path.exists() {
        return Some(path);
    }
    None
}

/// Load a JSON config file.
pub fn load_json_config(path: &Path) -> Result<serde_json::Value> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| OvError::NotFound { uri: format!("config file {}: {e}", path.display()) })?;
    serde_json::from_str(&content)
        .map_err(|e| OvError::InvalidInput(format!("invalid JSON in config {}: {e}", path.display())))
}

/// Load [`OpenVikingConfig`] from the standard resolution chain, using
/// `OPENVIKING_CONFIG_FILE`.
pub fn load_openviking_config(explicit_path: Option<&str>) -> Result<OpenVikingConfig> {
    load_openviking_config_with_env(explicit_path, OPENVIKING_CONFIG_ENV)
}

/// Same as [`load_openviking_config`] but resolved against
/// `OPENVIKING_CLI_CONFIG_FILE`, for `ov-cli`'s own config layer which is
/// allowed to diverge from the library default.
pub fn load_cli_config(explicit_path: Option<&str>) -> Result<OpenVikingConfig> {
    load_openviking_config_with_env(explicit_path, OPENVIKING_CLI_CONFIG_ENV)
}

fn load_openviking_config_with_env(explicit_path: Option<&str>, env_var: &str) -> Result<OpenVikingConfig> {
    match resolve_config_path(explicit_path, env_var, DEFAULT_OV_CONF) {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| OvError::NotFound { uri: format!("config {}: {e}", path.display()) })?;
            serde_json::from_str(&content)
                .map_err(|e| OvError::InvalidInput(format!("invalid config JSON: {e}")))
        }
        None => Ok(OpenVikingConfig::default()),
    }
}

/// Validate an [`OpenVikingConfig`].
pub fn validate_config(config: &OpenVikingConfig) -> Result<()> {
    if config.embedding.dense.dimension == 0 {
        return Err(OvError::InvalidInput("embedding.dense.dimension must be > 0".into()));
    }
    if config.server.port == 0 {
        return Err(OvError::InvalidInput("server.port must be > 0".into()));
    }
    if config.storage.vectordb.name.is_empty() {
        return Err(OvError::InvalidInput("storage.vectordb.name cannot be empty".into()));
    }
    if !(0.0..=1.0).contains(&config.storage.vectordb.sparse_weight) {
        return Err(OvError::InvalidInput("storage.vectordb.sparse_weight must be in [0, 1]".into()));
    }
    Ok(())
}
