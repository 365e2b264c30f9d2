use crate::error::{RagError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_EMBED_MODEL: &str = "text-embedding-004";
const DEFAULT_ANSWER_MODEL: &str = "gemini-2.0-flash-exp";

/// Configuration for the Gemini API
#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub embed_model: String,
    pub answer_model: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    /// Create a configuration with default endpoints and models
    pub fn new(api_key: impl Into<String>) -> Self {
        GeminiConfig {
            api_key: api_key.into(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            answer_model: DEFAULT_ANSWER_MODEL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Create a new configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("GEMINI_API_KEY")
            .map_err(|_| RagError::Config("GEMINI_API_KEY is not set".to_string()))?;
        if api_key.trim().is_empty() {
            return Err(RagError::Config("GEMINI_API_KEY is empty".to_string()));
        }

        let mut config = GeminiConfig::new(api_key);
        if let Ok(url) = env::var("GEMINI_BASE_URL") {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(model) = env::var("GEMINI_EMBED_MODEL") {
            config.embed_model = model;
        }
        if let Ok(model) = env::var("GEMINI_ANSWER_MODEL") {
            config.answer_model = model;
        }
        config.timeout = Duration::from_secs(env_or("GEMINI_TIMEOUT_SECS", 60u64)?);

        Ok(config)
    }

    pub fn embeddings_url(&self) -> String {
        format!("{}/models/{}:embedContent", self.base_url, self.embed_model)
    }

    pub fn generate_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.answer_model)
    }
}

// Keeps the key out of logs.
impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("embed_model", &self.embed_model)
            .field("answer_model", &self.answer_model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Configuration for Qdrant
#[derive(Debug, Clone)]
pub struct QdrantConfig {
    pub url: String,
    pub api_key: Option<String>,
    /// Prefix for the documents and chunks collections
    pub collection_prefix: String,
}

impl QdrantConfig {
    /// Create a new configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let url = env::var("QDRANT_URL")
            .map_err(|_| RagError::Config("QDRANT_URL is not set".to_string()))?;
        let api_key = env::var("QDRANT_API_KEY").ok();
        let collection_prefix =
            env::var("QDRANT_COLLECTION_PREFIX").unwrap_or_else(|_| "rag".to_string());

        Ok(QdrantConfig {
            url,
            api_key,
            collection_prefix,
        })
    }
}

/// Tunables of the chunking, search and pacing stages.
///
/// The boundary ratio and the similarity floor are empirical values, so they
/// are kept configurable instead of being baked into the algorithms.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalConfig {
    /// Maximum chunk window in characters
    pub chunk_size: usize,
    /// Characters shared by consecutive windows
    pub chunk_overlap: usize,
    /// A natural break is used only past `chunk_size * boundary_ratio`
    pub boundary_ratio: f32,
    /// Trimmed chunks of this length or shorter are dropped
    pub min_chunk_chars: usize,
    /// Extracted documents shorter than this are rejected
    pub min_document_chars: usize,
    /// Number of chunks handed to the answer service
    pub top_k: usize,
    /// Results scoring at or below this are discarded
    pub min_similarity: f32,
    /// Pause after every `pace_every` embedding requests
    pub pace_every: usize,
    pub pace_delay_ms: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        RetrievalConfig {
            chunk_size: 1000,
            chunk_overlap: 200,
            boundary_ratio: 0.5,
            min_chunk_chars: 50,
            min_document_chars: 100,
            top_k: 3,
            min_similarity: 0.3,
            pace_every: 5,
            pace_delay_ms: 1000,
        }
    }
}

impl RetrievalConfig {
    /// Defaults overridden by `RAG_*` environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = RetrievalConfig::default();
        let config = RetrievalConfig {
            chunk_size: env_or("RAG_CHUNK_SIZE", defaults.chunk_size)?,
            chunk_overlap: env_or("RAG_CHUNK_OVERLAP", defaults.chunk_overlap)?,
            boundary_ratio: env_or("RAG_BOUNDARY_RATIO", defaults.boundary_ratio)?,
            min_chunk_chars: defaults.min_chunk_chars,
            min_document_chars: env_or("RAG_MIN_DOCUMENT_CHARS", defaults.min_document_chars)?,
            top_k: env_or("RAG_TOP_K", defaults.top_k)?,
            min_similarity: env_or("RAG_MIN_SIMILARITY", defaults.min_similarity)?,
            pace_every: env_or("RAG_PACE_EVERY", defaults.pace_every)?,
            pace_delay_ms: env_or("RAG_PACE_DELAY_MS", defaults.pace_delay_ms)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations that would make chunking or pacing misbehave.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be greater than zero".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if !(0.0..1.0).contains(&self.boundary_ratio) {
            return Err(RagError::Config(format!(
                "boundary_ratio ({}) must be in [0, 1)",
                self.boundary_ratio
            )));
        }
        // A break at or before the overlap would move the cursor backwards.
        if (self.chunk_size as f32 * self.boundary_ratio) < self.chunk_overlap as f32 {
            return Err(RagError::Config(format!(
                "chunk_size * boundary_ratio ({}) must not be smaller than chunk_overlap ({})",
                self.chunk_size as f32 * self.boundary_ratio,
                self.chunk_overlap
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::Config("top_k must be greater than zero".to_string()));
        }
        if self.pace_every == 0 || self.pace_delay_ms == 0 {
            return Err(RagError::Config(
                "pace_every and pace_delay_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn pace_delay(&self) -> Duration {
        Duration::from_millis(self.pace_delay_ms)
    }
}

/// Everything the binary needs, passed around explicitly.
#[derive(Debug, Clone)]
pub struct Settings {
    pub gemini: GeminiConfig,
    pub retrieval: RetrievalConfig,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Ok(Settings {
            gemini: GeminiConfig::from_env()?,
            retrieval: RetrievalConfig::from_env()?,
        })
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| RagError::Config(format!("{key} has an invalid value: {raw}"))),
        Err(_) => Ok(default),
    }
}
