//! Error types shared by every stage of the retrieval pipeline.

use thiserror::Error;

/// Errors produced while ingesting documents or answering queries.
#[derive(Debug, Error)]
pub enum RagError {
    /// The source bytes could not be parsed as a document, or it has no pages.
    #[error("Failed to extract text: {0}")]
    Extraction(String),

    /// Extracted text is too short to be worth indexing.
    #[error("Document '{filename}' contains too little text ({chars} characters, need at least {min})")]
    EmptyDocument {
        filename: String,
        chars: usize,
        min: usize,
    },

    /// The embedding provider failed for a single input.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Every chunk of a document failed to embed.
    #[error("Ingestion of '{filename}' failed: none of {attempted} chunks could be embedded")]
    IngestionFailed { filename: String, attempted: usize },

    /// The answer service returned something that is not a structured answer.
    #[error("Answer has an unexpected format: {0}")]
    AnswerFormat(String),

    /// A remote service (embedding or generation) returned an error.
    #[error("{service} request failed: {message}")]
    Provider { service: String, message: String },

    /// The storage backend failed.
    #[error("Vector store error ({backend}): {message}")]
    VectorStore { backend: String, message: String },

    #[error("Document '{0}' not found")]
    NotFound(String),

    #[error("Query cannot be empty")]
    EmptyQuery,

    #[error("Unsupported document format: {0}. Only PDF files are supported.")]
    UnsupportedFormat(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RagError {
    pub(crate) fn provider(service: &str, message: impl Into<String>) -> Self {
        RagError::Provider {
            service: service.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn store(backend: &str, message: impl Into<String>) -> Self {
        RagError::VectorStore {
            backend: backend.to_string(),
            message: message.into(),
        }
    }
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, RagError>;
