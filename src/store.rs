use crate::error::{RagError, Result};
use crate::similarity::rank_chunks;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// Metadata of an ingested file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    /// Original file name
    pub filename: String,
    pub size_bytes: u64,
    pub total_chunks: usize,
    pub uploaded_at: DateTime<Utc>,
}

/// A stored segment of a document together with its embedding
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredChunk {
    pub id: String,
    pub document_id: String,
    /// Zero-based position within the document
    pub index: usize,
    pub content: String,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

/// Document metadata before it is persisted
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub filename: String,
    pub size_bytes: u64,
    pub total_chunks: usize,
}

/// Chunk contents before they are persisted
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub index: usize,
    pub content: String,
    pub embedding: Vec<f32>,
}

/// A chunk paired with its similarity to a query
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub chunk: StoredChunk,
    pub score: f32,
}

/// Outcome of a cascading document delete
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeletionReport {
    pub chunks_deleted: usize,
    pub chunks_failed: usize,
}

/// Persistence for documents and their chunks.
///
/// Backends only provide storage primitives. Similarity ranking and the
/// document/chunk cascade are implemented once, in the provided methods.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Short backend name used in logs and errors
    fn name(&self) -> &'static str;

    /// Persist document metadata and return its new identifier
    async fn add_document(&self, document: NewDocument) -> Result<String>;

    /// Persist chunks of an existing document. Each chunk is an independent write.
    async fn add_chunks(&self, document_id: &str, chunks: Vec<NewChunk>) -> Result<()>;

    /// All documents, most recently uploaded first
    async fn list_documents(&self) -> Result<Vec<StoredDocument>>;

    /// Every stored chunk, in insertion order
    async fn chunks(&self) -> Result<Vec<StoredChunk>>;

    /// Remove the document record. Fails with `NotFound` for unknown ids.
    async fn remove_document(&self, document_id: &str) -> Result<()>;

    /// Ids of all chunks that reference `document_id`
    async fn chunk_ids_for(&self, document_id: &str) -> Result<Vec<String>>;

    async fn remove_chunk(&self, chunk_id: &str) -> Result<()>;

    /// Linear-scan cosine search over every stored chunk.
    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
        min_similarity: f32,
    ) -> Result<Vec<ScoredChunk>> {
        let chunks = self.chunks().await?;
        let candidates = chunks.len();
        let results = rank_chunks(query, chunks, top_k, min_similarity);
        debug!(
            "{}: {} of {} chunks above similarity {}",
            self.name(),
            results.len(),
            candidates,
            min_similarity
        );
        Ok(results)
    }

    /// Delete a document and then every chunk that belongs to it.
    ///
    /// Removing the document record is authoritative: once it succeeds the
    /// chunk deletions are attempted one by one, and a failing chunk is logged
    /// and counted without undoing anything. When the record is already gone,
    /// chunks still referencing the id are swept, so repeating a partially
    /// failed delete finishes the job. `NotFound` is returned only when
    /// neither a record nor a chunk matched.
    async fn delete_document(&self, document_id: &str) -> Result<DeletionReport> {
        let record_found = match self.remove_document(document_id).await {
            Ok(()) => true,
            Err(RagError::NotFound(_)) => false,
            Err(e) => return Err(e),
        };

        let chunk_ids = match self.chunk_ids_for(document_id).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(
                    "Chunks of removed document {} could not be listed, retry the delete: {}",
                    document_id, e
                );
                return Err(e);
            }
        };
        if !record_found {
            if chunk_ids.is_empty() {
                return Err(RagError::NotFound(document_id.to_string()));
            }
            info!(
                "Document {} has no record, sweeping {} leftover chunks",
                document_id,
                chunk_ids.len()
            );
        }

        let mut report = DeletionReport::default();
        for chunk_id in chunk_ids {
            match self.remove_chunk(&chunk_id).await {
                Ok(()) => report.chunks_deleted += 1,
                Err(e) => {
                    warn!("Failed to delete chunk {} of document {}: {}", chunk_id, document_id, e);
                    report.chunks_failed += 1;
                }
            }
        }

        info!(
            "Deleted document {} ({} chunks removed, {} failed)",
            document_id, report.chunks_deleted, report.chunks_failed
        );
        Ok(report)
    }
}
