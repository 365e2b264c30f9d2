//! In-memory [`VectorStore`] backed by vectors under a `tokio::sync::RwLock`.
//!
//! Used for tests and for single-process sessions (`--store memory`).

use crate::error::{RagError, Result};
use crate::store::{NewChunk, NewDocument, StoredChunk, StoredDocument, VectorStore};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

const BACKEND: &str = "memory";

#[derive(Debug, Default)]
struct Tables {
    documents: Vec<StoredDocument>,
    chunks: Vec<StoredChunk>,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dimensionality of the stored vectors, if any chunk exists
    pub async fn dimensions(&self) -> Option<usize> {
        let tables = self.tables.read().await;
        tables.chunks.first().map(|c| c.embedding.len())
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn add_document(&self, document: NewDocument) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let mut tables = self.tables.write().await;
        tables.documents.push(StoredDocument {
            id: id.clone(),
            filename: document.filename,
            size_bytes: document.size_bytes,
            total_chunks: document.total_chunks,
            uploaded_at: Utc::now(),
        });
        Ok(id)
    }

    async fn add_chunks(&self, document_id: &str, chunks: Vec<NewChunk>) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.documents.iter().any(|d| d.id == document_id) {
            return Err(RagError::NotFound(document_id.to_string()));
        }

        let mut dimensions = tables.chunks.first().map(|c| c.embedding.len());
        let created_at = Utc::now();
        for chunk in chunks {
            let expected = *dimensions.get_or_insert(chunk.embedding.len());
            if chunk.embedding.len() != expected {
                return Err(RagError::store(
                    BACKEND,
                    format!(
                        "chunk {} of document {} has {} dimensions, store holds {}",
                        chunk.index,
                        document_id,
                        chunk.embedding.len(),
                        expected
                    ),
                ));
            }
            tables.chunks.push(StoredChunk {
                id: Uuid::new_v4().to_string(),
                document_id: document_id.to_string(),
                index: chunk.index,
                content: chunk.content,
                embedding: chunk.embedding,
                created_at,
            });
        }
        Ok(())
    }

    async fn list_documents(&self) -> Result<Vec<StoredDocument>> {
        let tables = self.tables.read().await;
        let mut documents = tables.documents.clone();
        // newest first; equal timestamps keep the later insertion first
        documents.reverse();
        documents.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(documents)
    }

    async fn chunks(&self) -> Result<Vec<StoredChunk>> {
        Ok(self.tables.read().await.chunks.clone())
    }

    async fn remove_document(&self, document_id: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        let before = tables.documents.len();
        tables.documents.retain(|d| d.id != document_id);
        if tables.documents.len() == before {
            return Err(RagError::NotFound(document_id.to_string()));
        }
        Ok(())
    }

    async fn chunk_ids_for(&self, document_id: &str) -> Result<Vec<String>> {
        let tables = self.tables.read().await;
        Ok(tables
            .chunks
            .iter()
            .filter(|c| c.document_id == document_id)
            .map(|c| c.id.clone())
            .collect())
    }

    async fn remove_chunk(&self, chunk_id: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.chunks.retain(|c| c.id != chunk_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_chunk(index: usize, embedding: Vec<f32>) -> NewChunk {
        NewChunk {
            index,
            content: format!("chunk {index}"),
            embedding,
        }
    }

    async fn add(store: &InMemoryStore, name: &str, chunks: Vec<NewChunk>) -> String {
        let id = store
            .add_document(NewDocument {
                filename: name.to_string(),
                size_bytes: 10,
                total_chunks: chunks.len(),
            })
            .await
            .unwrap();
        store.add_chunks(&id, chunks).await.unwrap();
        id
    }

    #[tokio::test]
    async fn lists_newest_first() {
        let store = InMemoryStore::new();
        add(&store, "first.pdf", vec![]).await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        add(&store, "second.pdf", vec![]).await;

        let names: Vec<String> = store
            .list_documents()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.filename)
            .collect();
        assert_eq!(names, vec!["second.pdf", "first.pdf"]);
    }

    #[tokio::test]
    async fn delete_cascades_to_chunks() {
        let store = InMemoryStore::new();
        let keep = add(&store, "keep.pdf", vec![new_chunk(0, vec![1.0, 0.0])]).await;
        let removed = add(
            &store,
            "drop.pdf",
            vec![new_chunk(0, vec![0.0, 1.0]), new_chunk(1, vec![0.5, 0.5])],
        )
        .await;

        let report = store.delete_document(&removed).await.unwrap();
        assert_eq!(report.chunks_deleted, 2);
        assert_eq!(report.chunks_failed, 0);

        let documents = store.list_documents().await.unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].id, keep);
        let chunks = store.chunks().await.unwrap();
        assert!(chunks.iter().all(|c| c.document_id == keep));
    }

    #[tokio::test]
    async fn delete_unknown_document_is_not_found() {
        let store = InMemoryStore::new();
        let err = store.delete_document("missing").await.unwrap_err();
        assert!(matches!(err, RagError::NotFound(_)));
    }

    #[tokio::test]
    async fn rejects_mixed_dimensions() {
        let store = InMemoryStore::new();
        add(&store, "a.pdf", vec![new_chunk(0, vec![1.0, 0.0])]).await;
        let id = store
            .add_document(NewDocument {
                filename: "b.pdf".to_string(),
                size_bytes: 1,
                total_chunks: 1,
            })
            .await
            .unwrap();
        let err = store
            .add_chunks(&id, vec![new_chunk(0, vec![1.0, 0.0, 0.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::VectorStore { .. }));
        assert_eq!(store.dimensions().await, Some(2));
    }

    #[tokio::test]
    async fn search_uses_similarity_floor() {
        let store = InMemoryStore::new();
        add(
            &store,
            "doc.pdf",
            vec![new_chunk(0, vec![1.0, 0.0]), new_chunk(1, vec![0.0, 1.0])],
        )
        .await;

        let results = store.search(&[1.0, 0.1], 3, 0.3).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.index, 0);
    }
}
