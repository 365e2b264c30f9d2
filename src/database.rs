use crate::config::QdrantConfig;
use crate::error::{RagError, Result};
use crate::store::{NewChunk, NewDocument, StoredChunk, StoredDocument, VectorStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, GetPointsBuilder,
    PointId, PointStruct, PointsIdsList, RetrievedPoint, ScrollPointsBuilder, UpsertPointsBuilder,
    Value, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant, QdrantError};
use serde_json::json;
use std::collections::HashMap;
use uuid::Uuid;

const BACKEND: &str = "qdrant";
const SCROLL_PAGE: u32 = 256;

/// Document records carry no meaningful vector; Qdrant still wants one.
const DOCUMENT_VECTOR: [f32; 1] = [1.0];

/// [`VectorStore`] on top of two Qdrant collections, one for document records
/// and one for chunks.
///
/// Chunk vectors are mirrored into the payload so that ranking runs
/// client-side through [`VectorStore::search`], like every other backend.
pub struct QdrantStore {
    client: Qdrant,
    documents_collection: String,
    chunks_collection: String,
}

impl QdrantStore {
    /// Connect and make sure the documents collection exists
    pub async fn connect(config: QdrantConfig) -> Result<Self> {
        let builder = Qdrant::from_url(&config.url);
        let builder = if let Some(api_key) = config.api_key {
            builder.api_key(api_key)
        } else {
            builder
        };
        let client = builder.build().map_err(qdrant_error)?;

        let store = QdrantStore {
            client,
            documents_collection: collection_name(&config.collection_prefix, "documents"),
            chunks_collection: collection_name(&config.collection_prefix, "chunks"),
        };

        if !store.collection_exists(&store.documents_collection).await? {
            store
                .create_collection(&store.documents_collection, 1, Distance::Dot)
                .await?;
        }
        Ok(store)
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        match self.client.collection_info(name).await {
            Ok(_) => Ok(true),
            Err(QdrantError::ResponseError { status })
                if status.code() == tonic::Code::NotFound =>
            {
                Ok(false)
            }
            Err(e) => Err(RagError::store(
                BACKEND,
                format!("failed to check collection {name}: {e}"),
            )),
        }
    }

    async fn create_collection(&self, name: &str, size: u64, distance: Distance) -> Result<()> {
        info!("Creating Qdrant collection {} ({} dimensions)", name, size);
        self.client
            .create_collection(
                CreateCollectionBuilder::new(name)
                    .vectors_config(VectorParamsBuilder::new(size, distance)),
            )
            .await
            .map_err(|e| {
                RagError::store(BACKEND, format!("failed to create collection {name}: {e}"))
            })?;
        Ok(())
    }

    /// Every point of a collection matching `filter`, following scroll pages
    async fn scroll_all(
        &self,
        collection: &str,
        filter: Option<Filter>,
    ) -> Result<Vec<RetrievedPoint>> {
        let mut points = Vec::new();
        let mut offset: Option<PointId> = None;

        loop {
            let mut request = ScrollPointsBuilder::new(collection)
                .limit(SCROLL_PAGE)
                .with_payload(true)
                .with_vectors(false);
            if let Some(filter) = filter.clone() {
                request = request.filter(filter);
            }
            if let Some(offset) = offset.take() {
                request = request.offset(offset);
            }

            let response = self
                .client
                .scroll(request)
                .await
                .map_err(|e| {
                    RagError::store(BACKEND, format!("failed to scroll {collection}: {e}"))
                })?;
            points.extend(response.result);

            match response.next_page_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        debug!("Scrolled {} points from {}", points.len(), collection);
        Ok(points)
    }

    async fn delete_point(&self, collection: &str, id: &str) -> Result<()> {
        self.client
            .delete_points(
                DeletePointsBuilder::new(collection)
                    .points(PointsIdsList {
                        ids: vec![PointId::from(id.to_string())],
                    })
                    .wait(true),
            )
            .await
            .map_err(|e| RagError::store(BACKEND, format!("failed to delete point {id}: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn add_document(&self, document: NewDocument) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let payload = to_payload(document_payload(&document, Utc::now()))?;

        let point = PointStruct::new(id.clone(), DOCUMENT_VECTOR.to_vec(), payload);
        self.client
            .upsert_points(
                UpsertPointsBuilder::new(&self.documents_collection, vec![point]).wait(true),
            )
            .await
            .map_err(|e| RagError::store(BACKEND, format!("failed to store document: {e}")))?;

        Ok(id)
    }

    async fn add_chunks(&self, document_id: &str, chunks: Vec<NewChunk>) -> Result<()> {
        let Some(dimensions) = chunks.first().map(|c| c.embedding.len()) else {
            return Ok(());
        };
        if !self.collection_exists(&self.chunks_collection).await? {
            self.create_collection(&self.chunks_collection, dimensions as u64, Distance::Cosine)
                .await?;
        }

        let created_at = Utc::now();
        for chunk in chunks {
            let payload = to_payload(chunk_payload(document_id, &chunk, created_at))?;
            let point = PointStruct::new(Uuid::new_v4().to_string(), chunk.embedding, payload);

            self.client
                .upsert_points(
                    UpsertPointsBuilder::new(&self.chunks_collection, vec![point]).wait(true),
                )
                .await
                .map_err(|e| {
                    RagError::store(
                        BACKEND,
                        format!("failed to store chunk {} of {}: {e}", chunk.index, document_id),
                    )
                })?;
        }
        Ok(())
    }

    async fn list_documents(&self) -> Result<Vec<StoredDocument>> {
        let points = self.scroll_all(&self.documents_collection, None).await?;
        let mut documents =
            decode_points(&points, &self.documents_collection, document_from_point);
        documents.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(documents)
    }

    async fn chunks(&self) -> Result<Vec<StoredChunk>> {
        if !self.collection_exists(&self.chunks_collection).await? {
            return Ok(Vec::new());
        }
        let points = self.scroll_all(&self.chunks_collection, None).await?;
        let mut chunks = decode_points(&points, &self.chunks_collection, chunk_from_point);
        // scroll order follows point ids, which are random
        chunks.sort_by(|a, b| (a.created_at, a.index).cmp(&(b.created_at, b.index)));
        Ok(chunks)
    }

    async fn remove_document(&self, document_id: &str) -> Result<()> {
        let ids = vec![PointId::from(document_id.to_string())];
        let found = self
            .client
            .get_points(GetPointsBuilder::new(&self.documents_collection, ids).with_payload(false))
            .await
            .map_err(|e| {
                RagError::store(BACKEND, format!("failed to look up {document_id}: {e}"))
            })?;
        if found.result.is_empty() {
            return Err(RagError::NotFound(document_id.to_string()));
        }

        self.delete_point(&self.documents_collection, document_id).await
    }

    async fn chunk_ids_for(&self, document_id: &str) -> Result<Vec<String>> {
        if !self.collection_exists(&self.chunks_collection).await? {
            return Ok(Vec::new());
        }
        let filter = Filter::must([Condition::matches("document_id", document_id.to_string())]);
        let points = self.scroll_all(&self.chunks_collection, Some(filter)).await?;
        Ok(points.into_iter().filter_map(|p| point_id_string(p.id)).collect())
    }

    async fn remove_chunk(&self, chunk_id: &str) -> Result<()> {
        self.delete_point(&self.chunks_collection, chunk_id).await
    }
}

fn qdrant_error(e: QdrantError) -> RagError {
    RagError::store(BACKEND, e.to_string())
}

fn to_payload(value: serde_json::Value) -> Result<Payload> {
    payload_fields(value).map(Payload::from)
}

fn payload_fields(value: serde_json::Value) -> Result<HashMap<String, Value>> {
    serde_json::from_value(value)
        .map_err(|e| RagError::store(BACKEND, format!("invalid payload: {e}")))
}

fn document_payload(document: &NewDocument, uploaded_at: DateTime<Utc>) -> serde_json::Value {
    json!({
        "filename": document.filename,
        "size_bytes": document.size_bytes,
        "total_chunks": document.total_chunks,
        "uploaded_at": uploaded_at.timestamp_micros(),
    })
}

fn chunk_payload(
    document_id: &str,
    chunk: &NewChunk,
    created_at: DateTime<Utc>,
) -> serde_json::Value {
    json!({
        "document_id": document_id,
        "chunk_index": chunk.index,
        "content": chunk.content,
        "embedding": chunk.embedding,
        "created_at": created_at.timestamp_micros(),
    })
}

/// Decode every point, logging the ones that do not carry a complete payload
fn decode_points<T>(
    points: &[RetrievedPoint],
    collection: &str,
    decode: fn(&RetrievedPoint) -> Option<T>,
) -> Vec<T> {
    points
        .iter()
        .filter_map(|point| {
            let decoded = decode(point);
            if decoded.is_none() {
                warn!("Skipping malformed point {:?} in {}", point.id, collection);
            }
            decoded
        })
        .collect()
}

/// Generate a collection name from a prefix
fn collection_name(prefix: &str, kind: &str) -> String {
    // Replace non-alphanumeric characters with underscores and convert to lowercase
    let prefix = prefix
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .to_lowercase();

    format!("{}_{}", prefix, kind)
}

fn point_id_string(id: Option<PointId>) -> Option<String> {
    match id?.point_id_options? {
        PointIdOptions::Uuid(uuid) => Some(uuid),
        PointIdOptions::Num(num) => Some(num.to_string()),
    }
}

fn payload_str(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
    payload.get(key)?.as_str().map(|s| s.to_string())
}

fn payload_int(payload: &HashMap<String, Value>, key: &str) -> Option<i64> {
    payload.get(key)?.as_integer()
}

fn payload_time(payload: &HashMap<String, Value>, key: &str) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_micros(payload_int(payload, key)?)
}

fn document_from_point(point: &RetrievedPoint) -> Option<StoredDocument> {
    let payload = &point.payload;
    Some(StoredDocument {
        filename: payload_str(payload, "filename")?,
        size_bytes: payload_int(payload, "size_bytes")? as u64,
        total_chunks: payload_int(payload, "total_chunks")? as usize,
        uploaded_at: payload_time(payload, "uploaded_at")?,
        id: point_id_string(point.id.clone())?,
    })
}

fn chunk_from_point(point: &RetrievedPoint) -> Option<StoredChunk> {
    let payload = &point.payload;
    let embedding = payload
        .get("embedding")?
        .as_list()?
        .iter()
        .map(|v| {
            v.as_double()
                .or_else(|| v.as_integer().map(|i| i as f64))
                .map(|x| x as f32)
        })
        .collect::<Option<Vec<f32>>>()?;

    Some(StoredChunk {
        document_id: payload_str(payload, "document_id")?,
        index: payload_int(payload, "chunk_index")? as usize,
        content: payload_str(payload, "content")?,
        embedding,
        created_at: payload_time(payload, "created_at")?,
        id: point_id_string(point.id.clone())?,
    })
}
