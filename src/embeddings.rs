use crate::error::Result;
use async_trait::async_trait;

/// Turns text into a fixed-length vector.
///
/// Implementations must fail with [`RagError::Embedding`](crate::error::RagError::Embedding)
/// instead of returning a placeholder when the provider errors, rejects the
/// input or times out.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}
