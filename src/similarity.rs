//! Cosine ranking over stored chunks.

use crate::store::{ScoredChunk, StoredChunk};

/// Cosine similarity of two vectors.
///
/// Returns 0.0 when the lengths differ or either vector has zero magnitude,
/// so a malformed row ranks last instead of failing the whole search.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let similarity = dot / (norm_a * norm_b);
    if similarity.is_nan() {
        0.0
    } else {
        similarity
    }
}

/// Score every chunk against `query`, keep the best `top_k` and then drop
/// anything scoring at or below `min_similarity`.
///
/// The sort is stable, so equal scores keep the order the chunks were given in.
pub fn rank_chunks(
    query: &[f32],
    chunks: Vec<StoredChunk>,
    top_k: usize,
    min_similarity: f32,
) -> Vec<ScoredChunk> {
    let mut scored: Vec<ScoredChunk> = chunks
        .into_iter()
        .map(|chunk| {
            let score = cosine_similarity(query, &chunk.embedding);
            ScoredChunk { chunk, score }
        })
        .collect();

    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(top_k);
    scored.retain(|result| result.score > min_similarity);
    scored
}
