//! Embedding-based similarity gate for rephrased variants.

use crate::embedding::{EmbeddingCache, TaskType};
use crate::errors::{PipelineError, Result};

/// Rephrasings below this cosine similarity to the control text are retried.
pub const SIMILARITY_THRESHOLD: f32 = 0.60;

/// Cosine similarity between two vectors. Dimension mismatch is an error;
/// a zero-norm vector yields 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(PipelineError::Embedding(format!(
            "embedding dimensions don't match: {} vs {}",
            a.len(),
            b.len()
        )));
    }
    if a.is_empty() {
        return Ok(0.0);
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        Ok(0.0)
    } else {
        Ok(dot / (norm_a * norm_b))
    }
}

/// Similarity between the control's rephrased text and a variant's, embedded
/// through the cache so repeated comparisons of the same text are free.
pub async fn focused_similarity(
    cache: &EmbeddingCache,
    control_text: &str,
    treated_text: &str,
) -> Result<f32> {
    if control_text.is_empty() || treated_text.is_empty() {
        return Ok(0.0);
    }
    let control = cache
        .get_or_compute(control_text, TaskType::SemanticSimilarity)
        .await?;
    let treated = cache
        .get_or_compute(treated_text, TaskType::SemanticSimilarity)
        .await?;
    cosine_similarity(&control, &treated)
}
