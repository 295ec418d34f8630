//! Embedding Similarity
//!
//! The engine never produces embeddings. Callers attach a pre-computed vector
//! to each node and may inject the comparison used for matching and grouping.
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use strata_core::memory::{CosineSimilarity, Similarity};
//!
//! let cosine: Arc<dyn Similarity> = Arc::new(CosineSimilarity);
//! assert!((cosine.similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
//!
//! // Any closure with the right shape also works
//! let dot: Arc<dyn Similarity> =
//!     Arc::new(|a: &[f32], b: &[f32]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>());
//! assert_eq!(dot.similarity(&[2.0], &[3.0]), 6.0);
//! ```

/// Comparison between two embedding vectors
pub trait Similarity: Send + Sync {
    /// Higher means more alike. Mismatched lengths should compare as unrelated.
    fn similarity(&self, a: &[f32], b: &[f32]) -> f32;
}

impl<F> Similarity for F
where
    F: Fn(&[f32], &[f32]) -> f32 + Send + Sync,
{
    fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        self(a, b)
    }
}

/// Cosine similarity, the default comparison
#[derive(Debug, Clone, Copy, Default)]
pub struct CosineSimilarity;

impl Similarity for CosineSimilarity {
    fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        cosine_similarity(a, b)
    }
}

/// Compute cosine similarity between two vectors
///
/// Returns a value between -1.0 and 1.0, where 1.0 means identical,
/// 0.0 means orthogonal, and -1.0 means opposite.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Compare two optional embeddings; `None` when either side is missing
pub fn compare(similarity: &dyn Similarity, a: Option<&[f32]>, b: Option<&[f32]>) -> Option<f32> {
    match (a, b) {
        (Some(a), Some(b)) => Some(similarity.similarity(a, b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_same() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[1.0, 0.0, 0.0]);
        assert!((sim - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]);
        assert!(sim.abs() < 0.001);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[-1.0, 0.0, 0.0]);
        assert!((sim + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_mismatched_lengths_are_unrelated() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_compare_requires_both_sides() {
        let cosine = CosineSimilarity;
        let v = vec![1.0_f32];
        assert!(compare(&cosine, Some(v.as_slice()), None).is_none());
        assert!(compare(&cosine, Some(v.as_slice()), Some(v.as_slice())).is_some());
    }
}
