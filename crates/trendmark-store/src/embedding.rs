//! Embedding Model for Text Vectorization
//!
//! A deterministic bag-of-words embedder used when no external embedding
//! service is configured (seed data, local runs, tests). Each normalized
//! token is hashed into one of `dimension` buckets with a signed weight; the
//! result is L2-normalized so dot products are cosine similarities.
//!
//! Texts sharing vocabulary land close together, which is all the matcher
//! needs to produce meaningful scores without a model download.
//!
//! # Examples
//!
//! ```rust
//! use trendmark_store::embedding::{cosine_similarity, EmbeddingModel, HashingEmbedder};
//!
//! let model = HashingEmbedder::new(64);
//! let a = model.embed("diwali sale on lamps").unwrap();
//! let b = model.embed("Diwali Sale!").unwrap();
//! let c = model.embed("winter hiking boots").unwrap();
//! assert!(cosine_similarity(&a, &b) > cosine_similarity(&a, &c));
//! ```

use sha2::{Digest, Sha256};
use thiserror::Error;
use trendmark_domain::normalize_query;

/// Errors that can occur during embedding generation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmbeddingError {
    /// Invalid input text
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Trait for embedding models
pub trait EmbeddingModel: Send + Sync {
    /// Generate an embedding vector for the given text
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Get the dimension of embeddings produced by this model
    fn dimension(&self) -> usize;
}

/// Hashing bag-of-words embedder
///
/// - **Deterministic**: the same text always produces the same vector, across
///   processes and platforms (SHA-256 bucket assignment)
/// - **Normalized**: unit length
/// - **Case and punctuation insensitive**: text goes through the same
///   normalization as trend queries
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    /// Create an embedder producing vectors of `dimension` components
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn bucket(&self, token: &str) -> (usize, f32) {
        let digest = Sha256::digest(token.as_bytes());
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&digest[..8]);
        let value = u64::from_be_bytes(raw);
        let index = (value % self.dimension as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        (index, sign)
    }
}

impl EmbeddingModel for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let normalized = normalize_query(text);
        if normalized.is_empty() {
            return Err(EmbeddingError::InvalidInput(
                "Empty text cannot be embedded".to_string(),
            ));
        }

        let mut embedding = vec![0.0f32; self.dimension];
        for token in normalized.split(' ') {
            let (index, sign) = self.bucket(token);
            embedding[index] += sign;
        }

        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut embedding {
                *value /= magnitude;
            }
        }
        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Cosine similarity between two vectors
///
/// Returns 0.0 for mismatched lengths or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    (dot / (mag_a * mag_b)).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_and_normalized() {
        let model = HashingEmbedder::new(32);
        let a = model.embed("Diwali sale").unwrap();
        let b = model.embed("diwali   SALE!").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
        let magnitude: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_text_rejected() {
        let model = HashingEmbedder::new(8);
        assert!(model.embed("  !! ").is_err());
    }

    #[test]
    fn test_shared_vocabulary_scores_higher() {
        let model = HashingEmbedder::new(256);
        let query = model.embed("diwali sale").unwrap();
        let related = model.embed("big diwali sale on brass lamps").unwrap();
        let unrelated = model.embed("trail running shoes for winter").unwrap();
        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[test]
    fn test_cosine_edge_cases() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]), 1.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]), -1.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }
}
