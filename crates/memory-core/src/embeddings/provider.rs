//! Embedding provider abstraction.
//!
//! Production wiring plugs in a real model-backed provider; tests and
//! offline development use [`StubEmbeddingProvider`], which is deterministic
//! and needs no network access or model download.

use crate::error::{MemoryError, Result};

/// Something that turns text into a fixed-dimension embedding vector.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single piece of text.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts. The default implementation calls
    /// [`EmbeddingProvider::embed`] once per item; providers backed by a
    /// model that batches more efficiently should override this.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// The dimensionality of vectors this provider produces.
    fn dimension(&self) -> usize;
}

/// Deterministic, hash-based stand-in for a real embedding model: equal
/// inputs produce equal vectors, and the vectors are unit-normalised so
/// cosine similarity behaves sensibly in tests.
pub struct StubEmbeddingProvider {
    dimension: usize,
}

impl StubEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        StubEmbeddingProvider { dimension }
    }
}

impl Default for StubEmbeddingProvider {
    fn default() -> Self {
        StubEmbeddingProvider::new(32)
    }
}

impl EmbeddingProvider for StubEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(MemoryError::EmbeddingProvider("cannot embed empty text".to_string()));
        }
        let mut vector = vec![0.0f32; self.dimension];
        // Scatter bytes of a rolling hash across the vector so distinct
        // inputs land at distinct, reproducible points.
        let mut state: u64 = 0xcbf29ce484222325;
        for (i, byte) in text.bytes().enumerate() {
            state ^= byte as u64;
            state = state.wrapping_mul(0x100000001b3);
            let slot = i % self.dimension;
            vector[slot] += ((state >> 32) as i32 as f32) / i32::MAX as f32;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_input_yields_same_vector() {
        let provider = StubEmbeddingProvider::default();
        let a = provider.embed("hello world").unwrap();
        let b = provider.embed("hello world").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_input_yields_different_vector() {
        let provider = StubEmbeddingProvider::default();
        let a = provider.embed("hello world").unwrap();
        let b = provider.embed("goodbye world").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn vectors_are_unit_normalised() {
        let provider = StubEmbeddingProvider::default();
        let v = provider.embed("some text to embed").unwrap();
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn empty_text_errors() {
        let provider = StubEmbeddingProvider::default();
        assert!(provider.embed("   ").is_err());
    }

    #[test]
    fn batch_matches_individual() {
        let provider = StubEmbeddingProvider::default();
        let batch = provider
            .embed_batch(&["a".to_string(), "b".to_string()])
            .unwrap();
        assert_eq!(batch[0], provider.embed("a").unwrap());
        assert_eq!(batch[1], provider.embed("b").unwrap());
    }
}
