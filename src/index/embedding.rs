//! Embedding Provider (C2): a deterministic `text -> vector` map.
//!
//! No ML runtime is vendored (see DESIGN.md, Open Question 2). A SHA-256
//! hash of `(model_id, text)` seeds a small deterministic PRNG whose output
//! fills the embedding vector; the vector is then L2-normalized, matching
//! the "vectors are stored normalized" policy of the vector index. Given
//! identical input the output is bitwise-identical, satisfying the C2
//! contract without depending on input semantics at all.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use crate::types::EMBEDDING_DIM;

pub struct EmbeddingProvider {
    model_id: String,
    cache: HashMap<[u8; 32], Vec<f32>>,
}

impl EmbeddingProvider {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            cache: HashMap::new(),
        }
    }

    /// Embeds a single piece of text, consulting and populating the cache.
    pub fn embed(&mut self, text: &str) -> Vec<f32> {
        let key = cache_key(&self.model_id, text);
        if let Some(cached) = self.cache.get(&key) {
            return cached.clone();
        }
        let vector = embed_uncached(&key);
        self.cache.insert(key, vector.clone());
        vector
    }

    /// Embeds a batch. The contract is per-element — batching is purely a
    /// throughput concern the caller cannot observe in the result.
    pub fn embed_batch(&mut self, texts: &[String]) -> Vec<Vec<f32>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

fn cache_key(model_id: &str, text: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(model_id.as_bytes());
    hasher.update([0u8]); // separator, avoids ("a","bc") == ("ab","c") collisions
    hasher.update(text.as_bytes());
    hasher.finalize().into()
}

/// Deterministically expands a 32-byte seed into an `EMBEDDING_DIM`-length
/// L2-normalized vector using a simple counter-mode hash expansion (no
/// external PRNG dependency needed — SHA-256 over `seed || counter` is
/// already a deterministic, well-distributed byte stream).
fn embed_uncached(seed: &[u8; 32]) -> Vec<f32> {
    let mut out = Vec::with_capacity(EMBEDDING_DIM);
    let mut counter: u32 = 0;
    while out.len() < EMBEDDING_DIM {
        let mut hasher = Sha256::new();
        hasher.update(seed);
        hasher.update(counter.to_le_bytes());
        let digest = hasher.finalize();
        for chunk in digest.chunks_exact(4) {
            if out.len() == EMBEDDING_DIM {
                break;
            }
            let bits = u32::from_le_bytes(chunk.try_into().unwrap());
            // Map to [-1.0, 1.0).
            let value = (bits as f64 / u32::MAX as f64) * 2.0 - 1.0;
            out.push(value as f32);
        }
        counter += 1;
    }
    normalize_l2(&out)
}

/// L2-normalizes a vector; returns the zero vector unchanged (no direction
/// to normalize to).
pub fn normalize_l2(vector: &[f32]) -> Vec<f32> {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return vector.to_vec();
    }
    vector.iter().map(|v| v / norm).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embed_is_deterministic() {
        let mut provider = EmbeddingProvider::new("test-model");
        let a = provider.embed("list running processes");
        let b = provider.embed("list running processes");
        assert_eq!(a, b);
    }

    #[test]
    fn embed_has_fixed_dimension() {
        let mut provider = EmbeddingProvider::new("test-model");
        assert_eq!(provider.embed("anything").len(), EMBEDDING_DIM);
        assert_eq!(provider.embed("").len(), EMBEDDING_DIM);
    }

    #[test]
    fn embed_is_normalized() {
        let mut provider = EmbeddingProvider::new("test-model");
        let v = provider.embed("show audio sink volumes");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn different_text_yields_different_vectors() {
        let mut provider = EmbeddingProvider::new("test-model");
        let a = provider.embed("ps aux");
        let b = provider.embed("pactl list sinks");
        assert_ne!(a, b);
    }

    #[test]
    fn different_model_id_yields_different_vectors_for_same_text() {
        let mut a = EmbeddingProvider::new("model-a");
        let mut b = EmbeddingProvider::new("model-b");
        assert_ne!(a.embed("same text"), b.embed("same text"));
    }
}
