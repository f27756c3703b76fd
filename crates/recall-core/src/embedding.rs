//! Embedding provider trait and vector utilities.
//!
//! Defines the [`EmbeddingProvider`] trait that all embedding backends
//! implement, plus pure helper functions for vector serialization,
//! normalization, and similarity computation.
//!
//! Concrete provider implementations (Ollama, fastembed) live in the
//! `recall` app crate. The core never assumes a specific model.

use anyhow::Result;
use async_trait::async_trait;

/// Trait for embedding providers.
///
/// Implementations turn text into a fixed-length vector. Vectors are
/// expected to be unit-normalized; the vector index normalizes again on
/// insert so a misbehaving provider cannot skew dot-product similarity.
///
/// Implementations are not required to be safe for concurrent inference:
/// the engine serializes every call.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"nomic-embed-text"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `768`), or `0`
    /// when the provider is disabled.
    fn dims(&self) -> usize;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts in order, calling `progress(completed, total)`
    /// after each one.
    ///
    /// The default implementation embeds sequentially via [`embed`](Self::embed).
    async fn embed_batch(
        &self,
        texts: &[String],
        progress: &(dyn Fn(usize, usize) + Send + Sync),
    ) -> Result<Vec<Vec<f32>>> {
        let total = texts.len();
        let mut out = Vec::with_capacity(total);
        for (i, text) in texts.iter().enumerate() {
            out.push(self.embed(text).await?);
            progress(i + 1, total);
        }
        Ok(out)
    }
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// Each `f32` is stored as 4 bytes in little-endian order, producing
/// a BLOB of `vec.len() × 4` bytes. Used by index persistence so that
/// reloaded vectors are bit-identical.
///
/// # Example
///
/// ```rust
/// use recall_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
///
/// Reverses [`vec_to_blob`]: reads 4-byte little-endian `f32` values
/// from the byte slice. Trailing bytes that do not form a full value are
/// ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Scale `vec` to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm < f32::EPSILON {
        return;
    }
    for x in vec.iter_mut() {
        *x /= norm;
    }
}

/// Dot product of two pre-normalized vectors (equivalent to cosine
/// similarity for unit vectors).
///
/// Returns `0.0` for empty vectors or vectors of different lengths: a
/// dimension fault is a corpus-consistency issue, not a query-time error.
pub fn dot_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        let blob = vec_to_blob(&vec);
        let restored = blob_to_vec(&blob);
        assert_eq!(vec, restored);
    }

    /// Reference cosine over raw vectors.
    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        let norm = |v: &[f32]| v.iter().map(|x| x * x).sum::<f32>().sqrt();
        a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>() / (norm(a) * norm(b))
    }

    #[test]
    fn test_dot_matches_cosine_for_unit_vectors() {
        let mut a = vec![3.0f32, 4.0, 0.0];
        let mut b = vec![1.0f32, 1.0, 1.0];
        l2_normalize(&mut a);
        l2_normalize(&mut b);
        let expected = cosine(&[3.0, 4.0, 0.0], &[1.0, 1.0, 1.0]);
        assert!((dot_similarity(&a, &b) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_dot_mismatch_is_zero() {
        assert_eq!(dot_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(dot_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_normalize_zero_vector_untouched() {
        let mut v = vec![0.0f32; 4];
        l2_normalize(&mut v);
        assert_eq!(v, vec![0.0; 4]);
    }

    #[test]
    fn test_normalize_unit_length() {
        let mut v = vec![2.0f32, -2.0, 1.0];
        l2_normalize(&mut v);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    proptest! {
        #[test]
        fn prop_similarity_symmetric(
            pairs in proptest::collection::vec((-10.0f32..10.0, -10.0f32..10.0), 1..32)
        ) {
            let a: Vec<f32> = pairs.iter().map(|p| p.0).collect();
            let b: Vec<f32> = pairs.iter().map(|p| p.1).collect();
            prop_assert_eq!(dot_similarity(&a, &b), dot_similarity(&b, &a));
        }
    }
}
