//! Deterministic hash-based embedding fallback
//!
//! Token-hash folding into D buckets with L2 normalization. Not a semantic
//! model, but stable across runs and platforms, which keeps the full
//! pipeline (and the test suite) working with no API key configured.

use super::EmbeddingModel;
use async_trait::async_trait;
use intelscout_core::Result;

/// Local embedding fallback with a fixed dimension.
#[derive(Debug, Clone)]
pub struct HashEmbedding {
    dimensions: usize,
}

impl HashEmbedding {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in tokenize(text) {
            let bucket = (fnv1a(token) % self.dimensions as u64) as usize;
            vector[bucket] += 1.0;
        }
        l2_normalize(&mut vector);
        vector
    }
}

#[async_trait]
impl EmbeddingModel for HashEmbedding {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        "hash"
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
}

/// FNV-1a, fixed here rather than `DefaultHasher` because the std hasher is
/// not guaranteed stable across releases.
fn fnv1a(token: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in token.to_lowercase().bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_dimension_and_determinism() {
        let model = HashEmbedding::new(384);
        let texts = vec!["NVIDIA H100 pricing".to_string()];
        let a = model.embed(&texts).await.unwrap();
        let b = model.embed(&texts).await.unwrap();
        assert_eq!(a[0].len(), 384);
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_normalized_vectors() {
        let model = HashEmbedding::new(64);
        let vectors = model
            .embed(&["some evidence about GPU prices".to_string()])
            .await
            .unwrap();
        let norm: f32 = vectors[0].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_similar_texts_score_higher() {
        let model = HashEmbedding::new(256);
        let vectors = model
            .embed(&[
                "H100 GPU price in 2024".to_string(),
                "the H100 GPU price last year".to_string(),
                "baking sourdough bread at home".to_string(),
            ])
            .await
            .unwrap();
        let dot = |a: &[f32], b: &[f32]| -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() };
        assert!(dot(&vectors[0], &vectors[1]) > dot(&vectors[0], &vectors[2]));
    }

    #[tokio::test]
    async fn test_empty_text_is_zero_vector() {
        let model = HashEmbedding::new(16);
        let vectors = model.embed(&[String::new()]).await.unwrap();
        assert!(vectors[0].iter().all(|v| *v == 0.0));
    }
}
