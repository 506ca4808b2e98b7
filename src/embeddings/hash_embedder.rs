//! Deterministic feature-hashing embedder for tests.
//!
//! Each lowercase token and each adjacent token pair is hashed (FNV-1a) into
//! one of `dimension` buckets with a hash-derived sign, then L2-normalized.
//! Texts sharing vocabulary land close together under cosine distance.

use async_trait::async_trait;

use super::l2_normalize;
use super::TextEmbedder;
use crate::errors::Result;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;

/// Feature hashed for text without alphanumeric tokens
const EMPTY_FEATURE: &str = "\u{0}empty";

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, b| {
        (hash ^ u64::from(*b)).wrapping_mul(FNV_PRIME)
    })
}

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn add(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let hash = fnv1a(feature.as_bytes());
        let bucket = (hash % self.dimension as u64) as usize;
        let sign = if (hash >> 63) == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }

    pub fn encode(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.dimension];
        if self.dimension == 0 {
            return vector;
        }

        let tokens = tokens(text);
        if tokens.is_empty() {
            self.add(&mut vector, EMPTY_FEATURE, 1.0);
        }
        for token in &tokens {
            self.add(&mut vector, token, 1.0);
        }
        for pair in tokens.windows(2) {
            self.add(&mut vector, &format!("{} {}", pair[0], pair[1]), 0.5);
        }
        l2_normalize(&mut vector);
        vector
    }
}

#[async_trait]
impl TextEmbedder for HashEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.encode(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.encode(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::cosine_similarity;

    #[test]
    fn test_encoding_is_deterministic() {
        let embedder = HashEmbedder::new(384);
        assert_eq!(
            embedder.encode("Family Medicine, Thunder Bay"),
            embedder.encode("family medicine thunder bay")
        );
    }

    #[test]
    fn test_shared_vocabulary_scores_higher() {
        let embedder = HashEmbedder::new(384);
        let query = embedder.encode("rural medicine");
        let related = embedder.encode("Excellent rural training in family medicine");
        let unrelated = embedder.encode("Cardiac surgery fellowship in Montreal");
        let close = cosine_similarity(&query, &related);
        let far = cosine_similarity(&query, &unrelated);
        assert!(close > 0.0);
        assert!(close > far);
    }

    #[test]
    fn test_punctuation_only_text_is_unit_length() {
        let v = HashEmbedder::new(16).encode("???");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }
}
