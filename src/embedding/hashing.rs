//! 로컬 해싱 임베딩
//!
//! 단어 unigram/bigram 을 SHA-256 으로 버킷에 해싱한 뒤 L2 정규화합니다.
//! 네트워크 없이 결정적으로 동작하며, 계산은 블로킹 풀로 보냅니다.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use sha2::{Digest, Sha256};

use super::{check_batch, EmbeddingProvider};

/// bigram 가중치 (unigram = 1.0)
const BIGRAM_WEIGHT: f32 = 0.5;

/// 해싱 인코더
#[derive(Debug, Clone)]
pub struct HashingEmbedding {
    inner: Arc<Encoder>,
    name: String,
}

#[derive(Debug)]
struct Encoder {
    dimension: usize,
    token_re: Regex,
}

impl HashingEmbedding {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            anyhow::bail!("Invalid dimension: 0");
        }

        let token_re = Regex::new(r"[\p{L}\p{N}_]+").context("Failed to compile token regex")?;

        Ok(Self {
            inner: Arc::new(Encoder {
                dimension,
                token_re,
            }),
            name: format!("hashing-bow-{}", dimension),
        })
    }
}

impl Encoder {
    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let lowered = text.to_lowercase();
        let tokens: Vec<&str> = self.token_re.find_iter(&lowered).map(|m| m.as_str()).collect();

        let mut vector = vec![0.0f32; self.dimension];

        if tokens.is_empty() {
            // 기호만 있는 텍스트는 통째로 하나의 특징으로
            let raw = lowered.trim();
            if raw.is_empty() {
                anyhow::bail!("Cannot embed empty text");
            }
            self.add_feature(&mut vector, raw, 1.0);
        }

        for token in &tokens {
            self.add_feature(&mut vector, token, 1.0);
        }
        for pair in tokens.windows(2) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            self.add_feature(&mut vector, &bigram, BIGRAM_WEIGHT);
        }

        let mut norm = l2_norm(&vector);
        if norm == 0.0 {
            // 부호 상쇄로 0 이 된 경우
            self.add_feature(&mut vector, lowered.trim(), 1.0);
            norm = l2_norm(&vector);
        }
        if norm == 0.0 {
            anyhow::bail!("Embedding collapsed to a zero vector");
        }

        vector.iter_mut().for_each(|x| *x /= norm);
        Ok(vector)
    }

    fn add_feature(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);

        let bucket = (u64::from_le_bytes(bytes) % self.dimension as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

fn l2_norm(vector: &[f32]) -> f32 {
    vector.iter().map(|x| x * x).sum::<f32>().sqrt()
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedding {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let encoder = Arc::clone(&self.inner);
        let texts = texts.to_vec();
        let expected = texts.len();

        let vectors = tokio::task::spawn_blocking(move || {
            texts
                .iter()
                .map(|text| encoder.encode(text))
                .collect::<Result<Vec<_>>>()
        })
        .await
        .context("Embedding worker panicked")??;

        check_batch(&vectors, expected, self.inner.dimension)?;
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.inner.dimension
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 정규화된 벡터끼리의 코사인 유사도
    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn test_deterministic_and_normalized() {
        let embedder = HashingEmbedding::new(128).unwrap();
        let a = embedder.embed("Create a beam with HEA300 profile").await.unwrap();
        let b = embedder.embed("Create a beam with HEA300 profile").await.unwrap();

        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_related_text_is_closer() {
        let embedder = HashingEmbedding::new(256).unwrap();
        let vectors = embedder
            .embed_batch(&[
                "column start point and end point".to_string(),
                "column end point".to_string(),
                "drawing catalog bolts".to_string(),
            ])
            .await
            .unwrap();

        let near = dot(&vectors[0], &vectors[1]);
        let far = dot(&vectors[0], &vectors[2]);
        assert!(near > far);
    }

    #[tokio::test]
    async fn test_symbols_only_and_empty() {
        let embedder = HashingEmbedding::new(32).unwrap();
        assert!(embedder.embed("!!!").await.is_ok());
        assert!(embedder.embed("   ").await.is_err());
    }

    #[test]
    fn test_zero_dimension_rejected() {
        assert!(HashingEmbedding::new(0).is_err());
    }

    #[test]
    fn test_name() {
        let embedder = HashingEmbedding::new(384).unwrap();
        assert_eq!(embedder.name(), "hashing-bow-384");
    }
}
