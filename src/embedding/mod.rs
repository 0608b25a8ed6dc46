//! 임베딩 모듈 - 텍스트 → 고정 길이 벡터
//!
//! 인코더는 불투명한 능력으로 취급합니다. 같은 설정이면 같은 입력에 같은
//! 벡터를 돌려줘야 하며, CPU 를 쓰는 인코더는 tokio 블로킹 풀에서 돌립니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = create_embedder(&RagConfig::default())?;
//! let vectors = embedder.embed_batch(&["Beam".to_string()]).await?;
//! ```

mod gemini;
mod hashing;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::{EmbeddingBackend, RagConfig};

pub use gemini::{get_api_key, has_api_key, GeminiEmbedding, DEFAULT_DIMENSION};
pub use hashing::HashingEmbedding;

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 단일 텍스트 임베딩 (기본 구현: 크기 1 배치)
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Encoder returned no vector"))
    }

    /// 배치 임베딩. 입력 순서대로 같은 개수의 벡터를 반환
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 프로바이더(모델) 이름
    fn name(&self) -> &str;
}

/// 배치 결과 개수와 차원 검증
pub(crate) fn check_batch(
    vectors: &[Vec<f32>],
    expected_len: usize,
    dimension: usize,
) -> Result<()> {
    if vectors.len() != expected_len {
        anyhow::bail!(
            "Encoder returned {} vectors for {} inputs",
            vectors.len(),
            expected_len
        );
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
        anyhow::bail!(
            "Encoder returned a {}-d vector, expected {}-d",
            bad.len(),
            dimension
        );
    }
    Ok(())
}

// ============================================================================
// Factory Function
// ============================================================================

/// 설정에 따라 임베딩 프로바이더 생성
pub fn create_embedder(config: &RagConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let backend = match config.embedding {
        EmbeddingBackend::Auto if has_api_key() => EmbeddingBackend::Gemini,
        EmbeddingBackend::Auto => EmbeddingBackend::Hashing,
        other => other,
    };

    let embedder: Arc<dyn EmbeddingProvider> = match backend {
        EmbeddingBackend::Gemini => Arc::new(GeminiEmbedding::from_env_with_dimension(
            config.embedding_dimension,
        )?),
        _ => Arc::new(HashingEmbedding::new(config.embedding_dimension)?),
    };

    tracing::info!(
        "Using {} embedding (dimension: {})",
        embedder.name(),
        embedder.dimension()
    );
    Ok(embedder)
}

// ============================================================================
// Tests
// ============================================================================
