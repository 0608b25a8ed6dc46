//! Retrieval Query Engine
//!
//! 쿼리 임베딩 → 벡터 인덱스 검색 → 거리 → 점수 변환 → 임계값 필터 → 정렬

use serde::Serialize;

use super::document::{DocumentType, Metadata, MetadataValue};
use super::vector::{score_from_distance, Candidate, MetadataFilter, VectorIndex};
use crate::embedding::EmbeddingProvider;
use crate::error::{KnowledgeError, Result};

/// 일반 쿼리 기본값
pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_THRESHOLD: f32 = 0.7;

// ============================================================================
// Query / SearchHit
// ============================================================================

/// 검색 쿼리
#[derive(Debug, Clone)]
pub struct Query {
    pub text: String,
    pub top_k: usize,
    /// 최소 점수 (0.0 ~ 1.0)
    pub threshold: f32,
    pub filter: Option<MetadataFilter>,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            top_k: DEFAULT_TOP_K,
            threshold: DEFAULT_THRESHOLD,
            filter: None,
        }
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn filter(mut self, filter: MetadataFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// 문서 종류 하나로 제한
    pub fn by_type(text: impl Into<String>, doc_type: DocumentType) -> Self {
        Self::new(text).filter(MetadataFilter::doc_type(doc_type))
    }

    /// API 레퍼런스(namespace/class)로 제한, 선택적으로 namespace 일치
    pub fn api(text: impl Into<String>, namespace: Option<&str>) -> Self {
        let mut filter = MetadataFilter::new().is_in(
            "type",
            [DocumentType::Namespace.as_str(), DocumentType::Class.as_str()],
        );
        if let Some(ns) = namespace {
            filter = filter.eq("namespace", ns);
        }
        Self::new(text).filter(filter)
    }
}

/// 검색 결과 한 건
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub content: String,
    /// 유사도 (0.0 ~ 1.0, 높을수록 유사)
    pub score: f32,
    pub source: String,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub title: String,
    pub metadata: Metadata,
}

impl SearchHit {
    fn from_candidate(candidate: Candidate) -> Self {
        let text = |key: &str| {
            candidate
                .metadata
                .get(key)
                .and_then(MetadataValue::as_str)
                .map(str::to_string)
        };

        let doc_type = text("type")
            .and_then(|t| t.parse().ok())
            .unwrap_or(DocumentType::Text);
        let title = text("title").unwrap_or_else(|| candidate.id.clone());
        let source = text("source").unwrap_or_default();

        Self {
            score: score_from_distance(candidate.distance),
            id: candidate.id,
            content: candidate.content,
            source,
            doc_type,
            title,
            metadata: candidate.metadata,
        }
    }
}

// ============================================================================
// Retriever
// ============================================================================

/// 인덱스 + 인코더를 빌려 쓰는 검색기
pub struct Retriever<'a> {
    index: &'a dyn VectorIndex,
    encoder: &'a dyn EmbeddingProvider,
}

impl<'a> Retriever<'a> {
    pub fn new(index: &'a dyn VectorIndex, encoder: &'a dyn EmbeddingProvider) -> Self {
        Self { index, encoder }
    }

    /// 유사도 검색
    ///
    /// 결과는 모두 `score >= threshold` 이고 점수 내림차순 (동점은 인덱스 순서 유지).
    pub async fn query(&self, query: &Query) -> Result<Vec<SearchHit>> {
        if query.top_k == 0 || query.text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let embedding = self
            .encoder
            .embed(&query.text)
            .await
            .map_err(KnowledgeError::encoding)?;

        let candidates = self
            .index
            .query(&embedding, query.top_k, query.filter.as_ref())
            .await?;
        let fetched = candidates.len();

        let mut hits: Vec<SearchHit> = candidates
            .into_iter()
            .map(SearchHit::from_candidate)
            .filter(|hit| hit.score >= query.threshold)
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));

        tracing::debug!(
            "Query '{}': {} candidates, {} above threshold {}",
            truncate(&query.text, 40),
            fetched,
            hits.len(),
            query.threshold
        );
        Ok(hits)
    }

    /// 문서 종류 하나로 제한한 검색
    pub async fn query_by_type(
        &self,
        text: &str,
        doc_type: DocumentType,
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<SearchHit>> {
        let query = Query::by_type(text, doc_type)
            .top_k(top_k)
            .threshold(threshold);
        self.query(&query).await
    }

    /// API 레퍼런스 검색
    pub async fn query_api(
        &self,
        text: &str,
        namespace: Option<&str>,
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<SearchHit>> {
        let query = Query::api(text, namespace).top_k(top_k).threshold(threshold);
        self.query(&query).await
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::IndexEntry;
    use async_trait::async_trait;

    /// 고정 후보를 돌려주는 인덱스
    struct FixedIndex {
        candidates: Vec<Candidate>,
    }

    #[async_trait]
    impl VectorIndex for FixedIndex {
        fn collection_name(&self) -> &str {
            "fixed"
        }
        async fn insert_batch(&self, entries: &[IndexEntry]) -> Result<usize> {
            Ok(entries.len())
        }
        async fn update(&self, _entry: &IndexEntry) -> Result<()> {
            Ok(())
        }
        async fn delete(&self, _id: &str) -> Result<bool> {
            Ok(false)
        }
        async fn query(
            &self,
            _embedding: &[f32],
            top_k: usize,
            filter: Option<&MetadataFilter>,
        ) -> Result<Vec<Candidate>> {
            Ok(self
                .candidates
                .iter()
                .filter(|c| filter.map(|f| f.matches(&c.metadata)).unwrap_or(true))
                .take(top_k)
                .cloned()
                .collect())
        }
        async fn count(&self) -> Result<usize> {
            Ok(self.candidates.len())
        }
        async fn contains(&self, id: &str) -> Result<bool> {
            Ok(self.candidates.iter().any(|c| c.id == id))
        }
        async fn reset(&mut self) -> Result<()> {
            self.candidates.clear();
            Ok(())
        }
    }

    struct ConstEncoder;

    #[async_trait]
    impl EmbeddingProvider for ConstEncoder {
        async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
        fn dimension(&self) -> usize {
            2
        }
        fn name(&self) -> &str {
            "const"
        }
    }

    fn candidate(id: &str, doc_type: &str, distance: f32) -> Candidate {
        let mut metadata = Metadata::new();
        metadata.insert("type".to_string(), doc_type.into());
        metadata.insert("title".to_string(), format!("Title {}", id).into());
        metadata.insert("source".to_string(), "api_docs".into());
        Candidate {
            id: id.to_string(),
            content: format!("content {}", id),
            metadata,
            distance,
        }
    }

    fn fixed() -> FixedIndex {
        FixedIndex {
            candidates: vec![
                candidate("ns", "namespace", 0.05),
                candidate("a", "class", 0.2),
                candidate("b", "class", 0.2),
                candidate("c", "text", 0.5),
            ],
        }
    }

    #[tokio::test]
    async fn test_threshold_and_order() {
        let index = fixed();
        let retriever = Retriever::new(&index, &ConstEncoder);

        let hits = retriever
            .query(&Query::new("beam").top_k(10).threshold(0.7))
            .await
            .unwrap();

        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        // 동점 a, b 는 인덱스 순서 유지
        assert_eq!(ids, vec!["ns", "a", "b"]);
        assert!(hits.iter().all(|h| h.score >= 0.7));
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(hits[1].doc_type, DocumentType::Class);
        assert_eq!(hits[1].title, "Title a");
        assert_eq!(hits[1].source, "api_docs");
    }

    #[tokio::test]
    async fn test_top_k_bounds_results() {
        let index = fixed();
        let retriever = Retriever::new(&index, &ConstEncoder);

        let hits = retriever
            .query(&Query::new("beam").top_k(2).threshold(0.0))
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);

        assert!(retriever
            .query(&Query::new("beam").top_k(0))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_strict_threshold_is_empty() {
        let index = fixed();
        let retriever = Retriever::new(&index, &ConstEncoder);

        let hits = retriever
            .query(&Query::new("beam").top_k(10).threshold(0.99))
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_typed_wrappers() {
        let index = fixed();
        let retriever = Retriever::new(&index, &ConstEncoder);

        let classes = retriever
            .query_by_type("beam", DocumentType::Class, 5, 0.0)
            .await
            .unwrap();
        assert_eq!(classes.len(), 2);
        assert!(classes.iter().all(|h| h.doc_type == DocumentType::Class));

        let api = retriever.query_api("beam", None, 3, 0.0).await.unwrap();
        assert_eq!(api.len(), 3);
        assert!(api.iter().all(|h| h.doc_type != DocumentType::Text));
    }

    #[test]
    fn test_hit_serializes_type_key() {
        let hit = SearchHit::from_candidate(candidate("a", "class", 0.1));
        let json = serde_json::to_value(&hit).unwrap();
        assert_eq!(json["type"], "class");
        assert!((hit.score - 0.9).abs() < 1e-6);
    }
}
