//! Knowledge Service - 지식베이스 서비스 컨텍스트
//!
//! 인코더, 벡터 인덱스, 메모리상 문서 집합을 한 객체로 묶어 전달합니다.
//!
//! - 초기화 실패(인코더/인덱스)는 치명적
//! - 조회는 실패해도 빈 결과로 강등
//! - 변경은 성공 여부(bool)만 돌려줌
//! - rebuild 는 쓰기 잠금을 잡고, 그 사이 요청은 기다리지 않고 not-ready 처리

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{RwLock, RwLockReadGuard};

use crate::config::RagConfig;
use crate::embedding::create_embedder;
use crate::error::{KnowledgeError, Result};
use crate::knowledge::{
    BuildReport, Document, DocumentType, KnowledgeBase, KnowledgeExtractor, LanceVectorIndex,
    Metadata, Query, SearchHit,
};

// ============================================================================
// Stats
// ============================================================================

/// 서비스 상태
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ServiceStats {
    Ready {
        document_count: usize,
        collection_name: String,
        embedding_model: String,
    },
    NotReady,
}

// ============================================================================
// KnowledgeService
// ============================================================================

/// 지식베이스 서비스
pub struct KnowledgeService {
    config: RagConfig,
    state: RwLock<Option<KnowledgeBase>>,
}

impl KnowledgeService {
    /// 초기화 전 상태로 생성
    pub fn new(config: RagConfig) -> Self {
        Self {
            config,
            state: RwLock::new(None),
        }
    }

    /// 생성 + 초기화
    pub async fn open(config: RagConfig) -> Result<Self> {
        let service = Self::new(config);
        service.initialize().await?;
        Ok(service)
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// 인코더 로드 → 인덱스 열기 → 지식 추출 → (비어 있으면) 인덱싱
    pub async fn initialize(&self) -> Result<()> {
        self.config.validate()?;

        let encoder = create_embedder(&self.config).map_err(KnowledgeError::encoding)?;
        let index = LanceVectorIndex::open(
            &self.config.index_path,
            &self.config.collection_name,
            encoder.dimension(),
        )
        .await?;

        let documents = self.extract_documents().await?;
        let kb = KnowledgeBase::new(documents, Box::new(index), encoder, self.config.batch_size);
        kb.ensure_indexed().await?;

        tracing::info!(
            "Knowledge service ready ({} documents, collection '{}')",
            kb.document_count(),
            self.config.collection_name
        );
        *self.state.write().await = Some(kb);
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.state
            .try_read()
            .map(|state| state.is_some())
            .unwrap_or(false)
    }

    /// 인코더와 인덱스 핸들 해제
    pub async fn shutdown(&self) {
        if self.state.write().await.take().is_some() {
            tracing::info!("Knowledge service shut down");
        }
    }

    // ========================================================================
    // Query
    // ========================================================================

    /// 설정 기본값(top_k, threshold)을 채운 쿼리
    pub fn make_query(&self, text: impl Into<String>) -> Query {
        Query::new(text)
            .top_k(self.config.default_top_k)
            .threshold(self.config.default_threshold)
    }

    /// 유사도 검색 (실패 시 빈 결과)
    pub async fn query(&self, query: &Query) -> Vec<SearchHit> {
        match self.try_query(query).await {
            Ok(hits) => hits,
            Err(e) if e.is_not_ready() => {
                tracing::debug!("Query skipped: {}", e);
                Vec::new()
            }
            Err(e) => {
                tracing::warn!("Query failed, returning no results: {}", e);
                Vec::new()
            }
        }
    }

    /// 문서 종류 제한 검색
    pub async fn query_by_type(
        &self,
        text: &str,
        doc_type: DocumentType,
        top_k: Option<usize>,
        threshold: Option<f32>,
    ) -> Vec<SearchHit> {
        let query = Query::by_type(text, doc_type)
            .top_k(top_k.unwrap_or(self.config.default_top_k))
            .threshold(threshold.unwrap_or(self.config.default_threshold));
        self.query(&query).await
    }

    /// API 레퍼런스 검색 (더 엄격한 기본 임계값)
    pub async fn query_api(
        &self,
        text: &str,
        namespace: Option<&str>,
        top_k: Option<usize>,
        threshold: Option<f32>,
    ) -> Vec<SearchHit> {
        let query = Query::api(text, namespace)
            .top_k(top_k.unwrap_or(self.config.api_top_k))
            .threshold(threshold.unwrap_or(self.config.api_threshold));
        self.query(&query).await
    }

    /// 에러를 그대로 돌려주는 검색 (타임아웃 적용)
    pub async fn try_query(&self, query: &Query) -> Result<Vec<SearchHit>> {
        let state = self.ready_state()?;
        let kb = state.as_ref().ok_or(KnowledgeError::NotReady)?;

        let timeout = self.config.query_timeout;
        tokio::time::timeout(timeout, kb.retriever().query(query))
            .await
            .map_err(|_| KnowledgeError::Timeout(timeout))?
    }

    /// 메모리상 문서 키워드 검색
    pub fn search_documents(&self, text: &str, doc_type: Option<DocumentType>) -> Vec<Document> {
        match self.ready_state() {
            Ok(state) => state
                .as_ref()
                .map(|kb| kb.search_documents(text, doc_type))
                .unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// 문서 추가
    pub async fn add_document(&self, id: &str, content: &str, metadata: &Metadata) -> bool {
        log_outcome("add", id, self.try_add_document(id, content, metadata).await)
    }

    /// 문서 교체
    pub async fn update_document(&self, id: &str, content: &str, metadata: &Metadata) -> bool {
        log_outcome("update", id, self.try_update_document(id, content, metadata).await)
    }

    /// 문서 삭제 (없는 id 도 성공)
    pub async fn delete_document(&self, id: &str) -> bool {
        log_outcome("delete", id, self.try_delete_document(id).await.map(|_| ()))
    }

    pub async fn try_add_document(&self, id: &str, content: &str, metadata: &Metadata) -> Result<()> {
        let document = Document::from_parts(id, content, metadata)?;
        let state = self.ready_state()?;
        let kb = state.as_ref().ok_or(KnowledgeError::NotReady)?;
        kb.add_document(document).await
    }

    pub async fn try_update_document(
        &self,
        id: &str,
        content: &str,
        metadata: &Metadata,
    ) -> Result<()> {
        let document = Document::from_parts(id, content, metadata)?;
        let state = self.ready_state()?;
        let kb = state.as_ref().ok_or(KnowledgeError::NotReady)?;
        kb.update_document(document).await
    }

    /// 삭제. 실제로 지운 항목이 있으면 `true`
    pub async fn try_delete_document(&self, id: &str) -> Result<bool> {
        let state = self.ready_state()?;
        let kb = state.as_ref().ok_or(KnowledgeError::NotReady)?;
        kb.delete_document(id).await
    }

    // ========================================================================
    // Rebuild / Stats
    // ========================================================================

    /// 컬렉션 전체 재구축
    ///
    /// `reload_sources` 가 true 면 지식 디렉토리를 다시 추출해 문서 집합을 교체합니다.
    /// 진행 중에는 쓰기 잠금을 잡으므로 다른 요청은 not-ready 로 처리됩니다.
    pub async fn rebuild(&self, reload_sources: bool) -> Result<BuildReport> {
        let documents = if reload_sources {
            Some(self.extract_documents().await?)
        } else {
            None
        };

        let mut state = self.state.write().await;
        let kb = state.as_mut().ok_or(KnowledgeError::NotReady)?;
        if let Some(documents) = documents {
            kb.replace_documents(documents);
        }
        kb.rebuild().await
    }

    /// 컬렉션 통계
    pub async fn stats(&self) -> ServiceStats {
        let Ok(state) = self.ready_state() else {
            return ServiceStats::NotReady;
        };
        let Some(kb) = state.as_ref() else {
            return ServiceStats::NotReady;
        };

        match kb.index_count().await {
            Ok(document_count) => ServiceStats::Ready {
                document_count,
                collection_name: kb.index().collection_name().to_string(),
                embedding_model: kb.encoder().name().to_string(),
            },
            Err(e) => {
                tracing::warn!("Failed to read collection stats: {}", e);
                ServiceStats::NotReady
            }
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// 읽기 잠금 (rebuild 중이면 기다리지 않고 NotReady)
    fn ready_state(&self) -> Result<RwLockReadGuard<'_, Option<KnowledgeBase>>> {
        self.state.try_read().map_err(|_| KnowledgeError::NotReady)
    }

    /// 파일 읽기는 블로킹 풀에서
    async fn extract_documents(&self) -> Result<Vec<Document>> {
        let extractor = Arc::new(KnowledgeExtractor::from_config(&self.config));
        let worker = Arc::clone(&extractor);

        tokio::task::spawn_blocking(move || worker.extract())
            .await
            .map_err(|e| KnowledgeError::Extraction {
                path: extractor.knowledge_dir().to_path_buf(),
                reason: format!("extraction worker failed: {}", e),
            })?
    }
}

fn log_outcome(action: &str, id: &str, result: Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Failed to {} document '{}': {}", action, id, e);
            false
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
