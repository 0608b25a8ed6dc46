//! Knowledge Base Manager
//!
//! 메모리상 문서 집합과 벡터 인덱스를 함께 소유합니다.
//! 모든 변경은 이 타입을 거치므로 두 저장소가 같은 내용을 유지합니다.

use std::collections::HashSet;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::document::{Document, DocumentType};
use super::retrieval::Retriever;
use super::vector::{IndexEntry, VectorIndex};
use crate::embedding::EmbeddingProvider;
use crate::error::{KnowledgeError, Result};

/// 기본 인덱싱 배치 크기
pub const DEFAULT_BATCH_SIZE: usize = 100;

// ============================================================================
// Build Report
// ============================================================================

/// 인덱싱 결과
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub indexed: usize,
    pub batches: usize,
    pub elapsed: Duration,
    pub finished_at: DateTime<Utc>,
}

impl BuildReport {
    fn empty() -> Self {
        Self {
            indexed: 0,
            batches: 0,
            elapsed: Duration::ZERO,
            finished_at: Utc::now(),
        }
    }
}

// ============================================================================
// KnowledgeBase
// ============================================================================

/// 지식베이스
///
/// 단건 변경은 `mutation` 잠금 아래에서 확인 → 임베딩 → 인덱스 반영 → 메모리 반영
/// 순서로 끝까지 진행되므로, 같은 id 에 대한 동시 요청이 서로 끼어들지 않습니다.
pub struct KnowledgeBase {
    documents: RwLock<Vec<Document>>,
    mutation: Mutex<()>,
    index: Box<dyn VectorIndex>,
    encoder: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
}

impl KnowledgeBase {
    pub fn new(
        documents: Vec<Document>,
        index: Box<dyn VectorIndex>,
        encoder: Arc<dyn EmbeddingProvider>,
        batch_size: usize,
    ) -> Self {
        Self {
            documents: RwLock::new(documents),
            mutation: Mutex::new(()),
            index,
            encoder,
            batch_size: batch_size.max(1),
        }
    }

    pub fn index(&self) -> &dyn VectorIndex {
        self.index.as_ref()
    }

    pub fn encoder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.encoder
    }

    /// 검색기
    pub fn retriever(&self) -> Retriever<'_> {
        Retriever::new(self.index.as_ref(), self.encoder.as_ref())
    }

    /// 메모리상 문서 스냅샷
    pub fn documents(&self) -> Vec<Document> {
        self.read_docs().clone()
    }

    pub fn document_count(&self) -> usize {
        self.read_docs().len()
    }

    pub fn get_document(&self, id: &str) -> Option<Document> {
        self.read_docs().iter().find(|d| d.id == id).cloned()
    }

    /// 메모리상 문서 집합 교체 (다음 rebuild 에 반영)
    pub fn replace_documents(&self, documents: Vec<Document>) {
        *self.write_docs() = documents;
    }

    pub async fn index_count(&self) -> Result<usize> {
        self.index.count().await
    }

    // ========================================================================
    // Build
    // ========================================================================

    /// 메모리상 문서 전체를 배치 단위로 인덱싱
    ///
    /// 배치는 순차 처리하며, 한 배치라도 실패하면 중단합니다.
    /// 빈 컬렉션을 전제로 합니다 (이미 있는 id 는 `DuplicateId`).
    pub async fn build(&self) -> Result<BuildReport> {
        let documents = self.documents();
        check_unique_ids(&documents)?;
        if documents.is_empty() {
            tracing::warn!("No documents to index");
            return Ok(BuildReport::empty());
        }

        let start = Instant::now();
        let total_batches = documents.len().div_ceil(self.batch_size);
        let mut indexed = 0;

        tracing::info!(
            "Indexing {} documents into '{}' ({} batches)",
            documents.len(),
            self.index.collection_name(),
            total_batches
        );

        for (i, batch) in documents.chunks(self.batch_size).enumerate() {
            let entries = self.embed_documents(batch).await?;
            indexed += self.index.insert_batch(&entries).await?;

            tracing::info!(
                "Batch {}/{} indexed ({}/{} documents)",
                i + 1,
                total_batches,
                indexed,
                documents.len()
            );
        }

        let report = BuildReport {
            indexed,
            batches: total_batches,
            elapsed: start.elapsed(),
            finished_at: Utc::now(),
        };
        tracing::info!(
            "Index build complete: {} documents in {:.2}s",
            report.indexed,
            report.elapsed.as_secs_f64()
        );
        Ok(report)
    }

    /// 컬렉션이 비어 있을 때만 인덱싱 (기존 컬렉션은 그대로 재사용)
    pub async fn ensure_indexed(&self) -> Result<Option<BuildReport>> {
        let count = self.index.count().await?;
        if count > 0 {
            tracing::info!(
                "Reusing collection '{}' ({} entries)",
                self.index.collection_name(),
                count
            );
            return Ok(None);
        }
        self.build().await.map(Some)
    }

    /// 컬렉션 삭제 → 재생성 → 전체 인덱싱
    ///
    /// 문서 집합에 중복 id 가 있으면 컬렉션을 건드리기 전에 `DuplicateId`.
    pub async fn rebuild(&mut self) -> Result<BuildReport> {
        check_unique_ids(&self.read_docs())?;

        tracing::info!("Rebuilding collection '{}'", self.index.collection_name());
        self.index.reset().await?;
        self.build().await
    }

    // ========================================================================
    // Single-document mutation
    // ========================================================================

    /// 문서 추가. id 가 이미 있으면 `DuplicateId`
    pub async fn add_document(&self, document: Document) -> Result<()> {
        let _guard = self.mutation.lock().await;
        if self.read_docs().iter().any(|d| d.id == document.id) {
            return Err(KnowledgeError::DuplicateId(document.id));
        }

        let entries = self.embed_documents(std::slice::from_ref(&document)).await?;
        self.index.insert_batch(&entries).await?;

        tracing::info!("Added document '{}'", document.id);
        self.write_docs().push(document);
        Ok(())
    }

    /// 문서 교체 (재임베딩). 인덱스에 없으면 `NotFound`
    pub async fn update_document(&self, document: Document) -> Result<()> {
        let _guard = self.mutation.lock().await;
        let entries = self.embed_documents(std::slice::from_ref(&document)).await?;
        let entry = entries
            .first()
            .ok_or_else(|| KnowledgeError::Encoding("encoder returned no vector".to_string()))?;
        self.index.update(entry).await?;

        tracing::info!("Updated document '{}'", document.id);
        let mut docs = self.write_docs();
        match docs.iter_mut().find(|d| d.id == document.id) {
            Some(existing) => *existing = document,
            // 이전 실행에서 추가된 문서
            None => docs.push(document),
        }
        Ok(())
    }

    /// 문서 삭제. 없는 id 는 no-op (`false`)
    pub async fn delete_document(&self, id: &str) -> Result<bool> {
        let _guard = self.mutation.lock().await;
        let removed_from_index = self.index.delete(id).await?;

        let mut docs = self.write_docs();
        let before = docs.len();
        docs.retain(|d| d.id != id);
        let removed = removed_from_index || docs.len() != before;

        if removed {
            tracing::info!("Deleted document '{}'", id);
        }
        Ok(removed)
    }

    // ========================================================================
    // Keyword search
    // ========================================================================

    /// 메모리상 문서에서 대소문자 무시 부분 문자열 검색 (제목/본문)
    pub fn search_documents(&self, text: &str, doc_type: Option<DocumentType>) -> Vec<Document> {
        let needle = text.to_lowercase();
        if needle.trim().is_empty() {
            return Vec::new();
        }

        self.read_docs()
            .iter()
            .filter(|d| doc_type.map(|t| d.doc_type() == t).unwrap_or(true))
            .filter(|d| {
                d.title.to_lowercase().contains(&needle)
                    || d.content.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect()
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn embed_documents(&self, documents: &[Document]) -> Result<Vec<IndexEntry>> {
        let texts: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
        let embeddings = self
            .encoder
            .embed_batch(&texts)
            .await
            .map_err(KnowledgeError::encoding)?;

        if embeddings.len() != documents.len() {
            return Err(KnowledgeError::Encoding(format!(
                "encoder returned {} vectors for {} documents",
                embeddings.len(),
                documents.len()
            )));
        }

        Ok(documents
            .iter()
            .zip(embeddings)
            .map(|(doc, embedding)| IndexEntry {
                id: doc.id.clone(),
                content: doc.content.clone(),
                metadata: doc.index_metadata(),
                embedding,
            })
            .collect())
    }

    fn read_docs(&self) -> RwLockReadGuard<'_, Vec<Document>> {
        self.documents.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_docs(&self) -> RwLockWriteGuard<'_, Vec<Document>> {
        self.documents.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// 문서 집합 안의 id 중복 검사
fn check_unique_ids(documents: &[Document]) -> Result<()> {
    let mut seen = HashSet::with_capacity(documents.len());
    match documents.iter().find(|d| !seen.insert(d.id.as_str())) {
        Some(dup) => Err(KnowledgeError::DuplicateId(dup.id.clone())),
        None => Ok(()),
    }
}

// ============================================================================
// Tests
// ============================================================================
