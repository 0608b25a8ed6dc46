//! Knowledge Extractor - 지식 소스 → Document
//!
//! 1. API 스키마 (`api_docs.json`) → namespace/class 문서
//! 2. 지식 디렉토리의 텍스트/마크다운 파일 → 청크 문서
//!
//! 파일 단위로 best-effort: 한 파일의 실패는 경고 후 건너뜁니다.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use super::chunker::{recursive_chunker, Chunker};
use super::document::{Document, DocumentKind, DocumentType};
use super::schema::{ApiSchema, SCHEMA_FILE_NAME};
use crate::config::RagConfig;
use crate::error::{KnowledgeError, Result};

// ============================================================================
// Source File Kind
// ============================================================================

/// 파일 확장자 → 문서 종류
fn kind_for_path(path: &Path) -> Option<DocumentKind> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "txt" => Some(DocumentKind::Text),
        "md" | "markdown" => Some(DocumentKind::Markdown),
        _ => None,
    }
}

// ============================================================================
// Extraction Report
// ============================================================================

/// 추출 결과
#[derive(Debug, Default)]
pub struct ExtractionReport {
    /// 추출 순서대로의 문서 (스키마 → 파일 경로순)
    pub documents: Vec<Document>,
    /// 문서를 낸 소스 파일 수 (스키마 포함)
    pub files_processed: usize,
    /// 건너뛴 파일과 사유
    pub skipped: Vec<KnowledgeError>,
}

impl ExtractionReport {
    pub fn count_by_type(&self, doc_type: DocumentType) -> usize {
        self.documents
            .iter()
            .filter(|d| d.doc_type() == doc_type)
            .count()
    }
}

// ============================================================================
// KnowledgeExtractor
// ============================================================================

/// 지식 추출기
pub struct KnowledgeExtractor {
    knowledge_dir: PathBuf,
    chunker: Box<dyn Chunker>,
}

impl KnowledgeExtractor {
    pub fn new(knowledge_dir: impl Into<PathBuf>, chunker: Box<dyn Chunker>) -> Self {
        Self {
            knowledge_dir: knowledge_dir.into(),
            chunker,
        }
    }

    pub fn from_config(config: &RagConfig) -> Self {
        Self::new(&config.knowledge_dir, recursive_chunker(config.chunk.clone()))
    }

    pub fn knowledge_dir(&self) -> &Path {
        &self.knowledge_dir
    }

    pub fn schema_path(&self) -> PathBuf {
        self.knowledge_dir.join(SCHEMA_FILE_NAME)
    }

    /// 지식 디렉토리와 기본 스키마 파일 준비
    ///
    /// 스키마 파일이 이미 있으면 건드리지 않습니다.
    pub fn ensure_knowledge_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.knowledge_dir)?;

        let schema_path = self.schema_path();
        if !schema_path.exists() {
            std::fs::write(&schema_path, ApiSchema::builtin()?.to_json_pretty()?)?;
            tracing::info!("Seeded default API schema at {}", schema_path.display());
        }
        Ok(())
    }

    /// 전체 추출 (문서만)
    pub fn extract(&self) -> Result<Vec<Document>> {
        Ok(self.extract_report()?.documents)
    }

    /// 전체 추출 + 파일별 결과
    pub fn extract_report(&self) -> Result<ExtractionReport> {
        self.ensure_knowledge_dir()?;

        let mut report = ExtractionReport::default();
        let mut seen_ids = HashSet::new();

        // 1. API 스키마
        let schema_path = self.schema_path();
        match self.extract_schema(&schema_path) {
            Ok(docs) => report.accept(docs, &mut seen_ids, &schema_path),
            Err(e) => report.skip(e),
        }

        // 2. 텍스트/마크다운 파일
        for (path, kind) in self.discover_files() {
            match self.extract_file(&path, kind) {
                Ok(docs) => report.accept(docs, &mut seen_ids, &path),
                Err(e) => report.skip(e),
            }
        }

        tracing::info!(
            "Extracted {} documents from {} sources ({} skipped)",
            report.documents.len(),
            report.files_processed,
            report.skipped.len()
        );
        Ok(report)
    }

    /// 스키마 파일 → namespace/class 문서
    pub fn extract_schema(&self, path: &Path) -> Result<Vec<Document>> {
        let json = std::fs::read_to_string(path).map_err(|e| extraction(path, e))?;
        let schema = ApiSchema::from_json(&json).map_err(|e| extraction(path, e))?;
        let docs = schema.to_documents()?;

        tracing::debug!(
            "Schema {}: {} namespaces, {} documents",
            path.display(),
            schema.namespaces.len(),
            docs.len()
        );
        Ok(docs)
    }

    /// 파일 하나 → 청크 문서
    ///
    /// id 는 `{prefix}_{file_stem}_{index}` (text: `file`, markdown: `md`).
    pub fn extract_file(&self, path: &Path, kind: DocumentKind) -> Result<Vec<Document>> {
        let content = std::fs::read_to_string(path).map_err(|e| extraction(path, e))?;

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| extraction(path, "file name is not valid UTF-8"))?;
        let title = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or(stem)
            .to_string();
        let source = path.to_string_lossy().to_string();
        let prefix = kind.doc_type().id_prefix();

        let documents = self
            .chunker
            .chunk(&content)
            .into_iter()
            .filter(|chunk| !chunk.trim().is_empty())
            .enumerate()
            .map(|(i, chunk)| {
                Document::new(
                    format!("{}_{}_{}", prefix, stem, i),
                    kind.clone(),
                    title.clone(),
                    chunk,
                    source.clone(),
                )
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!("{}: {} chunks", path.display(), documents.len());
        Ok(documents)
    }

    /// 재귀 탐색, 경로순 정렬
    fn discover_files(&self) -> Vec<(PathBuf, DocumentKind)> {
        let walker = WalkBuilder::new(&self.knowledge_dir)
            .hidden(true)
            .git_ignore(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("Failed to read entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
                continue;
            }

            if let Some(kind) = kind_for_path(entry.path()) {
                files.push((entry.path().to_path_buf(), kind));
            }
        }
        files
    }
}

impl ExtractionReport {
    /// 파일 하나의 문서를 받아들임 (id 충돌 시 파일 전체를 건너뜀)
    fn accept(&mut self, docs: Vec<Document>, seen_ids: &mut HashSet<String>, path: &Path) {
        if let Some(dup) = docs.iter().find(|d| seen_ids.contains(&d.id)) {
            self.skip(extraction(path, format!("document id '{}' already extracted", dup.id)));
            return;
        }

        seen_ids.extend(docs.iter().map(|d| d.id.clone()));
        self.files_processed += 1;
        self.documents.extend(docs);
    }

    fn skip(&mut self, err: KnowledgeError) {
        tracing::warn!("Skipping source: {}", err);
        self.skipped.push(err);
    }
}

fn extraction(path: &Path, reason: impl std::fmt::Display) -> KnowledgeError {
    KnowledgeError::Extraction {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
