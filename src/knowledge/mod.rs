//! Knowledge 모듈 - API 레퍼런스 지식베이스
//!
//! - Document: namespace / class / text / markdown 닫힌 variant
//! - Chunker: 우선순위 구분자 기반 재귀 분할
//! - Extractor: API 스키마 + 텍스트/마크다운 파일 → Document
//! - LanceDB: 코사인 거리 벡터 인덱스
//! - Manager: 배치 인덱싱, rebuild, 단건 변경
//! - Retrieval: 임계값/필터 적용 유사도 검색

mod chunker;
mod document;
mod extractor;
mod lance;
mod manager;
mod retrieval;
mod schema;
mod vector;

// Re-exports
pub use chunker::{
    recursive_chunker, ChunkConfig, Chunker, RecursiveChunker,
    DEFAULT_SEPARATORS,
};
pub use document::{
    Document, DocumentKind, DocumentType, Metadata, MetadataValue, API_DOCS_SOURCE,
};
pub use extractor::{ExtractionReport, KnowledgeExtractor};
pub use lance::LanceVectorIndex;
pub use manager::{BuildReport, KnowledgeBase, DEFAULT_BATCH_SIZE};
pub use retrieval::{Query, Retriever, SearchHit, DEFAULT_THRESHOLD, DEFAULT_TOP_K};
pub use schema::{ApiSchema, ClassSpec, NamespaceSpec, OrderedMap, SCHEMA_FILE_NAME};
pub use vector::{
    score_from_distance, Candidate, FilterCondition, IndexEntry,
    MetadataFilter, VectorIndex,
};
