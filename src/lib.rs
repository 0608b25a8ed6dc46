//! apidoc-rag - API 레퍼런스 지식베이스
//!
//! API 스키마와 텍스트/마크다운 문서를 청킹·임베딩해 LanceDB 컬렉션에
//! 저장하고, 임계값과 메타데이터 필터를 적용한 유사도 검색을 제공합니다.

pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod knowledge;
pub mod service;

// Re-exports
pub use config::{get_data_dir, EmbeddingBackend, RagConfig};
pub use embedding::{
    create_embedder, get_api_key, has_api_key, EmbeddingProvider, GeminiEmbedding,
    HashingEmbedding,
};
pub use error::{KnowledgeError, Result};
pub use knowledge::{
    ApiSchema, BuildReport, ChunkConfig, Chunker, Document, DocumentKind, DocumentType,
    KnowledgeBase, KnowledgeExtractor, LanceVectorIndex, Metadata, MetadataFilter, MetadataValue,
    Query, RecursiveChunker, Retriever, SearchHit, VectorIndex,
};
pub use service::{KnowledgeService, ServiceStats};
