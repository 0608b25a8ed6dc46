//! 에러 타입
//!
//! 지식베이스 전 구간에서 사용하는 에러 정의입니다.
//! 초기화 실패는 치명적, 파일 추출 실패는 격리, 쿼리 실패는 빈 결과로 강등됩니다.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// 지식베이스 결과 타입
pub type Result<T> = std::result::Result<T, KnowledgeError>;

/// 지식베이스 에러
#[derive(Debug, Error)]
pub enum KnowledgeError {
    /// 인덱스 또는 인코더가 아직 준비되지 않음 (재구축 진행 중 포함)
    #[error("knowledge service is not ready")]
    NotReady,

    /// 임베딩 인코더 호출 실패
    #[error("embedding failed: {0}")]
    Encoding(String),

    /// LanceDB 읽기/쓰기 실패
    #[error("vector index error: {0}")]
    Index(#[from] lancedb::Error),

    /// Arrow 배치 변환 실패
    #[error("arrow conversion error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),

    /// 단일 소스 파일 추출 실패 (격리 대상)
    #[error("failed to extract {}: {reason}", path.display())]
    Extraction { path: PathBuf, reason: String },

    #[error("duplicate document id: {0}")]
    DuplicateId(String),

    #[error("document not found: {0}")]
    NotFound(String),

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("unsupported metadata filter: {0}")]
    InvalidFilter(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// 컬렉션 벡터 차원이 인코더와 다름 (rebuild 필요)
    #[error("collection '{collection}' stores {stored}-d vectors but encoder produces {expected}-d")]
    DimensionMismatch {
        collection: String,
        stored: usize,
        expected: usize,
    },

    #[error("query timed out after {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl KnowledgeError {
    /// 인코더 에러 래핑 (anyhow 체인을 한 줄로 보존)
    pub fn encoding(err: anyhow::Error) -> Self {
        Self::Encoding(format!("{:#}", err))
    }

    /// 영속 저장소 계열 에러 여부
    pub fn is_index_io(&self) -> bool {
        matches!(
            self,
            Self::Index(_) | Self::Arrow(_) | Self::DimensionMismatch { .. } | Self::Io(_)
        )
    }

    pub fn is_not_ready(&self) -> bool {
        matches!(self, Self::NotReady)
    }
}
