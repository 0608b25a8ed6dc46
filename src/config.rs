//! 설정 모듈
//!
//! 기본값 → 환경변수(`RAG_*`) → CLI 플래그 순서로 덮어씁니다.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{KnowledgeError, Result};
use crate::knowledge::ChunkConfig;

/// 데이터 디렉토리 경로 (~/.apidoc-rag/)
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".apidoc-rag")
}

// ============================================================================
// Embedding Backend
// ============================================================================

/// 임베딩 백엔드 선택
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbeddingBackend {
    /// API 키가 있으면 Gemini, 없으면 로컬 해싱 인코더
    #[default]
    Auto,
    Gemini,
    Hashing,
}

impl FromStr for EmbeddingBackend {
    type Err = KnowledgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "gemini" => Ok(Self::Gemini),
            "hashing" | "local" => Ok(Self::Hashing),
            other => Err(KnowledgeError::InvalidConfig(format!(
                "unknown embedding backend '{}' (expected auto, gemini or hashing)",
                other
            ))),
        }
    }
}

// ============================================================================
// RagConfig
// ============================================================================

/// 지식베이스 서비스 설정
#[derive(Debug, Clone)]
pub struct RagConfig {
    /// 루트 데이터 디렉토리
    pub data_dir: PathBuf,
    /// 텍스트/마크다운 및 API 스키마 파일 위치
    pub knowledge_dir: PathBuf,
    /// LanceDB 디렉토리
    pub index_path: PathBuf,
    pub collection_name: String,
    pub chunk: ChunkConfig,
    /// 인덱싱 배치 크기
    pub batch_size: usize,
    pub default_top_k: usize,
    pub default_threshold: f32,
    /// API 레퍼런스 조회용 (더 엄격한 임계값)
    pub api_top_k: usize,
    pub api_threshold: f32,
    pub query_timeout: Duration,
    pub embedding: EmbeddingBackend,
    pub embedding_dimension: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self::with_data_dir(&get_data_dir())
    }
}

impl RagConfig {
    /// 데이터 디렉토리를 기준으로 하위 경로를 구성
    pub fn with_data_dir(data_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            knowledge_dir: data_dir.join("knowledge"),
            index_path: data_dir.join("vectordb"),
            collection_name: "api_knowledge".to_string(),
            chunk: ChunkConfig::default(),
            batch_size: 100,
            default_top_k: 5,
            default_threshold: 0.7,
            api_top_k: 3,
            api_threshold: 0.8,
            query_timeout: Duration::from_secs(30),
            embedding: EmbeddingBackend::Auto,
            embedding_dimension: 768,
        }
    }

    /// 환경변수를 반영한 설정
    ///
    /// `RAG_DATA_DIR`, `RAG_KNOWLEDGE_DIR`, `RAG_INDEX_PATH`, `RAG_COLLECTION`,
    /// `RAG_CHUNK_SIZE`, `RAG_CHUNK_OVERLAP`, `RAG_BATCH_SIZE`, `RAG_EMBEDDING`,
    /// `RAG_EMBEDDING_DIMENSION`, `RAG_QUERY_TIMEOUT_SECS`
    pub fn from_env() -> Result<Self> {
        let mut config = match env_var("RAG_DATA_DIR") {
            Some(dir) => Self::with_data_dir(Path::new(&dir)),
            None => Self::default(),
        };

        if let Some(dir) = env_var("RAG_KNOWLEDGE_DIR") {
            config.knowledge_dir = PathBuf::from(dir);
        }
        if let Some(path) = env_var("RAG_INDEX_PATH") {
            config.index_path = PathBuf::from(path);
        }
        if let Some(name) = env_var("RAG_COLLECTION") {
            config.collection_name = name;
        }
        if let Some(size) = env_parse("RAG_CHUNK_SIZE")? {
            config.chunk.chunk_size = size;
        }
        if let Some(overlap) = env_parse("RAG_CHUNK_OVERLAP")? {
            config.chunk.chunk_overlap = overlap;
        }
        if let Some(batch) = env_parse("RAG_BATCH_SIZE")? {
            config.batch_size = batch;
        }
        if let Some(backend) = env_var("RAG_EMBEDDING") {
            config.embedding = backend.parse()?;
        }
        if let Some(dim) = env_parse("RAG_EMBEDDING_DIMENSION")? {
            config.embedding_dimension = dim;
        }
        if let Some(secs) = env_parse::<u64>("RAG_QUERY_TIMEOUT_SECS")? {
            config.query_timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// 설정 검증
    pub fn validate(&self) -> Result<()> {
        self.chunk.validate()?;

        if self.batch_size == 0 {
            return Err(KnowledgeError::InvalidConfig(
                "batch_size must be positive".to_string(),
            ));
        }
        if self.default_top_k == 0 || self.api_top_k == 0 {
            return Err(KnowledgeError::InvalidConfig(
                "top_k must be positive".to_string(),
            ));
        }
        for threshold in [self.default_threshold, self.api_threshold] {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(KnowledgeError::InvalidConfig(format!(
                    "threshold {} is outside [0, 1]",
                    threshold
                )));
            }
        }
        if self.collection_name.trim().is_empty() {
            return Err(KnowledgeError::InvalidConfig(
                "collection_name must not be empty".to_string(),
            ));
        }
        if self.embedding_dimension == 0 {
            return Err(KnowledgeError::InvalidConfig(
                "embedding_dimension must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>> {
    match env_var(key) {
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            KnowledgeError::InvalidConfig(format!("{} has an invalid value: '{}'", key, raw))
        }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RagConfig::with_data_dir(Path::new("/tmp/rag"));
        assert_eq!(config.knowledge_dir, PathBuf::from("/tmp/rag/knowledge"));
        assert_eq!(config.index_path, PathBuf::from("/tmp/rag/vectordb"));
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.chunk.chunk_size, 1000);
        assert_eq!(config.chunk.chunk_overlap, 200);
        assert!(config.api_threshold > config.default_threshold);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = RagConfig::with_data_dir(Path::new("/tmp/rag"));
        config.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = RagConfig::with_data_dir(Path::new("/tmp/rag"));
        config.default_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = RagConfig::with_data_dir(Path::new("/tmp/rag"));
        config.chunk.chunk_overlap = config.chunk.chunk_size;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_backend_parse() {
        assert_eq!("gemini".parse::<EmbeddingBackend>().unwrap(), EmbeddingBackend::Gemini);
        assert_eq!(" Hashing ".parse::<EmbeddingBackend>().unwrap(), EmbeddingBackend::Hashing);
        assert_eq!("auto".parse::<EmbeddingBackend>().unwrap(), EmbeddingBackend::Auto);
        assert!("openai".parse::<EmbeddingBackend>().is_err());
    }
}
