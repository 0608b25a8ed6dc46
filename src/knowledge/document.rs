//! Document 모델
//!
//! 지식베이스의 원자 단위 레코드입니다. 문서 종류별로 허용되는 필드만
//! 가지도록 `DocumentKind` 로 닫힌 variant 를 구성합니다.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{KnowledgeError, Result};

/// 스키마 문서의 source 메타데이터 값
pub const API_DOCS_SOURCE: &str = "api_docs";

// ============================================================================
// Metadata
// ============================================================================

/// 평면 메타데이터 값 (스칼라만 허용)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// 평면 key → 스칼라 메타데이터
pub type Metadata = BTreeMap<String, MetadataValue>;

// ============================================================================
// Document Type / Kind
// ============================================================================

/// 문서 종류 태그 (필터링용)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Namespace,
    Class,
    Text,
    Markdown,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Namespace => "namespace",
            Self::Class => "class",
            Self::Text => "text",
            Self::Markdown => "markdown",
        }
    }

    /// 파일 청크 id 접두사
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Self::Namespace => "namespace",
            Self::Class => "class",
            Self::Text => "file",
            Self::Markdown => "md",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = KnowledgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "namespace" => Ok(Self::Namespace),
            "class" => Ok(Self::Class),
            "text" => Ok(Self::Text),
            "markdown" => Ok(Self::Markdown),
            other => Err(KnowledgeError::InvalidDocument(format!(
                "unknown document type '{}'",
                other
            ))),
        }
    }
}

/// 문서 종류별 필드
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentKind {
    Namespace { namespace: String },
    Class { namespace: String, class_name: String },
    Text,
    Markdown,
}

impl DocumentKind {
    pub fn doc_type(&self) -> DocumentType {
        match self {
            Self::Namespace { .. } => DocumentType::Namespace,
            Self::Class { .. } => DocumentType::Class,
            Self::Text => DocumentType::Text,
            Self::Markdown => DocumentType::Markdown,
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        match self {
            Self::Namespace { namespace } | Self::Class { namespace, .. } => Some(namespace),
            _ => None,
        }
    }

    pub fn class_name(&self) -> Option<&str> {
        match self {
            Self::Class { class_name, .. } => Some(class_name),
            _ => None,
        }
    }
}

// ============================================================================
// Document
// ============================================================================

/// 지식베이스 문서
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// 세대 내 전역 고유 id
    pub id: String,
    pub kind: DocumentKind,
    pub title: String,
    /// 비어 있지 않은 본문
    pub content: String,
    /// 출처 (파일 경로 또는 "api_docs")
    pub source: String,
    /// 호출자가 추가한 메타데이터
    pub extra: Metadata,
}

impl Document {
    /// 검증 후 생성
    pub fn new(
        id: impl Into<String>,
        kind: DocumentKind,
        title: impl Into<String>,
        content: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<Self> {
        let doc = Self {
            id: id.into(),
            kind,
            title: title.into(),
            content: content.into(),
            source: source.into(),
            extra: Metadata::new(),
        };
        doc.validate()?;
        Ok(doc)
    }

    /// (id, content, metadata) 로부터 복원
    ///
    /// `type` 키로 종류를 정하고 (없으면 text), namespace/class 는
    /// 해당 키가 있어야 합니다. 예약 키 외의 값은 `extra` 에 남습니다.
    pub fn from_parts(id: &str, content: &str, metadata: &Metadata) -> Result<Self> {
        let mut extra = metadata.clone();
        let mut take = |key: &str| -> Result<Option<String>> {
            match extra.remove(key) {
                None => Ok(None),
                Some(MetadataValue::Text(s)) => Ok(Some(s)),
                Some(other) => Err(KnowledgeError::InvalidDocument(format!(
                    "metadata key '{}' must be a string, got {}",
                    key, other
                ))),
            }
        };

        let doc_type = match take("type")? {
            Some(t) => t.parse::<DocumentType>()?,
            None => DocumentType::Text,
        };
        let title = take("title")?.unwrap_or_else(|| id.to_string());
        let source = take("source")?.unwrap_or_default();
        let namespace = take("namespace")?;
        let class_name = take("class_name")?;

        let kind = match doc_type {
            DocumentType::Namespace => DocumentKind::Namespace {
                namespace: namespace.ok_or_else(|| missing(id, "namespace"))?,
            },
            DocumentType::Class => DocumentKind::Class {
                namespace: namespace.ok_or_else(|| missing(id, "namespace"))?,
                class_name: class_name.ok_or_else(|| missing(id, "class_name"))?,
            },
            DocumentType::Text => DocumentKind::Text,
            DocumentType::Markdown => DocumentKind::Markdown,
        };

        let doc = Self {
            id: id.to_string(),
            kind,
            title,
            content: content.to_string(),
            source,
            extra,
        };
        doc.validate()?;
        Ok(doc)
    }

    pub fn doc_type(&self) -> DocumentType {
        self.kind.doc_type()
    }

    /// 인덱스에 저장할 평면 메타데이터
    pub fn index_metadata(&self) -> Metadata {
        let mut metadata = self.extra.clone();
        metadata.insert("type".to_string(), self.doc_type().as_str().into());
        metadata.insert("title".to_string(), self.title.clone().into());
        metadata.insert("source".to_string(), self.source.clone().into());
        if let Some(ns) = self.kind.namespace() {
            metadata.insert("namespace".to_string(), ns.into());
        }
        if let Some(class_name) = self.kind.class_name() {
            metadata.insert("class_name".to_string(), class_name.into());
        }
        metadata
    }

    fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(KnowledgeError::InvalidDocument("id must not be empty".to_string()));
        }
        if self.content.trim().is_empty() {
            return Err(KnowledgeError::InvalidDocument(format!(
                "document '{}' has empty content",
                self.id
            )));
        }
        Ok(())
    }
}

fn missing(id: &str, key: &str) -> KnowledgeError {
    KnowledgeError::InvalidDocument(format!("document '{}' requires metadata '{}'", id, key))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_metadata_for_class() {
        let doc = Document::new(
            "class_Model_Beam",
            DocumentKind::Class {
                namespace: "Model".to_string(),
                class_name: "Beam".to_string(),
            },
            "Model.Beam",
            "Beam part",
            API_DOCS_SOURCE,
        )
        .unwrap();

        let meta = doc.index_metadata();
        assert_eq!(meta["type"], MetadataValue::from("class"));
        assert_eq!(meta["namespace"], MetadataValue::from("Model"));
        assert_eq!(meta["class_name"], MetadataValue::from("Beam"));
        assert_eq!(meta["source"], MetadataValue::from("api_docs"));
    }

    #[test]
    fn test_text_has_no_namespace() {
        let doc = Document::new("file_a_0", DocumentKind::Text, "a.txt", "hello", "a.txt").unwrap();
        let meta = doc.index_metadata();
        assert!(!meta.contains_key("namespace"));
        assert!(!meta.contains_key("class_name"));
    }

    #[test]
    fn test_empty_content_rejected() {
        let result = Document::new("x", DocumentKind::Text, "x", "   ", "x");
        assert!(result.is_err());
    }

    #[test]
    fn test_from_parts_roundtrip() {
        let mut meta = Metadata::new();
        meta.insert("type".to_string(), "class".into());
        meta.insert("namespace".to_string(), "Drawing".into());
        meta.insert("class_name".to_string(), "GADrawing".into());
        meta.insert("version".to_string(), 2025i64.into());

        let doc = Document::from_parts("custom_1", "General arrangement drawing", &meta).unwrap();
        assert_eq!(doc.doc_type(), DocumentType::Class);
        assert_eq!(doc.title, "custom_1");
        assert_eq!(doc.extra["version"], MetadataValue::Int(2025));

        let back = doc.index_metadata();
        assert_eq!(back["class_name"], MetadataValue::from("GADrawing"));
        assert_eq!(back["version"], MetadataValue::Int(2025));
    }

    #[test]
    fn test_from_parts_requires_kind_fields() {
        let mut meta = Metadata::new();
        meta.insert("type".to_string(), "namespace".into());
        assert!(Document::from_parts("ns", "content", &meta).is_err());

        meta.insert("type".to_string(), "unknown".into());
        assert!(Document::from_parts("ns", "content", &meta).is_err());
    }

    #[test]
    fn test_metadata_value_json() {
        let mut meta = Metadata::new();
        meta.insert("a".to_string(), "x".into());
        meta.insert("b".to_string(), 3i64.into());
        meta.insert("c".to_string(), true.into());

        let json = serde_json::to_string(&meta).unwrap();
        assert_eq!(json, r#"{"a":"x","b":3,"c":true}"#);

        let parsed: Metadata = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, meta);
    }
}
