//! Vector Index - 벡터 인덱스 트레이트 및 유틸리티
//!
//! 이름 있는 영속 컬렉션 위에서 insert / update / delete / count /
//! 최근접 이웃 검색(+메타데이터 필터)을 제공합니다.

use async_trait::async_trait;

use super::document::{DocumentType, Metadata, MetadataValue};
use crate::error::{KnowledgeError, Result};

// ============================================================================
// Types
// ============================================================================

/// 인덱스 엔트리 (저장용)
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub id: String,
    pub content: String,
    pub metadata: Metadata,
    pub embedding: Vec<f32>,
}

/// 검색 후보 (거리 오름차순)
#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: String,
    pub content: String,
    pub metadata: Metadata,
    /// 코사인 거리 (0 = 동일 방향)
    pub distance: f32,
}

// ============================================================================
// Metadata Filter
// ============================================================================

/// 키 하나에 대한 조건
#[derive(Debug, Clone, PartialEq)]
pub enum FilterCondition {
    Eq(MetadataValue),
    In(Vec<MetadataValue>),
}

impl FilterCondition {
    fn matches(&self, value: Option<&MetadataValue>) -> bool {
        match (self, value) {
            (Self::Eq(expected), Some(v)) => expected == v,
            (Self::In(options), Some(v)) => options.contains(v),
            (_, None) => false,
        }
    }
}

/// 메타데이터 필터 (모든 조건 AND)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataFilter {
    conditions: Vec<(String, FilterCondition)>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 정확히 일치
    pub fn eq(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.conditions
            .push((key.into(), FilterCondition::Eq(value.into())));
        self
    }

    /// 집합 포함
    pub fn is_in<V: Into<MetadataValue>>(
        mut self,
        key: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.conditions.push((key.into(), FilterCondition::In(values)));
        self
    }

    /// 조건 하나 추가
    pub fn and(mut self, key: impl Into<String>, condition: FilterCondition) -> Self {
        self.conditions.push((key.into(), condition));
        self
    }

    /// `type` 정확히 일치 필터
    pub fn doc_type(doc_type: DocumentType) -> Self {
        Self::new().eq("type", doc_type.as_str())
    }

    pub fn conditions(&self) -> &[(String, FilterCondition)] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// 메모리상 메타데이터에 대한 평가
    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.conditions
            .iter()
            .all(|(key, cond)| cond.matches(metadata.get(key)))
    }

    /// JSON 표현 파싱
    ///
    /// `{"type": "class"}`, `{"type": {"$in": ["namespace", "class"]}}`,
    /// `{"namespace": {"$eq": "Model"}}`
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| KnowledgeError::InvalidFilter("filter must be a JSON object".to_string()))?;

        let mut filter = Self::new();
        for (key, raw) in object {
            let condition = match raw {
                serde_json::Value::Object(op) if op.len() == 1 => {
                    let (name, operand) = op.iter().next().map(|(k, v)| (k.as_str(), v)).unwrap_or(("", raw));
                    match name {
                        "$eq" => FilterCondition::Eq(scalar(key, operand)?),
                        "$in" => {
                            let items = operand.as_array().ok_or_else(|| {
                                KnowledgeError::InvalidFilter(format!("'$in' for '{}' needs an array", key))
                            })?;
                            FilterCondition::In(
                                items.iter().map(|v| scalar(key, v)).collect::<Result<Vec<_>>>()?,
                            )
                        }
                        other => {
                            return Err(KnowledgeError::InvalidFilter(format!(
                                "unsupported operator '{}' for '{}'",
                                other, key
                            )))
                        }
                    }
                }
                other => FilterCondition::Eq(scalar(key, other)?),
            };
            filter.conditions.push((key.clone(), condition));
        }
        Ok(filter)
    }
}

fn scalar(key: &str, value: &serde_json::Value) -> Result<MetadataValue> {
    serde_json::from_value::<MetadataValue>(value.clone())
        .map_err(|_| KnowledgeError::InvalidFilter(format!("'{}' must compare against a scalar", key)))
}

// ============================================================================
// VectorIndex Trait
// ============================================================================

/// VectorIndex 트레이트 (async)
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// 컬렉션 이름
    fn collection_name(&self) -> &str;

    /// 배치 삽입. 이미 있는 id 가 하나라도 있으면 `DuplicateId`
    async fn insert_batch(&self, entries: &[IndexEntry]) -> Result<usize>;

    /// 기존 엔트리 교체. 없으면 `NotFound`
    async fn update(&self, entry: &IndexEntry) -> Result<()>;

    /// 삭제. 없는 id 는 no-op (`false`)
    async fn delete(&self, id: &str) -> Result<bool>;

    /// 최근접 `top_k` 후보 (거리 오름차순)
    async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Candidate>>;

    /// 살아있는 엔트리 수
    async fn count(&self) -> Result<usize>;

    async fn contains(&self, id: &str) -> Result<bool>;

    /// 컬렉션 삭제 후 빈 컬렉션 재생성
    async fn reset(&mut self) -> Result<()>;
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 코사인 거리 → 유사도 점수 (0.0 ~ 1.0)
///
/// 거리에 대해 단조 감소하며, 범위를 벗어나면 잘라냅니다.
pub fn score_from_distance(distance: f32) -> f32 {
    if distance.is_nan() {
        return 0.0;
    }
    (1.0 - distance).clamp(0.0, 1.0)
}

// ============================================================================
// Tests
// ============================================================================
