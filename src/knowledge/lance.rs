//! LanceDB Vector Index - 영속 컬렉션 + 코사인 최근접 검색
//!
//! 컬렉션 하나 = LanceDB 테이블 하나. 자주 거르는 메타데이터 키는
//! 별도 컬럼으로 승격하고, 전체 메타데이터는 JSON 문자열로 함께 저장합니다.
//! 승격 컬럼 조건은 SQL prefilter 로, 나머지 키 조건은 후보를 읽은 뒤 거릅니다.
//! ref: https://lancedb.github.io/lancedb/

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::table::Table;
use lancedb::DistanceType;

use super::document::{Metadata, MetadataValue};
use super::vector::{Candidate, FilterCondition, IndexEntry, MetadataFilter, VectorIndex};
use crate::error::{KnowledgeError, Result};

/// 벡터 컬럼 이름
const VECTOR_COLUMN: &str = "vector";

/// 필터 키 → 승격 컬럼
fn filter_column(key: &str) -> Option<&'static str> {
    match key {
        "type" => Some("doc_type"),
        "title" => Some("title"),
        "source" => Some("source"),
        "namespace" => Some("namespace"),
        "class_name" => Some("class_name"),
        _ => None,
    }
}

// ============================================================================
// LanceVectorIndex
// ============================================================================

/// LanceDB 컬렉션 구현
///
/// 거리 함수는 코사인으로 고정합니다 (0 = 같은 방향, 2 = 반대 방향).
pub struct LanceVectorIndex {
    db: Connection,
    table: Table,
    path: PathBuf,
    collection: String,
    dimension: usize,
}

impl LanceVectorIndex {
    /// 컬렉션 열기 (없으면 빈 컬렉션 생성)
    ///
    /// # Arguments
    /// * `path` - LanceDB 디렉토리 경로
    /// * `collection` - 테이블 이름
    /// * `dimension` - 인코더 벡터 차원. 기존 컬렉션과 다르면 `DimensionMismatch`
    pub async fn open(path: &Path, collection: &str, dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(KnowledgeError::InvalidConfig(
                "embedding dimension must be positive".to_string(),
            ));
        }
        if collection.trim().is_empty() {
            return Err(KnowledgeError::InvalidConfig(
                "collection name must not be empty".to_string(),
            ));
        }

        if !path.exists() {
            tokio::fs::create_dir_all(path).await?;
        }

        let path_str = path.to_str().ok_or_else(|| {
            KnowledgeError::InvalidConfig(format!("index path is not UTF-8: {}", path.display()))
        })?;

        let db = lancedb::connect(path_str).execute().await?;

        let table = if Self::table_exists(&db, collection).await? {
            let table = db.open_table(collection).execute().await?;
            let schema = table.schema().await?;
            let stored = stored_dimension(&schema);
            if stored != dimension {
                return Err(KnowledgeError::DimensionMismatch {
                    collection: collection.to_string(),
                    stored,
                    expected: dimension,
                });
            }
            tracing::debug!("Opened collection '{}' at {}", collection, path.display());
            table
        } else {
            tracing::info!("Creating collection '{}' ({}-d)", collection, dimension);
            Self::create_table(&db, collection, dimension).await?
        };

        Ok(Self {
            db,
            table,
            path: path.to_path_buf(),
            collection: collection.to_string(),
            dimension,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    async fn table_exists(db: &Connection, name: &str) -> Result<bool> {
        let names = db.table_names().execute().await?;
        Ok(names.iter().any(|n| n == name))
    }

    async fn create_table(db: &Connection, name: &str, dimension: usize) -> Result<Table> {
        let schema = Self::create_schema(dimension)?;
        Ok(db.create_empty_table(name, schema).execute().await?)
    }

    /// 컬렉션 스키마
    fn create_schema(dimension: usize) -> Result<SchemaRef> {
        let width = list_width(dimension)?;
        Ok(Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("doc_type", DataType::Utf8, false),
            Field::new("title", DataType::Utf8, false),
            Field::new("source", DataType::Utf8, false),
            Field::new("namespace", DataType::Utf8, true),
            Field::new("class_name", DataType::Utf8, true),
            Field::new("metadata", DataType::Utf8, false),
            Field::new(
                VECTOR_COLUMN,
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    width,
                ),
                false,
            ),
        ])))
    }

    /// 엔트리들을 Arrow RecordBatch로 변환
    fn entries_to_batch(&self, entries: &[IndexEntry]) -> Result<RecordBatch> {
        for entry in entries {
            if entry.embedding.len() != self.dimension {
                return Err(KnowledgeError::DimensionMismatch {
                    collection: self.collection.clone(),
                    stored: self.dimension,
                    expected: entry.embedding.len(),
                });
            }
        }

        let promoted = |key: &str| -> Vec<Option<&str>> {
            entries
                .iter()
                .map(|e| e.metadata.get(key).and_then(MetadataValue::as_str))
                .collect()
        };

        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        let contents: Vec<&str> = entries.iter().map(|e| e.content.as_str()).collect();
        let doc_types: Vec<&str> = promoted("type")
            .into_iter()
            .map(|t| t.unwrap_or("text"))
            .collect();
        let titles: Vec<&str> = promoted("title")
            .into_iter()
            .zip(&ids)
            .map(|(t, id)| t.unwrap_or(*id))
            .collect();
        let sources: Vec<&str> = promoted("source")
            .into_iter()
            .map(|s| s.unwrap_or_default())
            .collect();
        let metadata_json = entries
            .iter()
            .map(|e| serde_json::to_string(&e.metadata))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let flat: Vec<f32> = entries
            .iter()
            .flat_map(|e| e.embedding.iter().copied())
            .collect();
        let vectors = FixedSizeListArray::try_new(
            Arc::new(Field::new("item", DataType::Float32, true)),
            list_width(self.dimension)?,
            Arc::new(Float32Array::from(flat)) as Arc<dyn Array>,
            None,
        )?;

        let batch = RecordBatch::try_new(
            Self::create_schema(self.dimension)?,
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(contents)),
                Arc::new(StringArray::from(doc_types)),
                Arc::new(StringArray::from(titles)),
                Arc::new(StringArray::from(sources)),
                Arc::new(StringArray::from(promoted("namespace"))),
                Arc::new(StringArray::from(promoted("class_name"))),
                Arc::new(StringArray::from(metadata_json)),
                Arc::new(vectors),
            ],
        )?;

        Ok(batch)
    }

    /// 이미 저장된 id 중 첫 번째
    async fn first_existing(&self, ids: &[&str]) -> Result<Option<String>> {
        let predicate = format!(
            "id IN ({})",
            ids.iter().map(|id| quote(id)).collect::<Vec<_>>().join(", ")
        );
        if self.table.count_rows(Some(predicate)).await? == 0 {
            return Ok(None);
        }
        for id in ids {
            if self.contains(id).await? {
                return Ok(Some(id.to_string()));
            }
        }
        Ok(None)
    }

    fn batches_to_candidates(batches: &[RecordBatch]) -> Result<Vec<Candidate>> {
        let mut candidates = Vec::new();

        for batch in batches {
            let ids = string_column(batch, "id")?;
            let contents = string_column(batch, "content")?;
            let metadata = string_column(batch, "metadata")?;

            // _distance 컬럼 (LanceDB가 자동 추가)
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| missing_column("_distance"))?;

            for i in 0..batch.num_rows() {
                let meta: Metadata = serde_json::from_str(metadata.value(i))?;
                candidates.push(Candidate {
                    id: ids.value(i).to_string(),
                    content: contents.value(i).to_string(),
                    metadata: meta,
                    distance: distances.value(i),
                });
            }
        }

        candidates.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Ok(candidates)
    }
}

#[async_trait]
impl VectorIndex for LanceVectorIndex {
    fn collection_name(&self) -> &str {
        &self.collection
    }

    async fn insert_batch(&self, entries: &[IndexEntry]) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let mut seen = HashSet::with_capacity(entries.len());
        for entry in entries {
            if !seen.insert(entry.id.as_str()) {
                return Err(KnowledgeError::DuplicateId(entry.id.clone()));
            }
        }

        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        if let Some(existing) = self.first_existing(&ids).await? {
            return Err(KnowledgeError::DuplicateId(existing));
        }

        let batch = self.entries_to_batch(entries)?;
        let schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);
        self.table.add(batches).execute().await?;

        tracing::debug!("Inserted {} entries into '{}'", entries.len(), self.collection);
        Ok(entries.len())
    }

    async fn update(&self, entry: &IndexEntry) -> Result<()> {
        if !self.contains(&entry.id).await? {
            return Err(KnowledgeError::NotFound(entry.id.clone()));
        }

        let batch = self.entries_to_batch(std::slice::from_ref(entry))?;
        let schema = batch.schema();
        let reader = RecordBatchIterator::new(vec![Ok(batch)], schema);

        // 행 교체는 단일 커밋으로 처리
        let mut merge = self.table.merge_insert(&["id"]);
        merge.when_matched_update_all(None);
        merge.execute(Box::new(reader)).await?;

        tracing::debug!("Updated entry '{}'", entry.id);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        if !self.contains(id).await? {
            return Ok(false);
        }

        self.table.delete(&format!("id = {}", quote(id))).await?;
        tracing::debug!("Deleted entry '{}'", id);
        Ok(true)
    }

    async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Candidate>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        if embedding.len() != self.dimension {
            return Err(KnowledgeError::DimensionMismatch {
                collection: self.collection.clone(),
                stored: self.dimension,
                expected: embedding.len(),
            });
        }

        let plan = match filter {
            Some(f) => match plan_filter(f) {
                Some(plan) => plan,
                // 빈 집합 조건은 어떤 행과도 일치하지 않음
                None => return Ok(Vec::new()),
            },
            None => FilterPlan::default(),
        };

        let available = self.table.count_rows(plan.predicate.clone()).await?;
        if available == 0 {
            return Ok(Vec::new());
        }
        // 나머지 조건이 있으면 prefilter 를 통과한 행 전체가 후보
        let limit = if plan.residual.is_empty() {
            top_k.min(available)
        } else {
            available
        };

        let mut search = self
            .table
            .vector_search(embedding.to_vec())?
            .column(VECTOR_COLUMN)
            .distance_type(DistanceType::Cosine)
            .limit(limit);
        if let Some(sql) = plan.predicate {
            search = search.only_if(sql);
        }

        let batches: Vec<RecordBatch> = search.execute().await?.try_collect().await?;
        let mut candidates = Self::batches_to_candidates(&batches)?;
        if !plan.residual.is_empty() {
            candidates.retain(|c| plan.residual.matches(&c.metadata));
        }
        candidates.truncate(top_k);
        Ok(candidates)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.table.count_rows(None).await?)
    }

    async fn contains(&self, id: &str) -> Result<bool> {
        let count = self
            .table
            .count_rows(Some(format!("id = {}", quote(id))))
            .await?;
        Ok(count > 0)
    }

    async fn reset(&mut self) -> Result<()> {
        if Self::table_exists(&self.db, &self.collection).await? {
            self.db.drop_table(&self.collection).await?;
        }
        self.table = Self::create_table(&self.db, &self.collection, self.dimension).await?;

        tracing::info!("Collection '{}' recreated", self.collection);
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// SQL 문자열 리터럴 (작은따옴표 이스케이프)
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// 필터 분해 결과
#[derive(Debug, Default)]
struct FilterPlan {
    /// 승격 컬럼에 대한 SQL 조건
    predicate: Option<String>,
    /// 메타데이터 JSON 으로 평가할 조건
    residual: MetadataFilter,
}

/// 필터 → LanceDB SQL 조건 + 나머지 조건
///
/// 승격 키의 문자열 조건만 SQL 로 옮깁니다. 일치할 수 없는 필터(빈 `In`)는 `None`.
fn plan_filter(filter: &MetadataFilter) -> Option<FilterPlan> {
    let mut clauses = Vec::new();
    let mut residual = MetadataFilter::new();

    for (key, condition) in filter.conditions() {
        if matches!(condition, FilterCondition::In(values) if values.is_empty()) {
            return None;
        }
        match (filter_column(key), sql_condition(condition)) {
            (Some(column), Some(rhs)) => clauses.push(format!("{} {}", column, rhs)),
            _ => residual = residual.and(key.clone(), condition.clone()),
        }
    }

    Some(FilterPlan {
        predicate: (!clauses.is_empty()).then(|| clauses.join(" AND ")),
        residual,
    })
}

fn sql_condition(condition: &FilterCondition) -> Option<String> {
    match condition {
        FilterCondition::Eq(value) => value.as_str().map(|v| format!("= {}", quote(v))),
        FilterCondition::In(values) => {
            let items = values
                .iter()
                .map(|v| v.as_str().map(quote))
                .collect::<Option<Vec<_>>>()?;
            Some(format!("IN ({})", items.join(", ")))
        }
    }
}

fn list_width(dimension: usize) -> Result<i32> {
    i32::try_from(dimension).map_err(|_| {
        KnowledgeError::InvalidConfig(format!("embedding dimension {} is too large", dimension))
    })
}

fn stored_dimension(schema: &Schema) -> usize {
    match schema.field_with_name(VECTOR_COLUMN).map(|f| f.data_type()) {
        Ok(DataType::FixedSizeList(_, width)) => usize::try_from(*width).unwrap_or(0),
        _ => 0,
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| missing_column(name))
}

fn missing_column(name: &str) -> KnowledgeError {
    KnowledgeError::Arrow(arrow_schema::ArrowError::SchemaError(format!(
        "missing column '{}'",
        name
    )))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DIM: usize = 4;

    fn entry(id: &str, doc_type: &str, embedding: [f32; DIM]) -> IndexEntry {
        let mut metadata = Metadata::new();
        metadata.insert("type".to_string(), doc_type.into());
        metadata.insert("title".to_string(), id.into());
        metadata.insert("source".to_string(), "api_docs".into());
        IndexEntry {
            id: id.to_string(),
            content: format!("content of {}", id),
            metadata,
            embedding: embedding.to_vec(),
        }
    }

    async fn open_index(dir: &TempDir) -> LanceVectorIndex {
        LanceVectorIndex::open(&dir.path().join("vectordb"), "test_collection", DIM)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_insert_count_contains() {
        let temp_dir = TempDir::new().unwrap();
        let index = open_index(&temp_dir).await;

        assert_eq!(index.count().await.unwrap(), 0);

        let entries = vec![
            entry("a", "class", [1.0, 0.0, 0.0, 0.0]),
            entry("b", "namespace", [0.0, 1.0, 0.0, 0.0]),
        ];
        assert_eq!(index.insert_batch(&entries).await.unwrap(), 2);
        assert_eq!(index.count().await.unwrap(), 2);
        assert!(index.contains("a").await.unwrap());
        assert!(!index.contains("zzz").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_ids_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let index = open_index(&temp_dir).await;

        index
            .insert_batch(&[entry("a", "class", [1.0, 0.0, 0.0, 0.0])])
            .await
            .unwrap();

        let err = index
            .insert_batch(&[entry("a", "class", [0.0, 1.0, 0.0, 0.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, KnowledgeError::DuplicateId(id) if id == "a"));

        let err = index
            .insert_batch(&[
                entry("x", "text", [1.0, 0.0, 0.0, 0.0]),
                entry("x", "text", [1.0, 0.0, 0.0, 0.0]),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, KnowledgeError::DuplicateId(_)));
        assert_eq!(index.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_query_orders_by_distance() {
        let temp_dir = TempDir::new().unwrap();
        let index = open_index(&temp_dir).await;

        index
            .insert_batch(&[
                entry("far", "class", [0.0, 0.0, 1.0, 0.0]),
                entry("exact", "class", [1.0, 0.0, 0.0, 0.0]),
                entry("near", "class", [1.0, 0.2, 0.0, 0.0]),
            ])
            .await
            .unwrap();

        let results = index.query(&[1.0, 0.0, 0.0, 0.0], 2, None).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "exact");
        assert_eq!(results[1].id, "near");
        assert!(results[0].distance.abs() < 1e-4);
        assert_eq!(results[0].metadata["type"], MetadataValue::from("class"));

        // top_k 보다 적으면 있는 만큼
        let all = index.query(&[1.0, 0.0, 0.0, 0.0], 10, None).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_query_filter_restricts_type() {
        let temp_dir = TempDir::new().unwrap();
        let index = open_index(&temp_dir).await;

        index
            .insert_batch(&[
                entry("ns", "namespace", [1.0, 0.0, 0.0, 0.0]),
                entry("cls", "class", [0.5, 0.5, 0.0, 0.0]),
            ])
            .await
            .unwrap();

        let filter = MetadataFilter::new().eq("type", "class");
        let results = index
            .query(&[1.0, 0.0, 0.0, 0.0], 5, Some(&filter))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "cls");

        let nothing = MetadataFilter::new().is_in("type", Vec::<String>::new());
        assert!(index
            .query(&[1.0, 0.0, 0.0, 0.0], 5, Some(&nothing))
            .await
            .unwrap()
            .is_empty());

    }

    #[tokio::test]
    async fn test_query_filter_on_custom_key() {
        let temp_dir = TempDir::new().unwrap();
        let index = open_index(&temp_dir).await;

        let mut bolts = entry("bolts", "text", [0.2, 0.8, 0.0, 0.0]);
        bolts.metadata.insert("category".to_string(), "bolts".into());
        bolts.metadata.insert("revision".to_string(), 2i64.into());
        let mut welds = entry("welds", "text", [1.0, 0.0, 0.0, 0.0]);
        welds.metadata.insert("category".to_string(), "welds".into());
        index
            .insert_batch(&[welds, bolts, entry("plain", "text", [0.9, 0.1, 0.0, 0.0])])
            .await
            .unwrap();

        // 가장 가까운 후보(welds)가 걸러져도 top_k 안에 일치 항목이 남음
        let filter = MetadataFilter::new().eq("category", "bolts");
        let results = index
            .query(&[1.0, 0.0, 0.0, 0.0], 1, Some(&filter))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "bolts");

        // 승격 키 + 일반 키 + 숫자 값
        let mixed = MetadataFilter::new()
            .eq("type", "text")
            .is_in("revision", [1i64, 2i64]);
        let results = index
            .query(&[1.0, 0.0, 0.0, 0.0], 5, Some(&mixed))
            .await
            .unwrap();
        let ids: Vec<&str> = results.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["bolts"]);

        let unknown = MetadataFilter::new().eq("color", "red");
        assert!(index
            .query(&[1.0, 0.0, 0.0, 0.0], 5, Some(&unknown))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_query_huge_top_k() {
        let temp_dir = TempDir::new().unwrap();
        let index = open_index(&temp_dir).await;

        assert!(index
            .query(&[1.0, 0.0, 0.0, 0.0], usize::MAX, None)
            .await
            .unwrap()
            .is_empty());

        index
            .insert_batch(&[
                entry("a", "text", [1.0, 0.0, 0.0, 0.0]),
                entry("b", "class", [0.0, 1.0, 0.0, 0.0]),
            ])
            .await
            .unwrap();

        let all = index
            .query(&[1.0, 0.0, 0.0, 0.0], usize::MAX, None)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let classes = MetadataFilter::new().eq("type", "class");
        let filtered = index
            .query(&[1.0, 0.0, 0.0, 0.0], usize::MAX, Some(&classes))
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let temp_dir = TempDir::new().unwrap();
        let index = open_index(&temp_dir).await;

        index
            .insert_batch(&[entry("a", "text", [1.0, 0.0, 0.0, 0.0])])
            .await
            .unwrap();

        let mut changed = entry("a", "text", [0.0, 1.0, 0.0, 0.0]);
        changed.content = "replaced".to_string();
        index.update(&changed).await.unwrap();

        assert_eq!(index.count().await.unwrap(), 1);
        let results = index.query(&[0.0, 1.0, 0.0, 0.0], 1, None).await.unwrap();
        assert_eq!(results[0].content, "replaced");

        let missing = entry("ghost", "text", [1.0, 0.0, 0.0, 0.0]);
        assert!(matches!(
            index.update(&missing).await,
            Err(KnowledgeError::NotFound(_))
        ));

        assert!(index.delete("a").await.unwrap());
        assert!(!index.delete("a").await.unwrap());
        assert_eq!(index.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reset_and_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let index = open_index(&temp_dir).await;
            index
                .insert_batch(&[entry("a", "text", [1.0, 0.0, 0.0, 0.0])])
                .await
                .unwrap();
        }

        // 재시작 후에도 유지
        let mut index = open_index(&temp_dir).await;
        assert_eq!(index.count().await.unwrap(), 1);

        index.reset().await.unwrap();
        assert_eq!(index.count().await.unwrap(), 0);
        index
            .insert_batch(&[entry("a", "text", [1.0, 0.0, 0.0, 0.0])])
            .await
            .unwrap();
        assert_eq!(index.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_on_open() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("vectordb");
        LanceVectorIndex::open(&path, "dims", DIM).await.unwrap();

        let err = LanceVectorIndex::open(&path, "dims", 8).await.err();
        assert!(matches!(
            err,
            Some(KnowledgeError::DimensionMismatch { stored: 4, expected: 8, .. })
        ));
    }

    #[test]
    fn test_plan_filter() {
        let filter = MetadataFilter::new()
            .is_in("type", ["namespace", "class"])
            .eq("namespace", "O'Brien");
        let plan = plan_filter(&filter).unwrap();
        assert_eq!(
            plan.predicate.as_deref(),
            Some("doc_type IN ('namespace', 'class') AND namespace = 'O''Brien'")
        );
        assert!(plan.residual.is_empty());

        // 문자열이 아닌 값, 승격되지 않은 키는 나머지 조건으로
        let mixed = MetadataFilter::new()
            .eq("title", 3i64)
            .eq("category", "bolts")
            .eq("source", "api_docs");
        let plan = plan_filter(&mixed).unwrap();
        assert_eq!(plan.predicate.as_deref(), Some("source = 'api_docs'"));
        assert_eq!(plan.residual.conditions().len(), 2);

        let nothing = MetadataFilter::new().is_in("category", Vec::<String>::new());
        assert!(plan_filter(&nothing).is_none());
    }
}
