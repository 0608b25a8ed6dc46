//! API 레퍼런스 스키마
//!
//! `{<namespace>: {description, classes: {<class>: {description, properties?, methods?, example?}}}}`
//! 형태의 JSON 을 순서를 보존하며 읽고, namespace/class 문서로 펼칩니다.

use std::fmt;
use std::marker::PhantomData;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::document::{Document, DocumentKind, API_DOCS_SOURCE};
use crate::error::Result;

/// 지식 디렉토리 안의 스키마 파일 이름
pub const SCHEMA_FILE_NAME: &str = "api_docs.json";

/// 기본 내장 스키마
pub const DEFAULT_SCHEMA_JSON: &str = include_str!("../../data/api_docs.json");

// ============================================================================
// OrderedMap
// ============================================================================

/// 파일에 적힌 순서를 유지하는 JSON 객체
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<V>(pub Vec<(String, V)>);

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<V> OrderedMap<V> {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct OrderedVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedVisitor<V> {
            type Value = OrderedMap<V>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, V>()? {
                    entries.push((key, value));
                }
                Ok(OrderedMap(entries))
            }
        }

        deserializer.deserialize_map(OrderedVisitor(PhantomData))
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

// ============================================================================
// Schema Types
// ============================================================================

/// 클래스 레퍼런스
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassSpec {
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<OrderedMap<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methods: Option<OrderedMap<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
}

impl ClassSpec {
    /// 설명 → 속성 → 메서드 → 예제 순서로 본문 합성
    pub fn render(&self) -> String {
        let mut content = format!("{}\n\n", self.description);

        if let Some(properties) = &self.properties {
            content.push_str("Properties:\n");
            for (name, desc) in properties.iter() {
                content.push_str(&format!("- {}: {}\n", name, desc));
            }
            content.push('\n');
        }

        if let Some(methods) = &self.methods {
            content.push_str("Methods:\n");
            for (name, desc) in methods.iter() {
                content.push_str(&format!("- {}: {}\n", name, desc));
            }
            content.push('\n');
        }

        if let Some(example) = &self.example {
            content.push_str("Example:\n");
            content.push_str(example);
        }

        content.trim().to_string()
    }
}

/// 네임스페이스 레퍼런스
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamespaceSpec {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub classes: OrderedMap<ClassSpec>,
}

/// 전체 API 스키마
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiSchema {
    pub namespaces: OrderedMap<NamespaceSpec>,
}

impl ApiSchema {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// 내장 기본 스키마
    pub fn builtin() -> Result<Self> {
        Self::from_json(DEFAULT_SCHEMA_JSON)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// namespace 마다 1개, class 마다 1개 문서 생성 (파일 순서 유지)
    pub fn to_documents(&self) -> Result<Vec<Document>> {
        let mut documents = Vec::new();

        for (namespace, ns_spec) in self.namespaces.iter() {
            let content = non_empty_or(ns_spec.description.trim(), namespace);
            documents.push(Document::new(
                format!("namespace_{}", namespace),
                DocumentKind::Namespace {
                    namespace: namespace.to_string(),
                },
                namespace,
                content,
                API_DOCS_SOURCE,
            )?);

            for (class_name, class_spec) in ns_spec.classes.iter() {
                let title = format!("{}.{}", namespace, class_name);
                let rendered = class_spec.render();
                let content = non_empty_or(&rendered, &title);

                documents.push(Document::new(
                    format!("class_{}_{}", namespace, class_name),
                    DocumentKind::Class {
                        namespace: namespace.to_string(),
                        class_name: class_name.to_string(),
                    },
                    title.clone(),
                    content,
                    API_DOCS_SOURCE,
                )?);
            }
        }

        Ok(documents)
    }
}

fn non_empty_or<'a>(text: &'a str, fallback: &'a str) -> &'a str {
    if text.is_empty() {
        fallback
    } else {
        text
    }
}

// ============================================================================
// Tests
// ============================================================================
