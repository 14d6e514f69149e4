//! Response projections of engine rows.
use entity::{date, Source};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backend::{field, FieldMap};

/// Results for one query of a `/query` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub query: String,
    pub results: Vec<DocumentResult>,
    pub top_k: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentResult {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub metadata: DocumentMetadata,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
}

impl QueryResult {
    /// Assemble rows in engine order.
    ///
    /// When the top score exceeds 1.0 every score is divided by it, so the
    /// best hit scores exactly 1.0.
    pub fn from_rows(query: impl Into<String>, rows: &[FieldMap]) -> Self {
        let mut results: Vec<DocumentResult> = rows.iter().map(DocumentResult::from_row).collect();

        if let Some(top) = results.first().map(|r| r.score) {
            if top > 1.0 {
                for result in &mut results {
                    result.score /= top;
                }
            }
        }

        Self {
            query: query.into(),
            top_k: results.len(),
            results,
        }
    }
}

impl DocumentResult {
    pub fn from_row(row: &FieldMap) -> Self {
        let id = string_field(row, field::ID)
            .or_else(|| string_field(row, field::DOC_ID))
            .unwrap_or_default();

        Self {
            id,
            text: string_field(row, field::CONTENT),
            metadata: DocumentMetadata::from_row(row),
            score: row.get(field::SCORE).and_then(Value::as_f64).unwrap_or(0.0),
            embedding: row.get(field::EMBEDDING).filter(|v| !v.is_null()).cloned(),
        }
    }
}

impl DocumentMetadata {
    pub fn from_row(row: &FieldMap) -> Self {
        Self {
            source: row.get(field::LABEL).and_then(first_source),
            source_id: string_field(row, field::FILENAME).filter(|s| !s.is_empty()),
            url: string_field(row, field::URL),
            created_at: row.get(field::TIMESTAMP).and_then(timestamp),
            author: string_field(row, field::AUTHOR),
            document_id: string_field(row, field::DOC_ID),
        }
    }
}

fn string_field(row: &FieldMap, name: &str) -> Option<String> {
    row.get(name).and_then(Value::as_str).map(str::to_string)
}

/// First label naming a known source.
fn first_source(label: &Value) -> Option<Source> {
    match label {
        Value::String(s) => Source::from_label(s),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .find_map(Source::from_label),
        _ => None,
    }
}

/// Engine timestamps arrive as date strings or epoch millis.
fn timestamp(value: &Value) -> Option<String> {
    let millis = match value {
        Value::String(s) => date::parse(s),
        Value::Number(n) => n.as_i64()?,
        _ => return None,
    };
    date::format(millis)
}
