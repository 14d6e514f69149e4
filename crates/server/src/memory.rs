//! In-process backends.
//!
//! Lets the binary run without a host search platform and gives the
//! integration tests a real pipeline to drive. Scoring is plain term
//! frequency over `content`, which is enough to exercise ranking and score
//! normalization.
use std::cmp::Ordering;

use dashmap::DashMap;
use serde_json::Value;

use crate::auth::{AccessToken, TokenStore};
use crate::backend::{field, FieldMap, IndexError, Indexer, SearchError, SearchParams, SearchService};
use crate::config::AccessTokenConfig;

/// Page size used when the caller forwards a non-positive one.
const DEFAULT_PAGE_SIZE: usize = 20;

/// Token store backed by a concurrent map.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: DashMap<String, AccessToken>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(entries: &[AccessTokenConfig]) -> Self {
        let store = Self::new();
        for entry in entries {
            store.insert(AccessToken {
                token: entry.token.clone(),
                permissions: entry.permissions.clone(),
                expired_time: entry.expired_time,
            });
        }
        store
    }

    pub fn insert(&self, token: AccessToken) {
        self.tokens.insert(token.token.clone(), token);
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl TokenStore for MemoryTokenStore {
    fn find(&self, token: &str) -> anyhow::Result<Option<AccessToken>> {
        Ok(self.tokens.get(token).map(|entry| entry.value().clone()))
    }
}

/// Search index and indexer over one concurrent map keyed by `doc_id`.
#[derive(Debug)]
pub struct MemoryIndex {
    documents: DashMap<String, FieldMap>,
    max_result_window: usize,
}

impl MemoryIndex {
    pub fn new(max_result_window: usize) -> Self {
        Self {
            documents: DashMap::new(),
            max_result_window,
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn get(&self, doc_id: &str) -> Option<FieldMap> {
        self.documents.get(doc_id).map(|entry| entry.value().clone())
    }
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl Indexer for MemoryIndex {
    fn add_all(&self, documents: Vec<FieldMap>) -> Result<Vec<String>, IndexError> {
        // Validate the whole batch before storing any of it.
        let mut batch = Vec::with_capacity(documents.len());
        for mut document in documents {
            let doc_id = match document.get(field::DOC_ID).and_then(Value::as_str) {
                Some(id) if !id.is_empty() => id.to_string(),
                _ => return Err(IndexError::Rejected("document has no doc_id".into())),
            };
            document.insert(field::ID.to_string(), Value::String(doc_id.clone()));
            batch.push((doc_id, document));
        }

        let ids = batch.iter().map(|(id, _)| id.clone()).collect();
        for (doc_id, document) in batch {
            self.documents.insert(doc_id, document);
        }
        Ok(ids)
    }
}

impl SearchService for MemoryIndex {
    fn search(&self, params: &SearchParams) -> Result<Vec<FieldMap>, SearchError> {
        if params.query.matches('"').count() % 2 != 0 {
            return Err(SearchError::InvalidQuery(format!(
                "unbalanced quotes in {:?}",
                params.query
            )));
        }

        let size = usize::try_from(params.page_size)
            .ok()
            .filter(|size| *size > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE);
        if params.start_position + size > self.max_result_window {
            return Err(SearchError::ResultWindowExceeded {
                start: params.start_position,
                size,
                max: self.max_result_window,
            });
        }

        let ranges = params
            .extra_queries
            .iter()
            .map(|clause| RangeClause::parse(clause))
            .collect::<Result<Vec<_>, _>>()?;

        let terms: Vec<String> = params
            .query
            .split_whitespace()
            .map(|term| term.trim_matches('"').to_lowercase())
            .filter(|term| !term.is_empty())
            .collect();

        let mut hits: Vec<(f64, String, FieldMap)> = self
            .documents
            .iter()
            .filter(|entry| {
                let doc = entry.value();
                params
                    .fields
                    .iter()
                    .all(|(name, accepted)| field_matches(doc, name, accepted))
                    && ranges.iter().all(|range| range.matches(doc))
                    && role_visible(doc, &params.roles)
            })
            .filter_map(|entry| {
                let score = term_score(entry.value(), &terms);
                (score > 0.0).then(|| (score, entry.key().clone(), entry.value().clone()))
            })
            .collect();

        hits.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.1.cmp(&b.1))
        });

        tracing::debug!(
            query = %params.query,
            matched = hits.len(),
            "memory search"
        );

        Ok(hits
            .into_iter()
            .skip(params.start_position)
            .take(size)
            .map(|(score, _, doc)| project(doc, score, &params.response_fields))
            .collect())
    }
}

/// `field:[lower upper]` with `*` for an open bound.
#[derive(Debug)]
struct RangeClause {
    field: String,
    lower: Option<i64>,
    upper: Option<i64>,
}

impl RangeClause {
    fn parse(clause: &str) -> Result<Self, SearchError> {
        let invalid = || SearchError::InvalidQuery(format!("unsupported clause {clause:?}"));
        let (field, range) = clause.split_once(':').ok_or_else(invalid)?;
        let inner = range
            .strip_prefix('[')
            .and_then(|r| r.strip_suffix(']'))
            .ok_or_else(invalid)?;
        let (lower, upper) = inner.trim().split_once(' ').ok_or_else(invalid)?;
        let bound = |value: &str| match value.trim() {
            "*" => Ok(None),
            value => match entity::date::parse(value) {
                0 => Err(invalid()),
                millis => Ok(Some(millis)),
            },
        };
        Ok(Self {
            field: field.to_string(),
            lower: bound(lower)?,
            upper: bound(upper)?,
        })
    }

    fn matches(&self, doc: &FieldMap) -> bool {
        let millis = match doc.get(&self.field) {
            Some(Value::String(value)) => entity::date::parse(value),
            Some(Value::Number(value)) => value.as_i64().unwrap_or(0),
            _ => return false,
        };
        self.lower.map_or(true, |lower| millis >= lower)
            && self.upper.map_or(true, |upper| millis <= upper)
    }
}

fn string_values(value: &Value) -> Vec<&str> {
    match value {
        Value::String(s) => vec![s.as_str()],
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

fn field_matches(doc: &FieldMap, name: &str, accepted: &[String]) -> bool {
    doc.get(name)
        .map(|value| {
            string_values(value)
                .into_iter()
                .any(|v| accepted.iter().any(|a| a == v))
        })
        .unwrap_or(false)
}

/// Documents without roles are public.
fn role_visible(doc: &FieldMap, roles: &[String]) -> bool {
    match doc.get(field::ROLE).map(string_values) {
        Some(doc_roles) if !doc_roles.is_empty() => {
            doc_roles.iter().any(|r| roles.iter().any(|role| role == r))
        }
        _ => true,
    }
}

fn term_score(doc: &FieldMap, terms: &[String]) -> f64 {
    let content = match doc.get(field::CONTENT).and_then(Value::as_str) {
        Some(content) => content.to_lowercase(),
        None => return 0.0,
    };
    terms
        .iter()
        .map(|term| content.matches(term.as_str()).count() as f64)
        .sum()
}

fn project(doc: FieldMap, score: f64, response_fields: &[String]) -> FieldMap {
    let mut row: FieldMap = doc
        .into_iter()
        .filter(|(key, _)| response_fields.is_empty() || response_fields.contains(key))
        .collect();
    row.insert(field::SCORE.to_string(), Value::from(score));
    row
}
