//! Capabilities the gateway borrows from the host search platform.
//!
//! The gateway never searches, stores or issues tokens itself. It talks to
//! three collaborators through the traits below, all injected into
//! [`ServerState`](crate::state::ServerState) at construction:
//!
//! | Trait | Role |
//! |-------|------|
//! | [`SearchService`] | Runs a [`SearchParams`] and returns ranked rows |
//! | [`Indexer`] | Accepts field maps and returns their document ids |
//! | [`TokenStore`](crate::auth::TokenStore) | Resolves bearer tokens |
//!
//! Calls are synchronous; handlers run them on tokio's blocking pool.
//! [`crate::memory`] holds in-process implementations.
use std::collections::BTreeMap;

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// A document as the search engine sees it: field name to JSON value.
pub type FieldMap = Map<String, Value>;

/// Index field names shared by the mapper, the parameter builder and the
/// result assembler.
pub mod field {
    pub const ID: &str = "_id";
    pub const DOC_ID: &str = "doc_id";
    pub const CONTENT: &str = "content";
    pub const CONTENT_LENGTH: &str = "content_length";
    pub const LABEL: &str = "label";
    pub const FILENAME: &str = "filename";
    pub const URL: &str = "url";
    pub const AUTHOR: &str = "author";
    pub const SEGMENT: &str = "segment";
    pub const ROLE: &str = "role";
    pub const CREATED: &str = "created";
    pub const TIMESTAMP: &str = "timestamp";
    pub const LAST_MODIFIED: &str = "last_modified";
    pub const FILETYPE: &str = "filetype";
    pub const CLICK_COUNT: &str = "click_count";
    pub const FAVORITE_COUNT: &str = "favorite_count";
    pub const TITLE: &str = "title";
    pub const DIGEST: &str = "digest";
    pub const HOST: &str = "host";
    pub const VIRTUAL_HOST: &str = "virtual_host";
    pub const CONFIG_ID: &str = "config_id";
    pub const PARENT_ID: &str = "parent_id";
    pub const ANCHOR: &str = "anchor";
    pub const BOOST: &str = "boost";
    pub const MIMETYPE: &str = "mimetype";
    pub const LANG: &str = "lang";
    pub const SCORE: &str = "score";
    pub const EMBEDDING: &str = "embedding";
}

/// Everything the search engine needs to run one query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchParams {
    /// Free-text query string
    pub query: String,
    /// Exact-match constraints, field name to accepted values
    pub fields: BTreeMap<String, Vec<String>>,
    /// Additional field conditions; always empty for plugin queries
    pub conditions: BTreeMap<String, Vec<String>>,
    /// Extra query clauses such as `timestamp:[a b]`
    pub extra_queries: Vec<String>,
    pub start_position: usize,
    pub page_size: i32,
    pub languages: Vec<String>,
    /// Client locale from `Accept-Language`
    pub locale: Option<String>,
    /// Fields to return for each hit
    pub response_fields: Vec<String>,
    /// Roles the caller may read
    pub roles: Vec<String>,
}

/// Search failures, split by whether the caller or the engine is at fault.
#[derive(Error, Debug)]
pub enum SearchError {
    /// The engine could not make sense of the query.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("result window exceeded: offset {start} + size {size} > {max}")]
    ResultWindowExceeded { start: usize, size: usize, max: usize },

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl SearchError {
    /// True when the request, not the engine, caused the failure.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            SearchError::InvalidQuery(_) | SearchError::ResultWindowExceeded { .. }
        )
    }
}

/// Ingestion failures.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("document rejected: {0}")]
    Rejected(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Ranked retrieval over the host index.
pub trait SearchService: Send + Sync {
    /// Rows in rank order. Each row carries the requested response fields
    /// plus a numeric `score`.
    fn search(&self, params: &SearchParams) -> Result<Vec<FieldMap>, SearchError>;
}

/// Document ingestion into the host index.
pub trait Indexer: Send + Sync {
    /// Store all documents in one batch and return their ids in input order.
    fn add_all(&self, documents: Vec<FieldMap>) -> Result<Vec<String>, IndexError>;

    /// Hook for the host's language detection. Runs on the assembled field
    /// map before the document key is generated.
    fn update_language(&self, _fields: &mut FieldMap) {}

    /// Derive a document key from the assembled field map.
    ///
    /// The default hashes the URL, roles and virtual hosts, so the same URL
    /// ingested under the same visibility always maps to the same key.
    fn generate_doc_id(&self, fields: &FieldMap) -> String {
        let mut hasher = Sha256::new();
        if let Some(url) = fields.get(field::URL).and_then(Value::as_str) {
            hasher.update(url.as_bytes());
        }
        for key in [field::ROLE, field::VIRTUAL_HOST] {
            hasher.update([0]);
            if let Some(values) = fields.get(key).and_then(Value::as_array) {
                for value in values.iter().filter_map(Value::as_str) {
                    hasher.update(value.as_bytes());
                    hasher.update([b';']);
                }
            }
        }
        hex::encode(hasher.finalize())
    }
}
