//! Turns upserted [`Document`]s into index field maps.
use chrono::{DateTime, Utc};
use entity::{date, Document};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::auth::Permissions;
use crate::backend::{field, FieldMap, Indexer};
use crate::config::ServerConfig;

/// Builds field maps for one upsert call.
///
/// All documents mapped by the same `FieldMapper` share one segment tag and
/// one "now" timestamp.
pub struct FieldMapper<'a> {
    config: &'a ServerConfig,
    roles: Vec<String>,
    segment: String,
    now: String,
}

impl<'a> FieldMapper<'a> {
    pub fn new(config: &'a ServerConfig, permissions: &Permissions, now: DateTime<Utc>) -> Self {
        let now_millis = now.timestamp_millis();
        Self {
            config,
            roles: permissions.with_defaults(&config.default_roles),
            segment: now.format("%Y%m%d%H%M%S%3f").to_string(),
            now: date::format(now_millis).unwrap_or_default(),
        }
    }

    pub fn segment(&self) -> &str {
        &self.segment
    }

    /// Map every document, in order.
    pub fn map_all(&self, documents: &[Document], indexer: &dyn Indexer) -> Vec<FieldMap> {
        documents
            .iter()
            .map(|document| self.map(document, indexer))
            .collect()
    }

    pub fn map(&self, document: &Document, indexer: &dyn Indexer) -> FieldMap {
        let metadata = document.metadata();
        let text = document.text();
        let mut fields = FieldMap::new();

        fields.insert(field::CONTENT.into(), json!(text));
        if let Some(label) = metadata.source().label() {
            fields.insert(field::LABEL.into(), json!([label]));
        }
        fields.insert(field::FILENAME.into(), json!(metadata.source_id().unwrap_or("")));
        let url = match metadata.url().filter(|url| !url.trim().is_empty()) {
            Some(url) => url.to_string(),
            None => format!("{}?{}", self.config.document_base_url, content_digest(text)),
        };
        fields.insert(field::URL.into(), json!(url));
        if let Some(author) = metadata.author().filter(|author| !author.trim().is_empty()) {
            fields.insert(field::AUTHOR.into(), json!(author));
        }
        fields.insert(field::SEGMENT.into(), json!(self.segment));
        fields.insert(field::ROLE.into(), json!(self.roles));

        let created = metadata.created_at().unwrap_or_else(|| self.now.clone());
        fields.insert(field::CREATED.into(), json!(created));
        fields.insert(field::TIMESTAMP.into(), json!(created));
        fields.insert(field::LAST_MODIFIED.into(), json!(created));

        fields.insert(field::CONTENT_LENGTH.into(), json!(text.len()));
        fields.insert(field::FILETYPE.into(), json!("txt"));
        fields.insert(field::CLICK_COUNT.into(), json!(0));
        fields.insert(field::FAVORITE_COUNT.into(), json!(0));
        fields.insert(field::TITLE.into(), json!(""));
        fields.insert(field::DIGEST.into(), json!(""));
        fields.insert(field::HOST.into(), json!(self.config.default_host));
        fields.insert(field::VIRTUAL_HOST.into(), json!(self.config.default_virtual_hosts));
        fields.insert(field::CONFIG_ID.into(), json!(self.config.default_config_id));
        fields.insert(field::PARENT_ID.into(), json!(""));
        fields.insert(field::ANCHOR.into(), Value::Array(Vec::new()));
        fields.insert(field::BOOST.into(), json!(1.0));
        fields.insert(field::MIMETYPE.into(), json!("text/plain"));

        indexer.update_language(&mut fields);

        let doc_id = match document.id() {
            Some(id) => id.to_string(),
            None => indexer.generate_doc_id(&fields),
        };
        fields.insert(field::DOC_ID.into(), json!(doc_id));
        fields
    }
}

/// Hex SHA-256 of the document text, used for synthesized URLs.
pub fn content_digest(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}
