//! Builds engine [`SearchParams`] from a decoded [`Query`].
use std::collections::BTreeMap;

use entity::{Query, DEFAULT_TOP_K};

use crate::auth::Permissions;
use crate::backend::{field, SearchParams};
use crate::config::{ServerConfig, TopKPolicy};

/// Translate one query.
///
/// `locale` is the raw `Accept-Language` header value, if any.
pub fn build(
    query: &Query,
    config: &ServerConfig,
    permissions: &Permissions,
    locale: Option<&str>,
) -> SearchParams {
    SearchParams {
        query: query.text().to_string(),
        fields: field_filters(query),
        conditions: BTreeMap::new(),
        extra_queries: date_range(query).into_iter().collect(),
        start_position: 0,
        page_size: page_size(query.top_k(), config.top_k_policy),
        languages: Vec::new(),
        locale: locale.and_then(primary_language),
        response_fields: config.response_fields.clone(),
        roles: permissions.with_defaults(&config.default_roles),
    }
}

fn field_filters(query: &Query) -> BTreeMap<String, Vec<String>> {
    let filter = query.filter();
    let mut fields = BTreeMap::new();
    let mut put = |name: &str, value: Option<&str>| {
        if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
            fields.insert(name.to_string(), vec![value.to_string()]);
        }
    };
    put(field::DOC_ID, filter.document_id());
    put(field::LABEL, filter.source().label());
    put(field::FILENAME, filter.source_id());
    put(field::AUTHOR, filter.author());
    fields
}

/// `timestamp:[start end]`, `*` for an open side; `None` when both are open.
fn date_range(query: &Query) -> Option<String> {
    let filter = query.filter();
    let (start, end) = (filter.start_date(), filter.end_date());
    if start.is_none() && end.is_none() {
        return None;
    }
    Some(format!(
        "{}:[{} {}]",
        field::TIMESTAMP,
        start.as_deref().unwrap_or("*"),
        end.as_deref().unwrap_or("*")
    ))
}

fn page_size(top_k: i32, policy: TopKPolicy) -> i32 {
    match policy {
        TopKPolicy::Default if top_k <= 0 => DEFAULT_TOP_K,
        _ => top_k,
    }
}

/// First language tag of an `Accept-Language` value, without its weight.
fn primary_language(header: &str) -> Option<String> {
    header
        .split(',')
        .map(|tag| tag.split(';').next().unwrap_or("").trim())
        .find(|tag| !tag.is_empty() && *tag != "*")
        .map(str::to_string)
}
