use std::sync::Arc;

use axum::body::Bytes;
use axum::Json;
use chrono::Utc;
use entity::DocumentParser;
use serde::{Deserialize, Serialize};

use crate::auth::Permissions;
use crate::backend::IndexError;
use crate::error::{ApiError, ApiResult};
use crate::mapper::FieldMapper;
use crate::state::ServerState;

/// Response of `{prefix}/upsert`
#[derive(Debug, Serialize, Deserialize)]
pub struct UpsertResponse {
    pub ids: Vec<String>,
}

/// Map every document of the body and hand the batch to the indexer in one call.
pub async fn process_upsert(
    state: Arc<ServerState>,
    permissions: Permissions,
    body: Bytes,
) -> ApiResult<Json<UpsertResponse>> {
    let documents = DocumentParser::new(body.as_ref()).parse()?;
    if documents.is_empty() {
        return Ok(Json(UpsertResponse { ids: Vec::new() }));
    }

    let mapper = FieldMapper::new(&state.config, &permissions, Utc::now());
    let fields = mapper.map_all(&documents, state.indexer.as_ref());
    let segment = mapper.segment().to_string();

    let indexer = state.indexer.clone();
    let ids = tokio::task::spawn_blocking(move || indexer.add_all(fields))
        .await?
        .map_err(|err| match err {
            IndexError::Rejected(reason) => ApiError::bad_request(reason),
            IndexError::Backend(err) => ApiError::Upstream(err),
        })?;

    metrics::counter!("retrieval_documents_upserted_total").increment(ids.len() as u64);
    tracing::info!(documents = ids.len(), segment = %segment, "documents upserted");

    Ok(Json(UpsertResponse { ids }))
}
