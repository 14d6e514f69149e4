use std::sync::Arc;

use axum::body::Bytes;
use axum::Json;
use entity::QueryParser;
use serde::{Deserialize, Serialize};

use crate::auth::Permissions;
use crate::error::{ApiError, ApiResult};
use crate::params;
use crate::results::QueryResult;
use crate::state::ServerState;

/// Response of `{prefix}/query`
#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub results: Vec<QueryResult>,
}

/// Run every query of the body, one result block per query, in order.
///
/// Searches run back to back on one blocking worker. The first failing
/// search fails the whole request.
pub async fn process_queries(
    state: Arc<ServerState>,
    permissions: Permissions,
    locale: Option<String>,
    body: Bytes,
) -> ApiResult<Json<QueryResponse>> {
    let queries = QueryParser::new(body.as_ref()).parse()?;

    let searches: Vec<_> = queries
        .iter()
        .map(|query| params::build(query, &state.config, &permissions, locale.as_deref()))
        .collect();

    metrics::counter!("retrieval_queries_total").increment(searches.len() as u64);

    let search = state.search.clone();
    let rows = tokio::task::spawn_blocking(move || {
        searches
            .iter()
            .map(|params| search.search(params))
            .collect::<Result<Vec<_>, _>>()
    })
    .await?
    .map_err(ApiError::from_search)?;

    let results = queries
        .iter()
        .zip(rows)
        .map(|(query, rows)| QueryResult::from_rows(query.text(), &rows))
        .collect::<Vec<_>>();

    tracing::info!(
        queries = results.len(),
        hits = results.iter().map(|r| r.top_k).sum::<usize>(),
        "queries processed"
    );

    Ok(Json(QueryResponse { results }))
}
