//! API route handlers
//!
//! - `well_known`: discovery manifest, OpenAPI document and logo
//! - `query`: `{prefix}/query`
//! - `upsert`: `{prefix}/upsert`
//! - `health`: liveness and metrics
//!
//! Everything under the path prefix goes through [`dispatch`], which runs
//! after the bearer middleware and picks the sub-route itself.

pub mod health;
pub mod query;
pub mod upsert;
pub mod well_known;

use std::sync::Arc;

use axum::body::{to_bytes, Bytes};
use axum::extract::{Request, State};
use axum::http::header::ACCEPT_LANGUAGE;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::auth::Permissions;
use crate::error::{ApiError, ApiResult};
use crate::state::ServerState;

/// Message of the generic 404.
pub const UNKNOWN_REQUEST: &str = "Cannot understand your request.";

/// Sub-route of a prefixed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Query,
    Upsert,
    UpsertFile,
    Unknown,
}

/// Pick the endpoint from the segment after the prefix.
///
/// Only reached for paths the router matched under the prefix. Repeated
/// slashes after the prefix are collapsed, so `/chatgpt//query` is `query`.
pub fn resolve_endpoint(path: &str, method: &Method, prefix: &str) -> Endpoint {
    let collapsed = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>();
    let prefix = prefix.trim_matches('/');

    match collapsed.as_slice() {
        [head, endpoint, ..] if *head == prefix => match *endpoint {
            "upsert-file" => Endpoint::UpsertFile,
            "upsert" if *method == Method::POST => Endpoint::Upsert,
            "query" if *method == Method::POST => Endpoint::Query,
            _ => Endpoint::Unknown,
        },
        _ => Endpoint::Unknown,
    }
}

/// Handler for every path under the prefix.
pub async fn dispatch(State(state): State<Arc<ServerState>>, request: Request) -> ApiResult<Response> {
    let endpoint = resolve_endpoint(request.uri().path(), request.method(), state.config.prefix());
    tracing::debug!(path = %request.uri().path(), ?endpoint, "dispatch");

    match endpoint {
        Endpoint::Query => {
            let permissions = permissions(&request);
            let locale = request
                .headers()
                .get(ACCEPT_LANGUAGE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = read_body(request, state.config.max_body_size()).await?;
            let response = query::process_queries(state, permissions, locale, body).await?;
            Ok(response.into_response())
        }
        Endpoint::Upsert => {
            let permissions = permissions(&request);
            let body = read_body(request, state.config.max_body_size()).await?;
            let response = upsert::process_upsert(state, permissions, body).await?;
            Ok(response.into_response())
        }
        Endpoint::UpsertFile => Err(ApiError::not_found("upsert-file is not supported.")),
        Endpoint::Unknown => Err(ApiError::not_found(UNKNOWN_REQUEST)),
    }
}

/// Set by the bearer middleware; empty when it did not run.
fn permissions(request: &Request) -> Permissions {
    request
        .extensions()
        .get::<Permissions>()
        .cloned()
        .unwrap_or_default()
}

async fn read_body(request: Request, limit: usize) -> ApiResult<Bytes> {
    to_bytes(request.into_body(), limit)
        .await
        .map_err(|_| ApiError::InvalidRequest {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            message: "Cannot read your request body.".to_string(),
        })
}

/// 404 Not Found handler
pub async fn not_found() -> ApiError {
    ApiError::not_found(UNKNOWN_REQUEST)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_endpoint() {
        let post = Method::POST;
        assert_eq!(resolve_endpoint("/chatgpt/query", &post, "/chatgpt"), Endpoint::Query);
        assert_eq!(resolve_endpoint("/chatgpt/upsert", &post, "/chatgpt"), Endpoint::Upsert);
        assert_eq!(resolve_endpoint("//chatgpt///query/", &post, "/chatgpt"), Endpoint::Query);
        assert_eq!(
            resolve_endpoint("/chatgpt/upsert-file", &Method::GET, "/chatgpt"),
            Endpoint::UpsertFile
        );
    }

    #[test]
    fn test_unknown_combinations() {
        assert_eq!(
            resolve_endpoint("/chatgpt/query", &Method::GET, "/chatgpt"),
            Endpoint::Unknown
        );
        assert_eq!(
            resolve_endpoint("/chatgpt/upsert", &Method::PUT, "/chatgpt"),
            Endpoint::Unknown
        );
        assert_eq!(resolve_endpoint("/chatgpt", &Method::POST, "/chatgpt"), Endpoint::Unknown);
        assert_eq!(
            resolve_endpoint("/chatgpt/delete", &Method::POST, "/chatgpt"),
            Endpoint::Unknown
        );
        assert_eq!(
            resolve_endpoint("/other/query", &Method::POST, "/chatgpt"),
            Endpoint::Unknown
        );
    }
}
