use crate::error::ApiError;
use crate::state::ServerState;
use axum::extract::{Query, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use headers::authorization::Bearer;
use headers::{Authorization, HeaderMapExt};
use std::collections::HashMap;
use std::sync::Arc;

/// Request id attached to request extensions and echoed as `x-request-id`
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Bearer token authentication middleware
///
/// Runs once per prefixed request. On success the resolved
/// [`Permissions`](crate::auth::Permissions) are inserted into the request
/// extensions for the handlers.
pub async fn bearer_auth(
    State(state): State<Arc<ServerState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(&request);
    let authenticator = state.authenticator.clone();
    let now = chrono::Utc::now().timestamp_millis();

    let result =
        tokio::task::spawn_blocking(move || authenticator.authenticate(token.as_deref(), now))
            .await?;

    match result {
        Ok(permissions) => {
            tracing::debug!(permissions = ?permissions.as_slice(), "request authorized");
            request.extensions_mut().insert(permissions);
            Ok(next.run(request).await)
        }
        Err(err) => {
            if let ApiError::InvalidAccessToken(kind) = &err {
                metrics::counter!("retrieval_auth_failures_total", "kind" => kind.as_str())
                    .increment(1);
            }
            Err(err)
        }
    }
}

/// Bearer token from the typed header, a raw `Authorization` value, or the
/// `access_token` query parameter, in that order
fn extract_token(request: &Request) -> Option<String> {
    if let Some(Authorization(bearer)) = request.headers().typed_get::<Authorization<Bearer>>() {
        let token = bearer.token().trim();
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }

    if let Some(raw) = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        let raw = raw.trim();
        // A bare scheme carries no token.
        let token = match raw.get(..7) {
            _ if raw.eq_ignore_ascii_case("bearer") => "",
            Some(scheme) if scheme.eq_ignore_ascii_case("bearer ") => &raw[7..],
            _ => raw,
        };
        if !token.trim().is_empty() {
            return Some(token.trim().to_string());
        }
    }

    Query::<HashMap<String, String>>::try_from_uri(request.uri())
        .ok()
        .and_then(|Query(mut params)| params.remove("access_token"))
        .filter(|token| !token.trim().is_empty())
}

/// Request ID injection middleware
pub async fn request_id(mut request: Request, next: Next) -> Response {
    // Generate or extract request ID
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    // Add to request extensions for handlers to access
    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }

    response
}

/// Logging middleware
pub async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();

    tracing::info!(
        method = %method,
        uri = %uri,
        request_id = %request_id,
        "Request started"
    );

    let response = next.run(request).await;
    let duration = start.elapsed();
    let status = response.status();

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %status,
        duration_ms = %duration.as_millis(),
        request_id = %request_id,
        "Request completed"
    );

    response
}

/// Error rendering middleware
///
/// Turns an [`ApiError`] left in the response extensions into the
/// `{"detail":[..]}` envelope.
pub async fn render_errors(
    State(state): State<Arc<ServerState>>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    match response.extensions_mut().remove::<Arc<ApiError>>() {
        Some(error) => error.render(state.config.verbose_errors),
        None => response,
    }
}
