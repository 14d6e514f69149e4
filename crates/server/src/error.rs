use std::sync::Arc;

use axum::http::header::WWW_AUTHENTICATE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::TokenFailure;
use crate::backend::SearchError;

pub type ApiResult<T> = Result<T, ApiError>;

/// Failure categories of the plugin API
///
/// Handlers return these; [`IntoResponse`] only records the error in the
/// response extensions and the `render_errors` middleware turns it into the
/// wire envelope, so there is one place that writes failure bodies.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Client mistake such as an unknown route or a malformed body.
    /// Rendered without `loc`.
    #[error("{message}")]
    InvalidRequest { status: StatusCode, message: String },

    #[error("Cannot understand your query.")]
    InvalidQuery(#[source] SearchError),

    #[error("{}", .0.message())]
    InvalidAccessToken(TokenFailure),

    #[error("Cannot process your request.")]
    Upstream(#[source] anyhow::Error),
}

/// Error envelope: `{"detail":[{"msg":..,"loc":[..]}]}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: Vec<ErrorDetail>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loc: Option<Vec<String>>,
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::InvalidRequest {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::InvalidRequest {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    /// Search failures split into caller faults and engine faults
    pub fn from_search(err: SearchError) -> Self {
        if err.is_client_error() {
            ApiError::InvalidQuery(err)
        } else {
            ApiError::Upstream(anyhow::Error::new(err))
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest { status, .. } => *status,
            ApiError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidAccessToken(_) => StatusCode::UNAUTHORIZED,
            ApiError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest { .. } => "INVALID_REQUEST",
            ApiError::InvalidQuery(_) => "INVALID_QUERY",
            ApiError::InvalidAccessToken(_) => "INVALID_ACCESS_TOKEN",
            ApiError::Upstream(_) => "UPSTREAM_FAILURE",
        }
    }

    /// The error followed by every cause, one line each
    fn chain_lines(&self) -> Vec<String> {
        let mut lines = vec![self.to_string()];
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            lines.push(format!("caused by: {cause}"));
            source = cause.source();
        }
        lines
    }

    /// Build the wire response.
    ///
    /// `verbose` exposes the cause chain in `loc`; otherwise `loc` carries a
    /// fresh correlation id and the chain only goes to the log.
    pub fn render(&self, verbose: bool) -> Response {
        let loc = match self {
            ApiError::InvalidRequest { .. } => None,
            _ if verbose => Some(self.chain_lines()),
            _ => {
                let error_code = uuid::Uuid::new_v4().to_string();
                tracing::warn!(
                    error_code = %error_code,
                    kind = self.error_code(),
                    detail = %self.chain_lines().join(" | "),
                    "request failed"
                );
                Some(vec![format!("error_code:{error_code}")])
            }
        };

        let body = ErrorResponse {
            detail: vec![ErrorDetail {
                msg: self.to_string(),
                loc,
            }],
        };
        let mut response = (self.status_code(), Json(body)).into_response();

        if let ApiError::InvalidAccessToken(kind) = self {
            let challenge = format!("Bearer error=\"{}\"", kind.as_str());
            if let Ok(value) = HeaderValue::from_str(&challenge) {
                response.headers_mut().insert(WWW_AUTHENTICATE, value);
            }
        }
        response
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = self.status_code().into_response();
        response.extensions_mut().insert(Arc::new(self));
        response
    }
}

impl From<entity::ParseError> for ApiError {
    fn from(err: entity::ParseError) -> Self {
        match err {
            entity::ParseError::Json(_) => ApiError::bad_request("Cannot parse your request body."),
            other => ApiError::Upstream(anyhow::Error::new(other)),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Upstream(anyhow::Error::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_invalid_request_has_no_loc() {
        let response = ApiError::not_found("Cannot understand your request.").render(false);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(
            body,
            serde_json::json!({"detail": [{"msg": "Cannot understand your request."}]})
        );
    }

    #[tokio::test]
    async fn test_opaque_error_code() {
        let err = ApiError::Upstream(anyhow::anyhow!("engine down"));
        let response = err.render(false);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["detail"][0]["msg"], "Cannot process your request.");
        let loc = body["detail"][0]["loc"].as_array().unwrap();
        assert_eq!(loc.len(), 1);
        let code = loc[0].as_str().unwrap();
        assert!(code.starts_with("error_code:"));
        assert!(uuid::Uuid::parse_str(&code["error_code:".len()..]).is_ok());
    }

    #[tokio::test]
    async fn test_verbose_chain() {
        let err = ApiError::from_search(SearchError::InvalidQuery("unbalanced quote".into()));
        let response = err.render(true);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["detail"][0]["msg"], "Cannot understand your query.");
        assert_eq!(
            body["detail"][0]["loc"],
            serde_json::json!([
                "Cannot understand your query.",
                "caused by: invalid query: unbalanced quote"
            ])
        );
    }

    #[tokio::test]
    async fn test_token_failure_adds_challenge() {
        let response = ApiError::InvalidAccessToken(TokenFailure::ExpiredToken).render(false);
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()[WWW_AUTHENTICATE],
            "Bearer error=\"expired_token\""
        );
        let body = body_json(response).await;
        assert_eq!(body["detail"][0]["msg"], "The token is expired.");
    }

    #[test]
    fn test_search_error_classification() {
        let window = SearchError::ResultWindowExceeded { start: 0, size: 20_000, max: 10_000 };
        assert!(matches!(ApiError::from_search(window), ApiError::InvalidQuery(_)));
        let backend = SearchError::Backend(anyhow::anyhow!("io"));
        assert!(matches!(ApiError::from_search(backend), ApiError::Upstream(_)));
    }

    #[test]
    fn test_into_response_defers_rendering() {
        let response = ApiError::bad_request("nope").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.extensions().get::<Arc<ApiError>>().is_some());
    }
}
