//! Unauthenticated discovery endpoints.
use std::sync::Arc;

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;

use crate::manifest::LOGO_PNG;
use crate::state::ServerState;

/// `GET /.well-known/ai-plugin.json`
pub async fn ai_plugin(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    (
        [(CONTENT_TYPE, "application/json")],
        state.manifest.ai_plugin_json().to_string(),
    )
}

/// `GET /.well-known/openapi.yaml`
pub async fn openapi(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    (
        [(CONTENT_TYPE, "text/yaml; charset=utf-8")],
        state.manifest.openapi_yaml().to_string(),
    )
}

/// `GET /.well-known/logo.png`
pub async fn logo() -> impl IntoResponse {
    ([(CONTENT_TYPE, "image/png")], LOGO_PNG)
}
