//! Error protocol tests: every failure leaves the router as
//! `{"detail":[{"msg":..,"loc":[..]}]}` with the right status.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use server::config::AccessTokenConfig;
use server::{
    FieldMap, IndexError, Indexer, SearchError, SearchParams, SearchService, ServerConfig,
    ServerState, build_router, memory::MemoryTokenStore,
};

fn gated_config() -> ServerConfig {
    ServerConfig {
        verification_token: "verify".to_string(),
        access_tokens: vec![
            AccessTokenConfig {
                token: "good".to_string(),
                permissions: vec!["Radmin".to_string()],
                expired_time: None,
            },
            AccessTokenConfig {
                token: "expired".to_string(),
                permissions: vec!["Radmin".to_string()],
                expired_time: Some(1),
            },
            AccessTokenConfig {
                token: "empty".to_string(),
                permissions: Vec::new(),
                expired_time: None,
            },
        ],
        ..ServerConfig::default()
    }
}

fn app(config: ServerConfig) -> Router {
    build_router(Arc::new(ServerState::in_memory(config)))
}

fn post(uri: &str, authorization: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, header::HeaderMap, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, serde_json::from_slice(&bytes).unwrap())
}

fn assert_error_code(body: &Value) {
    let loc = body["detail"][0]["loc"].as_array().expect("loc present");
    assert_eq!(loc.len(), 1);
    assert!(loc[0].as_str().unwrap().starts_with("error_code:"));
}

const QUERY: &str = r#"{"queries":[{"query":"x"}]}"#;

#[tokio::test]
async fn error_missing_token_in_gated_mode() {
    let app = app(gated_config());
    let (status, headers, body) = call(&app, post("/chatgpt/query", None, QUERY)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(headers[header::WWW_AUTHENTICATE], "Bearer error=\"no_token\"");
    assert_eq!(body["detail"][0]["msg"], "The token is not specified.");
    assert_error_code(&body);
}

#[tokio::test]
async fn error_token_failure_kinds() {
    let app = app(gated_config());
    for (token, kind) in [
        ("Bearer unknown", "invalid_token"),
        ("Bearer expired", "expired_token"),
        ("Bearer empty", "no_permissions"),
    ] {
        let (status, headers, body) = call(&app, post("/chatgpt/upsert", Some(token), "{}")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{token}");
        assert_eq!(
            headers[header::WWW_AUTHENTICATE],
            format!("Bearer error=\"{kind}\"").as_str()
        );
        assert_error_code(&body);
    }

    let (status, _, _) = call(&app, post("/chatgpt/query", Some("Bearer good"), QUERY)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn error_auth_runs_before_dispatch() {
    let app = app(gated_config());
    let (status, headers, _) = call(&app, post("/chatgpt/no-such-endpoint", None, "")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(headers.contains_key(header::WWW_AUTHENTICATE));
}

#[tokio::test]
async fn error_open_mode_still_rejects_bad_tokens() {
    let app = app(ServerConfig::default());
    let (status, _, _) = call(&app, post("/chatgpt/query", None, QUERY)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, headers, _) = call(&app, post("/chatgpt/query", Some("Bearer nope"), QUERY)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(headers[header::WWW_AUTHENTICATE], "Bearer error=\"invalid_token\"");
}

#[tokio::test]
async fn error_empty_bearer_counts_as_no_token() {
    let open = app(ServerConfig::default());
    let (status, _, body) = call(&open, post("/chatgpt/query", Some("Bearer "), QUERY)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"][0]["query"], "x");

    let gated = app(gated_config());
    let (status, headers, body) = call(&gated, post("/chatgpt/query", Some("Bearer "), QUERY)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(headers[header::WWW_AUTHENTICATE], "Bearer error=\"no_token\"");
    assert_eq!(body["detail"][0]["msg"], "The token is not specified.");
}

#[tokio::test]
async fn error_unknown_routes_are_generic_404() {
    let app = app(ServerConfig::default());
    let generic = json!({"detail": [{"msg": "Cannot understand your request."}]});

    let get_query = Request::builder()
        .uri("/chatgpt/query")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = call(&app, get_query).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, generic);

    let (status, _, body) = call(&app, post("/chatgpt/delete", None, "{}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, generic);

    let (status, _, body) = call(&app, post("//chatgpt/query", None, QUERY)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, generic);

    let (status, _, body) = call(&app, post("/somewhere/else", None, "{}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, generic);

    let (status, _, body) = call(&app, post("/.well-known/ai-plugin.json", None, "{}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, generic);
}

#[tokio::test]
async fn error_upsert_file_not_supported() {
    let app = app(ServerConfig::default());
    let (status, _, body) = call(&app, post("/chatgpt/upsert-file", None, "")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"][0]["msg"], "upsert-file is not supported.");
    assert!(body["detail"][0].get("loc").is_none());
}

#[tokio::test]
async fn error_malformed_json_is_bad_request() {
    let app = app(ServerConfig::default());
    let (status, _, body) = call(&app, post("/chatgpt/query", None, "{\"queries\": [")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"][0]["msg"], "Cannot parse your request body.");
}

#[tokio::test]
async fn error_invalid_query_is_400() {
    let app = app(ServerConfig::default());
    let (status, _, body) = call(
        &app,
        post("/chatgpt/query", None, r#"{"queries":[{"query":"\"unterminated"}]}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"][0]["msg"], "Cannot understand your query.");
    assert_error_code(&body);
}

#[tokio::test]
async fn error_result_window_is_400() {
    let mut config = ServerConfig::default();
    config.max_result_window = 5;
    let app = app(config);
    let (status, _, body) = call(
        &app,
        post("/chatgpt/query", None, r#"{"queries":[{"query":"x","top_k":6}]}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"][0]["msg"], "Cannot understand your query.");
}

#[tokio::test]
async fn error_verbose_mode_exposes_chain() {
    let mut config = ServerConfig::default();
    config.verbose_errors = true;
    let app = app(config);
    let (status, _, body) = call(
        &app,
        post("/chatgpt/query", None, r#"{"queries":[{"query":"\"oops"}]}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let loc: Vec<&str> = body["detail"][0]["loc"]
        .as_array()
        .unwrap()
        .iter()
        .map(|line| line.as_str().unwrap())
        .collect();
    assert_eq!(loc[0], "Cannot understand your query.");
    assert!(loc[1].starts_with("caused by: invalid query: unbalanced quotes"));
}

struct BrokenEngine;

impl SearchService for BrokenEngine {
    fn search(&self, _: &SearchParams) -> Result<Vec<FieldMap>, SearchError> {
        Err(SearchError::Backend(anyhow::anyhow!("connection refused")))
    }
}

impl Indexer for BrokenEngine {
    fn add_all(&self, _: Vec<FieldMap>) -> Result<Vec<String>, IndexError> {
        Err(IndexError::Backend(anyhow::anyhow!("disk full")))
    }
}

fn broken_app(verbose: bool) -> Router {
    let config = ServerConfig {
        verbose_errors: verbose,
        ..ServerConfig::default()
    };
    let engine = Arc::new(BrokenEngine);
    let state = ServerState::new(config, Arc::new(MemoryTokenStore::new()), engine.clone(), engine);
    build_router(Arc::new(state))
}

#[tokio::test]
async fn error_engine_failure_is_500_with_opaque_code() {
    let app = broken_app(false);
    let (status, _, body) = call(&app, post("/chatgpt/query", None, QUERY)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["detail"][0]["msg"], "Cannot process your request.");
    assert_error_code(&body);
    assert!(!body.to_string().contains("connection refused"));
}

#[tokio::test]
async fn error_indexer_failure_verbose() {
    let app = broken_app(true);
    let (status, _, body) = call(
        &app,
        post("/chatgpt/upsert", None, r#"{"documents":[{"text":"t"}]}"#),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["detail"][0]["loc"][1], "caused by: disk full");
}
