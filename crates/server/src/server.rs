//! Server initialization and routing
//!
//! This module handles the Axum server setup including:
//! - Router configuration for the well-known, prefixed and health endpoints
//! - Middleware stack (auth, error rendering, logging, compression, CORS)
//! - Graceful shutdown handling

use crate::config::{CorsConfig, ServerConfig};
use crate::middleware::{bearer_auth, log_requests, render_errors, request_id};
use crate::routes::{dispatch, health, not_found, well_known};
use crate::state::ServerState;
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{any, get};
use axum::Router;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Build the Axum router with all routes and middleware
///
/// Routes are divided into:
/// - Public routes: `/.well-known/*` (GET only), `/health`, `/metrics`
/// - Prefixed routes: `{prefix}` and everything below it, behind the bearer
///   middleware and resolved by [`dispatch`]
///
/// Middleware stack (innermost first):
/// 1. Error rendering
/// 2. Timeout handling
/// 3. Compression
/// 4. CORS
/// 5. Request ID tracking
/// 6. Request logging
/// 7. Tracing
pub fn build_router(state: Arc<ServerState>) -> Router {
    let prefix = state.config.prefix().to_string();

    // Other methods on these paths get the generic 404, not a 405
    let public_routes = Router::new()
        .route(
            "/.well-known/ai-plugin.json",
            get(well_known::ai_plugin).fallback(not_found),
        )
        .route(
            "/.well-known/openapi.yaml",
            get(well_known::openapi).fallback(not_found),
        )
        .route(
            "/.well-known/logo.png",
            get(well_known::logo).fallback(not_found),
        )
        .route("/health", get(health::health_check).fallback(not_found))
        .route("/metrics", get(health::metrics).fallback(not_found));

    let prefixed_routes = Router::new()
        .route(&prefix, any(dispatch))
        .route(&format!("{prefix}/{{*rest}}"), any(dispatch))
        .route_layer(from_fn_with_state(state.clone(), bearer_auth));

    Router::new()
        .merge(public_routes)
        .merge(prefixed_routes)
        .fallback(not_found)
        .layer(from_fn_with_state(state.clone(), render_errors))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            state.config.timeout(),
        ))
        .layer(CompressionLayer::new())
        .layer(cors_layer(&state.config.cors))
        .layer(from_fn(request_id))
        .layer(from_fn(log_requests))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS policy for browser-hosted plugin clients
///
/// A `*` origin or header list is answered by mirroring the request, which
/// stays valid when credentials are allowed.
pub fn cors_layer(cors: &CorsConfig) -> CorsLayer {
    let origin = if cors.origins.iter().any(|o| o.trim() == "*") {
        AllowOrigin::mirror_request()
    } else {
        let origins: Vec<HeaderValue> = cors
            .origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o.trim()) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    let headers = if cors.headers.trim() == "*" {
        AllowHeaders::mirror_request()
    } else {
        let names: Vec<HeaderName> = cors
            .headers
            .split(',')
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .filter_map(|h| HeaderName::from_bytes(h.as_bytes()).ok())
            .collect();
        AllowHeaders::list(names)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_headers(headers)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_credentials(cors.credentials)
        .allow_private_network(cors.private_network)
}

/// Start the retrieval plugin HTTP server
///
/// Initializes the server with the provided configuration and starts listening
/// for incoming HTTP requests. This function will block until the server is
/// shut down via SIGTERM or Ctrl+C.
///
/// # Example
///
/// ```rust,no_run
/// use server::ServerConfig;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = ServerConfig::load()?;
///     server::start_server(config).await?;
///     Ok(())
/// }
/// ```
///
/// # Initialization
///
/// 1. Sets up structured JSON logging with the configured log level
/// 2. Installs the Prometheus recorder when metrics are enabled
/// 3. Creates shared server state (in-memory token store and index)
/// 4. Builds the Axum router and binds to the configured TCP address
pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .json()
        .init();

    let mut state = ServerState::in_memory(config.clone());
    if config.metrics_enabled {
        let handle = PrometheusBuilder::new().install_recorder()?;
        state = state.with_metrics(handle);
    }

    let app = build_router(Arc::new(state));

    // Parse bind address
    let addr: SocketAddr = config.socket_addr()?;

    tracing::info!(
        "Starting retrieval server on {} under prefix {}",
        addr,
        config.prefix()
    );
    tracing::info!(
        "Auth: {}, access tokens: {}",
        if config.is_token_gated() { "token" } else { "open" },
        config.access_tokens.len()
    );
    tracing::info!(
        "Timeout: {}s, Max body: {}MB",
        config.timeout_secs,
        config.max_body_size_mb
    );
    tracing::info!(
        "CORS origins: {:?}, Metrics: {}",
        config.cors.origins,
        config.metrics_enabled
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Shutdown signal handler
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
