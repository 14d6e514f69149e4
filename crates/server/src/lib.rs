//! Retrieval Server - AI plugin gateway in front of a full-text search engine
//!
//! This crate exposes a search platform through the AI plugin convention: a
//! discovery manifest, an OpenAPI document and two JSON endpoints. It is a
//! translation and policy layer only. Searching, storage and token issuance
//! belong to the collaborators in [`backend`] and [`auth`].
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use server::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::load()?;
//!     server::start_server(config).await?;
//!     Ok(())
//! }
//! ```
//!
//! # API Endpoints
//!
//! ## Public Endpoints (No Authentication, GET only)
//!
//! - `/.well-known/ai-plugin.json` - Discovery manifest
//! - `/.well-known/openapi.yaml` - OpenAPI document
//! - `/.well-known/logo.png` - Logo
//! - `/health` - Liveness probe
//! - `/metrics` - Prometheus metrics
//!
//! ## Prefixed Endpoints (Bearer token when configured)
//!
//! - `POST {prefix}/query` - Run search queries
//! - `POST {prefix}/upsert` - Index documents
//! - `{prefix}/upsert-file` - Not supported, always 404
//!
//! Failures use one envelope: `{"detail":[{"msg":"...","loc":["..."]}]}`.

pub mod auth;
pub mod backend;
pub mod config;
pub mod error;
pub mod manifest;
pub mod mapper;
pub mod memory;
pub mod middleware;
pub mod params;
pub mod results;
pub mod routes;
pub mod server;
pub mod state;

pub use auth::{AccessToken, Authenticator, Permissions, TokenFailure, TokenStore};
pub use backend::{FieldMap, IndexError, Indexer, SearchError, SearchParams, SearchService};
pub use config::ServerConfig;
pub use error::{ApiError, ApiResult};
pub use memory::{MemoryIndex, MemoryTokenStore};
pub use server::{build_router, start_server};
pub use state::ServerState;
