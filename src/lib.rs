//! Workspace umbrella crate for the retrieval plugin gateway.
//!
//! Re-exports the request entities from `retrieval-entity` and the HTTP
//! layer from `retrieval-server` so callers can embed the gateway with a
//! single dependency.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use retrieval_plugin::{ServerConfig, ServerState, build_router};
//!
//! let state = ServerState::in_memory(ServerConfig::default());
//! let app = build_router(Arc::new(state));
//! # let _ = app;
//! ```

pub use entity::{
    DEFAULT_TOP_K, Document, DocumentParser, Filter, Metadata, ParseError, Query, QueryParser,
    Source, date,
};
pub use server::{
    AccessToken, ApiError, ApiResult, Authenticator, FieldMap, IndexError, Indexer, MemoryIndex,
    MemoryTokenStore, Permissions, SearchError, SearchParams, SearchService, ServerConfig,
    ServerState, TokenFailure, TokenStore, build_router, start_server,
};
