use crate::auth::{Authenticator, TokenStore};
use crate::backend::{Indexer, SearchService};
use crate::config::ServerConfig;
use crate::manifest::Manifest;
use crate::memory::{MemoryIndex, MemoryTokenStore};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct ServerState {
    /// Server configuration, read once at startup
    pub config: Arc<ServerConfig>,

    /// Bearer token resolution
    pub authenticator: Arc<Authenticator>,

    /// Search engine (shared across requests)
    pub search: Arc<dyn SearchService>,

    /// Document indexer (shared across requests)
    pub indexer: Arc<dyn Indexer>,

    /// Discovery documents rendered from the configuration
    pub manifest: Arc<Manifest>,

    /// Prometheus recorder handle, when metrics are enabled
    pub metrics: Option<PrometheusHandle>,
}

impl ServerState {
    /// Create new server state around the host collaborators
    pub fn new(
        config: ServerConfig,
        token_store: Arc<dyn TokenStore>,
        search: Arc<dyn SearchService>,
        indexer: Arc<dyn Indexer>,
    ) -> Self {
        let authenticator = Authenticator::new(config.verification_token.clone(), token_store);
        let manifest = Manifest::render(&config, &authenticator.ai_plugin_auth_json());

        Self {
            config: Arc::new(config),
            authenticator: Arc::new(authenticator),
            search,
            indexer,
            manifest: Arc::new(manifest),
            metrics: None,
        }
    }

    /// State backed by the in-process token store and index
    pub fn in_memory(config: ServerConfig) -> Self {
        let tokens = Arc::new(MemoryTokenStore::from_config(&config.access_tokens));
        let index = Arc::new(MemoryIndex::new(config.max_result_window));
        Self::new(config, tokens, index.clone(), index)
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}
