use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Server configuration
///
/// Loaded from an optional `server.{toml,yaml,json}` file and then from
/// `RETRIEVAL__*` environment variables (`__` separates nested keys, `,`
/// separates list items), e.g. `RETRIEVAL__VERIFICATION_TOKEN=secret` or
/// `RETRIEVAL__CORS__ORIGINS=https://a.example,https://b.example`.
///
/// Read once at startup; the rendered manifest and the token store are built
/// from it then, so changes take effect after a restart.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Server bind address
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum request body size in MB
    #[serde(default = "default_max_body_size_mb")]
    pub max_body_size_mb: usize,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Metrics endpoint enabled
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,

    /// Prefix of the authenticated endpoints (`{prefix}/query`, `{prefix}/upsert`)
    #[serde(default = "default_path_prefix")]
    pub path_prefix: String,

    /// Bearer verification token advertised in the manifest. Empty means open mode.
    #[serde(default)]
    pub verification_token: String,

    /// Put error chains into `loc` instead of an opaque error code
    #[serde(default)]
    pub verbose_errors: bool,

    /// Fields the search engine returns for each hit
    #[serde(default = "default_response_fields")]
    pub response_fields: Vec<String>,

    /// Base of synthesized URLs for documents ingested without one
    #[serde(default = "default_document_base_url")]
    pub document_base_url: String,

    /// Roles appended to every ingested document and search
    #[serde(default = "default_roles")]
    pub default_roles: Vec<String>,

    #[serde(default)]
    pub default_virtual_hosts: Vec<String>,

    #[serde(default)]
    pub default_host: String,

    #[serde(default)]
    pub default_config_id: String,

    /// How a non-positive `top_k` is forwarded to the search engine
    #[serde(default)]
    pub top_k_policy: TopKPolicy,

    /// Largest `start + page_size` the in-memory search accepts
    #[serde(default = "default_max_result_window")]
    pub max_result_window: usize,

    #[serde(default)]
    pub cors: CorsConfig,

    #[serde(default)]
    pub plugin: PluginConfig,

    /// Access tokens served by the in-memory token store (in production, use the host store)
    #[serde(default)]
    pub access_tokens: Vec<AccessTokenConfig>,
}

/// Treatment of `top_k <= 0`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TopKPolicy {
    /// Replace with the default of 3
    #[default]
    Default,
    /// Forward unchanged and let the engine decide
    PassThrough,
}

/// Cross-origin settings for browser-hosted plugin clients
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
    #[serde(default = "default_cors_origins")]
    pub origins: Vec<String>,

    #[serde(default = "default_cors_headers")]
    pub headers: String,

    #[serde(default = "default_true")]
    pub credentials: bool,

    #[serde(default = "default_true")]
    pub private_network: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            origins: default_cors_origins(),
            headers: default_cors_headers(),
            credentials: true,
            private_network: true,
        }
    }
}

/// Overrides for the served discovery manifest and OpenAPI document.
/// Unset values keep the shipped defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PluginConfig {
    pub name_for_model: Option<String>,
    pub name_for_human: Option<String>,
    pub description_for_model: Option<String>,
    pub description_for_human: Option<String>,
    pub openapi_yaml_url: Option<String>,
    pub logo_url: Option<String>,
    pub openapi_server_url: Option<String>,
}

/// One entry of the in-memory token store
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccessTokenConfig {
    pub token: String,

    #[serde(default)]
    pub permissions: Vec<String>,

    /// Epoch millis; absent or non-positive never expires
    #[serde(default)]
    pub expired_time: Option<i64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
            timeout_secs: default_timeout_secs(),
            max_body_size_mb: default_max_body_size_mb(),
            log_level: default_log_level(),
            metrics_enabled: default_true(),
            path_prefix: default_path_prefix(),
            verification_token: String::new(),
            verbose_errors: false,
            response_fields: default_response_fields(),
            document_base_url: default_document_base_url(),
            default_roles: default_roles(),
            default_virtual_hosts: Vec::new(),
            default_host: String::new(),
            default_config_id: String::new(),
            top_k_policy: TopKPolicy::default(),
            max_result_window: default_max_result_window(),
            cors: CorsConfig::default(),
            plugin: PluginConfig::default(),
            access_tokens: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables and config files
    pub fn load() -> anyhow::Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }

        let builder = config::Config::builder()
            // Load from file if exists
            .add_source(config::File::with_name("server").required(false))
            // Override with environment variables
            .add_source(
                config::Environment::with_prefix("RETRIEVAL")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("response_fields")
                    .with_list_parse_key("default_roles")
                    .with_list_parse_key("default_virtual_hosts")
                    .with_list_parse_key("cors.origins")
                    .try_parsing(true),
            );

        let config: ServerConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        if config.verification_token.is_empty() {
            tracing::warn!("No verification token configured, plugin endpoints run in open mode");
        }

        Ok(config)
    }

    /// Reject settings the router cannot work with
    pub fn validate(&self) -> anyhow::Result<()> {
        let prefix = self.path_prefix.trim_end_matches('/');
        if !prefix.starts_with('/') || prefix.len() < 2 {
            anyhow::bail!(
                "path_prefix must start with '/' and name at least one segment, got {:?}",
                self.path_prefix
            );
        }
        if prefix[1..].contains('/') {
            anyhow::bail!("path_prefix must be a single segment, got {:?}", self.path_prefix);
        }
        if self.port == 0 {
            anyhow::bail!("port must be non-zero");
        }
        Ok(())
    }

    /// Prefix without a trailing slash
    pub fn prefix(&self) -> &str {
        self.path_prefix.trim_end_matches('/')
    }

    /// Whether requests must present a bearer token
    pub fn is_token_gated(&self) -> bool {
        !self.verification_token.trim().is_empty()
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr_str = format!("{}:{}", self.bind_addr, self.port);
        Ok(addr_str.parse()?)
    }

    /// Get request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Get max body size in bytes
    pub fn max_body_size(&self) -> usize {
        self.max_body_size_mb * 1024 * 1024
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_body_size_mb() -> usize {
    10
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_path_prefix() -> String {
    "/chatgpt".to_string()
}

fn default_response_fields() -> Vec<String> {
    [
        "_id", "doc_id", "content", "label", "filename", "url", "timestamp", "author", "score",
        "embedding",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_document_base_url() -> String {
    "http://localhost:8080/".to_string()
}

fn default_roles() -> Vec<String> {
    vec!["Rguest".to_string()]
}

fn default_max_result_window() -> usize {
    10_000
}

fn default_cors_origins() -> Vec<String> {
    vec!["https://chat.openai.com".to_string()]
}

fn default_cors_headers() -> String {
    "*".to_string()
}
