//! Retrieval Server - AI plugin gateway binary
//!
//! Serves the plugin API over the in-memory token store and index.

use server::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = ServerConfig::load()?;

    // Start server
    server::start_server(config).await?;

    Ok(())
}
