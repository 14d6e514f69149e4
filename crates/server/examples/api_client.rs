//! Examples for using the retrieval plugin API
//!
//! Start the server first, optionally token-gated:
//!
//! ```text
//! RETRIEVAL__VERIFICATION_TOKEN=verify cargo run -p retrieval-server
//! ```
//!
//! `ACCESS_TOKEN` is sent as the bearer token when set.

use reqwest::Client;
use serde_json::json;

const SERVER_URL: &str = "http://localhost:8080";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let client = Client::new();
    let token = std::env::var("ACCESS_TOKEN").ok();

    let post = |path: &str| {
        let request = client.post(format!("{SERVER_URL}{path}"));
        match &token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    };

    // Example 1: Health check
    println!("1. Health Check:");
    let resp = client.get(format!("{SERVER_URL}/health")).send().await?;
    println!("Status: {}", resp.status());
    println!("Body: {}", resp.text().await?);
    println!();

    // Example 2: Discovery manifest
    println!("2. Discovery Manifest:");
    let resp = client
        .get(format!("{SERVER_URL}/.well-known/ai-plugin.json"))
        .send()
        .await?;
    println!("Status: {}", resp.status());
    println!("Body: {}", resp.text().await?);
    println!();

    // Example 3: Upsert documents
    println!("3. Upsert Documents:");
    let resp = post("/chatgpt/upsert")
        .json(&json!({
            "documents": [
                {
                    "id": "note-001",
                    "text": "The quarterly report is due on Friday.",
                    "metadata": {
                        "source": "email",
                        "source_id": "msg-42",
                        "author": "alice",
                        "created_at": "2024-03-01T09:30:00Z"
                    }
                },
                {
                    "text": "Team chat: the report draft is in the shared folder.",
                    "metadata": { "source": "chat" }
                }
            ]
        }))
        .send()
        .await?;
    println!("Status: {}", resp.status());
    println!("Body: {}", resp.text().await?);
    println!();

    // Example 4: Query with a filter
    println!("4. Query:");
    let resp = post("/chatgpt/query")
        .header("Accept-Language", "en-US,en;q=0.9")
        .json(&json!({
            "queries": [
                { "query": "report", "top_k": 5 },
                {
                    "query": "report",
                    "filter": { "source": "email", "start_date": "2024-01-01" }
                }
            ]
        }))
        .send()
        .await?;
    println!("Status: {}", resp.status());
    println!("Body: {}", resp.text().await?);
    println!();

    // Example 5: Error envelope
    println!("5. Unsupported Endpoint:");
    let resp = post("/chatgpt/upsert-file").send().await?;
    println!("Status: {}", resp.status());
    println!("Body: {}", resp.text().await?);

    Ok(())
}
