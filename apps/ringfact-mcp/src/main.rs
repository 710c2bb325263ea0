//! # ringfact MCP Server
//!
//! Entry point for the MCP (Model Context Protocol) bridge to ringfact.
//!
//! Reads configuration from environment variables:
//! - `RINGFACT_URL` - ringfact server URL (default: `http://localhost:8080`)
//! - `RINGFACT_API_KEY` - optional Bearer token for authentication
//!
//! Speaks MCP over stdio and forwards every tool call to the ringfact
//! HTTP API.

mod client;
mod server;

use client::RingfactClient;
use rmcp::{ServiceExt, transport::stdio};
use server::RingfactMcp;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout belongs to the MCP transport.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let url = std::env::var("RINGFACT_URL").unwrap_or_else(|_| "http://localhost:8080".into());
    let api_key = std::env::var("RINGFACT_API_KEY").ok();

    tracing::info!("ringfact MCP server starting, target: {}", url);

    let client = RingfactClient::new(url, api_key)?;
    let mcp = RingfactMcp::new(client);

    let service = mcp.serve(stdio()).await.inspect_err(|e| {
        tracing::error!("MCP serve error: {:?}", e);
    })?;

    service.waiting().await?;
    Ok(())
}
