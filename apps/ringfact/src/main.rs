//! # ringfact - Content-Addressed Ring Algebra Server
//!
//! The main binary for the ringfact engine.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for kernel, derivation and graph operations
//! - Dual-verification object store over remote gateways
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    apps/ringfact (THE BINARY)                   │
//! │                                                                 │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────┐   │
//! │  │   CLI       │    │   HTTP API  │    │  Gateway client  │   │
//! │  │  (clap)     │    │   (axum)    │    │    (reqwest)     │   │
//! │  └──────┬──────┘    └──────┬──────┘    └────────┬─────────┘   │
//! │         │                  │                    │              │
//! │         └──────────────────┼────────────────────┘              │
//! │                            ▼                                   │
//! │                    ┌───────────────┐                           │
//! │                    │ ringfact-core │                           │
//! │                    │  (THE LOGIC)  │                           │
//! │                    └───────────────┘                           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! ringfact server --host 0.0.0.0 --port 8080 --config ringfact.toml
//!
//! # CLI operations
//! ringfact compute --op add -x 200 -y 100
//! ringfact derive "xor(3,5)"
//! ringfact query "SELECT ?s WHERE { ?s partition:class partition:UnitSet }"
//! ```

use clap::Parser;
use ringfact::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // RINGFACT_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("RINGFACT_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ringfact=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the startup banner.
fn print_banner() {
    println!(
        r#"
  ringfact v{}

  Z/2^n  •  content-addressed  •  recomputable
"#,
        env!("CARGO_PKG_VERSION")
    );
}
