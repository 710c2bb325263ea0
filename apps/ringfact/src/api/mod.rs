//! # ringfact HTTP API Module
//!
//! The HTTP REST API server, built on axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /kernel/{op,datum,partition,identity}` - Ring kernel
//! - `GET|POST /derive`, `GET /certify` - Derivations and certificates
//! - `POST /address/encode`, `GET /address/decode`, `POST /canonical` - Addressing
//! - `GET|POST /graph/query`, `GET /graph`, `GET /conformance` - Knowledge graph
//! - `POST /store/write`, `GET /store/{read,verify}/{id}`, `GET /store/gateways` - Object store
//! - `POST /observers`, `POST /observers/{agent}/outputs`, `GET /observers/{agent}` - Observers
//! - `GET /ring/*` - Deprecated, 301 to `/kernel/*`
//!
//! ## Security Configuration
//!
//! All of it comes from [`ServerConfig`]; handlers never read the environment.
//!
//! - `cors_origins`: comma-separated origins, or "*" for all (default: localhost only)
//! - `rate_limit_read` / `rate_limit_write`: requests per minute per client (0 disables)
//! - `api_key`: if set, requires Bearer token authentication

mod auth;
pub mod error;
mod handlers;
pub mod middleware;
pub mod types;

pub use auth::keys_match;
pub use error::{ApiError, ErrorBody};
pub use middleware::{RateLimits, compute_etag, create_rate_limiter};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderName, HeaderValue, Method, header},
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use ringfact_core::{GraphContext, ObserverRegistry, RingfactError};
use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::gateway::{GatewayError, GatewayRegistry};

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 256 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Knowledge graph of the default ring, built on first use.
    pub graph: Arc<GraphContext>,
    pub gateways: Arc<GatewayRegistry>,
    pub observers: Arc<RwLock<ObserverRegistry>>,
}

impl AppState {
    pub fn new(config: ServerConfig, observers: ObserverRegistry) -> Result<Self, GatewayError> {
        let gateways = GatewayRegistry::from_config(&config)?;
        Ok(Self {
            config: Arc::new(config),
            graph: Arc::new(GraphContext::new()),
            gateways: Arc::new(gateways),
            observers: Arc::new(RwLock::new(observers)),
        })
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

fn exposed_headers() -> [HeaderName; 6] {
    [
        header::ETAG,
        header::RETRY_AFTER,
        header::LOCATION,
        HeaderName::from_static("x-ratelimit-limit"),
        HeaderName::from_static("x-ratelimit-remaining"),
        HeaderName::from_static("x-ratelimit-reset"),
    ]
}

/// Build the CORS layer from `cors_origins`.
///
/// - "*": allows all origins (development only)
/// - unset: localhost only
/// - otherwise: the comma-separated list
fn build_cors_layer(origins: Option<&str>) -> CorsLayer {
    match origins {
        Some("*") => {
            tracing::warn!(
                "CORS: Allowing ALL origins (cors_origins=*). This is insecure for production!"
            );
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!("CORS: No valid origins in cors_origins, defaulting to localhost only");
                build_localhost_cors()
            } else {
                restrictive_cors(allowed_origins)
            }
        }
        None => {
            tracing::info!("CORS: No cors_origins set, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

fn restrictive_cors(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::IF_NONE_MATCH,
            header::ACCEPT,
        ])
        .expose_headers(exposed_headers())
}

/// Localhost origins only.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();
    restrictive_cors(origins)
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

fn handle_panic(_panic: Box<dyn Any + Send + 'static>) -> Response {
    ApiError::Internal("request handler panicked".to_string()).into_response()
}

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Panic catcher - turns a panic into the 500 envelope
/// 4. Body limit
/// 5. Rate Limiting - per client and method class (if enabled)
/// 6. Authentication - validates API key (if configured)
/// 7. ETag - deterministic GET routes only
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer(state.config.cors_origins.as_deref());

    let limits = RateLimits::from_config(&state.config);
    if limits.is_enabled() {
        tracing::info!(
            "Rate limiting enabled: {} reads/min, {} writes/min per client",
            state.config.rate_limit_read,
            state.config.rate_limit_write
        );
    } else {
        tracing::info!("Rate limiting disabled");
    }

    let api_key: Option<Arc<str>> = state.config.api_key.as_deref().map(Arc::from);
    if api_key.is_some() {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!(
            "API key authentication DISABLED - all endpoints are publicly accessible! \
             Set RINGFACT_API_KEY or api_key in the config file to enable authentication."
        );
    }

    let cacheable = Router::new()
        .route("/kernel/op", get(handlers::op_handler))
        .route("/kernel/datum", get(handlers::datum_handler))
        .route("/kernel/partition", get(handlers::partition_handler))
        .route("/kernel/identity", get(handlers::identity_handler))
        .route(
            "/derive",
            get(handlers::derive_get_handler).post(handlers::derive_post_handler),
        )
        .route("/address/decode", get(handlers::address_decode_handler))
        .route("/graph", get(handlers::graph_handler))
        .route("/conformance", get(handlers::conformance_handler))
        .route_layer(axum_middleware::from_fn(middleware::etag_middleware));

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/certify", get(handlers::certify_handler))
        .route("/address/encode", post(handlers::address_encode_handler))
        .route("/canonical", post(handlers::canonical_handler))
        .route(
            "/graph/query",
            get(handlers::query_get_handler).post(handlers::query_post_handler),
        )
        .route("/store/write", post(handlers::store_write_handler))
        .route("/store/read/{id}", get(handlers::store_read_handler))
        .route("/store/verify/{id}", get(handlers::store_verify_handler))
        .route("/store/gateways", get(handlers::gateways_handler))
        .route("/observers", post(handlers::register_observer_handler))
        .route(
            "/observers/{agent}/outputs",
            post(handlers::record_output_handler),
        )
        .route("/observers/{agent}", get(handlers::profile_handler))
        .route("/ring/{*rest}", get(handlers::ring_alias_handler))
        .merge(cacheable)
        .fallback(handlers::not_found_handler)
        .method_not_allowed_fallback(handlers::method_not_allowed_handler);

    // Authentication (innermost - runs last on request)
    if let Some(key) = api_key {
        router = router.layer(axum_middleware::from_fn_with_state(
            key,
            auth::api_key_auth_middleware,
        ));
    }

    if limits.is_enabled() {
        router = router.layer(axum_middleware::from_fn_with_state(
            limits,
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::warn!("Could not install Ctrl-C handler; shut down by terminating the process");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Start the HTTP server.
pub async fn run_server(addr: &str, state: AppState) -> Result<(), RingfactError> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| RingfactError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("ringfact HTTP server listening on {}", addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|e| RingfactError::IoError(format!("Server error: {}", e)))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_variants_build() {
        let _ = build_cors_layer(None);
        let _ = build_cors_layer(Some("*"));
        let _ = build_cors_layer(Some("https://a.example, https://b.example"));
        let _ = build_cors_layer(Some(" , "));
    }

    #[test]
    fn state_from_default_config() {
        let state = AppState::new(ServerConfig::default(), ObserverRegistry::new()).expect("state");
        assert!(!state.graph.is_built());
        assert_eq!(state.gateways.default_name(), "local");
    }
}
