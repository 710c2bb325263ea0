//! # API Endpoint Handlers
//!
//! Every handler validates its inputs first and returns either a complete
//! response or an [`ApiError`]; nothing partial is ever returned.

mod address;
mod derivation;
mod graph;
mod kernel;
mod observers;
mod store;

pub use address::{address_decode_handler, address_encode_handler, canonical_handler};
pub use derivation::{certify_handler, derive_get_handler, derive_post_handler};
pub use graph::{conformance_handler, graph_handler, query_get_handler, query_post_handler};
pub use kernel::{
    datum_handler, identity_handler, op_handler, partition_handler, ring_alias_handler,
};
pub use observers::{profile_handler, record_output_handler, register_observer_handler};
pub use store::{gateways_handler, store_read_handler, store_verify_handler, store_write_handler};

use axum::{Json, extract::State, http::Uri, response::IntoResponse};
use ringfact_core::{Ring, primitives::DEFAULT_QUANTUM};
use std::time::{SystemTime, UNIX_EPOCH};

use super::{AppState, error::ApiError, types::HealthResponse};

// =============================================================================
// PARAMETER HELPERS
// =============================================================================

/// A required parameter, named in the error when missing or blank.
fn required<'a>(name: &str, value: Option<&'a str>) -> Result<&'a str, ApiError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::param(name, "is required"))
}

/// A non-negative integer parameter.
fn int_param(name: &str, value: &str) -> Result<u64, ApiError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| ApiError::param(name, format!("'{}' is not a non-negative integer", value)))
}

fn quantum_param(value: Option<&str>) -> Result<u32, ApiError> {
    match value {
        None => Ok(DEFAULT_QUANTUM),
        Some(v) => v
            .trim()
            .parse::<u32>()
            .map_err(|_| ApiError::param("n", format!("'{}' is not a valid quantum", v))),
    }
}

/// A computation ring from the `n` parameter (default 8).
fn ring_param(value: Option<&str>) -> Result<Ring, ApiError> {
    Ok(Ring::new(quantum_param(value)?)?)
}

/// A boolean flag; absent means false.
fn flag_param(name: &str, value: Option<&str>) -> Result<bool, ApiError> {
    match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        None | Some("" | "false" | "0" | "no") => Ok(false),
        Some("true" | "1" | "yes") => Ok(true),
        Some(other) => Err(ApiError::param(name, format!("'{}' is not a boolean", other))),
    }
}

/// Run hashing or disk work on the blocking pool.
async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::Internal(format!("blocking task failed: {}", e)))?
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

// =============================================================================
// HEALTH & FALLBACKS
// =============================================================================

/// Health check endpoint.
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse::new(state.graph.is_built()))
}

/// Unknown route.
pub async fn not_found_handler(uri: Uri) -> ApiError {
    ApiError::not_found(
        format!("No route for {}", uri.path()),
        "Kernel routes live under /kernel/*; start with GET /kernel/op?op=add&x=1&y=2.",
    )
}

/// Known route, wrong method.
pub async fn method_not_allowed_handler() -> ApiError {
    ApiError::MethodNotAllowed
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantum_defaults_to_eight() {
        assert_eq!(ring_param(None).expect("default").quantum(), 8);
        assert_eq!(ring_param(Some("12")).expect("12").quantum(), 12);
    }

    #[test]
    fn bad_quantum_names_n() {
        for bad in ["abc", "0", "17", "-1"] {
            assert!(
                matches!(ring_param(Some(bad)), Err(ApiError::InvalidParameter { ref param, .. }) if param == "n"),
                "expected a parameter error on n for {bad}"
            );
        }
    }

    #[test]
    fn required_rejects_blank() {
        assert!(required("x", None).is_err());
        assert!(required("x", Some("  ")).is_err());
        assert_eq!(required("x", Some(" 5 ")).expect("present"), "5");
    }

    #[test]
    fn flags() {
        assert!(!flag_param("strict", None).expect("absent"));
        assert!(flag_param("strict", Some("TRUE")).expect("true"));
        assert!(!flag_param("strict", Some("0")).expect("zero"));
        assert!(flag_param("strict", Some("maybe")).is_err());
    }

    #[test]
    fn integers() {
        assert_eq!(int_param("x", "42").expect("int"), 42);
        assert!(int_param("x", "4.2").is_err());
        assert!(int_param("x", "-1").is_err());
    }
}
