//! Derivation and certification endpoints.

use axum::{Json, extract::State};
use ringfact_core::{Ring, certify, derive, primitives::DEFAULT_QUANTUM};
use std::sync::Arc;

use super::{blocking, required, ring_param};
use crate::api::AppState;
use crate::api::error::{ApiError, ApiJson, ApiQuery};
use crate::api::types::{
    CertificateResponse, CertifyParams, DerivationResponse, DeriveParams, DeriveRequest,
};

fn derive_term(term: &str, ring: Ring) -> Result<Json<DerivationResponse>, ApiError> {
    let derivation = derive(term, ring).map_err(|e| ApiError::from_core(e, "term"))?;
    let grade_info = derivation.grade.info();
    Ok(Json(DerivationResponse {
        derivation,
        grade_info,
    }))
}

/// `POST /derive {term, n}`
pub async fn derive_post_handler(
    ApiJson(request): ApiJson<DeriveRequest>,
) -> Result<Json<DerivationResponse>, ApiError> {
    let ring = Ring::new(request.n.unwrap_or(DEFAULT_QUANTUM))?;
    derive_term(required("term", Some(&request.term))?, ring)
}

/// `GET /derive?term&n`
pub async fn derive_get_handler(
    ApiQuery(params): ApiQuery<DeriveParams>,
) -> Result<Json<DerivationResponse>, ApiError> {
    let ring = ring_param(params.n.as_deref())?;
    derive_term(required("term", params.term.as_deref())?, ring)
}

/// `GET /certify?derivation_id[&n]`
///
/// The knowledge graph is consulted only for the default ring. Graph lookup
/// and the re-derivation search run on the blocking pool.
pub async fn certify_handler(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<CertifyParams>,
) -> Result<Json<CertificateResponse>, ApiError> {
    let ring = ring_param(params.n.as_deref())?;
    let id = required("derivation_id", params.derivation_id.as_deref())?.to_string();
    let context = Arc::clone(&state.graph);
    let certificate = blocking(move || {
        let graph = (ring == Ring::default()).then(|| context.graph());
        Ok(certify(graph, &id, ring)?)
    })
    .await?;
    let grade_info = certificate.grade.info();
    Ok(Json(CertificateResponse {
        certificate,
        grade_info,
    }))
}
