//! Dual-verification object store endpoints.
//!
//! Writes seal the payload locally and upload the round-2 bytes. Reads fetch,
//! unwrap a dag-pb block if the gateway returned one, and re-derive both
//! identifiers from the bytes actually received.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use ringfact_core::{Grade, Verification, dagpb, seal, verify};
use serde_json::json;

use super::{flag_param, now_unix};
use crate::api::AppState;
use crate::api::error::{ApiError, ApiJson, ApiPath, ApiQuery};
use crate::api::types::{
    GatewaysResponse, StoreReadParams, StoreReadResponse, StoreWriteParams, StoreWriteRequest,
    StoreWriteResponse,
};
use crate::gateway::is_valid_identifier;

const WRITE_USAGE: &str = "Read back with GET /store/read/{gateway_cid}. \
     Verify algebraically by recomputing uor_cid from the envelope with store:cid and store:address removed.";

/// `POST /store/write[?gateway] {payload}`
pub async fn store_write_handler(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<StoreWriteParams>,
    ApiJson(request): ApiJson<StoreWriteRequest>,
) -> Result<(StatusCode, Json<StoreWriteResponse>), ApiError> {
    let stored_at = now_unix();
    let sealed = seal(&request.payload, stored_at)?;
    let gateway = state.gateways.select(params.gateway.as_deref())?;
    let bytes = sealed.bytes.len();
    let gateway_cid = state.gateways.upload(gateway, sealed.bytes).await?;

    tracing::info!(
        event = "store_write",
        gateway = %gateway.name,
        gateway_cid = %gateway_cid,
        uor_cid = %sealed.cid,
        payload_type = %sealed.payload_type,
        "Stored sealed envelope"
    );

    Ok((
        StatusCode::CREATED,
        Json(StoreWriteResponse {
            gateway: gateway.name.clone(),
            gateway_cid,
            uor_cid: sealed.cid,
            address: sealed.address,
            payload_type: sealed.payload_type,
            stored_at,
            bytes,
            usage: WRITE_USAGE.to_string(),
        }),
    ))
}

/// Fetch and verify; returns the gateway name, whether a block was unwrapped,
/// and the verification.
async fn fetch_and_verify(
    state: &AppState,
    identifier: &str,
    gateway: Option<&str>,
) -> Result<(String, bool, Verification), ApiError> {
    if !is_valid_identifier(identifier) {
        return Err(ApiError::param(
            "id",
            "expected an alphanumeric content identifier",
        ));
    }
    let gateway = state.gateways.select(gateway)?;
    let fetched = state.gateways.fetch(gateway, identifier).await?;
    let (bytes, unwrapped) = dagpb::unwrap_or_raw(fetched);
    Ok((gateway.name.clone(), unwrapped, verify(&bytes)))
}

fn trust_statement(verification: &Verification) -> String {
    match verification.grade() {
        Grade::B => "Both identifiers recomputed from the received bytes match; the content is intact.",
        Grade::D => "Recomputed identifiers contradict the declared ones; do not trust this object.",
        _ => "Integrity could not be established; treat this object as unverified.",
    }
    .to_string()
}

fn read_response(
    identifier: String,
    gateway: String,
    unwrapped: bool,
    verification: &Verification,
    include_payload: bool,
) -> StoreReadResponse {
    StoreReadResponse {
        identifier,
        gateway,
        unwrapped,
        verified: verification.verified(),
        cid_integrity: verification.cid_integrity.clone(),
        address_consistency: verification.address_consistency.clone(),
        grade: verification.grade().info(),
        payload_type: verification.payload_type().map(str::to_string),
        payload: if include_payload {
            verification.payload().cloned()
        } else {
            None
        },
        trust: trust_statement(verification),
    }
}

/// `GET /store/read/{id}?gateway&strict`
///
/// In strict mode the payload is withheld with a 409 when either identifier
/// definitely fails, or when the bytes no longer parse as an envelope. The
/// check statuses are reported as computed.
pub async fn store_read_handler(
    State(state): State<AppState>,
    ApiPath(identifier): ApiPath<String>,
    ApiQuery(params): ApiQuery<StoreReadParams>,
) -> Result<Json<StoreReadResponse>, ApiError> {
    let strict = flag_param("strict", params.strict.as_deref())?;
    let (gateway, unwrapped, verification) =
        fetch_and_verify(&state, &identifier, params.gateway.as_deref()).await?;

    if let Some(reason) = verification.withhold_reason().filter(|_| strict) {
        tracing::warn!(
            event = "integrity_conflict",
            identifier = %identifier,
            gateway = %gateway,
            reason = ?reason,
            "Strict read withheld content"
        );
        return Err(ApiError::Conflict {
            message: format!(
                "Object {} failed verification: {}; content withheld",
                identifier,
                reason.describe()
            ),
            details: json!({
                "identifier": identifier,
                "gateway": gateway,
                "reason": reason,
                "cid_integrity": verification.cid_integrity,
                "address_consistency": verification.address_consistency,
            }),
        });
    }

    Ok(Json(read_response(
        identifier,
        gateway,
        unwrapped,
        &verification,
        true,
    )))
}

/// `GET /store/verify/{id}?gateway`: the read checks without the payload.
pub async fn store_verify_handler(
    State(state): State<AppState>,
    ApiPath(identifier): ApiPath<String>,
    ApiQuery(params): ApiQuery<StoreReadParams>,
) -> Result<Json<StoreReadResponse>, ApiError> {
    let (gateway, unwrapped, verification) =
        fetch_and_verify(&state, &identifier, params.gateway.as_deref()).await?;
    Ok(Json(read_response(
        identifier,
        gateway,
        unwrapped,
        &verification,
        false,
    )))
}

/// `GET /store/gateways`
pub async fn gateways_handler(State(state): State<AppState>) -> Json<GatewaysResponse> {
    Json(GatewaysResponse {
        default: state.gateways.default_name().to_string(),
        gateways: state.gateways.probe_all().await,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trust_follows_grade() {
        let payload = json!({"@type": "schema:Note", "text": "hi"});
        let sealed = seal(&payload, 1).expect("seal");
        let intact = verify(&sealed.bytes);
        assert!(trust_statement(&intact).contains("intact"));

        let response = read_response("bafy".into(), "local".into(), false, &intact, false);
        assert!(response.verified);
        assert!(response.payload.is_none());
        assert_eq!(response.payload_type.as_deref(), Some("schema:Note"));

        let unverified = verify(b"not json");
        assert!(trust_statement(&unverified).contains("unverified"));
    }
}
