//! Wire-shape tests for the API request/response types.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use ringfact::api::ErrorBody;
use ringfact::api::types::{
    AddressEncodeRequest, DerivationResponse, DeriveRequest, HealthResponse,
    ObserverProfileResponse, RecordOutputRequest, RegisterObserverRequest, StoreReadResponse,
    StoreWriteRequest,
};
use ringfact_core::{ObserverRecord, Ring, derive};
use serde_json::{Value, json};

// =============================================================================
// REQUESTS
// =============================================================================

#[test]
fn test_derive_request_quantum_optional() {
    let request: DeriveRequest = serde_json::from_value(json!({ "term": "neg(1)" })).unwrap();
    assert_eq!(request.term, "neg(1)");
    assert!(request.n.is_none());

    let request: DeriveRequest =
        serde_json::from_value(json!({ "term": "neg(1)", "n": 4 })).unwrap();
    assert_eq!(request.n, Some(4));
}

#[test]
fn test_address_encode_request_accepts_either_field() {
    let hex: AddressEncodeRequest = serde_json::from_value(json!({ "hex": "00ff" })).unwrap();
    assert!(hex.text.is_none());
    let text: AddressEncodeRequest = serde_json::from_value(json!({ "text": "hi" })).unwrap();
    assert!(text.hex.is_none());
    let empty: AddressEncodeRequest = serde_json::from_value(json!({})).unwrap();
    assert!(empty.hex.is_none() && empty.text.is_none());
}

#[test]
fn test_register_request_requires_founding_derivation() {
    let missing = serde_json::from_value::<RegisterObserverRequest>(
        json!({ "agent_id": "a", "capacity": 1 }),
    );
    assert!(missing.is_err());
}

#[test]
fn test_record_output_request_variants() {
    let direct: RecordOutputRequest =
        serde_json::from_value(json!({ "grade": "B", "distance": "0.5" })).unwrap();
    assert_eq!(direct.distance, Some(json!("0.5")));

    let pair: RecordOutputRequest =
        serde_json::from_value(json!({ "grade": "A", "claimed": 7, "derived": 5 })).unwrap();
    assert_eq!(pair.claimed, Some(7));
    assert_eq!(pair.derived, Some(5));
    assert!(pair.distance.is_none());
}

#[test]
fn test_store_write_request_keeps_payload_verbatim() {
    let request: StoreWriteRequest = serde_json::from_value(json!({
        "payload": { "@type": "schema:Note", "nested": { "z": 1, "a": 2 } }
    }))
    .unwrap();
    assert_eq!(request.payload["nested"]["z"], 1);
}

// =============================================================================
// RESPONSES
// =============================================================================

#[test]
fn test_health_response_shape() {
    let value = serde_json::to_value(HealthResponse::new(false)).unwrap();
    assert_eq!(value["status"], "ok");
    assert_eq!(value["graph_built"], false);
}

#[test]
fn test_derivation_response_is_flat() {
    let derivation = derive("add(1,2)", Ring::default()).unwrap();
    let grade_info = derivation.grade.info();
    let value = serde_json::to_value(DerivationResponse {
        derivation,
        grade_info,
    })
    .unwrap();
    assert_eq!(value["result"], 3);
    assert_eq!(value["grade"], "A");
    assert_eq!(value["grade_info"]["label"], "Algebraically Proven");
    assert!(value.get("derivation").is_none());

    let back: DerivationResponse = serde_json::from_value(value).unwrap();
    assert_eq!(back.derivation.result, 3);
}

#[test]
fn test_error_body_omits_absent_fields() {
    let body = ErrorBody {
        code: "not_found".into(),
        error: "No route".into(),
        param: None,
        hint: Some("try /health".into()),
        details: None,
    };
    let value = serde_json::to_value(&body).unwrap();
    assert!(value.get("param").is_none());
    assert!(value.get("details").is_none());
    assert_eq!(value["hint"], "try /health");
}

#[test]
fn test_store_read_response_omits_payload_when_absent() {
    let value = json!({
        "identifier": "bafyx",
        "gateway": "local",
        "unwrapped": false,
        "verified": false,
        "cid_integrity": { "status": "indeterminate", "detail": "no declared cid" },
        "address_consistency": { "status": "fail", "declared": "a", "recomputed": "b", "detail": "differs" },
        "grade": { "grade": "D", "label": "Unverified", "description": "" },
        "trust": "do not trust"
    });
    let response: StoreReadResponse = serde_json::from_value(value).unwrap();
    assert!(response.payload.is_none());
    let out: Value = serde_json::to_value(&response).unwrap();
    assert!(out.get("payload").is_none());
    assert!(out.get("payload_type").is_none());
    assert!(out["cid_integrity"].get("declared").is_none());
}

#[test]
fn test_observer_profile_from_record() {
    let founding = format!("urn:uor:derivation:sha256:{}", "b".repeat(64));
    let record = ObserverRecord::register("agent-1", 8, 3, &founding, 1_700_000_000).unwrap();
    let profile = ObserverProfileResponse::new(&record, false);
    assert_eq!(profile.zone, "Coherence");
    assert_eq!(profile.outputs, 1);
    assert_eq!(profile.stats.grade_a_rate, "1.0000");
    assert_eq!(profile.stats.mean_distance, "0.000");
    assert!(!profile.remediation.action_required);

    let value = serde_json::to_value(&profile).unwrap();
    assert_eq!(value["stats"]["grade_a_rate_bp"], 10_000);
    assert_eq!(value["registered_at"], 1_700_000_000u64);
}
