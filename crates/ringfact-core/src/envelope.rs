//! # Stored Object Envelope
//!
//! Two-round sealing breaks the self-reference between an object and its own
//! digest:
//!
//! 1. round 1: payload + metadata, no `store:cid` / `store:address`
//!    → canonical bytes → CID and content address
//! 2. round 2: round 1 plus the two identifiers → canonical bytes (uploaded)
//!
//! Verification strips the two identifiers, recomputes round 1, and compares.
//! Each comparison is pass, fail or indeterminate; the three never collapse.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::RingfactError;
use crate::canonical::{canonical_bytes, canonical_string, compute_cid, encode_address};
use crate::grade::Grade;
use crate::graph::vocab::is_kernel_type;
use crate::primitives::MAX_STORE_PAYLOAD;

pub const ENVELOPE_TYPE: &str = "store:StoredContext";
pub const FIELD_TYPE: &str = "@type";
pub const FIELD_PAYLOAD_TYPE: &str = "store:payloadType";
pub const FIELD_PAYLOAD: &str = "store:payload";
pub const FIELD_STORED_AT: &str = "store:storedAtUnix";
pub const FIELD_SERIALIZATION: &str = "store:serialization";
pub const FIELD_CID_ALGORITHM: &str = "store:cidAlgorithm";
pub const FIELD_CID: &str = "store:cid";
pub const FIELD_ADDRESS: &str = "store:address";

pub const SERIALIZATION: &str = "canonical-json: recursively sorted keys, compact separators, UTF-8";
pub const CID_ALGORITHM: &str = "CIDv1 dag-json (0x0129) sha2-256 base32-lower over round-1 bytes";

// =============================================================================
// SEALING
// =============================================================================

/// A sealed envelope ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedEnvelope {
    pub payload_type: String,
    /// CID of the round-1 bytes.
    pub cid: String,
    /// Content address of the round-1 bytes.
    pub address: String,
    pub round1_len: usize,
    /// Canonical round-2 bytes.
    pub bytes: Vec<u8>,
}

/// Validate a payload and return its type tag.
pub fn validate_payload(payload: &Value) -> Result<String, RingfactError> {
    let object = payload
        .as_object()
        .ok_or_else(|| RingfactError::param("payload", "payload must be a JSON object"))?;
    let type_tag = match object.get(FIELD_TYPE) {
        Some(Value::String(t)) if !t.trim().is_empty() => t.clone(),
        Some(_) => {
            return Err(RingfactError::param("payload", "'@type' must be a non-empty string"));
        }
        None => return Err(RingfactError::param("payload", "payload requires an '@type' field")),
    };
    if is_kernel_type(&type_tag) {
        return Err(RingfactError::param(
            "payload",
            format!(
                "'{}' is a kernel-space type; it is regenerated from the ring, not stored",
                type_tag
            ),
        ));
    }
    let size = canonical_string(payload).len();
    if size > MAX_STORE_PAYLOAD {
        return Err(RingfactError::TooLarge {
            limit: MAX_STORE_PAYLOAD,
            actual: size,
        });
    }
    Ok(type_tag)
}

fn round1(payload: &Value, payload_type: &str, stored_at_unix: u64) -> Value {
    let mut map = Map::new();
    map.insert(FIELD_TYPE.into(), Value::String(ENVELOPE_TYPE.into()));
    map.insert(FIELD_PAYLOAD_TYPE.into(), Value::String(payload_type.into()));
    map.insert(FIELD_PAYLOAD.into(), payload.clone());
    map.insert(FIELD_STORED_AT.into(), Value::from(stored_at_unix));
    map.insert(FIELD_SERIALIZATION.into(), Value::String(SERIALIZATION.into()));
    map.insert(FIELD_CID_ALGORITHM.into(), Value::String(CID_ALGORITHM.into()));
    Value::Object(map)
}

/// Seal a payload in two rounds.
pub fn seal(payload: &Value, stored_at_unix: u64) -> Result<SealedEnvelope, RingfactError> {
    let payload_type = validate_payload(payload)?;

    let first = round1(payload, &payload_type, stored_at_unix);
    let first_bytes = canonical_bytes(&first);
    let cid = compute_cid(&first_bytes);
    let address = encode_address(&first_bytes);

    let mut second = first;
    if let Value::Object(map) = &mut second {
        map.insert(FIELD_CID.into(), Value::String(cid.clone()));
        map.insert(FIELD_ADDRESS.into(), Value::String(address.clone()));
    }

    Ok(SealedEnvelope {
        payload_type,
        cid,
        address,
        round1_len: first_bytes.len(),
        bytes: canonical_bytes(&second),
    })
}

// =============================================================================
// VERIFICATION
// =============================================================================

/// Outcome of one integrity comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Fail,
    /// Nothing to compare against.
    Indeterminate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    pub status: CheckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declared: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recomputed: Option<String>,
    pub detail: String,
}

impl Check {
    fn indeterminate(detail: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Indeterminate,
            declared: None,
            recomputed: None,
            detail: detail.into(),
        }
    }

    fn compare(name: &str, declared: Option<&str>, recomputed: String) -> Self {
        match declared {
            None => Self {
                status: CheckStatus::Indeterminate,
                declared: None,
                recomputed: Some(recomputed),
                detail: format!("envelope declares no {}", name),
            },
            Some(d) if d == recomputed => Self {
                status: CheckStatus::Pass,
                declared: Some(d.to_string()),
                recomputed: Some(recomputed),
                detail: format!("recomputed {} matches", name),
            },
            Some(d) => Self {
                status: CheckStatus::Fail,
                declared: Some(d.to_string()),
                recomputed: Some(recomputed),
                detail: format!("recomputed {} differs from the declared value", name),
            },
        }
    }
}

/// Why fetched content is not handed out under strict verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithholdReason {
    /// The CID or the address recomputes to something else.
    IdentifierMismatch,
    /// The bytes are not a JSON object.
    UnreadableEnvelope,
}

impl WithholdReason {
    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::IdentifierMismatch => "a recomputed identifier differs from the declared one",
            Self::UnreadableEnvelope => "the content no longer parses as a stored envelope",
        }
    }
}

/// Result of verifying fetched envelope bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub cid_integrity: Check,
    pub address_consistency: Check,
    /// Parsed envelope, if the bytes were a JSON object.
    pub envelope: Option<Value>,
}

impl Verification {
    /// True only when both checks pass.
    #[must_use]
    pub fn verified(&self) -> bool {
        self.cid_integrity.status == CheckStatus::Pass
            && self.address_consistency.status == CheckStatus::Pass
    }

    /// A recomputed identifier definitely contradicts its declared value.
    #[must_use]
    pub fn integrity_conflict(&self) -> bool {
        self.cid_integrity.status == CheckStatus::Fail
            || self.address_consistency.status == CheckStatus::Fail
    }

    /// Why a strict read must withhold the content, if it must.
    ///
    /// Bytes that no longer parse as an envelope keep their indeterminate
    /// checks but are withheld all the same.
    #[must_use]
    pub fn withhold_reason(&self) -> Option<WithholdReason> {
        if self.integrity_conflict() {
            Some(WithholdReason::IdentifierMismatch)
        } else if self.envelope.is_none() {
            Some(WithholdReason::UnreadableEnvelope)
        } else {
            None
        }
    }

    /// B when verified, D on any failure, C otherwise.
    #[must_use]
    pub fn grade(&self) -> Grade {
        if self.verified() {
            Grade::B
        } else if self.cid_integrity.status == CheckStatus::Fail
            || self.address_consistency.status == CheckStatus::Fail
        {
            Grade::D
        } else {
            Grade::C
        }
    }

    #[must_use]
    pub fn payload(&self) -> Option<&Value> {
        self.envelope.as_ref()?.get(FIELD_PAYLOAD)
    }

    #[must_use]
    pub fn payload_type(&self) -> Option<&str> {
        self.envelope.as_ref()?.get(FIELD_PAYLOAD_TYPE)?.as_str()
    }
}

/// Verify fetched bytes as a sealed envelope.
#[must_use]
pub fn verify(bytes: &[u8]) -> Verification {
    let parsed: Value = match serde_json::from_slice(bytes) {
        Ok(v) => v,
        Err(e) => {
            let reason = format!("content is not JSON: {}", e);
            return Verification {
                cid_integrity: Check::indeterminate(reason.clone()),
                address_consistency: Check::indeterminate(reason),
                envelope: None,
            };
        }
    };
    let Value::Object(map) = &parsed else {
        let reason = "content is JSON but not an object";
        return Verification {
            cid_integrity: Check::indeterminate(reason),
            address_consistency: Check::indeterminate(reason),
            envelope: None,
        };
    };

    let declared_cid = map.get(FIELD_CID).and_then(Value::as_str);
    let declared_address = map.get(FIELD_ADDRESS).and_then(Value::as_str);

    let mut stripped = map.clone();
    stripped.remove(FIELD_CID);
    stripped.remove(FIELD_ADDRESS);
    let round1_bytes = canonical_bytes(&Value::Object(stripped));

    Verification {
        cid_integrity: Check::compare("CID", declared_cid, compute_cid(&round1_bytes)),
        address_consistency: Check::compare(
            "address",
            declared_address,
            encode_address(&round1_bytes),
        ),
        envelope: Some(parsed.clone()),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn note() -> Value {
        json!({"@type": "schema:Note", "text": "hello", "tags": ["a", "b"]})
    }

    #[test]
    fn seal_then_verify() {
        let sealed = seal(&note(), 1_700_000_000).expect("seal");
        assert_eq!(sealed.payload_type, "schema:Note");
        let v = verify(&sealed.bytes);
        assert!(v.verified());
        assert_eq!(v.grade(), Grade::B);
        assert_eq!(v.cid_integrity.declared.as_deref(), Some(sealed.cid.as_str()));
        assert_eq!(
            canonical_string(v.payload().expect("payload")),
            canonical_string(&note())
        );
    }

    #[test]
    fn round2_bytes_are_canonical() {
        let sealed = seal(&note(), 1).expect("seal");
        let parsed: Value = serde_json::from_slice(&sealed.bytes).expect("json");
        assert_eq!(canonical_bytes(&parsed), sealed.bytes);
    }

    #[test]
    fn tampered_payload_fails_both_checks() {
        let sealed = seal(&note(), 1).expect("seal");
        let text = String::from_utf8(sealed.bytes).expect("utf8");
        let tampered = text.replacen("hello", "hellp", 1);
        let v = verify(tampered.as_bytes());
        assert!(!v.verified());
        assert_eq!(v.address_consistency.status, CheckStatus::Fail);
        assert_eq!(v.cid_integrity.status, CheckStatus::Fail);
        assert_eq!(v.withhold_reason(), Some(WithholdReason::IdentifierMismatch));
        assert_eq!(v.grade(), Grade::D);
    }

    #[test]
    fn every_single_byte_flip_is_withheld() {
        let sealed = seal(&note(), 1_700_000_000).expect("seal");
        assert_eq!(verify(&sealed.bytes).withhold_reason(), None);
        for i in 0..sealed.bytes.len() {
            let mut flipped = sealed.bytes.clone();
            flipped[i] ^= 0x01;
            let v = verify(&flipped);
            assert!(!v.verified(), "flip at {} still verifies", i);
            assert!(v.withhold_reason().is_some(), "flip at {} is not withheld", i);
        }
    }

    #[test]
    fn unparseable_content_is_indeterminate() {
        let v = verify(b"\x00\x01not json");
        assert_eq!(v.cid_integrity.status, CheckStatus::Indeterminate);
        assert_eq!(v.address_consistency.status, CheckStatus::Indeterminate);
        assert!(!v.verified());
        assert!(!v.integrity_conflict());
        assert_eq!(v.withhold_reason(), Some(WithholdReason::UnreadableEnvelope));
        assert_eq!(v.grade(), Grade::C);
    }

    #[test]
    fn missing_identifiers_are_indeterminate() {
        let v = verify(br#"{"@type":"store:StoredContext","store:payload":{}}"#);
        assert_eq!(v.cid_integrity.status, CheckStatus::Indeterminate);
        assert!(v.cid_integrity.recomputed.is_some());
    }

    #[test]
    fn rejects_kernel_types() {
        for t in ["schema:Datum", "https://uor.foundation/derivation/Derivation"] {
            let err = seal(&json!({"@type": t}), 1).expect_err("kernel type");
            assert!(matches!(err, RingfactError::InvalidParameter { .. }));
        }
    }

    #[test]
    fn rejects_untyped_and_non_objects() {
        assert!(seal(&json!({"text": "x"}), 1).is_err());
        assert!(seal(&json!({"@type": 5}), 1).is_err());
        assert!(seal(&json!([1, 2]), 1).is_err());
    }

    #[test]
    fn rejects_oversized_payloads() {
        let big = "x".repeat(MAX_STORE_PAYLOAD);
        let err = seal(&json!({"@type": "schema:Note", "text": big}), 1).expect_err("too large");
        assert!(matches!(err, RingfactError::TooLarge { .. }));
    }
}
