//! # Canonicalization & Content Addressing
//!
//! - `encode_address` / `decode_address`: bijective byte ↔ Braille symbol mapping
//! - `canonical_string` / `canonical_bytes`: recursive key sort, compact separators
//! - `compute_cid`: CIDv1 (dag-json, sha2-256), base32 lowercase
//!
//! Canonical output is a pure function of the JSON value: two objects that
//! differ only in field insertion order serialize to identical bytes.

use cid::Cid;
use multihash_codetable::{Code, MultihashDigest};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::RingfactError;
use crate::primitives::{DAG_JSON_CODEC, GLYPH_BASE};

// =============================================================================
// CONTENT ADDRESS
// =============================================================================

/// Map one byte to its address symbol.
#[must_use]
pub fn glyph(byte: u8) -> char {
    // Every code point in U+2800..=U+28FF is assigned, so the fallback is unreachable.
    char::from_u32(GLYPH_BASE + u32::from(byte)).unwrap_or(char::REPLACEMENT_CHARACTER)
}

/// Encode bytes as a content address, one symbol per byte.
#[must_use]
pub fn encode_address(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| glyph(b)).collect()
}

/// Decode a content address back to bytes.
///
/// Fails on the first symbol outside the Braille block, reporting its
/// symbol position (not byte offset).
pub fn decode_address(address: &str) -> Result<Vec<u8>, RingfactError> {
    address
        .chars()
        .enumerate()
        .map(|(position, c)| {
            let code = u32::from(c);
            if (GLYPH_BASE..GLYPH_BASE + 256).contains(&code) {
                Ok((code - GLYPH_BASE) as u8)
            } else {
                Err(RingfactError::parse(
                    position,
                    format!("'{}' (U+{:04X}) is not an address symbol", c, code),
                ))
            }
        })
        .collect()
}

// =============================================================================
// CANONICAL JSON
// =============================================================================

/// Rebuild a value with every object's keys in ascending order.
#[must_use]
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::with_capacity(map.len());
            for key in keys {
                if let Some(v) = map.get(key) {
                    sorted.insert(key.clone(), canonicalize(v));
                }
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Canonical JSON text: sorted keys, no insignificant whitespace.
#[must_use]
pub fn canonical_string(value: &Value) -> String {
    canonicalize(value).to_string()
}

/// Canonical JSON bytes (UTF-8 of [`canonical_string`]).
#[must_use]
pub fn canonical_bytes(value: &Value) -> Vec<u8> {
    canonical_string(value).into_bytes()
}

// =============================================================================
// DIGESTS
// =============================================================================

/// CIDv1 of raw bytes: dag-json codec, sha2-256 multihash, base32 lower.
#[must_use]
pub fn compute_cid(bytes: &[u8]) -> String {
    let hash = Code::Sha2_256.digest(bytes);
    Cid::new_v1(DAG_JSON_CODEC, hash).to_string()
}

/// Lowercase hex SHA-256.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Every identifier of one canonicalized JSON value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestSummary {
    pub canonical: String,
    pub cid: String,
    pub address: String,
    pub sha256: String,
    pub byte_length: usize,
}

impl DigestSummary {
    #[must_use]
    pub fn of(value: &Value) -> Self {
        let canonical = canonical_string(value);
        let bytes = canonical.as_bytes();
        Self {
            cid: compute_cid(bytes),
            address: encode_address(bytes),
            sha256: sha256_hex(bytes),
            byte_length: bytes.len(),
            canonical,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn address_uses_braille_block() {
        assert_eq!(encode_address(&[0]), "\u{2800}");
        assert_eq!(encode_address(&[42]), "\u{282A}");
        assert_eq!(encode_address(&[255]), "\u{28FF}");
    }

    #[test]
    fn address_round_trip_edge_cases() {
        assert_eq!(encode_address(&[]), "");
        assert_eq!(decode_address("").expect("decode"), Vec::<u8>::new());
        let zeros = vec![0u8; 32];
        assert_eq!(decode_address(&encode_address(&zeros)).expect("decode"), zeros);
        let all: Vec<u8> = (0..=255).collect();
        assert_eq!(decode_address(&encode_address(&all)).expect("decode"), all);
    }

    #[test]
    fn decode_reports_symbol_position() {
        let err = decode_address("\u{2800}\u{2801}x").expect_err("not braille");
        assert!(matches!(err, RingfactError::Parse { position: 2, .. }));
    }

    #[test]
    fn canonical_sorts_nested_keys() {
        let value = json!({"b": 1, "a": {"z": [3, {"y": 1, "x": 2}], "c": null}});
        assert_eq!(
            canonical_string(&value),
            r#"{"a":{"c":null,"z":[3,{"x":2,"y":1}]},"b":1}"#
        );
    }

    #[test]
    fn canonical_ignores_insertion_order() {
        let a: Value = serde_json::from_str(r#"{"x":1,"y":[1,2],"z":"s"}"#).expect("json");
        let b: Value = serde_json::from_str(r#"{"z":"s","y":[1,2],"x":1}"#).expect("json");
        assert_eq!(canonical_bytes(&a), canonical_bytes(&b));
    }

    #[test]
    fn canonical_is_idempotent() {
        let value = json!({"k": {"b": true, "a": [1, "two"]}});
        let once = canonical_string(&value);
        let reparsed: Value = serde_json::from_str(&once).expect("json");
        assert_eq!(canonical_string(&reparsed), once);
    }

    #[test]
    fn arrays_keep_order() {
        assert_eq!(canonical_string(&json!([3, 1, 2])), "[3,1,2]");
    }

    #[test]
    fn cid_shape_and_determinism() {
        let cid = compute_cid(b"{}");
        assert!(cid.starts_with("bagu"), "dag-json CIDv1 prefix, got {}", cid);
        assert_eq!(cid, compute_cid(b"{}"));
        assert_ne!(cid, compute_cid(b"[]"));
        assert!(cid.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn digest_summary_is_consistent() {
        let summary = DigestSummary::of(&json!({"b": 2, "a": 1}));
        assert_eq!(summary.canonical, r#"{"a":1,"b":2}"#);
        assert_eq!(summary.byte_length, summary.canonical.len());
        assert_eq!(summary.cid, compute_cid(summary.canonical.as_bytes()));
        assert_eq!(summary.sha256.len(), 64);
        assert_eq!(
            decode_address(&summary.address).expect("decode"),
            summary.canonical.as_bytes()
        );
    }
}
