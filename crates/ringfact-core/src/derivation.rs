//! # Derivations
//!
//! A derivation binds a canonical term to its result under one ring and names
//! the pair with a content-addressed identifier:
//!
//! `urn:uor:derivation:sha256:` + hex(SHA-256(canonical + "=" + address(result)))
//!
//! Equivalent terms (operand orderings of a commutative operation) share an id.

use serde::{Deserialize, Serialize};

use crate::RingfactError;
use crate::canonical::sha256_hex;
use crate::datum::element_address;
use crate::grade::Grade;
use crate::primitives::DERIVATION_URN_PREFIX;
use crate::ring::{Operation, Ring};
use crate::term::{Term, parse_term};

/// A minted derivation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Derivation {
    /// The term as the caller wrote it (normalized whitespace).
    pub original_term: String,
    pub canonical_term: String,
    pub quantum: u32,
    pub modulus: u64,
    pub result: u64,
    pub result_address: String,
    pub derivation_id: String,
    pub grade: Grade,
}

impl Derivation {
    /// Canonicalize, evaluate and mint an id for a parsed term.
    pub fn from_term(term: &Term, ring: Ring) -> Result<Self, RingfactError> {
        let (canonical_term, result) = term.canonical(ring)?;
        let result_address = element_address(ring, result);
        Ok(Self {
            original_term: term.to_string(),
            derivation_id: derivation_id(&canonical_term, &result_address),
            canonical_term,
            quantum: ring.quantum(),
            modulus: ring.modulus(),
            result,
            result_address,
            grade: Grade::A,
        })
    }

    /// Derive a single operation applied to literal operands.
    pub fn of_operation(op: Operation, operands: &[u64], ring: Ring) -> Result<Self, RingfactError> {
        let args = operands
            .iter()
            .map(|&v| ring.element(v, "x").map(Term::Literal))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_term(&Term::apply(op, args)?, ring)
    }
}

/// Parse and derive a term source string.
pub fn derive(source: &str, ring: Ring) -> Result<Derivation, RingfactError> {
    Derivation::from_term(&parse_term(source, ring)?, ring)
}

/// Identifier of a canonical term and its result address.
#[must_use]
pub fn derivation_id(canonical_term: &str, result_address: &str) -> String {
    let preimage = format!("{}={}", canonical_term, result_address);
    format!("{}{}", DERIVATION_URN_PREFIX, sha256_hex(preimage.as_bytes()))
}

/// Whether a string has the shape of a derivation id.
#[must_use]
pub fn is_derivation_id(candidate: &str) -> bool {
    candidate
        .strip_prefix(DERIVATION_URN_PREFIX)
        .is_some_and(|hex| hex.len() == 64 && hex.bytes().all(|b| b.is_ascii_hexdigit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r8() -> Ring {
        Ring::new(8).expect("ring")
    }

    #[test]
    fn xor_commutes() {
        let a = derive("xor(10,42)", r8()).expect("derive");
        let b = derive("xor(42,10)", r8()).expect("derive");
        assert_eq!(a.derivation_id, b.derivation_id);
        assert_eq!(a.canonical_term, "xor(10,42)");
        assert_eq!(b.original_term, "xor(42,10)");
    }

    #[test]
    fn sub_does_not_commute() {
        let a = derive("sub(10,42)", r8()).expect("derive");
        let b = derive("sub(42,10)", r8()).expect("derive");
        assert_ne!(a.derivation_id, b.derivation_id);
    }

    #[test]
    fn id_shape_and_grade() {
        let d = derive("neg(bnot(42))", r8()).expect("derive");
        assert!(is_derivation_id(&d.derivation_id));
        assert_eq!(d.result, 43);
        assert_eq!(d.result_address, "\u{282B}");
        assert_eq!(d.grade, Grade::A);
        assert_eq!(d.modulus, 256);
    }

    #[test]
    fn id_depends_on_ring() {
        let a = derive("succ(1)", r8()).expect("derive");
        let b = derive("succ(1)", Ring::new(16).expect("ring")).expect("derive");
        // Same value, different byte width, so different address.
        assert_ne!(a.derivation_id, b.derivation_id);
    }

    #[test]
    fn of_operation_matches_parsed_term() {
        let op = Derivation::of_operation(Operation::Xor, &[42, 10], r8()).expect("derive");
        let parsed = derive("xor(10,42)", r8()).expect("derive");
        assert_eq!(op.derivation_id, parsed.derivation_id);
    }

    #[test]
    fn of_operation_validates_operands() {
        assert!(Derivation::of_operation(Operation::Neg, &[300], r8()).is_err());
    }

    #[test]
    fn id_recognizer() {
        assert!(!is_derivation_id("urn:uor:derivation:sha256:abc"));
        assert!(!is_derivation_id("urn:other:xyz"));
    }
}
