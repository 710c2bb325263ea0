//! # Certification
//!
//! Turns a derivation id back into a grade-B certificate, or says it cannot.
//!
//! Lookup order:
//! 1. exact match among the knowledge graph's derivation nodes
//! 2. bounded re-derivation search: every unary operation over operands
//!    below [`CERT_SEARCH_UNARY_BOUND`], every binary operation over
//!    operands below [`CERT_SEARCH_OPERAND_BOUND`]
//!
//! Both bounds are independent of the quantum, so a miss costs the same
//! number of hashes on every ring.
//!
//! A found derivation is re-derived from its canonical term before the
//! certificate is issued. Nothing is invented for an unknown id.

use serde::{Deserialize, Serialize};

use crate::RingfactError;
use crate::canonical::sha256_hex;
use crate::derivation::{Derivation, derive, is_derivation_id};
use crate::graph::KnowledgeGraph;
use crate::grade::Grade;
use crate::primitives::{
    CERT_SEARCH_OPERAND_BOUND, CERT_SEARCH_UNARY_BOUND, CERTIFICATE_URN_PREFIX,
};
use crate::ring::{Arity, Operation, Ring};

/// Where the derivation behind a certificate was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateSource {
    Graph,
    Search,
}

/// A certificate for one derivation id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub certificate_id: String,
    pub derivation_id: String,
    pub canonical_term: String,
    pub result: u64,
    pub quantum: u32,
    pub source: CertificateSource,
    /// Re-deriving the canonical term reproduced the id.
    pub reverified: bool,
    pub grade: Grade,
}

/// Certify `derivation_id` under `ring`.
///
/// `graph` is consulted only when it was built for the same ring.
pub fn certify(
    graph: Option<&KnowledgeGraph>,
    derivation_id: &str,
    ring: Ring,
) -> Result<Certificate, RingfactError> {
    if !is_derivation_id(derivation_id) {
        return Err(RingfactError::param(
            "derivation_id",
            "expected urn:uor:derivation:sha256:<64 hex digits>",
        ));
    }

    if let Some(entry) = graph
        .filter(|g| g.ring() == ring)
        .and_then(|g| g.derivation(derivation_id))
    {
        let rederived = derive(&entry.canonical_term, ring)?;
        return Ok(issue(&rederived, derivation_id, CertificateSource::Graph));
    }

    search(derivation_id, ring)
        .map(|found| issue(&found, derivation_id, CertificateSource::Search))
        .ok_or_else(|| {
            RingfactError::NotFound(format!(
                "derivation {} is not in the knowledge graph and was not re-derivable from any single operation",
                derivation_id
            ))
        })
}

fn issue(derivation: &Derivation, requested_id: &str, source: CertificateSource) -> Certificate {
    let preimage = format!("{}|{}", requested_id, derivation.canonical_term);
    Certificate {
        certificate_id: format!("{}{}", CERTIFICATE_URN_PREFIX, sha256_hex(preimage.as_bytes())),
        derivation_id: requested_id.to_string(),
        canonical_term: derivation.canonical_term.clone(),
        result: derivation.result,
        quantum: derivation.quantum,
        source,
        reverified: derivation.derivation_id == requested_id,
        grade: Grade::B,
    }
}

/// Bounded brute-force search for a single-operation derivation.
fn search(derivation_id: &str, ring: Ring) -> Option<Derivation> {
    let unary_bound = CERT_SEARCH_UNARY_BOUND.min(ring.modulus());
    let bound = CERT_SEARCH_OPERAND_BOUND.min(ring.modulus());
    for op in Operation::ALL {
        match op.arity() {
            Arity::Unary => {
                for x in 0..unary_bound {
                    if let Some(d) = matching(op, &[x], ring, derivation_id) {
                        return Some(d);
                    }
                }
            }
            Arity::Binary => {
                for x in 0..bound {
                    // Commutative pairs canonicalize identically; visit each once.
                    let y_start = if op.is_commutative() { x } else { 0 };
                    for y in y_start..bound {
                        if let Some(d) = matching(op, &[x, y], ring, derivation_id) {
                            return Some(d);
                        }
                    }
                }
            }
        }
    }
    None
}

fn matching(op: Operation, operands: &[u64], ring: Ring, derivation_id: &str) -> Option<Derivation> {
    Derivation::of_operation(op, operands, ring)
        .ok()
        .filter(|d| d.derivation_id == derivation_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r8() -> Ring {
        Ring::default()
    }

    #[test]
    fn graph_resident_derivation() {
        let graph = KnowledgeGraph::build(r8());
        let id = derive("neg(bnot(42))", r8()).expect("derive").derivation_id;
        let cert = certify(Some(&graph), &id, r8()).expect("certify");
        assert_eq!(cert.source, CertificateSource::Graph);
        assert_eq!(cert.grade, Grade::B);
        assert!(cert.reverified);
        assert_eq!(cert.result, 43);
        assert!(cert.certificate_id.starts_with(CERTIFICATE_URN_PREFIX));
    }

    #[test]
    fn found_by_unary_search() {
        let id = derive("bnot(200)", r8()).expect("derive").derivation_id;
        let cert = certify(None, &id, r8()).expect("certify");
        assert_eq!(cert.source, CertificateSource::Search);
        assert_eq!(cert.canonical_term, "bnot(200)");
        assert_eq!(cert.result, 55);
    }

    #[test]
    fn found_by_binary_search_either_order() {
        let id = derive("mul(7,3)", r8()).expect("derive").derivation_id;
        let cert = certify(None, &id, r8()).expect("certify");
        assert_eq!(cert.canonical_term, "mul(3,7)");
        let id = derive("sub(3,7)", r8()).expect("derive").derivation_id;
        assert_eq!(certify(None, &id, r8()).expect("certify").canonical_term, "sub(3,7)");
    }

    #[test]
    fn outside_search_bound_is_not_found() {
        let id = derive("add(100,100)", r8()).expect("derive").derivation_id;
        assert!(matches!(certify(None, &id, r8()), Err(RingfactError::NotFound(_))));
    }

    #[test]
    fn unary_search_is_bounded_on_wide_rings() {
        let ring = Ring::new(16).expect("ring");
        let near = derive("neg(255)", ring).expect("derive").derivation_id;
        assert_eq!(certify(None, &near, ring).expect("certify").result, 65281);

        let far = derive("neg(40000)", ring).expect("derive").derivation_id;
        assert!(matches!(certify(None, &far, ring), Err(RingfactError::NotFound(_))));

        let unknown = format!("urn:uor:derivation:sha256:{}", "0".repeat(64));
        assert!(matches!(certify(None, &unknown, ring), Err(RingfactError::NotFound(_))));
    }

    #[test]
    fn malformed_id_is_a_parameter_error() {
        assert!(matches!(
            certify(None, "urn:uor:derivation:sha256:xyz", r8()),
            Err(RingfactError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn graph_of_other_ring_is_ignored() {
        let graph = KnowledgeGraph::build(r8());
        let ring = Ring::new(4).expect("ring");
        let id = derive("succ(3)", ring).expect("derive").derivation_id;
        let cert = certify(Some(&graph), &id, ring).expect("certify");
        assert_eq!(cert.source, CertificateSource::Search);
        assert_eq!(cert.quantum, 4);
    }
}
