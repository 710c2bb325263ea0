//! # Validation Tier Tests (T0-T4)
//!
//! If ANY tier fails, the engine is INVALID.
//!
//! ## Tiers
//! - T0: Kernel Integrity
//! - T1: Content Addressing
//! - T2: Derivation & Certification
//! - T3: Knowledge Graph & Query
//! - T4: Object Store Envelopes & Observers

use ringfact_core::{Grade, Ring, RingfactError};

// =============================================================================
// TIER T0: KERNEL INTEGRITY
// =============================================================================

mod t0_kernel_integrity {
    use super::*;
    use ringfact_core::{Operation, PartitionClass};

    /// T0.1: The critical identity holds at the default quantum.
    #[test]
    fn critical_identity_default_ring() {
        let report = Ring::default().verify_critical_identity();
        assert!(report.holds);
        assert_eq!(report.checked, 256);
        assert!(report.counterexamples.is_empty());
    }

    /// T0.2: The canonical witness x = 42.
    #[test]
    fn witness_at_42() {
        let ring = Ring::default();
        let w = ring.identity_at(42);
        assert_eq!(w.bnot_x, 213);
        assert_eq!(w.neg_bnot_x, 43);
        assert_eq!(w.succ_x, 43);
        assert!(w.holds);
    }

    /// T0.3: Existence checks reach n = 32 by sampling.
    #[test]
    fn existence_at_32_bits() {
        let ring = Ring::for_existence(32).expect("ring");
        let report = ring.verify_critical_identity();
        assert!(report.holds);
        assert_eq!(report.checked, 10_000);
    }

    /// T0.4: Quantum bounds are enforced.
    #[test]
    fn quantum_bounds() {
        assert!(Ring::new(0).is_err());
        assert!(Ring::new(17).is_err());
        assert!(Ring::for_existence(33).is_err());
        assert!(matches!(
            Ring::new(17),
            Err(RingfactError::InvalidParameter { ref param, .. }) if param == "n"
        ));
    }

    /// T0.5: Partition of Z/256Z.
    #[test]
    fn partition_z256() {
        let ring = Ring::default();
        let counts = ring.partition();
        assert_eq!(counts.units, 2);
        assert_eq!(counts.exterior, 2);
        assert_eq!(counts.irreducible, 126);
        assert_eq!(counts.reducible, 126);
        assert_eq!(counts.total(), 256);
        assert_eq!(ring.classify(128), PartitionClass::Exterior);
        assert_eq!(ring.classify(255), PartitionClass::Unit);
    }

    /// T0.6: Operation application respects arity.
    #[test]
    fn apply_arity() {
        let ring = Ring::default();
        assert_eq!(ring.apply(Operation::Add, &[250, 10]).expect("add"), 4);
        assert_eq!(ring.apply(Operation::Add, &[1, 2, 3]).expect("fold"), 6);
        assert!(ring.apply(Operation::Sub, &[1, 2, 3]).is_err());
        assert!(ring.apply(Operation::Neg, &[]).is_err());
    }
}

// =============================================================================
// TIER T1: CONTENT ADDRESSING
// =============================================================================

mod t1_content_addressing {
    use ringfact_core::{DigestSummary, canonical_string, compute_cid, decode_address, encode_address};
    use serde_json::json;

    /// T1.1: Key order does not affect canonical form.
    #[test]
    fn canonical_form_is_order_independent() {
        let a = json!({"b": 1, "a": {"d": [3, 2], "c": null}});
        let b = json!({"a": {"c": null, "d": [3, 2]}, "b": 1});
        assert_eq!(canonical_string(&a), canonical_string(&b));
        assert_eq!(canonical_string(&a), r#"{"a":{"c":null,"d":[3,2]},"b":1}"#);
    }

    /// T1.2: CIDs are CIDv1 dag-json base32.
    #[test]
    fn cid_shape() {
        let cid = compute_cid(b"{}");
        assert!(cid.starts_with("bagu"));
        assert_eq!(cid, compute_cid(b"{}"));
        assert_ne!(cid, compute_cid(b"[]"));
    }

    /// T1.3: Addresses are one glyph per byte and reversible.
    #[test]
    fn address_round_trip() {
        let bytes = [0u8, 42, 255];
        let address = encode_address(&bytes);
        assert_eq!(address.chars().count(), 3);
        assert_eq!(address.chars().next(), Some('\u{2800}'));
        assert_eq!(decode_address(&address).expect("decode"), bytes.to_vec());
        assert!(decode_address("a").is_err());
    }

    /// T1.4: Digest summaries agree with their parts.
    #[test]
    fn digest_summary_consistency() {
        let value = json!({"x": 1});
        let digest = DigestSummary::of(&value);
        assert_eq!(digest.canonical, r#"{"x":1}"#);
        assert_eq!(digest.byte_length, 7);
        assert_eq!(digest.cid, compute_cid(digest.canonical.as_bytes()));
        assert_eq!(digest.sha256.len(), 64);
    }
}

// =============================================================================
// TIER T2: DERIVATION & CERTIFICATION
// =============================================================================

mod t2_derivation {
    use super::*;
    use ringfact_core::{CertificateSource, KnowledgeGraph, certify, derive, is_derivation_id};

    /// T2.1: Commuted operands mint the same id.
    #[test]
    fn commutative_terms_share_an_id() {
        let ring = Ring::default();
        let a = derive("add(2, 1)", ring).expect("derive");
        let b = derive("add(1,2)", ring).expect("derive");
        assert_eq!(a.derivation_id, b.derivation_id);
        assert_eq!(a.result, 3);
        assert_eq!(a.grade, Grade::A);
        assert!(is_derivation_id(&a.derivation_id));
    }

    /// T2.2: Non-commutative operands keep their order.
    #[test]
    fn non_commutative_terms_differ() {
        let ring = Ring::default();
        let a = derive("sub(5,3)", ring).expect("derive");
        let b = derive("sub(3,5)", ring).expect("derive");
        assert_ne!(a.derivation_id, b.derivation_id);
        assert_eq!(b.result, 254);
    }

    /// T2.3: The same term in a different ring is a different fact.
    #[test]
    fn ring_scopes_identity() {
        let small = derive("succ(3)", Ring::default()).expect("derive");
        let large = derive("succ(3)", Ring::new(12).expect("ring")).expect("derive");
        assert_eq!(small.result, large.result);
        assert_ne!(small.result_address, large.result_address);
        assert_ne!(small.derivation_id, large.derivation_id);
    }

    /// T2.4: Depth and literal range are enforced.
    #[test]
    fn parse_limits() {
        let ring = Ring::default();
        let deep = format!("{}1{}", "succ(".repeat(21), ")".repeat(21));
        assert!(matches!(derive(&deep, ring), Err(RingfactError::DepthExceeded(_))));
        assert!(derive("succ(256)", ring).is_err());
        assert!(matches!(derive("frob(1)", ring), Err(RingfactError::Parse { .. })));
    }

    /// T2.5: Graph derivations certify from the graph; others by search.
    #[test]
    fn certificate_sources() {
        let ring = Ring::default();
        let graph = KnowledgeGraph::build(ring);

        let in_graph = derive("succ(42)", ring).expect("derive");
        let cert = certify(Some(&graph), &in_graph.derivation_id, ring).expect("certify");
        assert_eq!(cert.source, CertificateSource::Graph);
        assert!(cert.reverified);
        assert_eq!(cert.grade, Grade::B);

        let searched = derive("mul(7,9)", ring).expect("derive");
        let cert = certify(Some(&graph), &searched.derivation_id, ring).expect("certify");
        assert_eq!(cert.source, CertificateSource::Search);
        assert_eq!(cert.result, 63);
    }

    /// T2.6: Unknown ids are not found; malformed ids are rejected.
    #[test]
    fn certificate_failures() {
        let ring = Ring::default();
        let nested = derive("add(mul(200,3),xor(77,99))", ring).expect("derive");
        assert!(matches!(
            certify(None, &nested.derivation_id, ring),
            Err(RingfactError::NotFound(_))
        ));
        assert!(matches!(
            certify(None, "urn:uor:derivation:sha256:xyz", ring),
            Err(RingfactError::InvalidParameter { .. })
        ));
    }
}

// =============================================================================
// TIER T3: KNOWLEDGE GRAPH & QUERY
// =============================================================================

mod t3_graph_query {
    use super::*;
    use ringfact_core::graph::nquads::to_nquads;
    use ringfact_core::{GraphContext, execute};

    /// T3.1: The graph is built once and is stable.
    #[test]
    fn graph_is_deterministic() {
        let ctx = GraphContext::new();
        assert!(!ctx.is_built());
        let first = to_nquads(ctx.graph());
        assert!(ctx.is_built());
        let second = to_nquads(&ringfact_core::KnowledgeGraph::build(Ring::default()));
        assert_eq!(first, second);
    }

    /// T3.2: Every datum appears as a node.
    #[test]
    fn datum_nodes() {
        let ctx = GraphContext::new();
        let result = execute(
            ctx.graph(),
            "SELECT (COUNT(?d) AS ?n) WHERE { ?d a <https://uor.foundation/schema/Datum> }",
        )
        .expect("query");
        assert_eq!(result.rows.len(), 1);
        assert_eq!(
            result.rows[0].get("n").and_then(|o| o.as_integer()),
            Some(256)
        );
    }

    /// T3.3: Non-SELECT queries are unsupported.
    #[test]
    fn construct_is_unsupported() {
        let ctx = GraphContext::new();
        assert!(matches!(
            execute(ctx.graph(), "CONSTRUCT { ?s ?p ?o } WHERE { ?s ?p ?o }"),
            Err(RingfactError::Unsupported(_))
        ));
    }
}

// =============================================================================
// TIER T4: ENVELOPES & OBSERVERS
// =============================================================================

mod t4_store_observers {
    use super::*;
    use ringfact_core::{CheckStatus, ObserverOutput, ObserverRegistry, Zone, seal, verify};
    use ringfact_core::Milli;
    use serde_json::json;

    /// T4.1: A sealed envelope verifies.
    #[test]
    fn seal_then_verify() {
        let sealed = seal(&json!({"@type": "schema:Note", "text": "hello"}), 1_700_000_000)
            .expect("seal");
        let verification = verify(&sealed.bytes);
        assert!(verification.verified());
        assert_eq!(verification.grade(), Grade::B);
        assert_eq!(verification.cid_integrity.status, CheckStatus::Pass);
        assert_eq!(verification.payload_type(), Some("schema:Note"));
    }

    /// T4.2: Tampering is detected.
    #[test]
    fn tampering_fails() {
        let sealed = seal(&json!({"@type": "schema:Note", "n": 1}), 0).expect("seal");
        let tampered = String::from_utf8(sealed.bytes)
            .expect("utf8")
            .replace("\"n\":1", "\"n\":2");
        let verification = verify(tampered.as_bytes());
        assert!(!verification.verified());
        assert_eq!(verification.grade(), Grade::D);
    }

    /// T4.3: Kernel types are refused.
    #[test]
    fn kernel_types_refused() {
        assert!(seal(&json!({"@type": "schema:Datum"}), 0).is_err());
        assert!(seal(&json!({"text": "untyped"}), 0).is_err());
    }

    /// T4.4: A registered agent drifts as ungrounded outputs accumulate.
    #[test]
    fn observer_drift() {
        let ring = Ring::default();
        let founding = ringfact_core::derive("succ(42)", ring).expect("derive");
        let mut registry = ObserverRegistry::new();
        let record = registry
            .register("agent-x", 8, 4, &founding.derivation_id, 1)
            .expect("register");
        assert_eq!(record.zone, Zone::Coherence);

        let (record, changed) = registry
            .record(
                "agent-x",
                ObserverOutput {
                    grade: Grade::C,
                    derivation_id: None,
                    distance: Milli::from_units(3),
                    recorded_at: 2,
                },
                2,
            )
            .expect("record");
        assert!(changed);
        assert_eq!(record.zone, Zone::Drift);
        assert_eq!(record.zone_since, 2);
    }
}
