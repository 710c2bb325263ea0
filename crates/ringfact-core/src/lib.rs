//! # ringfact-core
//!
//! The deterministic knowledge engine for ringfact - THE LOGIC.
//!
//! Every fact this crate produces is a computation over the ring `Z/2^n`
//! that anyone can repeat: values, derivations, triples and certificates
//! carry content addresses and identifiers that are pure functions of
//! their inputs.
//!
//! ## Architectural Constraints
//!
//! The CORE:
//! - Is closed: the knowledge graph is generated from the ring, never mutated
//! - Is deterministic: `BTreeMap` only, no floats, fixed-seed sampling
//! - Never panics on caller input; every failure is a [`RingfactError`]
//! - Has NO async, NO network dependencies (pure Rust)

// =============================================================================
// MODULES
// =============================================================================

pub mod canonical;
pub mod certify;
pub mod conformance;
pub mod dagpb;
pub mod datum;
pub mod derivation;
pub mod envelope;
pub mod grade;
pub mod graph;
pub mod observer;
pub mod primitives;
pub mod ring;
pub mod sparql;
pub mod term;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{BasisPoints, Milli, RingfactError};

// =============================================================================
// RE-EXPORTS: Kernel
// =============================================================================

pub use canonical::{
    DigestSummary, canonical_bytes, canonical_string, canonicalize, compute_cid, decode_address,
    encode_address, sha256_hex,
};
pub use datum::{Datum, element_address, element_bytes};
pub use ring::{
    Arity, CheckMethod, IdentityReport, IdentityWitness, Operation, PartitionClass,
    PartitionCounts, Ring,
};

// =============================================================================
// RE-EXPORTS: Derivations & Grades
// =============================================================================

pub use certify::{Certificate, CertificateSource, certify};
pub use derivation::{Derivation, derivation_id, derive, is_derivation_id};
pub use grade::{Grade, GradeInfo};
pub use term::{Term, parse_term};

// =============================================================================
// RE-EXPORTS: Knowledge Graph & Query
// =============================================================================

pub use graph::{GraphContext, KnowledgeGraph, Node, Object, Triple};
pub use sparql::{QueryResult, execute};

// =============================================================================
// RE-EXPORTS: Store, Conformance, Observers
// =============================================================================

pub use conformance::{CheckResult, ConformanceReport, validate};
pub use envelope::{CheckStatus, SealedEnvelope, Verification, WithholdReason, seal, verify};
pub use observer::{
    ObserverBackend, ObserverOutput, ObserverRecord, ObserverRegistry, RedbObserverStore, Zone,
    ZoneStats,
};
