//! # Innate Primitives
//!
//! Hardcoded runtime constants for the ringfact CORE.
//!
//! These values are compiled into the binary and are immutable at runtime.
//! Everything a caller can observe about the ring is derived from them.

// =============================================================================
// RING QUANTUM
// =============================================================================

/// Default ring quantum (bit width). The canonical ring is `Z/256Z`.
pub const DEFAULT_QUANTUM: u32 = 8;

/// Largest quantum accepted for computation (values, terms, graph, validator).
pub const MAX_COMPUTE_QUANTUM: u32 = 16;

/// Largest quantum accepted for existence checks (critical identity only).
pub const MAX_EXISTENCE_QUANTUM: u32 = 32;

/// Rings at or below this quantum are checked exhaustively.
pub const EXHAUSTIVE_QUANTUM: u32 = 16;

/// Number of draws when a ring is too large to enumerate.
pub const SAMPLE_DRAWS: usize = 10_000;

/// Seed of the deterministic sampler. Fixed so that two runs draw the same elements.
pub const SAMPLE_SEED: u64 = 0x5EED_0F_C0FF_EE42;

// =============================================================================
// CONTENT ADDRESSING
// =============================================================================

/// First code point of the address alphabet (Unicode Braille Patterns block).
pub const GLYPH_BASE: u32 = 0x2800;

/// Multicodec for dag-json, used as the CID codec of canonical JSON bytes.
pub const DAG_JSON_CODEC: u64 = 0x0129;

/// Prefix of every derivation identifier.
pub const DERIVATION_URN_PREFIX: &str = "urn:uor:derivation:sha256:";

/// Prefix of every certificate identifier.
pub const CERTIFICATE_URN_PREFIX: &str = "urn:uor:cert:sha256:";

// =============================================================================
// TERMS & CERTIFICATION
// =============================================================================

/// Maximum nesting depth of a derivation term.
pub const MAX_TERM_DEPTH: usize = 20;

/// Maximum length of a term source string.
pub const MAX_TERM_LENGTH: usize = 4096;

/// Binary operands below this bound are tried during certificate re-derivation.
pub const CERT_SEARCH_OPERAND_BOUND: u64 = 16;

/// Unary operands below this bound are tried during certificate
/// re-derivation; it covers every element of the default ring.
pub const CERT_SEARCH_UNARY_BOUND: u64 = 256;

// =============================================================================
// VALIDATOR
// =============================================================================

/// Maximum number of violating inputs reported per conformance check.
pub const MAX_REPORTED_VIOLATIONS: usize = 10;

/// Maximum number of ring elements a conformance check visits.
pub const MAX_CHECKED_ELEMENTS: u64 = 1 << 16;

// =============================================================================
// QUERY
// =============================================================================

/// Maximum length of a query string.
pub const MAX_QUERY_LENGTH: usize = 8192;

/// Maximum number of triple patterns in one query.
pub const MAX_QUERY_PATTERNS: usize = 16;

/// Maximum number of intermediate bindings during evaluation.
///
/// Joins that would grow past this are rejected instead of exhausting memory.
pub const MAX_INTERMEDIATE_BINDINGS: usize = 100_000;

// =============================================================================
// OBJECT STORE
// =============================================================================

/// Maximum size of a canonical payload accepted for storage (64 KB).
pub const MAX_STORE_PAYLOAD: usize = 64 * 1024;

// =============================================================================
// OBSERVERS
// =============================================================================

/// Number of most recent outputs an observer's zone is computed from.
pub const OBSERVER_WINDOW: usize = 20;

/// Basis points denominator (1.0 == 10_000).
pub const BASIS_POINTS: u32 = 10_000;

/// Milli-unit denominator for distance scores (1.0 == 1_000).
pub const MILLI: u32 = 1_000;

/// Coherence requires a grade-A rate of at least 0.80.
pub const COHERENCE_MIN_RATE_BP: u32 = 8_000;

/// Coherence requires a mean distance below 2.0.
pub const COHERENCE_MAX_DISTANCE_MILLI: u32 = 2_000;

/// Drift requires a grade-A rate of at least 0.20.
pub const DRIFT_MIN_RATE_BP: u32 = 2_000;

/// Drift requires a mean distance below 5.0.
pub const DRIFT_MAX_DISTANCE_MILLI: u32 = 5_000;

/// Maximum length of an agent identifier.
pub const MAX_AGENT_ID_LENGTH: usize = 128;
