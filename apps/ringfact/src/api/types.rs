//! # API Request/Response Types
//!
//! JSON structures for the HTTP API.
//!
//! Query-string parameters are taken as strings so that a malformed value is
//! reported against its own name rather than as a generic extractor failure.

use ringfact_core::{
    Certificate, Datum, Derivation, GradeInfo, IdentityReport, IdentityWitness, Milli,
    ObserverRecord, PartitionClass, PartitionCounts, ZoneStats,
    envelope::Check,
    graph::Object,
    observer::Remediation,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::gateway::GatewayStatus;

// =============================================================================
// HEALTH
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Whether the default knowledge graph has been built yet.
    pub graph_built: bool,
}

impl HealthResponse {
    #[must_use]
    pub fn new(graph_built: bool) -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            graph_built,
        }
    }
}

// =============================================================================
// KERNEL
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpParams {
    pub op: Option<String>,
    pub x: Option<String>,
    pub y: Option<String>,
    pub n: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ElementParams {
    pub x: Option<String>,
    pub n: Option<String>,
}

/// One evaluated operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResponse {
    pub op: String,
    pub operands: Vec<u64>,
    pub quantum: u32,
    pub modulus: u64,
    pub result: u64,
    pub address: String,
    pub datum: Datum,
    pub derivation_id: String,
    pub canonical_term: String,
    pub grade: GradeInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatumResponse {
    pub address: String,
    pub datum: Datum,
    pub grade: GradeInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionResponse {
    pub quantum: u32,
    pub modulus: u64,
    pub counts: PartitionCounts,
    pub total: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<PartitionClass>,
}

/// The critical identity at one element or over the ring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityResponse {
    pub quantum: u32,
    pub identity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub witness: Option<IdentityWitness>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<IdentityReport>,
    pub holds: bool,
}

// =============================================================================
// DERIVATION & CERTIFICATION
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeriveParams {
    pub term: Option<String>,
    pub n: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeriveRequest {
    pub term: String,
    #[serde(default)]
    pub n: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivationResponse {
    #[serde(flatten)]
    pub derivation: Derivation,
    pub grade_info: GradeInfo,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CertifyParams {
    pub derivation_id: Option<String>,
    pub n: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateResponse {
    #[serde(flatten)]
    pub certificate: Certificate,
    pub grade_info: GradeInfo,
}

// =============================================================================
// ADDRESSING
// =============================================================================

/// Exactly one of `hex` or `text`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddressEncodeRequest {
    #[serde(default)]
    pub hex: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressEncodeResponse {
    pub address: String,
    pub hex: String,
    pub length: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddressDecodeParams {
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressDecodeResponse {
    pub address: String,
    pub hex: String,
    pub length: usize,
    /// The bytes as text, when they are valid UTF-8.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalRequest {
    pub object: Value,
}

// =============================================================================
// GRAPH & CONFORMANCE
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GraphQueryParams {
    pub q: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphQueryRequest {
    pub query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub variables: Vec<String>,
    pub rows: Vec<BTreeMap<String, Object>>,
    /// Rows before OFFSET/LIMIT.
    pub total: usize,
    /// Rows returned.
    pub count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub grade: GradeInfo,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuantumParams {
    pub n: Option<String>,
}

// =============================================================================
// OBJECT STORE
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreWriteParams {
    pub gateway: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreWriteRequest {
    pub payload: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreWriteResponse {
    pub gateway: String,
    /// Identifier assigned by the gateway; use it to read the object back.
    pub gateway_cid: String,
    /// CID of the round-1 envelope; use it to verify the object algebraically.
    pub uor_cid: String,
    pub address: String,
    pub payload_type: String,
    pub stored_at: u64,
    pub bytes: usize,
    pub usage: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreReadParams {
    pub gateway: Option<String>,
    pub strict: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreReadResponse {
    pub identifier: String,
    pub gateway: String,
    /// The gateway returned a dag-pb wrapped block.
    pub unwrapped: bool,
    pub verified: bool,
    pub cid_integrity: Check,
    pub address_consistency: Check,
    pub grade: GradeInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_type: Option<String>,
    /// Absent on verify-only reads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    pub trust: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GatewaysResponse {
    pub default: String,
    pub gateways: Vec<GatewayStatus>,
}

// =============================================================================
// OBSERVERS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterObserverRequest {
    pub agent_id: String,
    #[serde(default)]
    pub quantum: Option<u32>,
    pub capacity: u32,
    pub founding_derivation: String,
}

/// One output to record. The distance is given directly or computed from a
/// claimed and a derived value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordOutputRequest {
    pub grade: String,
    #[serde(default)]
    pub derivation_id: Option<String>,
    /// A number or a decimal string.
    #[serde(default)]
    pub distance: Option<Value>,
    #[serde(default)]
    pub claimed: Option<u64>,
    #[serde(default)]
    pub derived: Option<u64>,
}

/// Window statistics as decimal strings plus their raw fixed-point values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsView {
    pub window: u32,
    pub grade_a_rate: String,
    pub grade_a_rate_bp: u32,
    pub mean_distance: String,
    pub mean_distance_milli: u32,
    pub persistence: String,
    pub persistence_bp: u32,
}

impl From<ZoneStats> for StatsView {
    fn from(stats: ZoneStats) -> Self {
        Self {
            window: stats.window,
            grade_a_rate: stats.grade_a_rate.to_string(),
            grade_a_rate_bp: stats.grade_a_rate.value(),
            mean_distance: stats.mean_distance.to_string(),
            mean_distance_milli: stats.mean_distance.value(),
            persistence: stats.persistence.to_string(),
            persistence_bp: stats.persistence.value(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObserverProfileResponse {
    pub agent_id: String,
    pub quantum: u32,
    pub capacity: u32,
    pub founding_derivation: String,
    pub registered_at: u64,
    pub zone: String,
    pub zone_since: u64,
    /// Whether this request moved the agent to another zone.
    pub zone_changed: bool,
    pub outputs: usize,
    pub stats: StatsView,
    pub remediation: Remediation,
}

impl ObserverProfileResponse {
    #[must_use]
    pub fn new(record: &ObserverRecord, zone_changed: bool) -> Self {
        Self {
            agent_id: record.agent_id.clone(),
            quantum: record.quantum,
            capacity: record.capacity,
            founding_derivation: record.founding_derivation.clone(),
            registered_at: record.registered_at,
            zone: record.zone.name().to_string(),
            zone_since: record.zone_since,
            zone_changed,
            outputs: record.outputs.len(),
            stats: record.stats.into(),
            remediation: record.remediation(),
        }
    }
}

/// Parse a distance given as a JSON number or string.
pub fn parse_distance(value: &Value) -> Result<Milli, ringfact_core::RingfactError> {
    match value {
        Value::Number(n) => Milli::parse_decimal(&n.to_string()),
        Value::String(s) => Milli::parse_decimal(s),
        _ => Err(ringfact_core::RingfactError::param(
            "distance",
            "expected a number or a decimal string",
        )),
    }
}

// =============================================================================
// TESTS
// =============================================================================
