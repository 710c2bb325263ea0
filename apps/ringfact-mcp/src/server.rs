//! # ringfact MCP Server
//!
//! Implements `ServerHandler` with MCP tools that proxy to the ringfact HTTP API.

use crate::client::{ClientError, RingfactClient};
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router,
};
use serde::Deserialize;
use serde_json::{Value, json};

// =============================================================================
// MCP SERVER
// =============================================================================

/// MCP server that bridges to a ringfact HTTP API.
#[derive(Clone)]
pub struct RingfactMcp {
    client: RingfactClient,
    #[allow(dead_code)]
    tool_router: ToolRouter<Self>,
}

// =============================================================================
// TOOL PARAMETER STRUCTS
// =============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ComputeParams {
    #[schemars(description = "Operation: neg, bnot, succ, pred, add, sub, mul, xor, and, or, shl, shr")]
    pub op: String,
    #[schemars(description = "First operand")]
    pub x: u64,
    #[schemars(description = "Second operand, for binary operations only")]
    pub y: Option<u64>,
    #[schemars(description = "Ring quantum in bits (default 8)")]
    pub n: Option<u32>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DeriveParams {
    #[schemars(description = "Term such as 'add(mul(3,5),neg(1))'")]
    pub term: String,
    #[schemars(description = "Ring quantum in bits (default 8)")]
    pub n: Option<u32>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CertifyParams {
    #[schemars(description = "Derivation id: urn:uor:derivation:sha256:<64 hex>")]
    pub derivation_id: String,
    #[schemars(description = "Ring quantum in bits (default 8)")]
    pub n: Option<u32>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct QueryParams {
    #[schemars(description = "SELECT query over the ring's knowledge graph, e.g. \
        'SELECT ?s WHERE { ?s partition:class partition:UnitSet }'")]
    pub query: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ConformanceParams {
    #[schemars(description = "Ring quantum in bits (default 8)")]
    pub n: Option<u32>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct StoreWriteParams {
    #[schemars(description = "JSON object with a non-empty '@type' field")]
    pub payload: Value,
    #[schemars(description = "Gateway name (default: the server's default gateway)")]
    pub gateway: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct StoreReadParams {
    #[schemars(description = "Gateway identifier returned by store write (gateway_cid)")]
    pub identifier: String,
    #[schemars(description = "Gateway name (default: the server's default gateway)")]
    pub gateway: Option<String>,
    #[schemars(description = "Withhold content that fails verification or cannot be read (default false)")]
    pub strict: Option<bool>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct RegisterObserverParams {
    #[schemars(description = "Agent identifier")]
    pub agent_id: String,
    #[schemars(description = "Declared capacity, at least 1")]
    pub capacity: u32,
    #[schemars(description = "Derivation id that founds the agent's trail")]
    pub founding_derivation: String,
    #[schemars(description = "Ring quantum in bits (default 8)")]
    pub quantum: Option<u32>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct RecordOutputParams {
    #[schemars(description = "Agent identifier")]
    pub agent_id: String,
    #[schemars(description = "Grade of the output: A, B, C or D")]
    pub grade: String,
    #[schemars(description = "Derivation id backing the output, if any")]
    pub derivation_id: Option<String>,
    #[schemars(description = "Distance as a decimal string, e.g. '0.5'")]
    pub distance: Option<String>,
    #[schemars(description = "Claimed value; with 'derived', the distance is their Hamming distance")]
    pub claimed: Option<u64>,
    #[schemars(description = "Derived value")]
    pub derived: Option<u64>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ProfileParams {
    #[schemars(description = "Agent identifier")]
    pub agent_id: String,
}

// =============================================================================
// TOOL IMPLEMENTATIONS
// =============================================================================

#[tool_router]
impl RingfactMcp {
    pub fn new(client: RingfactClient) -> Self {
        Self {
            client,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Evaluate one ring operation and get its content address and derivation id")]
    async fn ringfact_compute(
        &self,
        params: Parameters<ComputeParams>,
    ) -> Result<CallToolResult, McpError> {
        let ComputeParams { op, x, y, n } = params.0;
        respond(self.client.compute(&op, x, y, n).await, format_operation)
    }

    #[tool(description = "Evaluate a term and mint its derivation id (grade A)")]
    async fn ringfact_derive(
        &self,
        params: Parameters<DeriveParams>,
    ) -> Result<CallToolResult, McpError> {
        let DeriveParams { term, n } = params.0;
        respond(self.client.derive(&term, n).await, format_derivation)
    }

    #[tool(description = "Certify a derivation id by re-deriving it")]
    async fn ringfact_certify(
        &self,
        params: Parameters<CertifyParams>,
    ) -> Result<CallToolResult, McpError> {
        let CertifyParams { derivation_id, n } = params.0;
        respond(self.client.certify(&derivation_id, n).await, format_json)
    }

    #[tool(description = "Run a SELECT query over the ring's knowledge graph")]
    async fn ringfact_query(
        &self,
        params: Parameters<QueryParams>,
    ) -> Result<CallToolResult, McpError> {
        respond(self.client.query(&params.0.query).await, format_query)
    }

    #[tool(description = "Run the ring conformance battery")]
    async fn ringfact_conformance(
        &self,
        params: Parameters<ConformanceParams>,
    ) -> Result<CallToolResult, McpError> {
        respond(self.client.conformance(params.0.n).await, format_json)
    }

    #[tool(description = "Seal a JSON object with its content address and store it on a gateway")]
    async fn ringfact_store_write(
        &self,
        params: Parameters<StoreWriteParams>,
    ) -> Result<CallToolResult, McpError> {
        let StoreWriteParams { payload, gateway } = params.0;
        respond(
            self.client.store_write(&payload, gateway.as_deref()).await,
            format_json,
        )
    }

    #[tool(description = "Fetch a stored object and verify both of its identifiers")]
    async fn ringfact_store_read(
        &self,
        params: Parameters<StoreReadParams>,
    ) -> Result<CallToolResult, McpError> {
        let StoreReadParams {
            identifier,
            gateway,
            strict,
        } = params.0;
        respond(
            self.client
                .store_read(&identifier, gateway.as_deref(), strict.unwrap_or(false))
                .await,
            format_store_read,
        )
    }

    #[tool(description = "Register an agent whose outputs will be tracked for grounding")]
    async fn ringfact_observer_register(
        &self,
        params: Parameters<RegisterObserverParams>,
    ) -> Result<CallToolResult, McpError> {
        let RegisterObserverParams {
            agent_id,
            capacity,
            founding_derivation,
            quantum,
        } = params.0;
        let body = json!({
            "agent_id": agent_id,
            "capacity": capacity,
            "founding_derivation": founding_derivation,
            "quantum": quantum,
        });
        respond(self.client.register_observer(&body).await, format_profile)
    }

    #[tool(description = "Record one output for an agent and get its updated zone")]
    async fn ringfact_observer_record(
        &self,
        params: Parameters<RecordOutputParams>,
    ) -> Result<CallToolResult, McpError> {
        let RecordOutputParams {
            agent_id,
            grade,
            derivation_id,
            distance,
            claimed,
            derived,
        } = params.0;
        let body = json!({
            "grade": grade,
            "derivation_id": derivation_id,
            "distance": distance,
            "claimed": claimed,
            "derived": derived,
        });
        respond(
            self.client.record_output(&agent_id, &body).await,
            format_profile,
        )
    }

    #[tool(description = "Get an agent's zone, window statistics and remediation steps")]
    async fn ringfact_observer_profile(
        &self,
        params: Parameters<ProfileParams>,
    ) -> Result<CallToolResult, McpError> {
        respond(
            self.client.observer_profile(&params.0.agent_id).await,
            format_profile,
        )
    }
}

// =============================================================================
// SERVER HANDLER
// =============================================================================

#[tool_handler]
impl ServerHandler for RingfactMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "ringfact: content-addressed arithmetic over Z/2^n. Derive values to get \
                 recomputable derivation ids, certify them, query the ring's knowledge graph, \
                 store objects with dual verification and track agent grounding."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

// =============================================================================
// RESPONSE FORMATTING
// =============================================================================

/// Turn a client result into a tool result. API error envelopes become tool
/// errors; transport failures become protocol errors.
fn respond(
    result: Result<Value, ClientError>,
    format: fn(&Value) -> String,
) -> Result<CallToolResult, McpError> {
    match result {
        Ok(resp) => match format_error(&resp) {
            Some(text) => Ok(CallToolResult::error(vec![Content::text(text)])),
            None => Ok(CallToolResult::success(vec![Content::text(format(&resp))])),
        },
        Err(e) => Err(McpError::internal_error(format!("{e}"), None)),
    }
}

fn str_field<'a>(resp: &'a Value, key: &str) -> &'a str {
    resp.get(key).and_then(Value::as_str).unwrap_or("?")
}

/// The API's error envelope, if `resp` is one.
fn format_error(resp: &Value) -> Option<String> {
    let code = resp.get("code").and_then(Value::as_str)?;
    let error = resp.get("error").and_then(Value::as_str)?;
    let mut parts = vec![format!("Error ({code}): {error}")];
    if let Some(param) = resp.get("param").and_then(Value::as_str) {
        parts.push(format!("Parameter: {param}"));
    }
    if let Some(hint) = resp.get("hint").and_then(Value::as_str) {
        parts.push(format!("Hint: {hint}"));
    }
    Some(parts.join("\n"))
}

fn format_json(resp: &Value) -> String {
    serde_json::to_string_pretty(resp).unwrap_or_else(|_| resp.to_string())
}

fn format_operation(resp: &Value) -> String {
    format!(
        "{} = {} (n={})\nAddress: {}\nDerivation: {}",
        str_field(resp, "canonical_term"),
        resp.get("result").map_or_else(|| "?".to_string(), Value::to_string),
        resp.get("quantum").map_or_else(|| "?".to_string(), Value::to_string),
        str_field(resp, "address"),
        str_field(resp, "derivation_id"),
    )
}

fn format_derivation(resp: &Value) -> String {
    format!(
        "{} = {}\nAddress: {}\nDerivation: {}\nGrade: {}",
        str_field(resp, "canonical_term"),
        resp.get("result").map_or_else(|| "?".to_string(), Value::to_string),
        str_field(resp, "result_address"),
        str_field(resp, "derivation_id"),
        str_field(resp, "grade"),
    )
}

fn format_query(resp: &Value) -> String {
    let variables: Vec<&str> = resp
        .get("variables")
        .and_then(Value::as_array)
        .map(|vars| vars.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    let rows = resp
        .get("rows")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut lines = vec![variables.join("\t")];
    for row in &rows {
        let cells: Vec<&str> = variables
            .iter()
            .map(|v| {
                row.get(*v)
                    .and_then(|cell| cell.get("value"))
                    .and_then(Value::as_str)
                    .unwrap_or("")
            })
            .collect();
        lines.push(cells.join("\t"));
    }
    let total = resp.get("total").and_then(Value::as_u64).unwrap_or(0);
    lines.push(format!("{} of {} rows", rows.len(), total));
    if let Some(warnings) = resp.get("warnings").and_then(Value::as_array) {
        for warning in warnings.iter().filter_map(Value::as_str) {
            lines.push(format!("warning: {warning}"));
        }
    }
    lines.join("\n")
}

fn format_store_read(resp: &Value) -> String {
    let verified = resp.get("verified").and_then(Value::as_bool).unwrap_or(false);
    let check = |key: &str| {
        resp.get(key)
            .and_then(|c| c.get("status"))
            .and_then(Value::as_str)
            .unwrap_or("?")
            .to_string()
    };
    let mut text = format!(
        "Verified: {verified}\nCID integrity: {}\nAddress consistency: {}\nTrust: {}",
        check("cid_integrity"),
        check("address_consistency"),
        str_field(resp, "trust"),
    );
    if let Some(payload) = resp.get("payload") {
        text.push_str("\nPayload:\n");
        text.push_str(&format_json(payload));
    }
    text
}

fn format_profile(resp: &Value) -> String {
    let stats = resp.get("stats").cloned().unwrap_or(Value::Null);
    let mut text = format!(
        "Agent: {}\nZone: {}\nGrade-A rate: {}\nMean distance: {}\nPersistence: {}",
        str_field(resp, "agent_id"),
        str_field(resp, "zone"),
        str_field(&stats, "grade_a_rate"),
        str_field(&stats, "mean_distance"),
        str_field(&stats, "persistence"),
    );
    if let Some(remediation) = resp.get("remediation") {
        text.push_str(&format!("\nRemediation: {}", str_field(remediation, "summary")));
        for step in remediation
            .get("steps")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
        {
            text.push_str(&format!("\n  - {step}"));
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_envelopes_are_detected() {
        let text = format_error(&json!({
            "code": "invalid_parameter",
            "error": "bad y",
            "param": "y"
        }))
        .expect("envelope");
        assert!(text.contains("invalid_parameter"));
        assert!(text.contains("Parameter: y"));
        assert!(format_error(&json!({ "result": 3 })).is_none());
    }

    #[test]
    fn query_rows_render_as_table() {
        let text = format_query(&json!({
            "variables": ["s"],
            "rows": [{ "s": { "type": "iri", "value": "https://uor.foundation/datum/q8/1" } }],
            "total": 2
        }));
        assert!(text.starts_with("s\n"));
        assert!(text.contains("datum/q8/1"));
        assert!(text.ends_with("1 of 2 rows"));
    }

    #[test]
    fn profile_lists_remediation_steps() {
        let text = format_profile(&json!({
            "agent_id": "a",
            "zone": "Drift",
            "stats": { "grade_a_rate": "0.5000", "mean_distance": "1.500", "persistence": "0.5000" },
            "remediation": { "summary": "restore trails", "steps": ["derive", "certify"] }
        }));
        assert!(text.contains("Zone: Drift"));
        assert!(text.contains("  - certify"));
    }
}
