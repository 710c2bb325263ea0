//! Knowledge graph, query and conformance endpoints.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Response},
};
use ringfact_core::{ConformanceReport, Grade, execute, graph::nquads, validate};

use super::{required, ring_param};
use crate::api::AppState;
use crate::api::error::{ApiError, ApiJson, ApiQuery};
use crate::api::types::{GraphQueryParams, GraphQueryRequest, QuantumParams, QueryResponse};

fn run_query(state: &AppState, source: &str, param: &str) -> Result<Json<QueryResponse>, ApiError> {
    let result =
        execute(state.graph.graph(), source).map_err(|e| ApiError::from_core(e, param))?;
    for warning in &result.warnings {
        tracing::debug!(warning = %warning, "query filter passed through");
    }
    Ok(Json(QueryResponse {
        count: result.rows.len(),
        variables: result.variables,
        rows: result.rows,
        total: result.total,
        warnings: result.warnings,
        grade: Grade::C.info(),
    }))
}

/// `GET /graph/query?q`
pub async fn query_get_handler(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<GraphQueryParams>,
) -> Result<Json<QueryResponse>, ApiError> {
    run_query(&state, required("q", params.q.as_deref())?, "q")
}

/// `POST /graph/query {query}`
pub async fn query_post_handler(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<GraphQueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    run_query(&state, required("query", Some(&request.query))?, "query")
}

/// Serialization picked from `Accept`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GraphFormat {
    Json,
    NQuads,
    NTriples,
}

fn negotiate(headers: &HeaderMap) -> GraphFormat {
    let accept = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if accept.contains("application/n-quads") {
        GraphFormat::NQuads
    } else if accept.contains("application/n-triples") {
        GraphFormat::NTriples
    } else {
        GraphFormat::Json
    }
}

/// `GET /graph`: JSON, N-Quads or N-Triples by `Accept`.
pub async fn graph_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let graph = state.graph.graph();
    let (body, content_type) = match negotiate(&headers) {
        GraphFormat::Json => return Json(graph.to_json()).into_response(),
        GraphFormat::NQuads => (nquads::to_nquads(graph), "application/n-quads"),
        GraphFormat::NTriples => (nquads::to_ntriples(graph), "application/n-triples"),
    };
    (
        [(header::CONTENT_TYPE, HeaderValue::from_static(content_type))],
        body,
    )
        .into_response()
}

/// `GET /conformance?n`
pub async fn conformance_handler(
    ApiQuery(params): ApiQuery<QuantumParams>,
) -> Result<Json<ConformanceReport>, ApiError> {
    let ring = ring_param(params.n.as_deref())?;
    Ok(Json(validate(ring)))
}
