//! # Query Evaluator
//!
//! A strict SELECT subset over the knowledge graph:
//!
//! ```text
//! [PREFIX p: <iri>]*
//! SELECT [DISTINCT] (?v+ | * | (COUNT(?x|*) AS ?n))
//! WHERE { [GRAPH <iri> {] pattern (. pattern)* FILTER(...)* [}] }
//! [LIMIT n] [OFFSET n]
//! ```
//!
//! Results follow graph generation order; OFFSET and LIMIT are applied after
//! the full join. Filters outside the recognized shapes do not restrict the
//! result and are reported in [`QueryResult::warnings`].

pub mod eval;
pub mod parser;

pub use eval::{Binding, QueryResult, evaluate};
pub use parser::{CompareOp, Filter, GraphScope, PatternTerm, Projection, Query, parse_query};

use crate::RingfactError;
use crate::graph::KnowledgeGraph;

/// Parse and evaluate in one step.
pub fn execute(graph: &KnowledgeGraph, source: &str) -> Result<QueryResult, RingfactError> {
    evaluate(graph, &parse_query(source)?)
}
