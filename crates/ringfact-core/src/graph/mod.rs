//! # Knowledge Graph
//!
//! The ring's fixed knowledge graph, materialized as typed nodes and flattened
//! into quads.
//!
//! The graph is generated from the ring alone. It is never mutated after
//! construction; [`GraphContext`] builds it on first use and hands out shared
//! references for the rest of the process lifetime.
//!
//! Generation order (and therefore query result order):
//! 1. ring node
//! 2. one datum node per element, ascending
//! 3. canonical derivation nodes
//! 4. coherence proof node
//! 5. partition node

pub mod nquads;
pub mod vocab;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::datum::Datum;
use crate::derivation::{Derivation, derive};
use crate::ring::{PartitionClass, Ring};
use vocab::{
    DERIVATION, PARTITION, PROOF, SCHEMA, XSD_BOOLEAN, XSD_INTEGER, XSD_STRING, datum_iri,
    graph_iri, iri, partition_iri, proof_iri, ring_iri,
};

/// Terms materialized as derivation nodes in every graph.
pub const CANONICAL_DERIVATIONS: [&str; 6] = [
    "neg(bnot(42))",
    "succ(42)",
    "pred(42)",
    "xor(10,42)",
    "add(1,255)",
    "mul(3,171)",
];

// =============================================================================
// TRIPLES
// =============================================================================

/// Object position of a triple.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Object {
    Iri { value: String },
    Literal { value: String, datatype: String },
}

impl Object {
    pub fn iri(value: impl Into<String>) -> Self {
        Self::Iri {
            value: value.into(),
        }
    }

    #[must_use]
    pub fn integer(value: u64) -> Self {
        Self::Literal {
            value: value.to_string(),
            datatype: XSD_INTEGER.to_string(),
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::Literal {
            value: value.into(),
            datatype: XSD_STRING.to_string(),
        }
    }

    #[must_use]
    pub fn boolean(value: bool) -> Self {
        Self::Literal {
            value: value.to_string(),
            datatype: XSD_BOOLEAN.to_string(),
        }
    }

    /// IRI text or literal lexical form.
    #[must_use]
    pub fn lexical(&self) -> &str {
        match self {
            Self::Iri { value } | Self::Literal { value, .. } => value,
        }
    }

    /// Integer value of an `xsd:integer` literal.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Literal { value, datatype } if datatype == XSD_INTEGER => value.parse().ok(),
            _ => None,
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Self::Iri { value } => json!({ "@id": value }),
            Self::Literal { value, datatype } if datatype == XSD_INTEGER => value
                .parse::<u64>()
                .map(Value::from)
                .unwrap_or_else(|_| Value::String(value.clone())),
            Self::Literal { value, datatype } if datatype == XSD_BOOLEAN => {
                Value::Bool(value == "true")
            }
            Self::Literal { value, .. } => Value::String(value.clone()),
        }
    }
}

/// One fact: subject, predicate, object, named graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: Object,
    pub graph: String,
}

// =============================================================================
// NODES
// =============================================================================

/// Value of one node property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    One(Object),
    /// Expanded element by element when flattened.
    Many(Vec<Object>),
}

/// A typed node before flattening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub iri: String,
    pub types: Vec<String>,
    pub props: Vec<(String, Field)>,
}

impl Node {
    fn new(iri: String, types: &[&str]) -> Self {
        Self {
            iri,
            types: types.iter().map(|t| (*t).to_string()).collect(),
            props: Vec::new(),
        }
    }

    fn with(mut self, predicate: String, object: Object) -> Self {
        self.props.push((predicate, Field::One(object)));
        self
    }

    fn with_all(mut self, predicate: String, objects: Vec<Object>) -> Self {
        self.props.push((predicate, Field::Many(objects)));
        self
    }

    /// Type triples first, then properties in declaration order.
    fn flatten(&self, graph: &str, out: &mut Vec<Triple>) {
        let triple = |predicate: &str, object: Object| Triple {
            subject: self.iri.clone(),
            predicate: predicate.to_string(),
            object,
            graph: graph.to_string(),
        };
        for t in &self.types {
            out.push(triple(vocab::RDF_TYPE, Object::iri(t.clone())));
        }
        for (predicate, field) in &self.props {
            match field {
                Field::One(object) => out.push(triple(predicate, object.clone())),
                Field::Many(objects) => {
                    for object in objects {
                        out.push(triple(predicate, object.clone()));
                    }
                }
            }
        }
    }

    /// JSON-LD style rendering used by the JSON export.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert("@id".into(), Value::String(self.iri.clone()));
        map.insert(
            "@type".into(),
            Value::Array(self.types.iter().cloned().map(Value::String).collect()),
        );
        for (predicate, field) in &self.props {
            let value = match field {
                Field::One(object) => object.to_json(),
                Field::Many(objects) => Value::Array(objects.iter().map(Object::to_json).collect()),
            };
            map.insert(predicate.clone(), value);
        }
        Value::Object(map)
    }
}

// =============================================================================
// KNOWLEDGE GRAPH
// =============================================================================

/// A graph-resident derivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivationEntry {
    pub original_term: String,
    pub canonical_term: String,
    pub result: u64,
}

/// The materialized graph of one ring.
#[derive(Debug, Clone)]
pub struct KnowledgeGraph {
    ring: Ring,
    iri: String,
    nodes: Vec<Node>,
    triples: Vec<Triple>,
    derivations: BTreeMap<String, DerivationEntry>,
    by_subject: BTreeMap<String, Vec<usize>>,
    by_predicate: BTreeMap<String, Vec<usize>>,
}

impl KnowledgeGraph {
    /// Generate the full graph of `ring`.
    #[must_use]
    pub fn build(ring: Ring) -> Self {
        let q = ring.quantum();
        let mut nodes = Vec::with_capacity(ring.modulus() as usize + 4);

        nodes.push(ring_node(ring));
        nodes.extend(ring.elements().map(|x| datum_node(ring, x)));

        let mut derivations = BTreeMap::new();
        for d in CANONICAL_DERIVATIONS
            .iter()
            .filter_map(|src| derive(src, ring).ok())
        {
            nodes.push(derivation_node(ring, &d));
            derivations.insert(
                d.derivation_id.clone(),
                DerivationEntry {
                    original_term: d.original_term,
                    canonical_term: d.canonical_term,
                    result: d.result,
                },
            );
        }

        nodes.push(proof_node(ring));
        nodes.push(partition_node(ring));

        let graph = graph_iri(q);
        let mut triples = Vec::new();
        for node in &nodes {
            node.flatten(&graph, &mut triples);
        }

        let mut by_subject: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        let mut by_predicate: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (i, t) in triples.iter().enumerate() {
            by_subject.entry(t.subject.clone()).or_default().push(i);
            by_predicate.entry(t.predicate.clone()).or_default().push(i);
        }

        Self {
            ring,
            iri: graph,
            nodes,
            triples,
            derivations,
            by_subject,
            by_predicate,
        }
    }

    #[must_use]
    pub fn ring(&self) -> Ring {
        self.ring
    }

    /// Named-graph IRI every quad carries.
    #[must_use]
    pub fn iri(&self) -> &str {
        &self.iri
    }

    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    #[must_use]
    pub fn triples(&self) -> &[Triple] {
        &self.triples
    }

    /// Indices of triples with this subject, in generation order.
    #[must_use]
    pub fn subject_index(&self, subject: &str) -> &[usize] {
        self.by_subject.get(subject).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Indices of triples with this predicate, in generation order.
    #[must_use]
    pub fn predicate_index(&self, predicate: &str) -> &[usize] {
        self.by_predicate.get(predicate).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Exact lookup of a graph-resident derivation.
    #[must_use]
    pub fn derivation(&self, derivation_id: &str) -> Option<&DerivationEntry> {
        self.derivations.get(derivation_id)
    }

    /// All graph-resident derivations, keyed by id.
    #[must_use]
    pub fn derivations(&self) -> &BTreeMap<String, DerivationEntry> {
        &self.derivations
    }

    /// JSON export: graph IRI plus every node.
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "@id": self.iri,
            "quantum": self.ring.quantum(),
            "triple_count": self.triples.len(),
            "@graph": self.nodes.iter().map(Node::to_json).collect::<Vec<_>>(),
        })
    }
}

fn schema(local: &str) -> String {
    iri(SCHEMA, local)
}

fn ring_node(ring: Ring) -> Node {
    let q = ring.quantum();
    Node::new(ring_iri(q), &["https://uor.foundation/schema/Ring"])
        .with(schema("quantum"), Object::integer(u64::from(q)))
        .with(schema("modulus"), Object::integer(ring.modulus()))
        .with(schema("generator"), Object::iri(datum_iri(q, 1)))
        .with(schema("zero"), Object::iri(datum_iri(q, 0)))
}

fn datum_node(ring: Ring, x: u64) -> Node {
    let q = ring.quantum();
    let datum = Datum::new(ring, x);
    let bits: Vec<Object> = datum
        .spectrum
        .iter()
        .rev()
        .enumerate()
        .flat_map(|(byte_index, bits)| {
            bits.iter()
                .map(move |b| Object::integer((byte_index as u64) * 8 + u64::from(*b)))
        })
        .collect();
    Node::new(datum_iri(q, x), &["https://uor.foundation/schema/Datum"])
        .with(schema("value"), Object::integer(x))
        .with(schema("quantum"), Object::integer(u64::from(q)))
        .with(schema("stratum"), Object::integer(u64::from(datum.total_stratum())))
        .with_all(schema("spectrum"), bits)
        .with(schema("glyph"), Object::string(datum.glyph))
        .with(schema("succ"), Object::iri(datum_iri(q, ring.succ(x))))
        .with(schema("pred"), Object::iri(datum_iri(q, ring.pred(x))))
        .with(schema("negation"), Object::iri(datum_iri(q, ring.neg(x))))
        .with(schema("complement"), Object::iri(datum_iri(q, ring.bnot(x))))
        .with(
            iri(PARTITION, "class"),
            Object::iri(iri(PARTITION, datum.partition.set_name())),
        )
}

fn derivation_node(ring: Ring, d: &Derivation) -> Node {
    Node::new(
        d.derivation_id.clone(),
        &["https://uor.foundation/derivation/Derivation"],
    )
    .with(iri(DERIVATION, "originalTerm"), Object::string(d.original_term.clone()))
    .with(iri(DERIVATION, "canonicalTerm"), Object::string(d.canonical_term.clone()))
    .with(
        iri(DERIVATION, "result"),
        Object::iri(datum_iri(ring.quantum(), d.result)),
    )
}

fn proof_node(ring: Ring) -> Node {
    let report = ring.verify_critical_identity();
    Node::new(
        proof_iri(ring.quantum()),
        &[
            "https://uor.foundation/proof/CoherenceProof",
            "https://uor.foundation/proof/CriticalIdentityProof",
        ],
    )
    .with(iri(PROOF, "criticalIdentity"), Object::string("neg(bnot(x)) = succ(x)"))
    .with(iri(PROOF, "quantum"), Object::integer(u64::from(ring.quantum())))
    .with(iri(PROOF, "checked"), Object::integer(report.checked))
    .with(iri(PROOF, "verified"), Object::boolean(report.holds))
}

fn partition_node(ring: Ring) -> Node {
    let counts = ring.partition();
    let mut node = Node::new(
        partition_iri(ring.quantum()),
        &["https://uor.foundation/partition/Partition"],
    )
    .with(iri(PARTITION, "cardinality"), Object::integer(counts.total()));
    for class in PartitionClass::ALL {
        node = node.with(
            iri(PARTITION, &format!("{}Cardinality", cardinality_stem(class))),
            Object::integer(counts.get(class)),
        );
    }
    node
}

fn cardinality_stem(class: PartitionClass) -> &'static str {
    match class {
        PartitionClass::Unit => "unit",
        PartitionClass::Exterior => "exterior",
        PartitionClass::Irreducible => "irreducible",
        PartitionClass::Reducible => "reducible",
    }
}

// =============================================================================
// CONTEXT
// =============================================================================

/// Lazily built, process-lifetime graph of the default ring.
///
/// Constructed explicitly and injected; there is no global instance.
#[derive(Debug, Default)]
pub struct GraphContext {
    graph: OnceLock<KnowledgeGraph>,
}

impl GraphContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The graph, built on first call.
    pub fn graph(&self) -> &KnowledgeGraph {
        self.graph.get_or_init(|| KnowledgeGraph::build(Ring::default()))
    }

    /// Whether the graph has been built yet.
    #[must_use]
    pub fn is_built(&self) -> bool {
        self.graph.get().is_some()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn default_graph() -> KnowledgeGraph {
        KnowledgeGraph::build(Ring::default())
    }

    #[test]
    fn node_counts() {
        let g = default_graph();
        // ring + 256 datums + derivations + proof + partition
        assert_eq!(g.nodes().len(), 1 + 256 + CANONICAL_DERIVATIONS.len() + 2);
        assert_eq!(g.derivations().len(), CANONICAL_DERIVATIONS.len());
    }

    #[test]
    fn every_quad_is_in_the_default_graph() {
        let g = default_graph();
        assert!(g.triples().iter().all(|t| t.graph == "https://uor.foundation/graph/q8"));
    }

    #[test]
    fn datum_triples_for_42() {
        let g = default_graph();
        let subject = datum_iri(8, 42);
        let props: Vec<&Triple> = g
            .subject_index(&subject)
            .iter()
            .map(|&i| &g.triples()[i])
            .collect();
        let object_of = |p: &str| {
            props
                .iter()
                .find(|t| t.predicate == p)
                .map(|t| t.object.clone())
        };
        assert_eq!(object_of(&schema("value")), Some(Object::integer(42)));
        assert_eq!(object_of(&schema("succ")), Some(Object::iri(datum_iri(8, 43))));
        assert_eq!(object_of(&schema("complement")), Some(Object::iri(datum_iri(8, 213))));
        let spectrum: Vec<&Object> = props
            .iter()
            .filter(|t| t.predicate == schema("spectrum"))
            .map(|t| &t.object)
            .collect();
        assert_eq!(spectrum.len(), 3);
    }

    #[test]
    fn unit_class_links() {
        let g = default_graph();
        let unit = Object::iri(iri(PARTITION, "UnitSet"));
        let subjects: Vec<&str> = g
            .predicate_index(&iri(PARTITION, "class"))
            .iter()
            .map(|&i| &g.triples()[i])
            .filter(|t| t.object == unit)
            .map(|t| t.subject.as_str())
            .collect();
        assert_eq!(subjects, vec![datum_iri(8, 1), datum_iri(8, 255)]);
    }

    #[test]
    fn derivation_lookup_is_exact() {
        let g = default_graph();
        let d = derive("xor(42,10)", Ring::default()).expect("derive");
        let entry = g.derivation(&d.derivation_id).expect("present");
        assert_eq!(entry.canonical_term, "xor(10,42)");
        assert_eq!(entry.result, 32);
        assert!(g.derivation("urn:uor:derivation:sha256:00").is_none());
    }

    #[test]
    fn context_builds_once() {
        let ctx = GraphContext::new();
        assert!(!ctx.is_built());
        let first = ctx.graph() as *const KnowledgeGraph;
        let second = ctx.graph() as *const KnowledgeGraph;
        assert!(ctx.is_built());
        assert_eq!(first, second);
    }

    #[test]
    fn json_export_lists_nodes() {
        let json = default_graph().to_json();
        assert_eq!(json["quantum"], 8);
        assert_eq!(
            json["@graph"].as_array().map(Vec::len),
            Some(1 + 256 + CANONICAL_DERIVATIONS.len() + 2)
        );
    }
}
