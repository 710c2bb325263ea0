//! IRI vocabulary of the knowledge graph and the store envelope.

pub const RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const RDFS: &str = "http://www.w3.org/2000/01/rdf-schema#";
pub const XSD: &str = "http://www.w3.org/2001/XMLSchema#";
pub const SCHEMA: &str = "https://uor.foundation/schema/";
pub const PARTITION: &str = "https://uor.foundation/partition/";
pub const PROOF: &str = "https://uor.foundation/proof/";
pub const DERIVATION: &str = "https://uor.foundation/derivation/";
pub const U: &str = "https://uor.foundation/u/";
pub const STORE: &str = "https://uor.foundation/store/";

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
pub const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";

/// Prefixes every query may use without declaring them.
pub const DEFAULT_PREFIXES: [(&str, &str); 9] = [
    ("rdf", RDF),
    ("rdfs", RDFS),
    ("xsd", XSD),
    ("schema", SCHEMA),
    ("partition", PARTITION),
    ("proof", PROOF),
    ("derivation", DERIVATION),
    ("u", U),
    ("store", STORE),
];

/// Expand `prefix:local` against the default prefixes.
#[must_use]
pub fn expand(prefixed: &str) -> Option<String> {
    let (prefix, local) = prefixed.split_once(':')?;
    DEFAULT_PREFIXES
        .iter()
        .find(|(p, _)| *p == prefix)
        .map(|(_, ns)| format!("{}{}", ns, local))
}

/// Join a namespace and a local name.
#[must_use]
pub fn iri(namespace: &str, local: &str) -> String {
    format!("{}{}", namespace, local)
}

// -----------------------------------------------------------------------------
// Node IRIs
// -----------------------------------------------------------------------------

#[must_use]
pub fn graph_iri(quantum: u32) -> String {
    format!("https://uor.foundation/graph/q{}", quantum)
}

#[must_use]
pub fn ring_iri(quantum: u32) -> String {
    format!("https://uor.foundation/ring/q{}", quantum)
}

#[must_use]
pub fn datum_iri(quantum: u32, value: u64) -> String {
    format!("https://uor.foundation/datum/q{}/{}", quantum, value)
}

#[must_use]
pub fn partition_iri(quantum: u32) -> String {
    format!("https://uor.foundation/partition/q{}", quantum)
}

#[must_use]
pub fn proof_iri(quantum: u32) -> String {
    format!("https://uor.foundation/proof/critical-identity/q{}", quantum)
}

// -----------------------------------------------------------------------------
// Kernel-space types
// -----------------------------------------------------------------------------

/// Types that describe regeneratable kernel objects and may not be stored.
pub const KERNEL_TYPES: [(&str, &str); 7] = [
    ("schema:Datum", "https://uor.foundation/schema/Datum"),
    ("schema:Ring", "https://uor.foundation/schema/Ring"),
    ("u:Address", "https://uor.foundation/u/Address"),
    ("partition:Partition", "https://uor.foundation/partition/Partition"),
    ("proof:CoherenceProof", "https://uor.foundation/proof/CoherenceProof"),
    (
        "proof:CriticalIdentityProof",
        "https://uor.foundation/proof/CriticalIdentityProof",
    ),
    (
        "derivation:Derivation",
        "https://uor.foundation/derivation/Derivation",
    ),
];

/// Whether a type tag (prefixed or full IRI) names a kernel-space type.
#[must_use]
pub fn is_kernel_type(type_tag: &str) -> bool {
    KERNEL_TYPES
        .iter()
        .any(|(short, full)| *short == type_tag || *full == type_tag)
}
