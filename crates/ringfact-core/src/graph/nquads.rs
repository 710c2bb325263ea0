//! N-Quads / N-Triples rendering of the knowledge graph.

use super::{KnowledgeGraph, Object, Triple};
use super::vocab::XSD_STRING;

/// Escape a literal's lexical form for N-Triples.
fn escape(lexical: &str) -> String {
    let mut out = String::with_capacity(lexical.len());
    for c in lexical.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

fn object_term(object: &Object) -> String {
    match object {
        Object::Iri { value } => format!("<{}>", value),
        Object::Literal { value, datatype } if datatype == XSD_STRING => {
            format!("\"{}\"", escape(value))
        }
        Object::Literal { value, datatype } => format!("\"{}\"^^<{}>", escape(value), datatype),
    }
}

/// One N-Quads line, without the trailing newline.
#[must_use]
pub fn quad_line(triple: &Triple) -> String {
    format!(
        "<{}> <{}> {} <{}> .",
        triple.subject,
        triple.predicate,
        object_term(&triple.object),
        triple.graph
    )
}

/// One N-Triples line, without the trailing newline.
#[must_use]
pub fn triple_line(triple: &Triple) -> String {
    format!(
        "<{}> <{}> {} .",
        triple.subject,
        triple.predicate,
        object_term(&triple.object)
    )
}

/// The whole graph as N-Quads.
#[must_use]
pub fn to_nquads(graph: &KnowledgeGraph) -> String {
    render(graph, quad_line)
}

/// The whole graph as N-Triples (graph name dropped).
#[must_use]
pub fn to_ntriples(graph: &KnowledgeGraph) -> String {
    render(graph, triple_line)
}

fn render(graph: &KnowledgeGraph, line: fn(&Triple) -> String) -> String {
    let mut out = String::new();
    for triple in graph.triples() {
        out.push_str(&line(triple));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::Ring;

    #[test]
    fn literal_escaping() {
        assert_eq!(escape("a\"b\\c\n"), "a\\\"b\\\\c\\n");
    }

    #[test]
    fn typed_and_plain_literals() {
        let t = Triple {
            subject: "s:1".into(),
            predicate: "p:1".into(),
            object: Object::integer(5),
            graph: "g:1".into(),
        };
        assert_eq!(
            quad_line(&t),
            "<s:1> <p:1> \"5\"^^<http://www.w3.org/2001/XMLSchema#integer> <g:1> ."
        );
        let t = Triple {
            object: Object::string("x"),
            ..t
        };
        assert_eq!(triple_line(&t), "<s:1> <p:1> \"x\" .");
    }

    #[test]
    fn one_line_per_triple() {
        let graph = KnowledgeGraph::build(Ring::new(4).expect("ring"));
        let nq = to_nquads(&graph);
        assert_eq!(nq.lines().count(), graph.triples().len());
        assert!(nq.lines().all(|l| l.ends_with("<https://uor.foundation/graph/q4> .")));
        let nt = to_ntriples(&graph);
        assert_eq!(nt.lines().count(), graph.triples().len());
    }
}
