//! Nested-loop join evaluation of a parsed query against the knowledge graph.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::parser::{Filter, GraphScope, PatternTerm, Projection, Query, TriplePattern};
use crate::RingfactError;
use crate::graph::{KnowledgeGraph, Object, Triple};
use crate::primitives::MAX_INTERMEDIATE_BINDINGS;

/// Variable name → bound value.
pub type Binding = BTreeMap<String, Object>;

/// Rows of a SELECT plus everything the caller should know about them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Projected variables, in projection order.
    pub variables: Vec<String>,
    pub rows: Vec<Binding>,
    /// Rows before OFFSET/LIMIT.
    pub total: usize,
    /// Filters that were not understood and did not restrict the result.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Evaluate `query` over `graph`.
pub fn evaluate(graph: &KnowledgeGraph, query: &Query) -> Result<QueryResult, RingfactError> {
    let mut bindings: Vec<Binding> = vec![Binding::new()];

    let scope_matches = match &query.graph {
        GraphScope::Default => true,
        GraphScope::Named(iri) => iri == graph.iri(),
        GraphScope::Var(_) => true,
    };
    if !scope_matches {
        bindings.clear();
    }
    if let GraphScope::Var(v) = &query.graph {
        for b in &mut bindings {
            b.insert(v.clone(), Object::iri(graph.iri()));
        }
    }

    for pattern in &query.patterns {
        if bindings.is_empty() {
            break;
        }
        bindings = join(graph, pattern, &bindings)?;
    }

    let mut warnings = Vec::new();
    for filter in &query.filters {
        match filter {
            Filter::Unknown(raw) => warnings.push(format!(
                "unsupported FILTER expression passed through without restricting results: {}",
                raw
            )),
            supported => bindings.retain(|b| keep(supported, b)),
        }
    }

    let (variables, mut rows) = project(query, bindings);
    if query.distinct {
        let mut seen = BTreeSet::new();
        rows.retain(|row| seen.insert(row.clone()));
    }
    let total = rows.len();
    let rows = rows
        .into_iter()
        .skip(query.offset)
        .take(query.limit.unwrap_or(usize::MAX))
        .collect();

    Ok(QueryResult {
        variables,
        rows,
        total,
        warnings,
    })
}

fn join(
    graph: &KnowledgeGraph,
    pattern: &TriplePattern,
    bindings: &[Binding],
) -> Result<Vec<Binding>, RingfactError> {
    let mut out = Vec::new();
    for binding in bindings {
        for &i in candidates(graph, pattern, binding).iter() {
            let triple = &graph.triples()[i];
            if let Some(extended) = unify(pattern, triple, binding) {
                if out.len() == MAX_INTERMEDIATE_BINDINGS {
                    return Err(RingfactError::param(
                        "query",
                        format!(
                            "query produces more than {} intermediate bindings",
                            MAX_INTERMEDIATE_BINDINGS
                        ),
                    ));
                }
                out.push(extended);
            }
        }
    }
    Ok(out)
}

/// Narrow the scan with the subject or predicate index when either is fixed.
fn candidates(graph: &KnowledgeGraph, pattern: &TriplePattern, binding: &Binding) -> Vec<usize> {
    if let Some(subject) = resolved_iri(&pattern.subject, binding) {
        return graph.subject_index(&subject).to_vec();
    }
    if let Some(predicate) = resolved_iri(&pattern.predicate, binding) {
        return graph.predicate_index(&predicate).to_vec();
    }
    (0..graph.triples().len()).collect()
}

fn resolved_iri(term: &PatternTerm, binding: &Binding) -> Option<String> {
    match term {
        PatternTerm::Iri(iri) => Some(iri.clone()),
        PatternTerm::Var(v) => match binding.get(v) {
            Some(Object::Iri { value }) => Some(value.clone()),
            _ => None,
        },
        PatternTerm::Literal { .. } => None,
    }
}

fn unify(pattern: &TriplePattern, triple: &Triple, binding: &Binding) -> Option<Binding> {
    let mut extended = binding.clone();
    bind(&pattern.subject, &Object::iri(triple.subject.clone()), &mut extended)?;
    bind(&pattern.predicate, &Object::iri(triple.predicate.clone()), &mut extended)?;
    bind(&pattern.object, &triple.object, &mut extended)?;
    Some(extended)
}

fn bind(term: &PatternTerm, value: &Object, binding: &mut Binding) -> Option<()> {
    match term {
        PatternTerm::Var(v) => match binding.get(v) {
            Some(bound) if bound == value => Some(()),
            Some(_) => None,
            None => {
                binding.insert(v.clone(), value.clone());
                Some(())
            }
        },
        PatternTerm::Iri(iri) => match value {
            Object::Iri { value } if value == iri => Some(()),
            _ => None,
        },
        PatternTerm::Literal { lexical, datatype } => match value {
            Object::Literal {
                value,
                datatype: actual,
            } if value == lexical && datatype.as_ref().is_none_or(|d| d == actual) => Some(()),
            _ => None,
        },
    }
}

fn keep(filter: &Filter, binding: &Binding) -> bool {
    match filter {
        Filter::Compare { var, op, value } => binding
            .get(var)
            .and_then(Object::as_integer)
            .is_some_and(|bound| op.holds(bound, *value)),
        Filter::StrStarts { var, prefix } => binding
            .get(var)
            .is_some_and(|bound| bound.lexical().starts_with(prefix.as_str())),
        Filter::VarEq {
            left,
            right,
            negated,
        } => match (binding.get(left), binding.get(right)) {
            (Some(a), Some(b)) => (a == b) != *negated,
            _ => false,
        },
        Filter::Unknown(_) => true,
    }
}

fn project(query: &Query, bindings: Vec<Binding>) -> (Vec<String>, Vec<Binding>) {
    match &query.projection {
        Projection::All => {
            let variables = pattern_variables(query);
            (variables, bindings)
        }
        Projection::Vars(vars) => {
            let rows = bindings
                .into_iter()
                .map(|b| {
                    b.into_iter()
                        .filter(|(k, _)| vars.contains(k))
                        .collect::<Binding>()
                })
                .collect();
            (vars.clone(), rows)
        }
        Projection::Count { var, alias } => {
            let count = match var {
                Some(v) => bindings.iter().filter(|b| b.contains_key(v)).count(),
                None => bindings.len(),
            };
            let mut row = Binding::new();
            row.insert(alias.clone(), Object::integer(count as u64));
            (vec![alias.clone()], vec![row])
        }
    }
}

/// Variables in order of first appearance.
fn pattern_variables(query: &Query) -> Vec<String> {
    let mut vars: Vec<String> = Vec::new();
    let mut push = |name: &String| {
        if !vars.contains(name) {
            vars.push(name.clone());
        }
    };
    if let GraphScope::Var(v) = &query.graph {
        push(v);
    }
    for p in &query.patterns {
        for term in [&p.subject, &p.predicate, &p.object] {
            if let PatternTerm::Var(v) = term {
                push(v);
            }
        }
    }
    vars
}
