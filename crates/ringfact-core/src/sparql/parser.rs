//! Tokenizer and recursive-descent parser for the SELECT subset.

use std::collections::BTreeMap;

use crate::RingfactError;
use crate::graph::vocab::{DEFAULT_PREFIXES, RDF_TYPE, XSD_BOOLEAN, XSD_INTEGER};
use crate::primitives::{MAX_QUERY_LENGTH, MAX_QUERY_PATTERNS};

// =============================================================================
// AST
// =============================================================================

/// What a SELECT returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    All,
    Vars(Vec<String>),
    /// `(COUNT(?x) AS ?n)`; `var` is `None` for `COUNT(*)`.
    Count { var: Option<String>, alias: String },
}

/// One position of a triple pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternTerm {
    Var(String),
    Iri(String),
    /// Literal; `datatype: None` matches any datatype with the same lexical form.
    Literal {
        lexical: String,
        datatype: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriplePattern {
    pub subject: PatternTerm,
    pub predicate: PatternTerm,
    pub object: PatternTerm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl CompareOp {
    fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "=" => Self::Eq,
            "!=" => Self::Ne,
            "<" => Self::Lt,
            ">" => Self::Gt,
            "<=" => Self::Le,
            ">=" => Self::Ge,
            _ => return None,
        })
    }

    /// The same comparison with operands swapped.
    fn flipped(self) -> Self {
        match self {
            Self::Lt => Self::Gt,
            Self::Gt => Self::Lt,
            Self::Le => Self::Ge,
            Self::Ge => Self::Le,
            other => other,
        }
    }

    #[must_use]
    pub fn holds(self, left: i64, right: i64) -> bool {
        match self {
            Self::Eq => left == right,
            Self::Ne => left != right,
            Self::Lt => left < right,
            Self::Gt => left > right,
            Self::Le => left <= right,
            Self::Ge => left >= right,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// `?v op <integer>`
    Compare { var: String, op: CompareOp, value: i64 },
    /// `STRSTARTS(STR(?v), "prefix")`
    StrStarts { var: String, prefix: String },
    /// `?a = ?b` or `?a != ?b`
    VarEq { left: String, right: String, negated: bool },
    /// Anything else. Kept verbatim and passed through.
    Unknown(String),
}

/// Graph scope of the WHERE block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphScope {
    Default,
    Named(String),
    Var(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub projection: Projection,
    pub distinct: bool,
    pub graph: GraphScope,
    pub patterns: Vec<TriplePattern>,
    pub filters: Vec<Filter>,
    pub limit: Option<usize>,
    pub offset: usize,
}

// =============================================================================
// TOKENS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tok {
    Var(String),
    Iri(String),
    /// `prefix:local`, unexpanded.
    PName(String, String),
    Str(String),
    Int(i64),
    Word(String),
    Op(&'static str),
    Punct(char),
    DataTypeMark,
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    start: usize,
    end: usize,
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn tokenize(src: &str) -> Result<Vec<Token>, RingfactError> {
    let chars: Vec<(usize, char)> = src.char_indices().collect();
    let at = |i: usize| chars.get(i).map(|&(_, c)| c);
    let offset = |i: usize| chars.get(i).map_or(src.len(), |&(o, _)| o);
    let mut tokens = Vec::new();
    let mut i = 0;

    while let Some(c) = at(i) {
        let start = offset(i);
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '#' {
            while at(i).is_some_and(|c| c != '\n') {
                i += 1;
            }
            continue;
        }

        let tok = match c {
            '?' | '$' => {
                i += 1;
                let name_start = i;
                while at(i).is_some_and(is_name_char) {
                    i += 1;
                }
                if i == name_start {
                    return Err(RingfactError::parse(start, "empty variable name"));
                }
                Tok::Var(chars[name_start..i].iter().map(|&(_, c)| c).collect())
            }
            '<' => {
                // An IRI is an absolute IRI closed by '>'; otherwise this is a comparison.
                let mut j = i + 1;
                while at(j).is_some_and(is_iri_char) {
                    j += 1;
                }
                let run: String = chars[i + 1..j].iter().map(|&(_, c)| c).collect();
                if at(j) == Some('>') && has_scheme(&run) {
                    i = j + 1;
                    Tok::Iri(run)
                } else if at(i + 1) == Some('=') {
                    i += 2;
                    Tok::Op("<=")
                } else {
                    i += 1;
                    Tok::Op("<")
                }
            }
            '>' => {
                if at(i + 1) == Some('=') {
                    i += 2;
                    Tok::Op(">=")
                } else {
                    i += 1;
                    Tok::Op(">")
                }
            }
            '=' => {
                i += 1;
                Tok::Op("=")
            }
            '!' => {
                if at(i + 1) == Some('=') {
                    i += 2;
                    Tok::Op("!=")
                } else {
                    i += 1;
                    Tok::Op("!")
                }
            }
            '&' | '|' if at(i + 1) == Some(c) => {
                i += 2;
                Tok::Op(if c == '&' { "&&" } else { "||" })
            }
            '^' if at(i + 1) == Some('^') => {
                i += 2;
                Tok::DataTypeMark
            }
            '"' | '\'' => {
                let quote = c;
                i += 1;
                let mut value = String::new();
                loop {
                    match at(i) {
                        None => return Err(RingfactError::parse(start, "unterminated string")),
                        Some('\\') => {
                            let escaped = at(i + 1).ok_or_else(|| {
                                RingfactError::parse(start, "unterminated string")
                            })?;
                            value.push(match escaped {
                                'n' => '\n',
                                't' => '\t',
                                'r' => '\r',
                                other => other,
                            });
                            i += 2;
                        }
                        Some(ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(ch) => {
                            value.push(ch);
                            i += 1;
                        }
                    }
                }
                Tok::Str(value)
            }
            c if c.is_ascii_digit() || (c == '-' && at(i + 1).is_some_and(|d| d.is_ascii_digit())) => {
                let num_start = i;
                i += 1;
                while at(i).is_some_and(|c| c.is_ascii_digit()) {
                    i += 1;
                }
                let text: String = chars[num_start..i].iter().map(|&(_, c)| c).collect();
                let value = text
                    .parse::<i64>()
                    .map_err(|_| RingfactError::parse(start, format!("integer '{}' out of range", text)))?;
                Tok::Int(value)
            }
            c if c.is_ascii_alphabetic() || c == '_' || c == ':' => {
                let word_start = i;
                while at(i).is_some_and(is_name_char) {
                    i += 1;
                }
                let word: String = chars[word_start..i].iter().map(|&(_, c)| c).collect();
                if at(i) == Some(':') {
                    i += 1;
                    let local_start = i;
                    while at(i).is_some_and(|c| is_name_char(c) || c == '.') {
                        i += 1;
                    }
                    // A trailing '.' ends the pattern, it is not part of the name.
                    while i > local_start && at(i - 1) == Some('.') {
                        i -= 1;
                    }
                    let local: String = chars[local_start..i].iter().map(|&(_, c)| c).collect();
                    Tok::PName(word, local)
                } else {
                    Tok::Word(word)
                }
            }
            '{' | '}' | '(' | ')' | '.' | ',' | '*' | ';' | '+' | '/' | '-' => {
                i += 1;
                Tok::Punct(c)
            }
            other => {
                return Err(RingfactError::parse(
                    start,
                    format!("unexpected character '{}'", other),
                ));
            }
        };
        tokens.push(Token {
            tok,
            start,
            end: offset(i),
        });
    }
    Ok(tokens)
}

// =============================================================================
// PARSER
// =============================================================================

/// Parse a query.
///
/// Non-SELECT forms fail with [`RingfactError::Unsupported`]; everything else
/// malformed fails with a positioned [`RingfactError::Parse`].
pub fn parse_query(src: &str) -> Result<Query, RingfactError> {
    if src.len() > MAX_QUERY_LENGTH {
        return Err(RingfactError::param(
            "query",
            format!("query exceeds {} bytes", MAX_QUERY_LENGTH),
        ));
    }
    let tokens = tokenize(src)?;
    let mut parser = QueryParser {
        src,
        tokens,
        pos: 0,
        prefixes: DEFAULT_PREFIXES
            .iter()
            .map(|(p, ns)| ((*p).to_string(), (*ns).to_string()))
            .collect(),
    };
    parser.query()
}

struct QueryParser<'a> {
    src: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    prefixes: BTreeMap<String, String>,
}

impl QueryParser<'_> {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|t| &t.tok)
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map_or(self.src.len(), |t| t.start)
    }

    fn error(&self, reason: impl Into<String>) -> RingfactError {
        RingfactError::parse(self.position(), reason)
    }

    fn next(&mut self) -> Option<Tok> {
        let tok = self.tokens.get(self.pos).map(|t| t.tok.clone());
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Tok::Word(w)) if w.eq_ignore_ascii_case(keyword))
    }

    fn keyword(&mut self, keyword: &str) -> Result<(), RingfactError> {
        if self.at_keyword(keyword) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected {}", keyword)))
        }
    }

    fn punct(&mut self, c: char) -> Result<(), RingfactError> {
        if self.peek() == Some(&Tok::Punct(c)) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", c)))
        }
    }

    fn var(&mut self) -> Result<String, RingfactError> {
        match self.peek() {
            Some(Tok::Var(name)) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.error("expected a variable")),
        }
    }

    fn query(&mut self) -> Result<Query, RingfactError> {
        while self.at_keyword("PREFIX") {
            self.pos += 1;
            let prefix = match self.next() {
                Some(Tok::PName(prefix, local)) if local.is_empty() => prefix,
                _ => return Err(self.error("expected 'prefix:' after PREFIX")),
            };
            let namespace = match self.next() {
                Some(Tok::Iri(iri)) => iri,
                _ => return Err(self.error("expected <iri> after PREFIX name")),
            };
            self.prefixes.insert(prefix, namespace);
        }

        for form in ["ASK", "CONSTRUCT", "DESCRIBE", "INSERT", "DELETE", "LOAD", "CLEAR", "DROP", "CREATE"] {
            if self.at_keyword(form) {
                return Err(RingfactError::Unsupported(format!(
                    "{} queries are not supported; only SELECT is implemented",
                    form
                )));
            }
        }
        self.keyword("SELECT")?;

        let distinct = self.at_keyword("DISTINCT");
        if distinct {
            self.pos += 1;
        }
        let projection = self.projection()?;

        if self.at_keyword("WHERE") {
            self.pos += 1;
        }
        self.punct('{')?;

        let graph = if self.at_keyword("GRAPH") {
            self.pos += 1;
            let scope = match self.next() {
                Some(Tok::Iri(iri)) => GraphScope::Named(iri),
                Some(Tok::PName(p, l)) => GraphScope::Named(self.expand(&p, &l)?),
                Some(Tok::Var(v)) => GraphScope::Var(v),
                _ => return Err(self.error("expected graph name after GRAPH")),
            };
            self.punct('{')?;
            scope
        } else {
            GraphScope::Default
        };

        let (patterns, mut filters) = self.group()?;
        if graph != GraphScope::Default {
            self.punct('}')?;
            // Only filters may follow the GRAPH block.
            let (outer_patterns, outer_filters) = self.group()?;
            if !outer_patterns.is_empty() {
                return Err(self.error("triple patterns outside the GRAPH block are not supported"));
            }
            filters.extend(outer_filters);
        }
        self.punct('}')?;

        let mut limit = None;
        let mut offset = 0;
        loop {
            if self.at_keyword("LIMIT") {
                self.pos += 1;
                limit = Some(self.count_value("LIMIT")?);
            } else if self.at_keyword("OFFSET") {
                self.pos += 1;
                offset = self.count_value("OFFSET")?;
            } else {
                break;
            }
        }
        if self.peek().is_some() {
            return Err(self.error("unexpected trailing input"));
        }

        Ok(Query {
            projection,
            distinct,
            graph,
            patterns,
            filters,
            limit,
            offset,
        })
    }

    fn count_value(&mut self, clause: &str) -> Result<usize, RingfactError> {
        match self.next() {
            Some(Tok::Int(n)) if n >= 0 => Ok(n as usize),
            _ => Err(self.error(format!("{} requires a non-negative integer", clause))),
        }
    }

    fn projection(&mut self) -> Result<Projection, RingfactError> {
        match self.peek() {
            Some(Tok::Punct('*')) => {
                self.pos += 1;
                Ok(Projection::All)
            }
            Some(Tok::Punct('(')) => {
                self.pos += 1;
                self.keyword("COUNT")?;
                self.punct('(')?;
                let var = if self.peek() == Some(&Tok::Punct('*')) {
                    self.pos += 1;
                    None
                } else {
                    Some(self.var()?)
                };
                self.punct(')')?;
                self.keyword("AS")?;
                let alias = self.var()?;
                self.punct(')')?;
                Ok(Projection::Count { var, alias })
            }
            Some(Tok::Var(_)) => {
                let mut vars = Vec::new();
                while matches!(self.peek(), Some(Tok::Var(_))) {
                    vars.push(self.var()?);
                }
                Ok(Projection::Vars(vars))
            }
            _ => Err(self.error("expected '*', variables or (COUNT(...) AS ?n)")),
        }
    }

    /// Patterns and filters up to (not including) the closing '}'.
    fn group(&mut self) -> Result<(Vec<TriplePattern>, Vec<Filter>), RingfactError> {
        let mut patterns = Vec::new();
        let mut filters = Vec::new();
        loop {
            match self.peek() {
                None | Some(Tok::Punct('}')) => break,
                Some(Tok::Punct('.')) => {
                    self.pos += 1;
                }
                Some(Tok::Word(w)) if w.eq_ignore_ascii_case("FILTER") => {
                    self.pos += 1;
                    filters.push(self.filter()?);
                }
                _ => {
                    if patterns.len() == MAX_QUERY_PATTERNS {
                        return Err(RingfactError::param(
                            "query",
                            format!("more than {} triple patterns", MAX_QUERY_PATTERNS),
                        ));
                    }
                    let subject = self.term(false)?;
                    let predicate = self.term(true)?;
                    let object = self.term(false)?;
                    patterns.push(TriplePattern {
                        subject,
                        predicate,
                        object,
                    });
                }
            }
        }
        Ok((patterns, filters))
    }

    fn expand(&self, prefix: &str, local: &str) -> Result<String, RingfactError> {
        self.prefixes
            .get(prefix)
            .map(|ns| format!("{}{}", ns, local))
            .ok_or_else(|| self.error(format!("undeclared prefix '{}:'", prefix)))
    }

    fn term(&mut self, predicate_position: bool) -> Result<PatternTerm, RingfactError> {
        let start = self.position();
        let term = match self.next() {
            Some(Tok::Var(v)) => PatternTerm::Var(v),
            Some(Tok::Iri(iri)) => PatternTerm::Iri(iri),
            Some(Tok::PName(p, l)) => PatternTerm::Iri(self.expand(&p, &l).map_err(|_| {
                RingfactError::parse(start, format!("undeclared prefix '{}:'", p))
            })?),
            Some(Tok::Word(w)) if predicate_position && w == "a" => {
                PatternTerm::Iri(RDF_TYPE.to_string())
            }
            Some(Tok::Word(w)) if w == "true" || w == "false" => PatternTerm::Literal {
                lexical: w,
                datatype: Some(XSD_BOOLEAN.to_string()),
            },
            Some(Tok::Int(n)) => PatternTerm::Literal {
                lexical: n.to_string(),
                datatype: Some(XSD_INTEGER.to_string()),
            },
            Some(Tok::Str(s)) => {
                let datatype = if self.peek() == Some(&Tok::DataTypeMark) {
                    self.pos += 1;
                    match self.next() {
                        Some(Tok::Iri(iri)) => Some(iri),
                        Some(Tok::PName(p, l)) => Some(self.expand(&p, &l)?),
                        _ => return Err(self.error("expected datatype after '^^'")),
                    }
                } else {
                    None
                };
                PatternTerm::Literal {
                    lexical: s,
                    datatype,
                }
            }
            _ => {
                return Err(RingfactError::parse(
                    start,
                    "expected a variable, IRI, prefixed name or literal",
                ));
            }
        };
        Ok(term)
    }

    fn filter(&mut self) -> Result<Filter, RingfactError> {
        let open = self.pos;
        // FILTER(expr) or FILTER fn(args)
        if matches!(self.peek(), Some(Tok::Word(_))) {
            self.pos += 1;
        }
        if self.peek() != Some(&Tok::Punct('(')) {
            return Err(self.error("expected '(' after FILTER"));
        }
        let mut depth = 0usize;
        loop {
            match self.next() {
                Some(Tok::Punct('(')) => depth += 1,
                Some(Tok::Punct(')')) => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                Some(_) => {}
                None => return Err(self.error("unbalanced parentheses in FILTER")),
            }
        }
        let span = &self.tokens[open..self.pos];
        let raw = match (span.first(), span.last()) {
            (Some(first), Some(last)) => self.src[first.start..last.end].to_string(),
            _ => String::new(),
        };
        let toks: Vec<&Tok> = span.iter().map(|t| &t.tok).collect();
        Ok(interpret_filter(&toks).unwrap_or(Filter::Unknown(raw)))
    }
}

/// Recognize the supported filter shapes; `None` means pass-through.
fn interpret_filter(toks: &[&Tok]) -> Option<Filter> {
    // Strip one pair of outer parentheses.
    let inner = match toks {
        [Tok::Punct('('), rest @ .., Tok::Punct(')')] => rest,
        other => other,
    };
    match inner {
        [Tok::Var(v), Tok::Op(op), Tok::Int(n)] => Some(Filter::Compare {
            var: v.clone(),
            op: CompareOp::from_symbol(op)?,
            value: *n,
        }),
        [Tok::Int(n), Tok::Op(op), Tok::Var(v)] => Some(Filter::Compare {
            var: v.clone(),
            op: CompareOp::from_symbol(op)?.flipped(),
            value: *n,
        }),
        [Tok::Var(a), Tok::Op(op), Tok::Var(b)] if *op == "=" || *op == "!=" => {
            Some(Filter::VarEq {
                left: a.clone(),
                right: b.clone(),
                negated: *op == "!=",
            })
        }
        [
            Tok::Word(f),
            Tok::Punct('('),
            Tok::Word(s),
            Tok::Punct('('),
            Tok::Var(v),
            Tok::Punct(')'),
            Tok::Punct(','),
            Tok::Str(prefix),
            Tok::Punct(')'),
        ] if f.eq_ignore_ascii_case("STRSTARTS") && s.eq_ignore_ascii_case("STR") => {
            Some(Filter::StrStarts {
                var: v.clone(),
                prefix: prefix.clone(),
            })
        }
        _ => None,
    }
}

// =============================================================================
// TESTS
// =============================================================================

/// Characters allowed inside `<...>`: no whitespace, controls or IRIREF delimiters.
fn is_iri_char(c: char) -> bool {
    !c.is_whitespace()
        && !c.is_control()
        && !matches!(c, '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\' | '(' | ')')
}

/// `scheme:` as in RFC 3986: a letter, then letters, digits, `+`, `-` or `.`.
fn has_scheme(run: &str) -> bool {
    let Some((scheme, _)) = run.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}
