//! # Derivation Terms
//!
//! A small recursive-descent parser for ring expressions:
//!
//! ```text
//! term    := literal | op "(" term ("," term)* ")"
//! literal := [0-9]+ | "0x" [0-9a-fA-F]+
//! op      := neg | bnot | succ | pred | add | sub | mul | xor | and | or | shl | shr
//! ```
//!
//! Errors carry the byte offset into the source. Nesting is bounded by
//! [`MAX_TERM_DEPTH`], checked while parsing so recursion never runs away.

use serde::{Deserialize, Serialize};

use crate::RingfactError;
use crate::primitives::{MAX_TERM_DEPTH, MAX_TERM_LENGTH};
use crate::ring::{Arity, Operation, Ring};

// =============================================================================
// EXPRESSION TREE
// =============================================================================

/// A parsed ring expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Term {
    Literal(u64),
    Unary {
        op: Operation,
        arg: Box<Term>,
    },
    /// Binary operation; commutative operations may carry more than two operands.
    Binary {
        op: Operation,
        args: Vec<Term>,
    },
}

impl Term {
    /// Build an application, checking arity.
    pub fn apply(op: Operation, mut args: Vec<Term>) -> Result<Self, RingfactError> {
        match op.arity() {
            Arity::Unary if args.len() == 1 => Ok(Self::Unary {
                op,
                arg: Box::new(args.remove(0)),
            }),
            Arity::Binary if args.len() == 2 || (op.is_commutative() && args.len() > 2) => {
                Ok(Self::Binary { op, args })
            }
            _ => Err(RingfactError::param(
                "term",
                arity_message(op, args.len()),
            )),
        }
    }

    /// Operator nesting depth. A bare literal has depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            Self::Literal(_) => 0,
            Self::Unary { arg, .. } => 1 + arg.depth(),
            Self::Binary { args, .. } => 1 + args.iter().map(Term::depth).max().unwrap_or(0),
        }
    }

    /// Evaluate depth-first.
    pub fn eval(&self, ring: Ring) -> Result<u64, RingfactError> {
        match self {
            Self::Literal(v) => ring.element(*v, "term"),
            Self::Unary { op, arg } => ring.apply(*op, &[arg.eval(ring)?]),
            Self::Binary { op, args } => {
                let values = args
                    .iter()
                    .map(|a| a.eval(ring))
                    .collect::<Result<Vec<_>, _>>()?;
                ring.apply(*op, &values)
            }
        }
    }

    /// Canonical string and value.
    ///
    /// Operands of commutative operations are ordered by value, ties broken by
    /// their canonical string; other operations keep source order.
    pub fn canonical(&self, ring: Ring) -> Result<(String, u64), RingfactError> {
        match self {
            Self::Literal(v) => Ok((v.to_string(), ring.element(*v, "term")?)),
            Self::Unary { op, arg } => {
                let (inner, value) = arg.canonical(ring)?;
                Ok((format!("{}({})", op, inner), ring.apply(*op, &[value])?))
            }
            Self::Binary { op, args } => {
                let mut parts = args
                    .iter()
                    .map(|a| a.canonical(ring))
                    .collect::<Result<Vec<_>, _>>()?;
                if op.is_commutative() {
                    parts.sort_by(|(sa, va), (sb, vb)| va.cmp(vb).then_with(|| sa.cmp(sb)));
                }
                let values: Vec<u64> = parts.iter().map(|(_, v)| *v).collect();
                let rendered: Vec<&str> = parts.iter().map(|(s, _)| s.as_str()).collect();
                Ok((
                    format!("{}({})", op, rendered.join(",")),
                    ring.apply(*op, &values)?,
                ))
            }
        }
    }
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Literal(v) => write!(f, "{}", v),
            Self::Unary { op, arg } => write!(f, "{}({})", op, arg),
            Self::Binary { op, args } => {
                write!(f, "{}(", op)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
        }
    }
}

fn arity_message(op: Operation, got: usize) -> String {
    let expected = match op.arity() {
        Arity::Unary => "exactly 1 operand",
        Arity::Binary if op.is_commutative() => "at least 2 operands",
        Arity::Binary => "exactly 2 operands",
    };
    format!("{} takes {}, got {}", op, expected, got)
}

// =============================================================================
// PARSER
// =============================================================================

/// Parse a term, checking literals against `ring`.
pub fn parse_term(source: &str, ring: Ring) -> Result<Term, RingfactError> {
    if source.len() > MAX_TERM_LENGTH {
        return Err(RingfactError::param(
            "term",
            format!("term exceeds {} bytes", MAX_TERM_LENGTH),
        ));
    }
    let mut parser = Parser {
        src: source.as_bytes(),
        pos: 0,
        ring,
    };
    parser.skip_ws();
    if parser.at_end() {
        return Err(RingfactError::parse(0, "empty term"));
    }
    let term = parser.term(0)?;
    parser.skip_ws();
    if !parser.at_end() {
        return Err(RingfactError::parse(parser.pos, "unexpected trailing input"));
    }
    Ok(term)
}

struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
    ring: Ring,
}

impl Parser<'_> {
    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), RingfactError> {
        self.skip_ws();
        match self.peek() {
            Some(b) if b == byte => {
                self.pos += 1;
                Ok(())
            }
            Some(b) => Err(RingfactError::parse(
                self.pos,
                format!("expected '{}', found '{}'", byte as char, b as char),
            )),
            None => Err(RingfactError::parse(
                self.pos,
                format!("expected '{}', found end of input (unbalanced parentheses)", byte as char),
            )),
        }
    }

    fn term(&mut self, depth: usize) -> Result<Term, RingfactError> {
        self.skip_ws();
        match self.peek() {
            Some(b) if b.is_ascii_digit() => self.literal(),
            Some(b) if b.is_ascii_alphabetic() => self.application(depth),
            Some(b) => Err(RingfactError::parse(
                self.pos,
                format!("unexpected '{}', expected a literal or an operation", b as char),
            )),
            None => Err(RingfactError::parse(
                self.pos,
                "unexpected end of input, expected a literal or an operation",
            )),
        }
    }

    fn application(&mut self, depth: usize) -> Result<Term, RingfactError> {
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_') {
            self.pos += 1;
        }
        let name = std::str::from_utf8(&self.src[start..self.pos]).unwrap_or_default();
        let op = Operation::from_name(name).ok_or_else(|| {
            RingfactError::parse(start, format!("unknown operation '{}'", name))
        })?;
        if depth + 1 > MAX_TERM_DEPTH {
            return Err(RingfactError::DepthExceeded(MAX_TERM_DEPTH));
        }

        self.expect(b'(')?;
        let mut args = vec![self.term(depth + 1)?];
        loop {
            self.skip_ws();
            match self.peek() {
                Some(b',') => {
                    self.pos += 1;
                    args.push(self.term(depth + 1)?);
                }
                Some(b')') => {
                    self.pos += 1;
                    break;
                }
                Some(b) => {
                    return Err(RingfactError::parse(
                        self.pos,
                        format!("expected ',' or ')', found '{}'", b as char),
                    ));
                }
                None => {
                    return Err(RingfactError::parse(
                        self.pos,
                        "unbalanced parentheses: missing ')'",
                    ));
                }
            }
        }

        let count = args.len();
        Term::apply(op, args).map_err(|_| RingfactError::parse(start, arity_message(op, count)))
    }

    fn literal(&mut self) -> Result<Term, RingfactError> {
        let start = self.pos;
        let hex = self.src[self.pos..].starts_with(b"0x") || self.src[self.pos..].starts_with(b"0X");
        if hex {
            self.pos += 2;
        }
        let digits_start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'.') {
            self.pos += 1;
        }
        let digits = std::str::from_utf8(&self.src[digits_start..self.pos]).unwrap_or_default();
        let parsed = if hex {
            u64::from_str_radix(digits, 16)
        } else {
            digits.parse::<u64>()
        };
        let value = parsed.map_err(|_| {
            let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap_or_default();
            RingfactError::parse(start, format!("'{}' is not a valid integer literal", text))
        })?;
        if !self.ring.contains(value) {
            return Err(RingfactError::parse(
                start,
                format!(
                    "literal {} is outside the ring [0, {})",
                    value,
                    self.ring.modulus()
                ),
            ));
        }
        Ok(Term::Literal(value))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn r8() -> Ring {
        Ring::new(8).expect("ring")
    }

    fn canon(src: &str) -> (String, u64) {
        parse_term(src, r8())
            .expect("parse")
            .canonical(r8())
            .expect("canonical")
    }

    #[test]
    fn parses_nested_terms() {
        let term = parse_term("neg(bnot(42))", r8()).expect("parse");
        assert_eq!(term.depth(), 2);
        assert_eq!(term.eval(r8()).expect("eval"), 43);
    }

    #[test]
    fn hex_literals_and_whitespace() {
        assert_eq!(canon(" xor( 0x0A , 42 ) "), ("xor(10,42)".to_string(), 32));
    }

    #[test]
    fn commutative_operands_sorted_by_value() {
        assert_eq!(canon("xor(42,10)").0, "xor(10,42)");
        assert_eq!(canon("add(succ(1),1,0)").0, "add(0,1,succ(1))");
    }

    #[test]
    fn non_commutative_keeps_order() {
        assert_eq!(canon("sub(42,10)").0, "sub(42,10)");
        assert_eq!(canon("sub(10,42)").0, "sub(10,42)");
        assert_ne!(canon("sub(42,10)").1, canon("sub(10,42)").1);
    }

    #[test]
    fn ties_broken_by_canonical_string() {
        // succ(0) and 1 both evaluate to 1.
        assert_eq!(canon("and(succ(0),1)").0, "and(1,succ(0))");
    }

    #[test]
    fn rejects_unknown_operation() {
        let err = parse_term("div(1,2)", r8()).expect_err("unknown op");
        assert!(matches!(err, RingfactError::Parse { position: 0, .. }));
    }

    #[test]
    fn rejects_unbalanced_parens() {
        assert!(matches!(
            parse_term("neg(1", r8()),
            Err(RingfactError::Parse { .. })
        ));
        assert!(matches!(
            parse_term("neg(1))", r8()),
            Err(RingfactError::Parse { position: 6, .. })
        ));
    }

    #[test]
    fn rejects_non_numeric_literal() {
        let err = parse_term("neg(12a)", r8()).expect_err("bad literal");
        assert!(matches!(err, RingfactError::Parse { position: 4, .. }));
        assert!(parse_term("neg(1.5)", r8()).is_err());
    }

    #[test]
    fn rejects_wrong_arity() {
        assert!(parse_term("neg(1,2)", r8()).is_err());
        assert!(parse_term("sub(1,2,3)", r8()).is_err());
        assert!(parse_term("xor(1)", r8()).is_err());
        assert!(parse_term("shl(1,2,3)", r8()).is_err());
    }

    #[test]
    fn rejects_out_of_range_literal() {
        assert!(parse_term("256", r8()).is_err());
        assert!(parse_term("0x100", r8()).is_err());
        assert!(parse_term("255", r8()).is_ok());
    }

    #[test]
    fn depth_bound() {
        let at_limit = format!("{}0{}", "neg(".repeat(MAX_TERM_DEPTH), ")".repeat(MAX_TERM_DEPTH));
        assert!(parse_term(&at_limit, r8()).is_ok());
        let over = format!("{}0{}", "neg(".repeat(MAX_TERM_DEPTH + 1), ")".repeat(MAX_TERM_DEPTH + 1));
        assert!(matches!(
            parse_term(&over, r8()),
            Err(RingfactError::DepthExceeded(_))
        ));
    }

    #[test]
    fn empty_and_trailing() {
        assert!(parse_term("   ", r8()).is_err());
        assert!(parse_term("1 2", r8()).is_err());
    }

    #[test]
    fn display_round_trips_source_order() {
        let term = parse_term("xor(42, neg(1))", r8()).expect("parse");
        assert_eq!(term.to_string(), "xor(42,neg(1))");
    }
}
