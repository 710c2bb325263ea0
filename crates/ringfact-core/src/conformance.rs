//! # Conformance Validator
//!
//! A fixed battery of algebraic and structural checks run against the live
//! kernel. Every check visits at most [`MAX_CHECKED_ELEMENTS`] elements and
//! reports at most [`MAX_REPORTED_VIOLATIONS`] violating inputs. Overall
//! conformance is the conjunction of all checks.

use serde::{Deserialize, Serialize};

use crate::canonical::{decode_address, encode_address};
use crate::datum::{Datum, element_bytes};
use crate::primitives::{MAX_CHECKED_ELEMENTS, MAX_REPORTED_VIOLATIONS};
use crate::ring::{PartitionClass, Ring};

/// Result of one check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub description: String,
    pub conformant: bool,
    pub checked: u64,
    pub violations: Vec<u64>,
}

/// Result of the whole battery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConformanceReport {
    pub quantum: u32,
    pub modulus: u64,
    pub conformant: bool,
    pub checks: Vec<CheckResult>,
}

impl ConformanceReport {
    #[must_use]
    pub fn check(&self, name: &str) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.name == name)
    }

    #[must_use]
    pub fn passed(&self) -> usize {
        self.checks.iter().filter(|c| c.conformant).count()
    }
}

/// Run a predicate over a domain, collecting the first few violations.
fn run_check(
    name: &str,
    description: &str,
    domain: impl Iterator<Item = u64>,
    holds: impl Fn(u64) -> bool,
) -> CheckResult {
    let mut checked = 0u64;
    let mut violations = Vec::new();
    let mut conformant = true;
    for x in domain {
        checked += 1;
        if !holds(x) {
            conformant = false;
            if violations.len() < MAX_REPORTED_VIOLATIONS {
                violations.push(x);
            }
        }
    }
    CheckResult {
        name: name.to_string(),
        description: description.to_string(),
        conformant,
        checked,
        violations,
    }
}

fn domain(ring: Ring) -> impl Iterator<Item = u64> {
    ring.elements().take(MAX_CHECKED_ELEMENTS as usize)
}

/// Run every check against `ring`.
#[must_use]
pub fn validate(ring: Ring) -> ConformanceReport {
    let checks = vec![
        ring_parameters(ring),
        run_check(
            "neg_involution",
            "neg(neg(x)) = x",
            domain(ring),
            |x| ring.neg(ring.neg(x)) == x,
        ),
        run_check(
            "bnot_involution",
            "bnot(bnot(x)) = x",
            domain(ring),
            |x| ring.bnot(ring.bnot(x)) == x,
        ),
        run_check(
            "triad_shape",
            "bytes, stratum and spectrum are ceil(n/8) wide and agree byte by byte",
            domain(ring),
            |x| triad_is_well_formed(ring, x),
        ),
        run_check(
            "succ_pred_inverse",
            "succ(pred(x)) = x and pred(succ(x)) = x",
            domain(ring),
            |x| ring.succ(ring.pred(x)) == x && ring.pred(ring.succ(x)) == x,
        ),
        partition_check(ring),
        run_check(
            "critical_identity",
            "neg(bnot(x)) = succ(x)",
            domain(ring),
            |x| ring.identity_at(x).holds && ring.succ(x) == ring.add(x, 1),
        ),
        run_check(
            "address_round_trip",
            "decode(encode(bytes(x))) = bytes(x), one symbol per byte",
            domain(ring),
            |x| {
                let bytes = element_bytes(ring, x);
                let address = encode_address(&bytes);
                address.chars().count() == bytes.len()
                    && decode_address(&address).is_ok_and(|decoded| decoded == bytes)
            },
        ),
    ];
    ConformanceReport {
        quantum: ring.quantum(),
        modulus: ring.modulus(),
        conformant: checks.iter().all(|c| c.conformant),
        checks,
    }
}

fn ring_parameters(ring: Ring) -> CheckResult {
    let n = ring.quantum();
    let ok = ring.modulus() == 1u64 << n
        && ring.mask() == ring.modulus() - 1
        && ring.width() == n.div_ceil(8) as usize
        && ring.width() * 8 >= n as usize
        && ring.mask().count_ones() == n;
    CheckResult {
        name: "ring_parameters".into(),
        description: "modulus = 2^n, mask = 2^n - 1, width = ceil(n/8)".into(),
        conformant: ok,
        checked: 1,
        violations: if ok { Vec::new() } else { vec![u64::from(n)] },
    }
}

fn triad_is_well_formed(ring: Ring, x: u64) -> bool {
    let d = Datum::new(ring, x);
    let width = ring.width();
    d.bytes.len() == width
        && d.stratum.len() == width
        && d.spectrum.len() == width
        && d.bytes.iter().zip(&d.stratum).zip(&d.spectrum).all(|((b, s), bits)| {
            *s == b.count_ones()
                && bits.len() == *s as usize
                && bits.iter().all(|&bit| bit < 8 && b & (1 << bit) != 0)
        })
        && d.total_stratum() == x.count_ones()
}

fn partition_check(ring: Ring) -> CheckResult {
    let expected = ring.partition();
    let mut counts = [0u64; 4];
    let mut result = run_check(
        "partition",
        "four classes are disjoint, match their definitions and cover the ring",
        domain(ring),
        |x| {
            let class = ring.classify(x);
            match class {
                PartitionClass::Unit => x == 1 || x == ring.mask(),
                PartitionClass::Exterior => x == 0 || x == ring.modulus() / 2,
                PartitionClass::Irreducible => x % 2 == 1,
                PartitionClass::Reducible => x % 2 == 0,
            }
        },
    );
    for x in domain(ring) {
        let index = PartitionClass::ALL
            .iter()
            .position(|c| *c == ring.classify(x))
            .unwrap_or(0);
        counts[index] += 1;
    }
    let cardinality_ok = PartitionClass::ALL
        .iter()
        .zip(counts)
        .all(|(class, n)| expected.get(*class) == n)
        && counts.iter().sum::<u64>() == ring.modulus().min(MAX_CHECKED_ELEMENTS);
    if !cardinality_ok {
        result.conformant = false;
    }
    result
}
