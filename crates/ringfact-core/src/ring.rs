//! # Ring Algebra Kernel
//!
//! Pure integer functions over `Z/(2^n)Z`.
//!
//! - Two involutions generate everything: `neg(x) = -x mod 2^n` and
//!   `bnot(x) = x XOR (2^n - 1)`
//! - `succ = neg ∘ bnot`, `pred = bnot ∘ neg`
//! - The critical identity `neg(bnot(x)) = succ(x)` anchors the whole engine
//!
//! Values are carried as `u64` so that the 32-bit existence rings fit without
//! overflow in any intermediate.

use serde::{Deserialize, Serialize};

use crate::RingfactError;
use crate::primitives::{
    DEFAULT_QUANTUM, EXHAUSTIVE_QUANTUM, MAX_COMPUTE_QUANTUM, MAX_EXISTENCE_QUANTUM,
    MAX_REPORTED_VIOLATIONS, SAMPLE_DRAWS, SAMPLE_SEED,
};

// =============================================================================
// OPERATIONS
// =============================================================================

/// Number of operands an [`Operation`] takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arity {
    Unary,
    Binary,
}

/// The twelve ring operations a term may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Neg,
    Bnot,
    Succ,
    Pred,
    Add,
    Sub,
    Mul,
    Xor,
    And,
    Or,
    Shl,
    Shr,
}

impl Operation {
    /// Every operation, unary first.
    pub const ALL: [Operation; 12] = [
        Self::Neg,
        Self::Bnot,
        Self::Succ,
        Self::Pred,
        Self::Add,
        Self::Sub,
        Self::Mul,
        Self::Xor,
        Self::And,
        Self::Or,
        Self::Shl,
        Self::Shr,
    ];

    /// Lowercase operator name as written in terms.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Neg => "neg",
            Self::Bnot => "bnot",
            Self::Succ => "succ",
            Self::Pred => "pred",
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Xor => "xor",
            Self::And => "and",
            Self::Or => "or",
            Self::Shl => "shl",
            Self::Shr => "shr",
        }
    }

    /// Look an operation up by name (case-sensitive).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    #[must_use]
    pub const fn arity(self) -> Arity {
        match self {
            Self::Neg | Self::Bnot | Self::Succ | Self::Pred => Arity::Unary,
            _ => Arity::Binary,
        }
    }

    /// Commutative operators get their operands sorted during canonicalization.
    #[must_use]
    pub const fn is_commutative(self) -> bool {
        matches!(
            self,
            Self::Add | Self::Mul | Self::Xor | Self::And | Self::Or
        )
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// PARTITION
// =============================================================================

/// The four disjoint classes covering every ring element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PartitionClass {
    /// Multiplicatively invertible extremes: 1 and m-1.
    Unit,
    /// 0 and m/2.
    Exterior,
    /// Odd, not a unit.
    Irreducible,
    /// Even, not exterior.
    Reducible,
}

impl PartitionClass {
    pub const ALL: [PartitionClass; 4] = [
        Self::Unit,
        Self::Exterior,
        Self::Irreducible,
        Self::Reducible,
    ];

    /// Local name of the class's set in the partition vocabulary.
    #[must_use]
    pub const fn set_name(self) -> &'static str {
        match self {
            Self::Unit => "UnitSet",
            Self::Exterior => "ExteriorSet",
            Self::Irreducible => "IrreducibleSet",
            Self::Reducible => "ReducibleSet",
        }
    }
}

/// Cardinality of each partition class for one ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionCounts {
    pub units: u64,
    pub exterior: u64,
    pub irreducible: u64,
    pub reducible: u64,
}

impl PartitionCounts {
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.units + self.exterior + self.irreducible + self.reducible
    }

    #[must_use]
    pub const fn get(&self, class: PartitionClass) -> u64 {
        match class {
            PartitionClass::Unit => self.units,
            PartitionClass::Exterior => self.exterior,
            PartitionClass::Irreducible => self.irreducible,
            PartitionClass::Reducible => self.reducible,
        }
    }
}

// =============================================================================
// IDENTITY REPORTS
// =============================================================================

/// How a property was established over a ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckMethod {
    /// Every element was visited.
    Exhaustive,
    /// A fixed-seed sample of [`SAMPLE_DRAWS`] elements was visited.
    Sampled,
}

/// The critical identity evaluated at one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityWitness {
    pub x: u64,
    pub bnot_x: u64,
    pub neg_bnot_x: u64,
    pub succ_x: u64,
    pub holds: bool,
}

/// The critical identity evaluated over a whole ring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityReport {
    pub quantum: u32,
    pub method: CheckMethod,
    pub checked: u64,
    pub holds: bool,
    pub counterexamples: Vec<u64>,
}

// =============================================================================
// RING
// =============================================================================

/// The ring `Z/(2^quantum)Z`.
///
/// A plain value type: two rings with the same quantum are the same ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ring {
    quantum: u32,
}

impl Default for Ring {
    fn default() -> Self {
        Self {
            quantum: DEFAULT_QUANTUM,
        }
    }
}

impl Ring {
    /// A ring usable for computation (quantum 1..=16).
    pub fn new(quantum: u32) -> Result<Self, RingfactError> {
        Self::bounded(quantum, MAX_COMPUTE_QUANTUM)
    }

    /// A ring usable for existence checks only (quantum 1..=32).
    pub fn for_existence(quantum: u32) -> Result<Self, RingfactError> {
        Self::bounded(quantum, MAX_EXISTENCE_QUANTUM)
    }

    fn bounded(quantum: u32, max: u32) -> Result<Self, RingfactError> {
        if quantum == 0 || quantum > max {
            return Err(RingfactError::param(
                "n",
                format!("quantum must be between 1 and {}, got {}", max, quantum),
            ));
        }
        Ok(Self { quantum })
    }

    /// Bit width `n`.
    #[must_use]
    pub const fn quantum(self) -> u32 {
        self.quantum
    }

    /// `2^n`.
    #[must_use]
    pub const fn modulus(self) -> u64 {
        1u64 << self.quantum
    }

    /// `2^n - 1`, the all-ones element.
    #[must_use]
    pub const fn mask(self) -> u64 {
        self.modulus() - 1
    }

    /// Bytes needed to hold one element: `ceil(n / 8)`.
    #[must_use]
    pub const fn width(self) -> usize {
        self.quantum.div_ceil(8) as usize
    }

    #[must_use]
    pub const fn contains(self, x: u64) -> bool {
        x < self.modulus()
    }

    /// Validate a caller-supplied element, naming the offending parameter.
    pub fn element(self, x: u64, param: &str) -> Result<u64, RingfactError> {
        if self.contains(x) {
            Ok(x)
        } else {
            Err(RingfactError::param(
                param,
                format!("{} is outside the ring [0, {})", x, self.modulus()),
            ))
        }
    }

    /// Every element in ascending order.
    pub fn elements(self) -> impl Iterator<Item = u64> {
        0..self.modulus()
    }

    // -------------------------------------------------------------------------
    // Unary
    // -------------------------------------------------------------------------

    #[must_use]
    pub const fn neg(self, x: u64) -> u64 {
        x.wrapping_neg() & self.mask()
    }

    #[must_use]
    pub const fn bnot(self, x: u64) -> u64 {
        (x ^ self.mask()) & self.mask()
    }

    #[must_use]
    pub const fn succ(self, x: u64) -> u64 {
        self.neg(self.bnot(x))
    }

    #[must_use]
    pub const fn pred(self, x: u64) -> u64 {
        self.bnot(self.neg(x))
    }

    // -------------------------------------------------------------------------
    // Binary
    // -------------------------------------------------------------------------

    #[must_use]
    pub const fn add(self, x: u64, y: u64) -> u64 {
        x.wrapping_add(y) & self.mask()
    }

    #[must_use]
    pub const fn sub(self, x: u64, y: u64) -> u64 {
        x.wrapping_sub(y) & self.mask()
    }

    #[must_use]
    pub const fn mul(self, x: u64, y: u64) -> u64 {
        x.wrapping_mul(y) & self.mask()
    }

    #[must_use]
    pub const fn xor(self, x: u64, y: u64) -> u64 {
        (x ^ y) & self.mask()
    }

    #[must_use]
    pub const fn and(self, x: u64, y: u64) -> u64 {
        x & y & self.mask()
    }

    #[must_use]
    pub const fn or(self, x: u64, y: u64) -> u64 {
        (x | y) & self.mask()
    }

    /// Logical left shift; shifting by `n` or more yields 0.
    #[must_use]
    pub const fn shl(self, x: u64, k: u64) -> u64 {
        if k >= self.quantum as u64 {
            0
        } else {
            (x << k) & self.mask()
        }
    }

    /// Logical right shift; shifting by `n` or more yields 0.
    #[must_use]
    pub const fn shr(self, x: u64, k: u64) -> u64 {
        if k >= self.quantum as u64 {
            0
        } else {
            (x & self.mask()) >> k
        }
    }

    /// Apply an operation to already-validated operands.
    ///
    /// Unary operations take exactly one operand, `sub`/`shl`/`shr` exactly
    /// two, commutative operations two or more (left fold).
    pub fn apply(self, op: Operation, operands: &[u64]) -> Result<u64, RingfactError> {
        match (op.arity(), operands) {
            (Arity::Unary, [x]) => Ok(match op {
                Operation::Neg => self.neg(*x),
                Operation::Bnot => self.bnot(*x),
                Operation::Succ => self.succ(*x),
                _ => self.pred(*x),
            }),
            (Arity::Unary, _) => Err(RingfactError::param(
                "op",
                format!("{} takes exactly 1 operand, got {}", op, operands.len()),
            )),
            (Arity::Binary, [first, rest @ ..]) if !rest.is_empty() => {
                if !op.is_commutative() && rest.len() != 1 {
                    return Err(RingfactError::param(
                        "op",
                        format!("{} takes exactly 2 operands, got {}", op, operands.len()),
                    ));
                }
                Ok(rest
                    .iter()
                    .fold(*first, |acc, &y| self.binary(op, acc, y)))
            }
            (Arity::Binary, _) => Err(RingfactError::param(
                "op",
                format!(
                    "{} takes at least 2 operands, got {}",
                    op,
                    operands.len()
                ),
            )),
        }
    }

    const fn binary(self, op: Operation, x: u64, y: u64) -> u64 {
        match op {
            Operation::Add => self.add(x, y),
            Operation::Sub => self.sub(x, y),
            Operation::Mul => self.mul(x, y),
            Operation::Xor => self.xor(x, y),
            Operation::And => self.and(x, y),
            Operation::Or => self.or(x, y),
            Operation::Shl => self.shl(x, y),
            Operation::Shr => self.shr(x, y),
            // Unary operations never reach here; `apply` dispatches on arity.
            Operation::Neg | Operation::Bnot | Operation::Succ | Operation::Pred => x,
        }
    }

    // -------------------------------------------------------------------------
    // Partition
    // -------------------------------------------------------------------------

    /// Partition class of one element.
    #[must_use]
    pub const fn classify(self, x: u64) -> PartitionClass {
        if x == 1 || x == self.mask() {
            PartitionClass::Unit
        } else if x == 0 || x == self.modulus() / 2 {
            PartitionClass::Exterior
        } else if x % 2 == 1 {
            PartitionClass::Irreducible
        } else {
            PartitionClass::Reducible
        }
    }

    /// Closed-form class cardinalities.
    #[must_use]
    pub const fn partition(self) -> PartitionCounts {
        if self.quantum == 1 {
            return PartitionCounts {
                units: 1,
                exterior: 1,
                irreducible: 0,
                reducible: 0,
            };
        }
        let half = self.modulus() / 2;
        PartitionCounts {
            units: 2,
            exterior: 2,
            irreducible: half - 2,
            reducible: half - 2,
        }
    }

    // -------------------------------------------------------------------------
    // Critical identity
    // -------------------------------------------------------------------------

    /// Evaluate `neg(bnot(x)) = succ(x)` at one element.
    #[must_use]
    pub const fn identity_at(self, x: u64) -> IdentityWitness {
        let bnot_x = self.bnot(x);
        let neg_bnot_x = self.neg(bnot_x);
        let succ_x = self.succ(x);
        IdentityWitness {
            x,
            bnot_x,
            neg_bnot_x,
            succ_x,
            holds: neg_bnot_x == succ_x,
        }
    }

    /// Elements a ring-wide property check should visit: every element when
    /// the ring is small enough, a fixed-seed sample otherwise.
    #[must_use]
    pub fn check_domain(self) -> (CheckMethod, Vec<u64>) {
        if self.quantum <= EXHAUSTIVE_QUANTUM {
            (CheckMethod::Exhaustive, self.elements().collect())
        } else {
            let mut sampler = Sampler::new(SAMPLE_SEED);
            let samples = (0..SAMPLE_DRAWS)
                .map(|_| sampler.next_u64() & self.mask())
                .collect();
            (CheckMethod::Sampled, samples)
        }
    }

    /// Verify the critical identity over the ring.
    ///
    /// `succ` is independently computed as `x + 1` here so the check is not
    /// tautological with the definition of [`Ring::succ`].
    #[must_use]
    pub fn verify_critical_identity(self) -> IdentityReport {
        let (method, domain) = self.check_domain();
        let mut counterexamples = Vec::new();
        let mut holds = true;
        for &x in &domain {
            let lhs = self.neg(self.bnot(x));
            let rhs = self.add(x, 1);
            if lhs != rhs {
                holds = false;
                if counterexamples.len() < MAX_REPORTED_VIOLATIONS {
                    counterexamples.push(x);
                }
            }
        }
        IdentityReport {
            quantum: self.quantum,
            method,
            checked: domain.len() as u64,
            holds,
            counterexamples,
        }
    }
}

// =============================================================================
// DETERMINISTIC SAMPLER
// =============================================================================

/// SplitMix64: a tiny fixed-seed generator so sampled checks are reproducible.
#[derive(Debug, Clone)]
pub(crate) struct Sampler {
    state: u64,
}

impl Sampler {
    pub(crate) const fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub(crate) fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
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

    #[test]
    fn quantum_bounds() {
        assert!(Ring::new(0).is_err());
        assert!(Ring::new(16).is_ok());
        assert!(Ring::new(17).is_err());
        assert!(Ring::for_existence(32).is_ok());
        assert!(Ring::for_existence(33).is_err());
    }

    #[test]
    fn ring_parameters() {
        let ring = r8();
        assert_eq!(ring.modulus(), 256);
        assert_eq!(ring.mask(), 255);
        assert_eq!(ring.width(), 1);
        assert_eq!(Ring::new(9).expect("ring").width(), 2);
    }

    #[test]
    fn critical_identity_worked_example() {
        let w = r8().identity_at(42);
        assert_eq!(w.bnot_x, 213);
        assert_eq!(w.neg_bnot_x, 43);
        assert_eq!(w.succ_x, 43);
        assert!(w.holds);
    }

    #[test]
    fn succ_and_pred_wrap() {
        let ring = r8();
        assert_eq!(ring.succ(255), 0);
        assert_eq!(ring.pred(0), 255);
    }

    #[test]
    fn element_out_of_range_names_param() {
        let err = r8().element(256, "x").expect_err("out of range");
        assert!(matches!(err, RingfactError::InvalidParameter { ref param, .. } if param == "x"));
    }

    #[test]
    fn apply_checks_arity() {
        let ring = r8();
        assert_eq!(ring.apply(Operation::Xor, &[10, 42]).expect("xor"), 32);
        assert_eq!(ring.apply(Operation::Add, &[200, 100, 1]).expect("add"), 45);
        assert!(ring.apply(Operation::Sub, &[1, 2, 3]).is_err());
        assert!(ring.apply(Operation::Neg, &[1, 2]).is_err());
        assert!(ring.apply(Operation::Mul, &[3]).is_err());
    }

    #[test]
    fn shifts_saturate_to_zero() {
        let ring = r8();
        assert_eq!(ring.shl(0b1000_0001, 1), 0b0000_0010);
        assert_eq!(ring.shr(0b1000_0001, 7), 1);
        assert_eq!(ring.shl(1, 8), 0);
        assert_eq!(ring.shr(255, 64), 0);
    }

    #[test]
    fn classify_default_ring() {
        let ring = r8();
        assert_eq!(ring.classify(1), PartitionClass::Unit);
        assert_eq!(ring.classify(255), PartitionClass::Unit);
        assert_eq!(ring.classify(0), PartitionClass::Exterior);
        assert_eq!(ring.classify(128), PartitionClass::Exterior);
        assert_eq!(ring.classify(3), PartitionClass::Irreducible);
        assert_eq!(ring.classify(4), PartitionClass::Reducible);
    }

    #[test]
    fn partition_counts_match_enumeration() {
        for quantum in 1..=10 {
            let ring = Ring::new(quantum).expect("ring");
            let counts = ring.partition();
            for class in PartitionClass::ALL {
                let enumerated = ring.elements().filter(|&x| ring.classify(x) == class).count();
                assert_eq!(enumerated as u64, counts.get(class), "n={} {:?}", quantum, class);
            }
            assert_eq!(counts.total(), ring.modulus());
        }
    }

    #[test]
    fn default_partition_sums_to_256() {
        let counts = r8().partition();
        assert_eq!(
            (counts.units, counts.exterior, counts.irreducible, counts.reducible),
            (2, 2, 126, 126)
        );
    }

    #[test]
    fn identity_exhaustive_for_small_rings() {
        let report = Ring::new(12).expect("ring").verify_critical_identity();
        assert_eq!(report.method, CheckMethod::Exhaustive);
        assert_eq!(report.checked, 4096);
        assert!(report.holds);
    }

    #[test]
    fn identity_sampled_for_large_rings() {
        let report = Ring::for_existence(32)
            .expect("ring")
            .verify_critical_identity();
        assert_eq!(report.method, CheckMethod::Sampled);
        assert_eq!(report.checked, SAMPLE_DRAWS as u64);
        assert!(report.holds);
        assert!(report.counterexamples.is_empty());
    }

    #[test]
    fn sampler_is_deterministic() {
        let mut a = Sampler::new(7);
        let mut b = Sampler::new(7);
        for _ in 0..100 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn operation_names_round_trip() {
        for op in Operation::ALL {
            assert_eq!(Operation::from_name(op.name()), Some(op));
        }
        assert_eq!(Operation::from_name("div"), None);
    }
}
