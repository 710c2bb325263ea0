//! # Core Type Definitions
//!
//! Shared value types for the ringfact engine:
//! - Error type (`RingfactError`)
//! - Fixed-point statistics (`Milli`, `BasisPoints`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer arithmetic only (no floating-point)
//! - Implement `Ord` for deterministic ordering in `BTreeMap`/`BTreeSet`
//! - Use saturating arithmetic for accumulators

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::primitives::{BASIS_POINTS, MILLI};

// =============================================================================
// FIXED-POINT VALUES
// =============================================================================

/// A non-negative decimal with three fractional digits, stored as thousandths.
///
/// `Milli(1250)` is `1.250`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Milli(pub u32);

impl Milli {
    /// Zero.
    pub const ZERO: Self = Self(0);

    /// Whole units, saturating.
    #[must_use]
    pub const fn from_units(units: u32) -> Self {
        Self(units.saturating_mul(MILLI))
    }

    /// Raw thousandths.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Parse a plain decimal string (`"2"`, `"1.5"`, `"0.125"`).
    ///
    /// Digits beyond the third fractional place are truncated. Signs and
    /// exponents are rejected. No floating point is involved.
    pub fn parse_decimal(text: &str) -> Result<Self, RingfactError> {
        let text = text.trim();
        let (whole, fraction) = match text.split_once('.') {
            Some((w, f)) => (w, f),
            None => (text, ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(RingfactError::param("distance", "empty decimal"));
        }
        if !whole.bytes().all(|b| b.is_ascii_digit())
            || !fraction.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(RingfactError::param(
                "distance",
                format!("'{}' is not a non-negative decimal", text),
            ));
        }

        let mut units: u32 = 0;
        for b in whole.bytes() {
            units = units
                .checked_mul(10)
                .and_then(|u| u.checked_add(u32::from(b - b'0')))
                .ok_or_else(|| RingfactError::param("distance", "value too large"))?;
        }

        let mut thousandths: u32 = 0;
        let mut digits = fraction.bytes();
        for scale in [100u32, 10, 1] {
            if let Some(b) = digits.next() {
                thousandths += u32::from(b - b'0') * scale;
            }
        }

        units
            .checked_mul(MILLI)
            .and_then(|u| u.checked_add(thousandths))
            .map(Self)
            .ok_or_else(|| RingfactError::param("distance", "value too large"))
    }
}

impl fmt::Display for Milli {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}", self.0 / MILLI, self.0 % MILLI)
    }
}

/// A ratio in basis points (`10_000` == 1.0).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct BasisPoints(pub u32);

impl BasisPoints {
    /// Ratio `numerator / denominator`, rounded down. An empty denominator yields zero.
    #[must_use]
    pub fn ratio(numerator: usize, denominator: usize) -> Self {
        if denominator == 0 {
            return Self(0);
        }
        let scaled = (numerator as u64).saturating_mul(u64::from(BASIS_POINTS)) / denominator as u64;
        Self(scaled.min(u64::from(BASIS_POINTS)) as u32)
    }

    /// Raw basis points.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for BasisPoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:04}", self.0 / BASIS_POINTS, self.0 % BASIS_POINTS)
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the ringfact engine.
///
/// - No silent failures
/// - Use `Result<T, RingfactError>` for fallible operations
/// - The CORE never panics; every error is recoverable
#[derive(Debug, Error)]
pub enum RingfactError {
    /// A caller-supplied value is malformed or out of range.
    #[error("Invalid parameter '{param}': {reason}")]
    InvalidParameter { param: String, reason: String },

    /// A term or query failed to parse.
    #[error("Parse error at position {position}: {reason}")]
    Parse { position: usize, reason: String },

    /// A term nests deeper than the evaluator allows.
    #[error("Term depth exceeds maximum of {0}")]
    DepthExceeded(usize),

    /// A referenced object does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An input exceeds a size limit.
    #[error("Payload of {actual} bytes exceeds the {limit}-byte limit")]
    TooLarge { limit: usize, actual: usize },

    /// The request is well-formed but asks for something the engine does not do.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O or storage error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl RingfactError {
    /// Shorthand for [`RingfactError::InvalidParameter`].
    pub fn param(param: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            param: param.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for [`RingfactError::Parse`].
    pub fn parse(position: usize, reason: impl Into<String>) -> Self {
        Self::Parse {
            position,
            reason: reason.into(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn milli_parses_plain_decimals() {
        assert_eq!(Milli::parse_decimal("2").expect("parse"), Milli(2000));
        assert_eq!(Milli::parse_decimal("1.5").expect("parse"), Milli(1500));
        assert_eq!(Milli::parse_decimal("0.125").expect("parse"), Milli(125));
        assert_eq!(Milli::parse_decimal(".5").expect("parse"), Milli(500));
    }

    #[test]
    fn milli_truncates_extra_digits() {
        assert_eq!(Milli::parse_decimal("1.23456").expect("parse"), Milli(1234));
    }

    #[test]
    fn milli_rejects_signs_and_exponents() {
        assert!(Milli::parse_decimal("-1").is_err());
        assert!(Milli::parse_decimal("1e-7").is_err());
        assert!(Milli::parse_decimal("").is_err());
        assert!(Milli::parse_decimal(".").is_err());
    }

    #[test]
    fn milli_display() {
        assert_eq!(Milli(1250).to_string(), "1.250");
        assert_eq!(Milli(7).to_string(), "0.007");
    }

    #[test]
    fn basis_points_ratio() {
        assert_eq!(BasisPoints::ratio(16, 20), BasisPoints(8000));
        assert_eq!(BasisPoints::ratio(1, 3), BasisPoints(3333));
        assert_eq!(BasisPoints::ratio(5, 0), BasisPoints(0));
        assert_eq!(BasisPoints(8000).to_string(), "0.8000");
    }
}
