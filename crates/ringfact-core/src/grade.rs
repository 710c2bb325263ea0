//! # Epistemic Grades
//!
//! Every fact the engine hands out carries one of four trust levels.

use serde::{Deserialize, Serialize};

/// Trust level of a fact, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    /// Freshly derived by the kernel; digest-verifiable.
    A,
    /// Backed by a certificate after graph lookup.
    B,
    /// Present in the graph but uncertified.
    C,
    /// No derivation trail.
    D,
}

impl Grade {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::A => "Algebraically Proven",
            Self::B => "Graph-Certified",
            Self::C => "Graph-Present",
            Self::D => "Unverified",
        }
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::A => {
                "Derived by the ring kernel in this request; the derivation id can be recomputed from the canonical term and result."
            }
            Self::B => {
                "Matched to a derivation in the knowledge graph and re-derived to issue a certificate."
            }
            Self::C => "Found in the knowledge graph without an accompanying certificate.",
            Self::D => "No derivation trail or failed verification; re-derive before relying on it.",
        }
    }

    #[must_use]
    pub const fn letter(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        }
    }

    /// Parse a single-letter grade (case-insensitive).
    #[must_use]
    pub fn from_letter(s: &str) -> Option<Self> {
        match s.trim() {
            "A" | "a" => Some(Self::A),
            "B" | "b" => Some(Self::B),
            "C" | "c" => Some(Self::C),
            "D" | "d" => Some(Self::D),
            _ => None,
        }
    }

    /// Serializable label/description bundle.
    #[must_use]
    pub fn info(self) -> GradeInfo {
        GradeInfo {
            grade: self,
            label: self.label().to_string(),
            description: self.description().to_string(),
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.letter())
    }
}

/// A grade together with its human-readable explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeInfo {
    pub grade: Grade,
    pub label: String,
    pub description: String,
}
