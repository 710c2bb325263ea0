//! # Observer Zone Classifier
//!
//! Tracks how trustworthy an external agent's outputs have been, as one of
//! three zones computed from its most recent [`OBSERVER_WINDOW`] outputs:
//!
//! | Zone | grade-A rate | mean distance |
//! |---|---|---|
//! | Coherence | ≥ 0.80 | < 2.0 |
//! | Drift | ≥ 0.20 | < 5.0 |
//! | Collapse | otherwise | |
//!
//! The zone is recomputed, never pushed: every record and every read
//! reclassifies from the window. `zone_since` moves only when the zone does.

pub mod registry;
pub mod store;

pub use registry::{ObserverBackend, ObserverRegistry};
pub use store::RedbObserverStore;

use serde::{Deserialize, Serialize};

use crate::RingfactError;
use crate::derivation::is_derivation_id;
use crate::grade::Grade;
use crate::primitives::{
    COHERENCE_MAX_DISTANCE_MILLI, COHERENCE_MIN_RATE_BP, DRIFT_MAX_DISTANCE_MILLI,
    DRIFT_MIN_RATE_BP, MAX_AGENT_ID_LENGTH, OBSERVER_WINDOW,
};
use crate::ring::Ring;
use crate::types::{BasisPoints, Milli};

// =============================================================================
// ZONES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Zone {
    Coherence,
    Drift,
    Collapse,
}

impl Zone {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Coherence => "Coherence",
            Self::Drift => "Drift",
            Self::Collapse => "Collapse",
        }
    }
}

/// Window statistics a zone is computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ZoneStats {
    pub window: u32,
    pub grade_a_rate: BasisPoints,
    pub mean_distance: Milli,
    /// Fraction of outputs carrying a derivation id.
    pub persistence: BasisPoints,
}

/// Classify window statistics.
#[must_use]
pub fn classify(stats: &ZoneStats) -> Zone {
    let rate = stats.grade_a_rate.value();
    let distance = stats.mean_distance.value();
    if rate >= COHERENCE_MIN_RATE_BP && distance < COHERENCE_MAX_DISTANCE_MILLI {
        Zone::Coherence
    } else if rate >= DRIFT_MIN_RATE_BP && distance < DRIFT_MAX_DISTANCE_MILLI {
        Zone::Drift
    } else {
        Zone::Collapse
    }
}

/// Statistics over the last [`OBSERVER_WINDOW`] outputs.
#[must_use]
pub fn window_stats(outputs: &[ObserverOutput]) -> ZoneStats {
    let window = &outputs[outputs.len().saturating_sub(OBSERVER_WINDOW)..];
    if window.is_empty() {
        return ZoneStats::default();
    }
    let n = window.len();
    let grade_a = window.iter().filter(|o| o.grade == Grade::A).count();
    let persistent = window.iter().filter(|o| o.derivation_id.is_some()).count();
    let total_distance: u64 = window.iter().map(|o| u64::from(o.distance.value())).sum();
    ZoneStats {
        window: n as u32,
        grade_a_rate: BasisPoints::ratio(grade_a, n),
        mean_distance: Milli((total_distance / n as u64) as u32),
        persistence: BasisPoints::ratio(persistent, n),
    }
}

/// Hamming distance between a claimed and a derived value, as a score.
#[must_use]
pub fn hamming_distance(claimed: u64, derived: u64) -> Milli {
    Milli::from_units((claimed ^ derived).count_ones())
}

// =============================================================================
// REMEDIATION
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remediation {
    pub zone: Zone,
    pub action_required: bool,
    pub summary: String,
    pub steps: Vec<String>,
}

/// Zone-specific guidance.
#[must_use]
pub fn remediation(zone: Zone) -> Remediation {
    let (action_required, summary, steps): (bool, &str, &[&str]) = match zone {
        Zone::Coherence => (
            false,
            "No action required; outputs are consistently algebraically grounded.",
            &[],
        ),
        Zone::Drift => (
            true,
            "Outputs are partially grounded; restore derivation trails.",
            &[
                "Identify recent outputs without a derivation id or below grade A.",
                "Derive each claimed value with POST /derive.",
                "Attach the returned derivation_id to the output.",
                "Verify with GET /certify?derivation_id=... before reuse.",
            ],
        ),
        Zone::Collapse => (
            true,
            "Outputs are not grounded; stop trusting them until re-grounded.",
            &[
                "Quarantine outputs produced since the zone change.",
                "Re-ground on the founding derivation via GET /certify.",
                "Re-derive every claim with POST /derive; discard claims that do not reproduce.",
                "Record only grade-A outputs until the zone returns to Drift or Coherence.",
            ],
        ),
    };
    Remediation {
        zone,
        action_required,
        summary: summary.to_string(),
        steps: steps.iter().map(|s| (*s).to_string()).collect(),
    }
}

// =============================================================================
// RECORDS
// =============================================================================

/// One recorded output of an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObserverOutput {
    pub grade: Grade,
    pub derivation_id: Option<String>,
    pub distance: Milli,
    pub recorded_at: u64,
}

/// Persisted state of one observed agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObserverRecord {
    pub agent_id: String,
    pub quantum: u32,
    pub capacity: u32,
    pub founding_derivation: String,
    pub registered_at: u64,
    pub zone: Zone,
    pub zone_since: u64,
    pub stats: ZoneStats,
    /// Most recent outputs, oldest first, at most [`OBSERVER_WINDOW`].
    pub outputs: Vec<ObserverOutput>,
}

/// Validate an agent identifier.
pub fn validate_agent_id(agent_id: &str) -> Result<(), RingfactError> {
    if agent_id.is_empty() || agent_id.len() > MAX_AGENT_ID_LENGTH {
        return Err(RingfactError::param(
            "agent_id",
            format!("must be 1 to {} characters", MAX_AGENT_ID_LENGTH),
        ));
    }
    if !agent_id
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b':'))
    {
        return Err(RingfactError::param(
            "agent_id",
            "only ASCII letters, digits and - _ . : are allowed",
        ));
    }
    Ok(())
}

impl ObserverRecord {
    /// A new record seeded with the founding derivation as one grade-A output.
    pub fn register(
        agent_id: &str,
        quantum: u32,
        capacity: u32,
        founding_derivation: &str,
        now: u64,
    ) -> Result<Self, RingfactError> {
        validate_agent_id(agent_id)?;
        Ring::new(quantum).map_err(|_| {
            RingfactError::param("quantum", format!("unsupported quantum {}", quantum))
        })?;
        if capacity == 0 {
            return Err(RingfactError::param("capacity", "must be at least 1"));
        }
        if !is_derivation_id(founding_derivation) {
            return Err(RingfactError::param(
                "founding_derivation",
                "expected urn:uor:derivation:sha256:<64 hex digits>",
            ));
        }
        let outputs = vec![ObserverOutput {
            grade: Grade::A,
            derivation_id: Some(founding_derivation.to_string()),
            distance: Milli::ZERO,
            recorded_at: now,
        }];
        let stats = window_stats(&outputs);
        Ok(Self {
            agent_id: agent_id.to_string(),
            quantum,
            capacity,
            founding_derivation: founding_derivation.to_string(),
            registered_at: now,
            zone: classify(&stats),
            zone_since: now,
            stats,
            outputs,
        })
    }

    /// Append an output. Returns whether the zone changed.
    pub fn record(&mut self, output: ObserverOutput, now: u64) -> Result<bool, RingfactError> {
        if output
            .derivation_id
            .as_deref()
            .is_some_and(|id| !is_derivation_id(id))
        {
            return Err(RingfactError::param(
                "derivation_id",
                "expected urn:uor:derivation:sha256:<64 hex digits>",
            ));
        }
        self.outputs.push(output);
        let excess = self.outputs.len().saturating_sub(OBSERVER_WINDOW);
        self.outputs.drain(..excess);
        Ok(self.refresh(now))
    }

    /// Recompute statistics and zone. Returns whether the zone changed.
    pub fn refresh(&mut self, now: u64) -> bool {
        self.stats = window_stats(&self.outputs);
        let zone = classify(&self.stats);
        if zone != self.zone {
            self.zone = zone;
            self.zone_since = now;
            true
        } else {
            false
        }
    }

    #[must_use]
    pub fn remediation(&self) -> Remediation {
        remediation(self.zone)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const FOUNDING: &str =
        "urn:uor:derivation:sha256:0000000000000000000000000000000000000000000000000000000000000000";

    fn output(grade: Grade, distance: u32) -> ObserverOutput {
        ObserverOutput {
            grade,
            derivation_id: None,
            distance: Milli::from_units(distance),
            recorded_at: 0,
        }
    }

    #[test]
    fn all_grade_a_is_coherence() {
        let outputs: Vec<_> = (0..20).map(|_| output(Grade::A, 0)).collect();
        let stats = window_stats(&outputs);
        assert_eq!(stats.grade_a_rate, BasisPoints(10_000));
        assert_eq!(classify(&stats), Zone::Coherence);
    }

    #[test]
    fn no_grade_a_and_high_distance_is_collapse() {
        let outputs: Vec<_> = (0..20).map(|_| output(Grade::D, 8)).collect();
        assert_eq!(classify(&window_stats(&outputs)), Zone::Collapse);
    }

    #[test]
    fn middle_band_is_drift() {
        // 10 of 20 grade A, mean distance 3.0
        let outputs: Vec<_> = (0..20)
            .map(|i| output(if i % 2 == 0 { Grade::A } else { Grade::C }, 3))
            .collect();
        assert_eq!(classify(&window_stats(&outputs)), Zone::Drift);
    }

    #[test]
    fn thresholds_are_inclusive_and_exclusive_as_stated() {
        let at = |rate, dist| ZoneStats {
            window: 20,
            grade_a_rate: BasisPoints(rate),
            mean_distance: Milli(dist),
            persistence: BasisPoints(0),
        };
        assert_eq!(classify(&at(8_000, 1_999)), Zone::Coherence);
        assert_eq!(classify(&at(8_000, 2_000)), Zone::Drift);
        assert_eq!(classify(&at(7_999, 0)), Zone::Drift);
        assert_eq!(classify(&at(2_000, 4_999)), Zone::Drift);
        assert_eq!(classify(&at(1_999, 0)), Zone::Collapse);
        assert_eq!(classify(&at(10_000, 5_000)), Zone::Collapse);
    }

    #[test]
    fn window_keeps_last_twenty() {
        let mut outputs: Vec<_> = (0..30).map(|_| output(Grade::D, 9)).collect();
        outputs.extend((0..20).map(|_| output(Grade::A, 0)));
        let stats = window_stats(&outputs);
        assert_eq!(stats.window, 20);
        assert_eq!(classify(&stats), Zone::Coherence);
    }

    #[test]
    fn registration_starts_coherent() {
        let record = ObserverRecord::register("agent-1", 8, 4, FOUNDING, 100).expect("register");
        assert_eq!(record.zone, Zone::Coherence);
        assert_eq!(record.zone_since, 100);
        assert_eq!(record.stats.persistence, BasisPoints(10_000));
        assert!(!record.remediation().action_required);
    }

    #[test]
    fn zone_since_moves_only_on_change() {
        let mut record = ObserverRecord::register("agent-1", 8, 4, FOUNDING, 100).expect("register");
        assert!(!record.record(output(Grade::A, 0), 110).expect("record"));
        assert_eq!(record.zone_since, 100);

        for t in 0..19 {
            record.record(output(Grade::D, 9), 200 + t).expect("record");
        }
        assert_eq!(record.zone, Zone::Collapse);
        let since = record.zone_since;
        assert!(since >= 200);

        record.record(output(Grade::D, 9), 500).expect("record");
        assert_eq!(record.zone_since, since);
        assert!(!record.refresh(600));
        assert_eq!(record.outputs.len(), OBSERVER_WINDOW);
    }

    #[test]
    fn remediation_differs_by_zone() {
        assert!(remediation(Zone::Coherence).steps.is_empty());
        let drift = remediation(Zone::Drift);
        let collapse = remediation(Zone::Collapse);
        assert!(drift.steps[0].starts_with("Identify"));
        assert!(collapse.steps[0].starts_with("Quarantine"));
    }

    #[test]
    fn registration_validation() {
        assert!(ObserverRecord::register("", 8, 1, FOUNDING, 0).is_err());
        assert!(ObserverRecord::register("a b", 8, 1, FOUNDING, 0).is_err());
        assert!(ObserverRecord::register("a", 17, 1, FOUNDING, 0).is_err());
        assert!(ObserverRecord::register("a", 8, 0, FOUNDING, 0).is_err());
        assert!(ObserverRecord::register("a", 8, 1, "urn:x", 0).is_err());
    }

    #[test]
    fn hamming_scores() {
        assert_eq!(hamming_distance(0b1010, 0b1010), Milli::ZERO);
        assert_eq!(hamming_distance(0, 0xFF), Milli(8_000));
    }

    #[test]
    fn record_rejects_malformed_derivation_id() {
        let mut record = ObserverRecord::register("a", 8, 1, FOUNDING, 0).expect("register");
        let bad = ObserverOutput {
            derivation_id: Some("nope".into()),
            ..output(Grade::A, 0)
        };
        assert!(record.record(bad, 1).is_err());
        assert_eq!(record.outputs.len(), 1);
    }
}
