//! Observer registry over an in-memory or redb backend.

use std::collections::BTreeMap;
use std::path::Path;

use super::{ObserverOutput, ObserverRecord, RedbObserverStore};
use crate::RingfactError;

/// Where observer records live.
#[derive(Debug)]
pub enum ObserverBackend {
    /// Volatile map; lost on restart.
    InMemory(BTreeMap<String, ObserverRecord>),
    /// redb file; one write per register, record and zone transition.
    Persistent(RedbObserverStore),
}

impl Default for ObserverBackend {
    fn default() -> Self {
        Self::InMemory(BTreeMap::new())
    }
}

/// All registered observers.
#[derive(Debug, Default)]
pub struct ObserverRegistry {
    backend: ObserverBackend,
}

impl ObserverRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry persisted to a redb file at `path`.
    pub fn with_redb(path: impl AsRef<Path>) -> Result<Self, RingfactError> {
        Ok(Self {
            backend: ObserverBackend::Persistent(RedbObserverStore::open(path)?),
        })
    }

    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, ObserverBackend::Persistent(_))
    }

    pub fn get(&self, agent_id: &str) -> Result<Option<ObserverRecord>, RingfactError> {
        match &self.backend {
            ObserverBackend::InMemory(map) => Ok(map.get(agent_id).cloned()),
            ObserverBackend::Persistent(store) => store.get(agent_id),
        }
    }

    fn put(&mut self, record: &ObserverRecord) -> Result<(), RingfactError> {
        match &mut self.backend {
            ObserverBackend::InMemory(map) => {
                map.insert(record.agent_id.clone(), record.clone());
                Ok(())
            }
            ObserverBackend::Persistent(store) => store.put(record),
        }
    }

    fn require(&self, agent_id: &str) -> Result<ObserverRecord, RingfactError> {
        self.get(agent_id)?
            .ok_or_else(|| RingfactError::NotFound(format!("observer '{}' is not registered", agent_id)))
    }

    /// Register a new agent. An existing id is a parameter error.
    pub fn register(
        &mut self,
        agent_id: &str,
        quantum: u32,
        capacity: u32,
        founding_derivation: &str,
        now: u64,
    ) -> Result<ObserverRecord, RingfactError> {
        if self.get(agent_id)?.is_some() {
            return Err(RingfactError::param(
                "agent_id",
                format!("observer '{}' is already registered", agent_id),
            ));
        }
        let record = ObserverRecord::register(agent_id, quantum, capacity, founding_derivation, now)?;
        self.put(&record)?;
        Ok(record)
    }

    /// Record one output and persist the updated record.
    pub fn record(
        &mut self,
        agent_id: &str,
        output: ObserverOutput,
        now: u64,
    ) -> Result<(ObserverRecord, bool), RingfactError> {
        let mut record = self.require(agent_id)?;
        let changed = record.record(output, now)?;
        self.put(&record)?;
        Ok((record, changed))
    }

    /// A profile with the zone recomputed, and whether the zone moved.
    /// Nothing is persisted.
    pub fn preview(&self, agent_id: &str, now: u64) -> Result<(ObserverRecord, bool), RingfactError> {
        let mut record = self.require(agent_id)?;
        let changed = record.refresh(now);
        Ok((record, changed))
    }

    /// [`preview`](Self::preview), persisting the record on a transition.
    pub fn profile(&mut self, agent_id: &str, now: u64) -> Result<(ObserverRecord, bool), RingfactError> {
        let (record, changed) = self.preview(agent_id, now)?;
        if changed {
            self.put(&record)?;
        }
        Ok((record, changed))
    }

    pub fn len(&self) -> Result<usize, RingfactError> {
        match &self.backend {
            ObserverBackend::InMemory(map) => Ok(map.len()),
            ObserverBackend::Persistent(store) => Ok(store.len()? as usize),
        }
    }

    pub fn is_empty(&self) -> Result<bool, RingfactError> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grade::Grade;
    use crate::observer::Zone;
    use crate::types::Milli;

    const FOUNDING: &str =
        "urn:uor:derivation:sha256:2222222222222222222222222222222222222222222222222222222222222222";

    fn bad_output() -> ObserverOutput {
        ObserverOutput {
            grade: Grade::D,
            derivation_id: None,
            distance: Milli::from_units(9),
            recorded_at: 0,
        }
    }

    fn exercise(registry: &mut ObserverRegistry) {
        registry.register("agent", 8, 1, FOUNDING, 10).expect("register");
        assert!(registry.register("agent", 8, 1, FOUNDING, 11).is_err());

        let mut transitioned = false;
        for t in 0..5 {
            let (_, changed) = registry.record("agent", bad_output(), 20 + t).expect("record");
            transitioned |= changed;
        }
        assert!(transitioned);

        let (profile, changed) = registry.profile("agent", 100).expect("profile");
        assert!(!changed);
        assert_eq!(profile.zone, Zone::Collapse);
        assert!(profile.zone_since < 100);
        assert_eq!(profile.outputs.len(), 6);

        assert!(matches!(
            registry.profile("ghost", 0),
            Err(RingfactError::NotFound(_))
        ));
        assert_eq!(registry.len().expect("len"), 1);
    }

    #[test]
    fn preview_leaves_a_stale_zone_for_profile_to_persist() {
        let mut registry = ObserverRegistry::new();
        let mut stale = registry.register("agent", 8, 1, FOUNDING, 10).expect("register");
        stale.zone = Zone::Collapse;
        registry.put(&stale).expect("put");

        let (previewed, changed) = registry.preview("agent", 50).expect("preview");
        assert!(changed);
        assert_eq!(previewed.zone, Zone::Coherence);
        assert_eq!(registry.get("agent").expect("get").expect("present").zone, Zone::Collapse);

        let (profiled, changed) = registry.profile("agent", 60).expect("profile");
        assert!(changed);
        assert_eq!(profiled.zone_since, 60);
        assert_eq!(registry.get("agent").expect("get").expect("present").zone, Zone::Coherence);
        assert!(!registry.preview("agent", 70).expect("preview").1);
    }

    #[test]
    fn in_memory_backend() {
        let mut registry = ObserverRegistry::new();
        assert!(!registry.is_persistent());
        exercise(&mut registry);
    }

    #[test]
    fn redb_backend() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("obs.redb");
        {
            let mut registry = ObserverRegistry::with_redb(&path).expect("open");
            assert!(registry.is_persistent());
            exercise(&mut registry);
        }
        let registry = ObserverRegistry::with_redb(&path).expect("reopen");
        let record = registry.get("agent").expect("get").expect("present");
        assert_eq!(record.zone, Zone::Collapse);
    }
}
