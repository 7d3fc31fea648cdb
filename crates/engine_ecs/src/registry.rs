//! System registry: the catalog of systems a world ticks.
//!
//! Systems are either **always-tick** (included in every frame) or
//! **timed** (included only once their interval has elapsed). Registering a
//! system caches its query types and ordering sets so the scheduler does not
//! call back into the system while building a frame.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use engine_component::ComponentTypeId;
use tracing::debug;

use crate::system::{System, SystemId};

/// A registered system together with its cached declarations.
#[derive(Clone)]
pub struct SystemEntry {
    /// The system's identity.
    pub id: SystemId,
    /// The system's name.
    pub name: String,
    /// Component types the system is ticked over.
    pub query_types: Vec<ComponentTypeId>,
    /// Systems that must run after this one.
    pub must_run_before: Vec<SystemId>,
    /// Systems that must run before this one.
    pub must_run_after: Vec<SystemId>,
    /// The system instance.
    pub system: Arc<dyn System>,
}

impl SystemEntry {
    /// Snapshot a system's declarations.
    #[must_use]
    pub fn new(system: Arc<dyn System>) -> Self {
        Self {
            id: system.id(),
            name: system.name().to_string(),
            query_types: system.query_types(),
            must_run_before: system.must_run_before(),
            must_run_after: system.must_run_after(),
            system,
        }
    }
}

impl fmt::Debug for SystemEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemEntry")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("query_types", &self.query_types)
            .field("must_run_before", &self.must_run_before)
            .field("must_run_after", &self.must_run_after)
            .finish_non_exhaustive()
    }
}

/// A system that runs at most once per interval.
#[derive(Debug, Clone)]
pub struct TimedSystemEntry {
    /// The system and its declarations.
    pub entry: SystemEntry,
    /// Minimum time between two inclusions.
    pub interval: Duration,
    /// When the system was last included; `None` until the first inclusion.
    pub last_timestamp: Option<Instant>,
}

impl TimedSystemEntry {
    /// Returns `true` if more than `interval` has passed since the last
    /// inclusion.
    #[must_use]
    pub fn is_due(&self, now: Instant) -> bool {
        self.last_timestamp
            .is_none_or(|last| now.saturating_duration_since(last) > self.interval)
    }
}

/// Catalog of always-tick and timed systems.
#[derive(Debug, Default)]
pub struct SystemRegistry {
    always: BTreeMap<SystemId, SystemEntry>,
    timed: BTreeMap<SystemId, TimedSystemEntry>,
}

impl SystemRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an always-tick system, replacing any system with the same id.
    pub fn register_system<S: System>(&mut self, system: Arc<S>) -> SystemId {
        let entry = SystemEntry::new(system);
        let id = entry.id;
        self.timed.remove(&id);
        debug!(system = %entry.name, id = %id, "registered system");
        self.always.insert(id, entry);
        id
    }

    /// Register a timed system, replacing any system with the same id.
    pub fn register_timed_system<S: System>(
        &mut self,
        system: Arc<S>,
        interval: Duration,
    ) -> SystemId {
        let entry = SystemEntry::new(system);
        let id = entry.id;
        self.always.remove(&id);
        debug!(system = %entry.name, id = %id, ?interval, "registered timed system");
        self.timed.insert(
            id,
            TimedSystemEntry {
                entry,
                interval,
                last_timestamp: None,
            },
        );
        id
    }

    /// Remove a system of either kind.
    ///
    /// Returns `true` if it was registered.
    pub fn unregister_system(&mut self, id: SystemId) -> bool {
        let removed = self.always.remove(&id).is_some() || self.timed.remove(&id).is_some();
        if removed {
            debug!(id = %id, "unregistered system");
        }
        removed
    }

    /// Returns `true` if a system with this id is registered.
    #[must_use]
    pub fn has_system(&self, id: SystemId) -> bool {
        self.always.contains_key(&id) || self.timed.contains_key(&id)
    }

    /// Look up a system of either kind.
    #[must_use]
    pub fn get(&self, id: SystemId) -> Option<&SystemEntry> {
        self.always
            .get(&id)
            .or_else(|| self.timed.get(&id).map(|timed| &timed.entry))
    }

    /// Always-tick systems, ordered by id.
    pub fn always_tick_systems(&self) -> impl Iterator<Item = &SystemEntry> {
        self.always.values()
    }

    /// Timed systems, ordered by id.
    pub fn timed_tick_systems(&self) -> impl Iterator<Item = &TimedSystemEntry> {
        self.timed.values()
    }

    /// Total number of registered systems.
    #[must_use]
    pub fn system_count(&self) -> usize {
        self.always.len() + self.timed.len()
    }

    /// The systems to include in a frame starting at `now`.
    ///
    /// Every always-tick system is included. A timed system is included
    /// when its interval has elapsed, and its timestamp is set to `now`
    /// right away rather than when its tasks complete.
    pub fn select_for_frame(&mut self, now: Instant) -> Vec<SystemEntry> {
        let mut selected: Vec<SystemEntry> = self.always.values().cloned().collect();
        for timed in self.timed.values_mut() {
            if timed.is_due(now) {
                timed.last_timestamp = Some(now);
                selected.push(timed.entry.clone());
            }
        }
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::FnSystem;

    fn named(name: &str) -> Arc<impl System> {
        Arc::new(FnSystem::new(name, |_, _| Ok(())).query_id(ComponentTypeId(1)))
    }

    #[test]
    fn test_register_new_system() {
        let mut registry = SystemRegistry::new();
        let id = registry.register_system(named("physics"));
        assert_eq!(registry.system_count(), 1);
        assert!(registry.has_system(id));
        assert_eq!(registry.get(id).unwrap().name, "physics");
        assert_eq!(registry.get(id).unwrap().query_types, vec![ComponentTypeId(1)]);
    }

    #[test]
    fn test_reregister_replaces() {
        let mut registry = SystemRegistry::new();
        registry.register_system(named("physics"));
        let id = registry.register_timed_system(named("physics"), Duration::from_secs(1));
        assert_eq!(registry.system_count(), 1);
        assert_eq!(registry.always_tick_systems().count(), 0);
        assert_eq!(registry.timed_tick_systems().count(), 1);
        assert!(registry.has_system(id));
    }

    #[test]
    fn test_unregister() {
        let mut registry = SystemRegistry::new();
        let a = registry.register_system(named("a"));
        let b = registry.register_timed_system(named("b"), Duration::from_millis(5));
        assert!(registry.unregister_system(a));
        assert!(registry.unregister_system(b));
        assert!(!registry.unregister_system(a));
        assert_eq!(registry.system_count(), 0);
    }

    #[test]
    fn test_select_orders_by_id() {
        let mut registry = SystemRegistry::new();
        for name in ["c", "a", "b", "d"] {
            registry.register_system(named(name));
        }
        let ids: Vec<_> = registry
            .select_for_frame(Instant::now())
            .iter()
            .map(|e| e.id)
            .collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_timed_system_respects_interval() {
        let mut registry = SystemRegistry::new();
        let interval = Duration::from_millis(100);
        registry.register_timed_system(named("timed"), interval);

        let start = Instant::now();
        // First frame always includes a never-run timed system.
        assert_eq!(registry.select_for_frame(start).len(), 1);
        assert!(registry.select_for_frame(start + interval / 2).is_empty());
        // Exactly one interval later is not "more than" the interval.
        assert!(registry.select_for_frame(start + interval).is_empty());
        assert_eq!(
            registry
                .select_for_frame(start + interval + Duration::from_millis(1))
                .len(),
            1
        );
    }

    #[test]
    fn test_timed_inclusions_over_many_frames() {
        let mut registry = SystemRegistry::new();
        let interval = Duration::from_millis(50);
        registry.register_system(named("always"));
        registry.register_timed_system(named("timed"), interval);

        let start = Instant::now();
        let frame = Duration::from_millis(5);
        let mut timed_hits = 0;
        let frames = 200u32;
        for i in 0..frames {
            let selected = registry.select_for_frame(start + frame * i);
            assert!(selected.iter().any(|e| e.name == "always"));
            timed_hits += selected.iter().filter(|e| e.name == "timed").count();
        }
        // 200 frames * 5ms = 1s of wall time = 20 intervals.
        let expected = (frame * frames).as_millis() / interval.as_millis();
        assert!(timed_hits.abs_diff(expected as usize) <= 1, "{timed_hits} vs {expected}");
    }
}
