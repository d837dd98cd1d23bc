//! Region identity and per-region state.
//!
//! Regions are identified by host-issued handles rather than by the render
//! objects themselves, so the bookkeeping here outlives (and is independent
//! of) whatever the host does to its tree.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::text::TextBlock;

/// Stable handle to a render subtree that may contain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionId(pub u64);

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "region#{}", self.0)
    }
}

/// Handle to a text-bearing node inside a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Lifecycle of a region as seen by the overlay.
///
/// - Observed: registered with the visibility sensor
/// - Retired: unobserved for good (no text, or analysis finished)
/// - Destroyed: removed by the host while batches were still pending
///
/// Transitions:
/// - Observed -> Retired (no extractable text, or terminal cleanup)
/// - Observed -> Destroyed (host removed it with work in flight)
/// - Observed -> forgotten (host removed it, nothing pending)
/// - Destroyed -> forgotten (terminal cleanup)
/// - Retired is terminal; a retired region is never observed again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionPhase {
    Observed,
    Retired,
    Destroyed,
}

#[derive(Debug)]
struct RegionState {
    phase: RegionPhase,
    /// Built on first visibility, never rebuilt.
    blocks: Option<Vec<TextBlock>>,
}

/// Arena of region state keyed by [`RegionId`].
#[derive(Debug, Default)]
pub struct RegionArena {
    regions: HashMap<RegionId, RegionState>,
}

impl RegionArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a region as observed.
    ///
    /// Returns `false` when the region is already observed or was retired,
    /// in which case the caller must not instrument it again.
    pub fn observe(&mut self, region: RegionId) -> bool {
        match self.regions.get(&region).map(|state| state.phase) {
            Some(_) => false,
            None => {
                self.regions.insert(
                    region,
                    RegionState {
                        phase: RegionPhase::Observed,
                        blocks: None,
                    },
                );
                true
            }
        }
    }

    /// Mark a region as permanently retired.
    pub fn retire(&mut self, region: RegionId) {
        if let Some(state) = self.regions.get_mut(&region) {
            state.phase = RegionPhase::Retired;
        }
    }

    /// Mark a region the host removed while its batches are still pending.
    pub fn destroy(&mut self, region: RegionId) {
        if let Some(state) = self.regions.get_mut(&region) {
            state.phase = RegionPhase::Destroyed;
            state.blocks = None;
        }
    }

    pub fn phase(&self, region: RegionId) -> Option<RegionPhase> {
        self.regions.get(&region).map(|state| state.phase)
    }

    pub fn is_retired(&self, region: RegionId) -> bool {
        self.phase(region) == Some(RegionPhase::Retired)
    }

    /// Text blocks of a region, built by `build` on the first call only.
    ///
    /// Regions the arena does not know are tracked on the fly, since the
    /// sensor may report a region that was observed before the arena existed.
    pub fn blocks_or_build(
        &mut self,
        region: RegionId,
        build: impl FnOnce() -> Vec<TextBlock>,
    ) -> &[TextBlock] {
        let state = self.regions.entry(region).or_insert(RegionState {
            phase: RegionPhase::Observed,
            blocks: None,
        });
        state.blocks.get_or_insert_with(build)
    }

    /// Forget a region the host destroyed.
    pub fn remove(&mut self, region: RegionId) -> bool {
        self.regions.remove(&region).is_some()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn observe_is_idempotent() {
        let mut arena = RegionArena::new();
        assert!(arena.observe(RegionId(1)));
        assert!(!arena.observe(RegionId(1)));
        assert_eq!(arena.phase(RegionId(1)), Some(RegionPhase::Observed));
    }

    #[test]
    fn retired_regions_cannot_be_observed_again() {
        let mut arena = RegionArena::new();
        arena.observe(RegionId(1));
        arena.retire(RegionId(1));

        assert!(arena.is_retired(RegionId(1)));
        assert!(!arena.observe(RegionId(1)));
        assert!(arena.is_retired(RegionId(1)));
    }

    #[test]
    fn blocks_are_built_exactly_once() {
        let mut arena = RegionArena::new();
        let builds = Cell::new(0);

        for _ in 0..3 {
            arena.blocks_or_build(RegionId(4), || {
                builds.set(builds.get() + 1);
                Vec::new()
            });
        }

        assert_eq!(builds.get(), 1);
    }

    #[test]
    fn destroyed_region_stays_known_until_removed() {
        let mut arena = RegionArena::new();
        arena.observe(RegionId(3));
        arena.destroy(RegionId(3));

        assert_eq!(arena.phase(RegionId(3)), Some(RegionPhase::Destroyed));
        assert!(!arena.observe(RegionId(3)));
        assert!(arena.remove(RegionId(3)));
        assert_eq!(arena.phase(RegionId(3)), None);
    }

    #[test]
    fn remove_forgets_region() {
        let mut arena = RegionArena::new();
        arena.observe(RegionId(2));
        assert!(arena.remove(RegionId(2)));
        assert!(!arena.remove(RegionId(2)));
        assert!(arena.is_empty());
    }
}
