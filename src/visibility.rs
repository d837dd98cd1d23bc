//! Viewport visibility tracking.
//!
//! Wraps the platform intersection primitive ([`ViewportObserver`]) and turns
//! its raw per-cycle entries into edge-triggered entered/left lists.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::region::RegionId;

const LOG_TARGET: &str = "parse_overlay::visibility";

/// Platform viewport-intersection primitive.
pub trait ViewportObserver {
    fn observe(&mut self, region: RegionId);
    fn unobserve(&mut self, region: RegionId);
}

/// One raw intersection record from the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntersectionEntry {
    pub region: RegionId,
    pub is_intersecting: bool,
}

impl IntersectionEntry {
    pub fn visible(region: RegionId) -> Self {
        Self {
            region,
            is_intersecting: true,
        }
    }

    pub fn hidden(region: RegionId) -> Self {
        Self {
            region,
            is_intersecting: false,
        }
    }
}

/// Edges detected in one notification cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibilityChange {
    pub entered: Vec<RegionId>,
    pub left: Vec<RegionId>,
}

impl VisibilityChange {
    pub fn is_empty(&self) -> bool {
        self.entered.is_empty() && self.left.is_empty()
    }
}

/// Edge-triggered visibility tracking over observed regions.
pub struct VisibilitySensor<O> {
    observer: O,
    /// Observed regions and whether they are currently in view.
    in_view: HashMap<RegionId, bool>,
}

impl<O: ViewportObserver> VisibilitySensor<O> {
    pub fn new(observer: O) -> Self {
        Self {
            observer,
            in_view: HashMap::new(),
        }
    }

    /// Start monitoring a region. Returns `false` if it was already monitored.
    pub fn observe(&mut self, region: RegionId) -> bool {
        if self.in_view.contains_key(&region) {
            return false;
        }
        self.in_view.insert(region, false);
        self.observer.observe(region);
        log::trace!(target: LOG_TARGET, "Observing {}", region);
        true
    }

    /// Stop monitoring a region. Returns `false` if it was not monitored.
    pub fn unobserve(&mut self, region: RegionId) -> bool {
        if self.in_view.remove(&region).is_none() {
            return false;
        }
        self.observer.unobserve(region);
        log::trace!(target: LOG_TARGET, "Unobserved {}", region);
        true
    }

    pub fn is_observed(&self, region: RegionId) -> bool {
        self.in_view.contains_key(&region)
    }

    pub fn is_in_view(&self, region: RegionId) -> bool {
        self.in_view.get(&region).copied().unwrap_or(false)
    }

    /// Consume the entries of one notification cycle.
    ///
    /// Only the last entry per region counts. Regions that are not observed
    /// are ignored; a region already in view does not enter again.
    pub fn notify(&mut self, entries: &[IntersectionEntry]) -> VisibilityChange {
        let mut latest: Vec<IntersectionEntry> = Vec::with_capacity(entries.len());
        for entry in entries {
            match latest.iter_mut().find(|seen| seen.region == entry.region) {
                Some(seen) => *seen = *entry,
                None => latest.push(*entry),
            }
        }

        let mut change = VisibilityChange::default();
        for entry in latest {
            let Some(in_view) = self.in_view.get_mut(&entry.region) else {
                continue;
            };
            match (*in_view, entry.is_intersecting) {
                (false, true) => {
                    *in_view = true;
                    change.entered.push(entry.region);
                }
                (true, false) => {
                    *in_view = false;
                    change.left.push(entry.region);
                }
                _ => {}
            }
        }

        if !change.is_empty() {
            log::debug!(
                target: LOG_TARGET,
                "{} region(s) entered view, {} left",
                change.entered.len(),
                change.left.len()
            );
        }
        change
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observed_count(&self) -> usize {
        self.in_view.len()
    }
}
