//! Registry of outstanding parse batches per region.
//!
//! This module provides `PendingRegistry`, the authoritative record of which
//! regions have batches in flight. Presence of a region is what prevents it
//! from being scheduled again; the entry is only removed once every batch of
//! the region has settled.

use std::collections::HashMap;

use crate::analysis::{BatchId, CancelHandle};
use crate::error::{OverlayError, OverlayResult};
use crate::region::RegionId;

#[derive(Debug)]
struct PendingBatch {
    id: BatchId,
    cancel: CancelHandle,
    settled: bool,
}

/// Progress of a region after one of its batches settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleProgress {
    /// Other batches of the region are still outstanding
    Pending { remaining: usize },
    /// Last batch settled; the entry has been removed
    Complete,
    /// Region or batch not in the registry (already cleaned up)
    Unknown,
}

/// Map from region to its ordered list of outstanding batches.
///
/// Only the overlay event loop touches this, so there is no locking.
///
/// # Example
///
/// ```ignore
/// let mut registry = PendingRegistry::new();
/// registry.register(region, vec![(batch, cancel)])?;
/// assert!(registry.contains(region));         // never rescheduled
/// registry.cancel(region);                     // entry stays
/// assert_eq!(registry.settle(region, batch), SettleProgress::Complete);
/// assert!(!registry.contains(region));        // may be scheduled again
/// ```
#[derive(Debug, Default)]
pub struct PendingRegistry {
    entries: HashMap<RegionId, Vec<PendingBatch>>,
}

impl PendingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, region: RegionId) -> bool {
        self.entries.contains_key(&region)
    }

    /// Register the batches of a region.
    ///
    /// Fails if the region already has an entry. An empty batch list is not
    /// registered.
    pub fn register(
        &mut self,
        region: RegionId,
        batches: Vec<(BatchId, CancelHandle)>,
    ) -> OverlayResult<()> {
        if self.contains(region) {
            return Err(OverlayError::AlreadyPending { region });
        }
        if batches.is_empty() {
            return Ok(());
        }

        let pending = batches
            .into_iter()
            .map(|(id, cancel)| PendingBatch {
                id,
                cancel,
                settled: false,
            })
            .collect();
        self.entries.insert(region, pending);
        Ok(())
    }

    /// Fire the cancel handle of every unsettled batch of a region.
    ///
    /// Returns the number of handles fired by this call, or `None` if the
    /// region has no entry. The entry itself is kept.
    pub fn cancel(&mut self, region: RegionId) -> Option<usize> {
        let batches = self.entries.get(&region)?;
        let fired = batches
            .iter()
            .filter(|batch| !batch.settled)
            .filter(|batch| batch.cancel.fire())
            .count();
        Some(fired)
    }

    /// Record the settlement of one batch.
    ///
    /// Removes the entry when this was the last outstanding batch.
    pub fn settle(&mut self, region: RegionId, batch: BatchId) -> SettleProgress {
        let Some(batches) = self.entries.get_mut(&region) else {
            return SettleProgress::Unknown;
        };
        let Some(pending) = batches.iter_mut().find(|pending| pending.id == batch) else {
            return SettleProgress::Unknown;
        };
        if pending.settled {
            return SettleProgress::Unknown;
        }
        pending.settled = true;

        let remaining = batches.iter().filter(|pending| !pending.settled).count();
        if remaining > 0 {
            return SettleProgress::Pending { remaining };
        }

        self.entries.remove(&region);
        SettleProgress::Complete
    }

    /// Fire every outstanding cancel handle; entries are kept.
    pub fn cancel_all(&mut self) -> usize {
        let regions: Vec<RegionId> = self.entries.keys().copied().collect();
        regions
            .into_iter()
            .filter_map(|region| self.cancel(region))
            .sum()
    }

    /// Batch ids of a region in registration order.
    pub fn batches(&self, region: RegionId) -> Vec<BatchId> {
        self.entries
            .get(&region)
            .map(|batches| batches.iter().map(|batch| batch.id).collect())
            .unwrap_or_default()
    }

    pub fn regions(&self) -> Vec<RegionId> {
        let mut regions: Vec<RegionId> = self.entries.keys().copied().collect();
        regions.sort();
        regions
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
