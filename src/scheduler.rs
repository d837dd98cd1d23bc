//! Visibility-gated batch scheduling and cancellation.
//!
//! # Flow
//!
//! ```text
//! entered-view(regions)
//!       │
//!       ├─► already pending? ──► skip
//!       │
//!       ├─► build text blocks (first time only)
//!       │       └─► none? ──► unobserve + retire
//!       │
//!       └─► one batch per block ──► register ──► tint in-flight ──► dispatch
//!
//! left-view(regions)
//!       └─► pending? ──► fire cancel handles ──► tint cancelled (entry kept)
//!
//! settled(region, batch)
//!       └─► last batch? ──► remove entry + unobserve + retire + tint neutral
//!                            (destroyed region: forget instead, no tint)
//!
//! destroyed(region)
//!       ├─► unobserve
//!       └─► pending? ──► fire cancel handles, forget after last settlement
//!                  └─► otherwise forget now
//! ```
//!
//! Cleanup only happens on settlement, which the registry reports exactly
//! once per region, so a cancelled region still gets a single cleanup when
//! the channel eventually settles its batches.

use crate::analysis::{BatchId, ParseBatch};
use crate::error::AnalysisError;
use crate::host::{RegionHost, Tint};
use crate::region::{RegionArena, RegionId, RegionPhase};
use crate::registry::{PendingRegistry, SettleProgress};
use crate::text::{Normalizer, TextBlock};
use crate::visibility::{ViewportObserver, VisibilitySensor};

/// Logging target for scheduling decisions.
const LOG_TARGET: &str = "parse_overlay::scheduler";

/// Central coordinator between visibility events and the analysis channel.
#[derive(Debug, Default)]
pub struct BatchScheduler {
    registry: PendingRegistry,
    arena: RegionArena,
    normalizer: Normalizer,
}

impl BatchScheduler {
    pub fn new(normalizer: Normalizer) -> Self {
        Self {
            registry: PendingRegistry::new(),
            arena: RegionArena::new(),
            normalizer,
        }
    }

    pub fn registry(&self) -> &PendingRegistry {
        &self.registry
    }

    pub fn arena(&self) -> &RegionArena {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut RegionArena {
        &mut self.arena
    }

    /// Build batches for regions that just entered the viewport.
    ///
    /// Returns every batch of the cycle so they can be dispatched together.
    pub fn on_entered_view<H, O>(
        &mut self,
        regions: &[RegionId],
        host: &mut H,
        sensor: &mut VisibilitySensor<O>,
    ) -> Vec<ParseBatch>
    where
        H: RegionHost,
        O: ViewportObserver,
    {
        let mut dispatch = Vec::new();

        for &region in regions {
            if self.registry.contains(region) {
                log::trace!(target: LOG_TARGET, "{} already has pending batches", region);
                continue;
            }
            if self.arena.is_retired(region) {
                continue;
            }

            let normalizer = &self.normalizer;
            let blocks = self
                .arena
                .blocks_or_build(region, || extract_blocks(region, host, normalizer));
            let batches: Vec<_> = blocks
                .iter()
                .map(|block| ParseBatch::for_block(region, block))
                .collect();

            if batches.is_empty() {
                sensor.unobserve(region);
                self.arena.retire(region);
                log::debug!(target: LOG_TARGET, "{} has no text, retired", region);
                continue;
            }

            let handles = batches
                .iter()
                .map(|(batch, cancel)| (batch.id, cancel.clone()))
                .collect();
            if let Err(err) = self.registry.register(region, handles) {
                log::warn!(target: LOG_TARGET, "Skipping {}: {}", region, err);
                continue;
            }

            host.set_tint(region, Tint::InFlight);
            log::debug!(
                target: LOG_TARGET,
                "Scheduled {} batch(es) for {}",
                batches.len(),
                region
            );
            dispatch.extend(batches.into_iter().map(|(batch, _)| batch));
        }

        dispatch
    }

    /// Cancel outstanding batches of regions that left the viewport.
    ///
    /// Returns how many of the regions had pending work.
    pub fn on_left_view<H: RegionHost>(&mut self, regions: &[RegionId], host: &mut H) -> usize {
        let mut cancelled = 0;
        for &region in regions {
            let Some(fired) = self.registry.cancel(region) else {
                continue;
            };
            host.set_tint(region, Tint::Cancelled);
            cancelled += 1;
            log::debug!(
                target: LOG_TARGET,
                "{} left view, fired {} cancel handle(s)",
                region,
                fired
            );
        }
        cancelled
    }

    /// Release a region the host removed from its tree.
    ///
    /// Pending batches are cancelled and the region is forgotten once they
    /// have all settled, so cleanup still runs exactly once.
    pub fn on_destroyed<O: ViewportObserver>(
        &mut self,
        region: RegionId,
        sensor: &mut VisibilitySensor<O>,
    ) {
        sensor.unobserve(region);
        match self.registry.cancel(region) {
            Some(fired) => {
                self.arena.destroy(region);
                log::debug!(
                    target: LOG_TARGET,
                    "{} destroyed, fired {} cancel handle(s)",
                    region,
                    fired
                );
            }
            None => {
                self.arena.remove(region);
                log::debug!(target: LOG_TARGET, "{} destroyed, forgotten", region);
            }
        }
    }

    /// Record the settlement of a batch and clean up after the last one.
    pub fn on_settled<H, O>(
        &mut self,
        region: RegionId,
        batch: BatchId,
        outcome: &Result<(), AnalysisError>,
        host: &mut H,
        sensor: &mut VisibilitySensor<O>,
    ) -> SettleProgress
    where
        H: RegionHost,
        O: ViewportObserver,
    {
        match outcome {
            Ok(()) => log::trace!(target: LOG_TARGET, "{} of {} succeeded", batch, region),
            Err(AnalysisError::Aborted) => {
                log::debug!(target: LOG_TARGET, "{} of {} aborted", batch, region)
            }
            Err(err) => log::warn!(target: LOG_TARGET, "{} of {} failed: {}", batch, region, err),
        }

        let progress = self.registry.settle(region, batch);
        if progress == SettleProgress::Complete {
            sensor.unobserve(region);
            if self.arena.phase(region) == Some(RegionPhase::Destroyed) {
                self.arena.remove(region);
                log::debug!(target: LOG_TARGET, "{} settled after destruction, forgotten", region);
            } else {
                self.arena.retire(region);
                host.set_tint(region, Tint::Neutral);
                log::debug!(target: LOG_TARGET, "{} finished, cleaned up", region);
            }
        }
        progress
    }

    /// Fire every outstanding cancel handle.
    pub fn cancel_all(&mut self) -> usize {
        self.registry.cancel_all()
    }
}

fn extract_blocks<H: RegionHost>(
    region: RegionId,
    host: &mut H,
    normalizer: &Normalizer,
) -> Vec<TextBlock> {
    let raw = host.text_blocks(region);
    raw.into_iter()
        .map(|nodes| TextBlock::from_nodes(nodes, normalizer, |node, text| host.replace_text(node, text)))
        .filter(|block| !block.is_empty())
        .collect()
}
