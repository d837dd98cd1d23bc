//! Single-writer event loop tying the overlay together.
//!
//! # Architecture
//!
//! ```text
//!  OverlayHandle ──► event queue ─┐
//!                                 │
//!  analysis settlements (JoinSet) ┼──► Overlay::step ──► BatchScheduler ↔ PendingRegistry
//!                                 │                  ──► ReadinessDetector
//!  readiness retry deadline ──────┘                  ──► VisibilitySensor
//! ```
//!
//! All state (registry, arena, sensor, detector) is owned by [`Overlay`] and
//! only mutated from [`Overlay::step`], so callbacks from the three sources
//! are serialized no matter how the host orders them.

pub mod bootstrap;
pub mod handle;

pub use bootstrap::launch;
pub use handle::{OverlayEvent, OverlayHandle};

use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio::task::{self, JoinError, JoinSet};
use tokio::time::{Instant, sleep_until};

use crate::analysis::{AnalysisChannel, BatchId, ParseBatch, Settlement};
use crate::config::OverlaySettings;
use crate::discovery::RegionDiscovery;
use crate::error::{AnalysisError, OverlayError, OverlayResult};
use crate::host::{PanelHost, RegionHost};
use crate::notify::Notifier;
use crate::readiness::{NavigationSignal, ReadinessDetector, ReadinessStep};
use crate::region::RegionId;
use crate::registry::SettleProgress;
use crate::scheduler::BatchScheduler;
use crate::visibility::{ViewportObserver, VisibilitySensor};

/// Logging target for the event loop.
const LOG_TARGET: &str = "parse_overlay::overlay";

/// Settlement of one batch, routed back to its region.
#[derive(Debug)]
struct SettledBatch {
    region: RegionId,
    batch: BatchId,
    outcome: Result<(), AnalysisError>,
}

type Joined = Result<(task::Id, Result<(), AnalysisError>), JoinError>;

/// What woke the loop up.
enum Wake {
    Event(Option<OverlayEvent>),
    Settled(Joined),
    RetryDue,
}

/// The overlay pipeline for one page load.
pub struct Overlay<H, O, A, N> {
    host: H,
    sensor: VisibilitySensor<O>,
    analysis: A,
    notifier: N,
    scheduler: BatchScheduler,
    detector: ReadinessDetector,
    discovery: Option<RegionDiscovery>,
    events: mpsc::UnboundedReceiver<OverlayEvent>,
    /// One task per dispatched batch; a panicking settlement panics its task
    inflight: JoinSet<Result<(), AnalysisError>>,
    /// Region and batch of every task in `inflight`
    routes: HashMap<task::Id, (RegionId, BatchId)>,
    /// Event queue still open (no shutdown, at least one handle alive)
    accepting: bool,
}

impl<H, O, A, N> Overlay<H, O, A, N>
where
    H: RegionHost + PanelHost,
    O: ViewportObserver,
    A: AnalysisChannel,
    N: Notifier,
{
    pub fn new(
        settings: &OverlaySettings,
        host: H,
        observer: O,
        analysis: A,
        notifier: N,
        discovery: Option<RegionDiscovery>,
    ) -> (Self, OverlayHandle) {
        let (tx, events) = mpsc::unbounded_channel();
        let overlay = Self {
            host,
            sensor: VisibilitySensor::new(observer),
            analysis,
            notifier,
            scheduler: BatchScheduler::new(settings.normalizer()),
            detector: ReadinessDetector::new(&settings.readiness),
            discovery,
            events,
            inflight: JoinSet::new(),
            routes: HashMap::new(),
            accepting: true,
        };
        (overlay, OverlayHandle::new(tx))
    }

    /// Observe the discovery snapshot and, for rebuilding readers, run the
    /// initial readiness probe.
    ///
    /// Errors here are setup failures; the caller decides what to do with them.
    pub fn start(&mut self, probe_reader: bool) -> OverlayResult<()> {
        let initial = self
            .discovery
            .as_mut()
            .map(RegionDiscovery::take_initial)
            .unwrap_or_default();
        log::debug!(target: LOG_TARGET, "Starting with {} region(s)", initial.len());
        for region in initial {
            self.observe(region);
        }

        if probe_reader {
            let step = self
                .detector
                .on_signal(NavigationSignal::initial(), &mut self.host);
            self.release_discarded();
            self.apply_readiness(Ok(step?));
        }
        Ok(())
    }

    /// Run until shutdown (or until every handle is dropped) and all
    /// outstanding work has settled.
    pub async fn run(mut self) -> Self {
        while self.step().await {}
        log::debug!(target: LOG_TARGET, "Overlay loop finished");
        self
    }

    /// Wait for the next input from any source and process it.
    ///
    /// Returns `false` when there is nothing left that could ever wake the loop.
    pub async fn step(&mut self) -> bool {
        let deadline = self.detector.deadline();
        let wake = tokio::select! {
            biased;
            event = self.events.recv(), if self.accepting => Wake::Event(event),
            Some(joined) = self.inflight.join_next_with_id(), if !self.inflight.is_empty() => {
                Wake::Settled(joined)
            }
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                Wake::RetryDue
            }
            else => return false,
        };

        match wake {
            Wake::Event(Some(event)) => self.handle(event),
            Wake::Event(None) => {
                log::debug!(target: LOG_TARGET, "All handles dropped");
                self.accepting = false;
            }
            Wake::Settled(joined) => self.on_joined(joined),
            Wake::RetryDue => {
                let step = self.detector.on_timer(&mut self.host);
                self.apply_readiness(step);
            }
        }
        true
    }

    /// Process every event already queued, without waiting.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while self.accepting {
            match self.events.try_recv() {
                Ok(event) => {
                    self.handle(event);
                    handled += 1;
                }
                Err(_) => break,
            }
        }
        handled
    }

    /// Process one event.
    pub fn handle(&mut self, event: OverlayEvent) {
        match event {
            OverlayEvent::Intersections(entries) => {
                let change = self.sensor.notify(&entries);
                if !change.entered.is_empty() {
                    let batches = self.scheduler.on_entered_view(
                        &change.entered,
                        &mut self.host,
                        &mut self.sensor,
                    );
                    self.dispatch(batches);
                }
                if !change.left.is_empty() {
                    self.scheduler.on_left_view(&change.left, &mut self.host);
                }
            }
            OverlayEvent::Mutations(added) => {
                let found = self
                    .discovery
                    .as_ref()
                    .map(|discovery| discovery.on_mutation(&added))
                    .unwrap_or_default();
                for region in found {
                    self.observe(region);
                }
            }
            OverlayEvent::Observe(regions) => {
                for region in regions {
                    self.observe(region);
                }
            }
            OverlayEvent::Navigation(signal) => {
                let step = self.detector.on_signal(signal, &mut self.host);
                self.release_discarded();
                self.apply_readiness(step);
            }
            OverlayEvent::Shutdown => self.shutdown(),
        }
    }

    /// Register a region with the sensor unless it is already tracked or retired.
    pub fn observe(&mut self, region: RegionId) -> bool {
        if !self.scheduler.arena_mut().observe(region) {
            log::trace!(target: LOG_TARGET, "{} already known, not observing again", region);
            return false;
        }
        self.sensor.observe(region)
    }

    fn shutdown(&mut self) {
        let fired = self.scheduler.cancel_all();
        self.accepting = false;
        self.events.close();
        log::debug!(
            target: LOG_TARGET,
            "Shutting down, cancelled {} batch(es)",
            fired
        );
    }

    fn dispatch(&mut self, batches: Vec<ParseBatch>) {
        if batches.is_empty() {
            return;
        }

        let routes: Vec<(RegionId, BatchId)> = batches
            .iter()
            .map(|batch| (batch.region, batch.id))
            .collect();
        let settlements = self.analysis.request_parse(batches);
        if settlements.len() != routes.len() {
            log::warn!(
                target: LOG_TARGET,
                "Analysis channel returned {} settlement(s) for {} batch(es)",
                settlements.len(),
                routes.len()
            );
        }

        let mut settlements = settlements.into_iter();
        for (region, batch) in routes {
            let settlement = settlements.next().unwrap_or_else(|| {
                Box::pin(async { Err::<(), _>(AnalysisError::rejected("no settlement returned")) })
                    as Settlement
            });
            let task = self.inflight.spawn(settlement);
            self.routes.insert(task.id(), (region, batch));
        }
    }

    /// Turn a finished settlement task back into the settlement of its batch.
    fn on_joined(&mut self, joined: Joined) {
        let (id, outcome) = match joined {
            Ok((id, outcome)) => (id, outcome),
            Err(err) if err.is_panic() => (
                err.id(),
                Err(AnalysisError::fatal(format!("settlement panicked: {}", err))),
            ),
            Err(err) => (err.id(), Err(AnalysisError::Aborted)),
        };
        let Some((region, batch)) = self.routes.remove(&id) else {
            log::warn!(target: LOG_TARGET, "Settlement task {} has no route", id);
            return;
        };
        self.on_settled(SettledBatch {
            region,
            batch,
            outcome,
        });
    }

    /// Release the reader clone destroyed by the last navigation signal.
    fn release_discarded(&mut self) {
        if let Some(region) = self.detector.take_discarded() {
            self.scheduler.on_destroyed(region, &mut self.sensor);
        }
    }

    fn on_settled(&mut self, settled: SettledBatch) {
        let SettledBatch {
            region,
            batch,
            outcome,
        } = settled;

        let progress = self.scheduler.on_settled(
            region,
            batch,
            &outcome,
            &mut self.host,
            &mut self.sensor,
        );
        if progress == SettleProgress::Unknown {
            log::debug!(target: LOG_TARGET, "Ignored settlement of unknown {}", batch);
        }

        if let Err(err) = outcome {
            if err.is_fatal() {
                self.notifier.notify(&OverlayError::Analysis(err));
            }
        }
    }

    fn apply_readiness(&mut self, step: OverlayResult<ReadinessStep>) {
        match step {
            Ok(ReadinessStep::Settled(region)) => {
                self.observe(region);
            }
            Ok(ReadinessStep::GaveUp(reason)) => {
                self.notifier.notify(&OverlayError::Readiness(reason));
            }
            Ok(ReadinessStep::Retry { .. } | ReadinessStep::Coalesced | ReadinessStep::Idle) => {}
            Err(err) => self.notifier.notify(&err),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn sensor(&self) -> &VisibilitySensor<O> {
        &self.sensor
    }

    pub fn scheduler(&self) -> &BatchScheduler {
        &self.scheduler
    }

    pub fn detector(&self) -> &ReadinessDetector {
        &self.detector
    }

    pub fn analysis(&self) -> &A {
        &self.analysis
    }

    /// Regions with batches in flight, in id order.
    pub fn pending_regions(&self) -> Vec<RegionId> {
        self.scheduler.registry().regions()
    }

    /// Number of settlements not yet processed.
    pub fn inflight_count(&self) -> usize {
        self.inflight.len()
    }
}
