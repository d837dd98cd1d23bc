//! Shared test helpers for overlay integration tests.
//!
//! Note: We use `helpers/mod.rs` instead of `helpers.rs` because Cargo
//! auto-discovers top-level `.rs` files in `tests/` as integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use parse_overlay::analysis::{AnalysisChannel, BatchId, ParseBatch, Settlement};
use parse_overlay::config::OverlaySettings;
use parse_overlay::discovery::RegionDiscovery;
use parse_overlay::error::AnalysisError;
use parse_overlay::memory::{MemoryHost, MemoryViewport};
use parse_overlay::notify::CollectingNotifier;
use parse_overlay::overlay::{Overlay, OverlayHandle};
use tokio::sync::oneshot;

/// Batch received by [`ManualAnalysis`] together with its settle switch.
struct Request {
    batch: ParseBatch,
    settle: Option<oneshot::Sender<Result<(), AnalysisError>>>,
}

/// Analysis channel whose batches settle only when the test says so.
///
/// Cancellation is ignored on purpose: batches still need an explicit settle.
#[derive(Clone, Default)]
pub struct ManualAnalysis {
    requests: Arc<Mutex<Vec<Request>>>,
    calls: Arc<Mutex<usize>>,
}

impl ManualAnalysis {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every batch received so far, in submission order.
    pub fn batches(&self) -> Vec<ParseBatch> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|request| request.batch.clone())
            .collect()
    }

    /// Number of `request_parse` calls.
    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }

    /// Settle one batch. Returns false if it was unknown or already settled.
    pub fn settle(&self, batch: BatchId, outcome: Result<(), AnalysisError>) -> bool {
        let mut requests = self.requests.lock().unwrap();
        let Some(request) = requests.iter_mut().find(|request| request.batch.id == batch) else {
            return false;
        };
        match request.settle.take() {
            Some(tx) => tx.send(outcome).is_ok(),
            None => false,
        }
    }

    /// Settle every outstanding batch with success.
    pub fn settle_all_ok(&self) -> usize {
        let ids: Vec<BatchId> = self.batches().iter().map(|batch| batch.id).collect();
        ids.into_iter()
            .filter(|id| self.settle(*id, Ok(())))
            .count()
    }
}

impl AnalysisChannel for ManualAnalysis {
    fn request_parse(&mut self, batches: Vec<ParseBatch>) -> Vec<Settlement> {
        *self.calls.lock().unwrap() += 1;
        let mut requests = self.requests.lock().unwrap();
        batches
            .into_iter()
            .map(|batch| {
                let (tx, rx) = oneshot::channel();
                requests.push(Request {
                    batch,
                    settle: Some(tx),
                });
                Box::pin(async move {
                    rx.await
                        .unwrap_or_else(|_| Err(AnalysisError::rejected("settle switch dropped")))
                }) as Settlement
            })
            .collect()
    }
}

pub type TestOverlay = Overlay<MemoryHost, MemoryViewport, ManualAnalysis, CollectingNotifier>;

/// Everything a test needs to drive an overlay and inspect the outcome.
pub struct Fixture {
    pub overlay: TestOverlay,
    pub handle: OverlayHandle,
    pub host: MemoryHost,
    pub viewport: MemoryViewport,
    pub analysis: ManualAnalysis,
    pub notifier: CollectingNotifier,
}

impl Fixture {
    /// Overlay over `host` observing every region it has right now.
    pub fn with_snapshot(host: MemoryHost) -> Self {
        let discovery = RegionDiscovery::snapshot(&host).unwrap();
        let mut fixture = Self::build(host, Some(discovery));
        fixture.overlay.start(false).unwrap();
        fixture
    }

    pub fn build(host: MemoryHost, discovery: Option<RegionDiscovery>) -> Self {
        let viewport = MemoryViewport::new();
        let analysis = ManualAnalysis::new();
        let notifier = CollectingNotifier::new();
        let (overlay, handle) = Overlay::new(
            &OverlaySettings::default(),
            host.clone(),
            viewport.clone(),
            analysis.clone(),
            notifier.clone(),
            discovery,
        );
        Self {
            overlay,
            handle,
            host,
            viewport,
            analysis,
            notifier,
        }
    }

    /// Process queued events and whatever settles within `ms` of (paused) time.
    pub async fn run_for(&mut self, ms: u64) {
        self.overlay.pump();
        let until = tokio::time::Instant::now() + Duration::from_millis(ms);
        while let Ok(true) = tokio::time::timeout_at(until, self.overlay.step()).await {}
    }

    /// Process queued events and settlements that are already ready.
    pub async fn settle(&mut self) {
        self.run_for(1).await;
    }
}
