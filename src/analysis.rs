//! Parse batches and the analysis channel they are sent through.
//!
//! The channel itself is external: it receives a list of batches and hands
//! back one awaitable settlement per batch, in the same order. Each batch
//! carries a cancellation token; cancelling it is advisory and the channel is
//! still expected to settle the batch afterwards.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use ulid::Ulid;

use crate::error::AnalysisError;
use crate::region::RegionId;
use crate::text::{Fragment, TextBlock};

/// Logging target for the bundled channel.
const LOG_TARGET: &str = "parse_overlay::analysis";

/// Opaque dispatch handle of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchId(Ulid);

impl BatchId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "batch-{}", self.0)
    }
}

/// Scheduler-side cancellation handle of a batch.
///
/// Firing is idempotent from the channel's point of view, and [`fire`]
/// reports whether this particular call was the one that cancelled.
///
/// [`fire`]: CancelHandle::fire
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the batch. Returns `false` if it was already cancelled.
    pub fn fire(&self) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        self.token.cancel();
        true
    }

    pub fn is_fired(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Token handed to the analysis channel.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

/// Unit of work dispatched to the analysis channel.
#[derive(Debug, Clone)]
pub struct ParseBatch {
    pub id: BatchId,
    pub region: RegionId,
    pub fragments: Vec<Fragment>,
    pub text: String,
    pub abort: CancellationToken,
}

impl ParseBatch {
    /// Batch covering one text block; returns the scheduler's cancel handle too.
    pub fn for_block(region: RegionId, block: &TextBlock) -> (Self, CancelHandle) {
        let cancel = CancelHandle::new();
        let batch = Self {
            id: BatchId::new(),
            region,
            fragments: block.fragments().to_vec(),
            text: block.text().to_string(),
            abort: cancel.token(),
        };
        (batch, cancel)
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.is_cancelled()
    }
}

/// Awaitable settlement of one batch.
pub type Settlement = Pin<Box<dyn Future<Output = Result<(), AnalysisError>> + Send + 'static>>;

/// Asynchronous linguistic analysis service.
///
/// Fragment offsets in a batch are UTF-16 code units into `text`.
pub trait AnalysisChannel {
    /// Submit batches together; returns one settlement per batch, in order.
    fn request_parse(&mut self, batches: Vec<ParseBatch>) -> Vec<Settlement>;
}

/// Channel that settles every batch after a fixed latency.
///
/// A cancelled batch settles early with [`AnalysisError::Aborted`]. Used by
/// the replay tool and as a reference for channel implementations.
#[derive(Debug, Clone)]
pub struct DelayedAnalysis {
    latency: Duration,
}

impl DelayedAnalysis {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

impl AnalysisChannel for DelayedAnalysis {
    fn request_parse(&mut self, batches: Vec<ParseBatch>) -> Vec<Settlement> {
        log::debug!(
            target: LOG_TARGET,
            "Received {} batch(es), settling after {:?}",
            batches.len(),
            self.latency
        );

        batches
            .into_iter()
            .map(|batch| {
                let latency = self.latency;
                Box::pin(async move {
                    tokio::select! {
                        _ = batch.abort.cancelled() => Err(AnalysisError::Aborted),
                        _ = tokio::time::sleep(latency) => {
                            log::trace!(
                                target: LOG_TARGET,
                                "{} analysed {} fragment(s) of {}",
                                batch.id,
                                batch.fragments.len(),
                                batch.region
                            );
                            Ok(())
                        }
                    }
                }) as Settlement
            })
            .collect()
    }
}
