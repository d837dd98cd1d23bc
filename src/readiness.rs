//! Render readiness detection for readers that rebuild their tree.
//!
//! A navigation signal only says the reader is about to replace its panel.
//! The detector polls the panel until the new content is actually rendered
//! (panel and pages present, fingerprint different from the last accepted
//! page), then installs a stable clone for the overlay to instrument.
//!
//! # State machine
//!
//! ```text
//!            signal                success
//!   Idle ─────────────► Polling ─────────────► Settled
//!                        │  ▲                     │
//!           failure,     │  │ timer               │ signal
//!           retries left └──┘                     ▼
//!                        │                     Polling
//!           failure,     │
//!           ceiling hit  ▼
//!                      GivenUp ──signal──► Polling
//! ```
//!
//! The retry counter, the fingerprint snapshot, and the single timer deadline
//! all live in the detector; the overlay loop sleeps until [`deadline`] and
//! then calls [`on_timer`]. An accepted signal destroys the previous clone;
//! the overlay collects it with [`take_discarded`] to release its state.
//!
//! [`deadline`]: ReadinessDetector::deadline
//! [`on_timer`]: ReadinessDetector::on_timer
//! [`take_discarded`]: ReadinessDetector::take_discarded

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::config::ReadinessSettings;
use crate::error::{OverlayResult, ReadinessFailure};
use crate::host::{PanelHost, PanelProbe};
use crate::region::RegionId;

/// Logging target for readiness detection.
const LOG_TARGET: &str = "parse_overlay::readiness";

/// Kind of navigation signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationKind {
    /// Synthetic probe issued when the overlay starts
    Initial,
    /// The reader turned the page
    PageChange,
    /// The reader was closed
    ReaderClosed,
}

/// "The render tree is about to be replaced."
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationSignal {
    pub kind: NavigationKind,
    /// Host event timestamp; signals sharing a timestamp are duplicates
    #[serde(default)]
    pub timestamp: Option<u64>,
}

impl NavigationSignal {
    pub fn initial() -> Self {
        Self {
            kind: NavigationKind::Initial,
            timestamp: None,
        }
    }

    pub fn page_change(timestamp: u64) -> Self {
        Self {
            kind: NavigationKind::PageChange,
            timestamp: Some(timestamp),
        }
    }

    pub fn reader_closed(timestamp: u64) -> Self {
        Self {
            kind: NavigationKind::ReaderClosed,
            timestamp: Some(timestamp),
        }
    }
}

/// State of the readiness detector.
///
/// - Idle: no signal seen yet
/// - Polling: waiting for new content, `retries` retries used so far
/// - Settled: new content accepted and handed to the sensor
/// - GivenUp: retry ceiling reached for the current signal
///
/// Transitions:
/// - Idle/Settled/GivenUp -> Polling (on an accepted signal)
/// - Polling -> Polling (failed probe, retries left)
/// - Polling -> Settled (probe accepted)
/// - Polling -> GivenUp (failed probe, ceiling reached)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessState {
    Idle,
    Polling { retries: u32 },
    Settled,
    GivenUp,
}

/// What the overlay should do after feeding the detector an input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessStep {
    /// Duplicate signal dropped; nothing changed
    Coalesced,
    /// Probe failed; the timer is armed for another attempt
    Retry {
        reason: ReadinessFailure,
        attempt: u32,
        after: Duration,
    },
    /// New content installed; observe this region
    Settled(RegionId),
    /// Ceiling reached; no more retries for this signal
    GaveUp(ReadinessFailure),
    /// Nothing to do (timer fired outside of polling)
    Idle,
}

/// Bounded-retry readiness state machine.
#[derive(Debug)]
pub struct ReadinessDetector {
    state: ReadinessState,
    retry_delay: Duration,
    max_retry_count: u32,
    last_signal_timestamp: Option<u64>,
    /// Fingerprint of the last settled content
    last_fingerprint: Option<String>,
    deadline: Option<Instant>,
    /// Clone destroyed by the last accepted signal, not yet collected
    discarded: Option<RegionId>,
}

impl ReadinessDetector {
    pub fn new(settings: &ReadinessSettings) -> Self {
        Self {
            state: ReadinessState::Idle,
            retry_delay: settings.retry_delay(),
            max_retry_count: settings.max_retry_count,
            last_signal_timestamp: None,
            last_fingerprint: None,
            deadline: None,
            discarded: None,
        }
    }

    pub fn state(&self) -> ReadinessState {
        self.state
    }

    /// When the retry timer is due, if armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn last_fingerprint(&self) -> Option<&str> {
        self.last_fingerprint.as_deref()
    }

    /// Clone removed by the last accepted signal, handed out once.
    pub fn take_discarded(&mut self) -> Option<RegionId> {
        self.discarded.take()
    }

    /// Handle a navigation signal and probe immediately.
    pub fn on_signal(
        &mut self,
        signal: NavigationSignal,
        host: &mut impl PanelHost,
    ) -> OverlayResult<ReadinessStep> {
        if let Some(timestamp) = signal.timestamp {
            if self.last_signal_timestamp == Some(timestamp) {
                log::debug!(
                    target: LOG_TARGET,
                    "Coalesced duplicate {:?} signal at {}",
                    signal.kind,
                    timestamp
                );
                return Ok(ReadinessStep::Coalesced);
            }
            self.last_signal_timestamp = Some(timestamp);
        }

        if let Some(removed) = host.remove_panel_clone() {
            log::debug!(target: LOG_TARGET, "Removed previous clone {}", removed);
            self.discarded = Some(removed);
        }
        self.state = ReadinessState::Polling { retries: 0 };
        self.deadline = None;
        log::debug!(target: LOG_TARGET, "{:?} signal, polling for new content", signal.kind);

        self.poll(host)
    }

    /// Handle expiry of the retry timer.
    pub fn on_timer(&mut self, host: &mut impl PanelHost) -> OverlayResult<ReadinessStep> {
        self.deadline = None;
        match self.state {
            ReadinessState::Polling { .. } => self.poll(host),
            _ => Ok(ReadinessStep::Idle),
        }
    }

    fn poll(&mut self, host: &mut impl PanelHost) -> OverlayResult<ReadinessStep> {
        let fingerprint = match host.probe_panel() {
            PanelProbe::AnchorMissing => return Ok(self.fail(ReadinessFailure::AnchorMissing)),
            PanelProbe::ChildrenMissing => {
                return Ok(self.fail(ReadinessFailure::ChildrenMissing));
            }
            PanelProbe::Ready { fingerprint } => fingerprint,
        };

        if self.last_fingerprint.as_deref() == Some(fingerprint.as_str()) {
            return Ok(self.fail(ReadinessFailure::FingerprintUnchanged));
        }

        let clone = match host.install_panel_clone() {
            Ok(clone) => clone,
            Err(err) => {
                self.state = ReadinessState::GivenUp;
                return Err(err);
            }
        };

        self.last_fingerprint = Some(fingerprint);
        self.state = ReadinessState::Settled;
        log::debug!(target: LOG_TARGET, "Content ready, installed {}", clone);
        Ok(ReadinessStep::Settled(clone))
    }

    fn fail(&mut self, reason: ReadinessFailure) -> ReadinessStep {
        let retries = match self.state {
            ReadinessState::Polling { retries } => retries,
            _ => 0,
        };

        if retries >= self.max_retry_count {
            self.state = ReadinessState::GivenUp;
            log::warn!(
                target: LOG_TARGET,
                "Giving up after {} retries: {}",
                retries,
                reason
            );
            return ReadinessStep::GaveUp(reason);
        }

        let attempt = retries + 1;
        self.state = ReadinessState::Polling { retries: attempt };
        self.deadline = Some(Instant::now() + self.retry_delay);
        log::trace!(
            target: LOG_TARGET,
            "{}; retry {}/{} in {:?}",
            reason,
            attempt,
            self.max_retry_count,
            self.retry_delay
        );
        ReadinessStep::Retry {
            reason,
            attempt,
            after: self.retry_delay,
        }
    }
}
