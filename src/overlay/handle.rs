//! Cloneable entry point for host callbacks.

use tokio::sync::mpsc;

use crate::discovery::AddedNode;
use crate::readiness::NavigationSignal;
use crate::region::RegionId;
use crate::visibility::IntersectionEntry;

/// Input to the overlay event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayEvent {
    /// Raw entries of one viewport notification cycle
    Intersections(Vec<IntersectionEntry>),
    /// Nodes added to the render tree
    Mutations(Vec<AddedNode>),
    /// Regions to observe directly
    Observe(Vec<RegionId>),
    /// The reader is about to replace its render tree
    Navigation(NavigationSignal),
    /// Cancel outstanding work and stop once it has settled
    Shutdown,
}

/// Sender side of the overlay event queue.
///
/// Every method returns `false` once the overlay loop has stopped.
#[derive(Debug, Clone)]
pub struct OverlayHandle {
    tx: mpsc::UnboundedSender<OverlayEvent>,
}

impl OverlayHandle {
    pub(crate) fn new(tx: mpsc::UnboundedSender<OverlayEvent>) -> Self {
        Self { tx }
    }

    pub fn send(&self, event: OverlayEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn report_intersections(&self, entries: Vec<IntersectionEntry>) -> bool {
        self.send(OverlayEvent::Intersections(entries))
    }

    pub fn report_mutations(&self, added: Vec<AddedNode>) -> bool {
        self.send(OverlayEvent::Mutations(added))
    }

    pub fn observe(&self, regions: Vec<RegionId>) -> bool {
        self.send(OverlayEvent::Observe(regions))
    }

    pub fn navigate(&self, signal: NavigationSignal) -> bool {
        self.send(OverlayEvent::Navigation(signal))
    }

    pub fn shutdown(&self) -> bool {
        self.send(OverlayEvent::Shutdown)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
