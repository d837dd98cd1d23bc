//! Region discovery adapters.
//!
//! Two interchangeable strategies feed regions to the visibility sensor:
//!
//! - Snapshot: enumerate the regions present when the overlay starts
//! - Continuous: inspect nodes added to the render tree and report those
//!   matching a shape predicate

use serde::{Deserialize, Serialize};

use crate::error::OverlayResult;
use crate::host::RegionHost;
use crate::region::RegionId;

/// Node added to the render tree, as reported by the host's mutation feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddedNode {
    pub region: RegionId,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub children: Vec<AddedNode>,
}

impl AddedNode {
    pub fn new(region: RegionId, classes: &[&str]) -> Self {
        Self {
            region,
            classes: classes.iter().map(|class| class.to_string()).collect(),
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<AddedNode>) -> Self {
        self.children = children;
        self
    }
}

/// Which added nodes count as regions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapePredicate {
    class: String,
}

impl ShapePredicate {
    pub fn has_class(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
        }
    }

    pub fn matches(&self, node: &AddedNode) -> bool {
        node.classes.iter().any(|class| *class == self.class)
    }

    /// Matching nodes in `node`'s subtree, in document order.
    fn collect(&self, node: &AddedNode, found: &mut Vec<RegionId>) {
        if self.matches(node) && !found.contains(&node.region) {
            found.push(node.region);
        }
        for child in &node.children {
            self.collect(child, found);
        }
    }
}

/// Discovery strategy of an overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionDiscovery {
    /// Regions present at start, handed out once
    Snapshot(Vec<RegionId>),
    /// Newly created regions matching a shape predicate
    Continuous(ShapePredicate),
}

impl RegionDiscovery {
    /// Enumerate the host's current regions.
    pub fn snapshot(host: &impl RegionHost) -> OverlayResult<Self> {
        Ok(RegionDiscovery::Snapshot(host.enumerate_regions()?))
    }

    pub fn continuous(predicate: ShapePredicate) -> Self {
        RegionDiscovery::Continuous(predicate)
    }

    /// Regions to observe right away. A snapshot is handed out only once.
    pub fn take_initial(&mut self) -> Vec<RegionId> {
        match self {
            RegionDiscovery::Snapshot(regions) => std::mem::take(regions),
            RegionDiscovery::Continuous(_) => Vec::new(),
        }
    }

    /// Regions among freshly added nodes. Snapshots ignore mutations.
    pub fn on_mutation(&self, added: &[AddedNode]) -> Vec<RegionId> {
        match self {
            RegionDiscovery::Snapshot(_) => Vec::new(),
            RegionDiscovery::Continuous(predicate) => {
                let mut found = Vec::new();
                for node in added {
                    predicate.collect(node, &mut found);
                }
                found
            }
        }
    }
}
