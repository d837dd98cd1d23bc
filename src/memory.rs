//! In-memory host adapter.
//!
//! A render tree made of plain maps, shared behind `Arc<Mutex<_>>` so a test
//! or the replay driver can keep a handle while the overlay owns another.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{LockResultExt, OverlayError, OverlayResult};
use crate::host::{PanelHost, PanelProbe, RegionHost, Tint};
use crate::region::{NodeId, RegionId};
use crate::text::TextNode;
use crate::visibility::ViewportObserver;

/// Page currently shown in the reader panel.
#[derive(Debug, Clone)]
struct PanelPage {
    source: RegionId,
    fingerprint: String,
}

#[derive(Debug, Default)]
struct PanelState {
    /// Panel element exists
    anchored: bool,
    page: Option<PanelPage>,
    clone: Option<RegionId>,
}

#[derive(Debug, Default)]
struct MemoryDom {
    regions: BTreeMap<RegionId, Vec<Vec<NodeId>>>,
    nodes: HashMap<NodeId, TextNode>,
    tints: Vec<(RegionId, Tint)>,
    panel: PanelState,
    enumeration_error: Option<String>,
    next_node: u64,
    /// Highest region id ever issued or inserted
    last_region: u64,
}

impl MemoryDom {
    fn allocate_node(&mut self) -> NodeId {
        self.next_node += 1;
        NodeId(self.next_node)
    }

    fn insert_region(&mut self, region: RegionId, blocks: Vec<Vec<TextNode>>) {
        let blocks = blocks
            .into_iter()
            .map(|block| {
                block
                    .into_iter()
                    .map(|node| {
                        self.next_node = self.next_node.max(node.node.0);
                        let id = node.node;
                        self.nodes.insert(id, node);
                        id
                    })
                    .collect()
            })
            .collect();
        self.last_region = self.last_region.max(region.0);
        self.regions.insert(region, blocks);
    }

    fn remove_region(&mut self, region: RegionId) {
        if let Some(blocks) = self.regions.remove(&region) {
            for node in blocks.into_iter().flatten() {
                self.nodes.remove(&node);
            }
        }
    }

    /// Fresh region id; ids of removed regions are never handed out again.
    fn allocate_region(&mut self) -> RegionId {
        self.last_region += 1;
        RegionId(self.last_region)
    }
}

/// Render tree held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryHost {
    dom: Arc<Mutex<MemoryDom>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn dom(&self) -> OverlayResult<MutexGuard<'_, MemoryDom>> {
        self.dom.lock().recover_poison("MemoryHost::dom")
    }

    /// Add a region whose blocks hold the given texts; node ids are allocated.
    pub fn add_region(&self, region: RegionId, blocks: &[&[&str]]) {
        let Ok(mut dom) = self.dom() else {
            return;
        };
        let blocks = blocks
            .iter()
            .map(|block| {
                block
                    .iter()
                    .map(|text| TextNode::new(dom.allocate_node(), *text))
                    .collect()
            })
            .collect();
        dom.insert_region(region, blocks);
    }

    /// Add a region from fully specified nodes.
    pub fn add_region_nodes(&self, region: RegionId, blocks: Vec<Vec<TextNode>>) {
        if let Ok(mut dom) = self.dom() {
            dom.insert_region(region, blocks);
        }
    }

    /// Make the next enumeration fail.
    pub fn fail_enumeration(&self, message: impl Into<String>) {
        if let Ok(mut dom) = self.dom() {
            dom.enumeration_error = Some(message.into());
        }
    }

    /// Render a page into the reader panel.
    pub fn show_page(&self, source: RegionId, fingerprint: &str, blocks: &[&[&str]]) {
        self.add_region(source, blocks);
        self.point_panel_at(source, fingerprint);
    }

    /// Render an already added region into the reader panel.
    pub fn point_panel_at(&self, source: RegionId, fingerprint: &str) {
        if let Ok(mut dom) = self.dom() {
            dom.panel.anchored = true;
            dom.panel.page = Some(PanelPage {
                source,
                fingerprint: fingerprint.to_string(),
            });
        }
    }

    /// Panel element present but its pages not rendered yet.
    pub fn show_empty_panel(&self) {
        if let Ok(mut dom) = self.dom() {
            dom.panel.anchored = true;
            dom.panel.page = None;
        }
    }

    /// Tear the panel element down.
    pub fn hide_panel(&self) {
        if let Ok(mut dom) = self.dom() {
            dom.panel.anchored = false;
            dom.panel.page = None;
        }
    }

    /// Region of the currently installed panel clone.
    pub fn panel_clone(&self) -> Option<RegionId> {
        self.dom().ok().and_then(|dom| dom.panel.clone)
    }

    /// Every region present, in id order.
    pub fn regions(&self) -> Vec<RegionId> {
        self.dom()
            .map(|dom| dom.regions.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn has_region(&self, region: RegionId) -> bool {
        self.dom()
            .map(|dom| dom.regions.contains_key(&region))
            .unwrap_or(false)
    }

    /// Current text of every node of a region, block by block.
    pub fn region_text(&self, region: RegionId) -> Vec<Vec<String>> {
        let Ok(dom) = self.dom() else {
            return Vec::new();
        };
        dom.regions
            .get(&region)
            .map(|blocks| {
                blocks
                    .iter()
                    .map(|block| {
                        block
                            .iter()
                            .filter_map(|node| dom.nodes.get(node))
                            .map(|node| node.text.clone())
                            .collect()
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every tint applied to `region`, oldest first.
    pub fn tints(&self, region: RegionId) -> Vec<Tint> {
        self.dom()
            .map(|dom| {
                dom.tints
                    .iter()
                    .filter(|(r, _)| *r == region)
                    .map(|(_, tint)| *tint)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn last_tint(&self, region: RegionId) -> Option<Tint> {
        self.tints(region).last().copied()
    }

    /// Every tint change in application order.
    pub fn tint_history(&self) -> Vec<(RegionId, Tint)> {
        self.dom().map(|dom| dom.tints.clone()).unwrap_or_default()
    }
}

impl RegionHost for MemoryHost {
    fn enumerate_regions(&self) -> OverlayResult<Vec<RegionId>> {
        let dom = self.dom()?;
        if let Some(message) = &dom.enumeration_error {
            return Err(OverlayError::host(message.clone()));
        }
        Ok(dom.regions.keys().copied().collect())
    }

    fn text_blocks(&self, region: RegionId) -> Vec<Vec<TextNode>> {
        let Ok(dom) = self.dom() else {
            return Vec::new();
        };
        dom.regions
            .get(&region)
            .map(|blocks| {
                blocks
                    .iter()
                    .map(|block| {
                        block
                            .iter()
                            .filter_map(|node| dom.nodes.get(node).cloned())
                            .collect()
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn replace_text(&mut self, node: NodeId, text: &str) {
        if let Ok(mut dom) = self.dom() {
            if let Some(entry) = dom.nodes.get_mut(&node) {
                entry.text = text.to_string();
            }
        }
    }

    fn set_tint(&mut self, region: RegionId, tint: Tint) {
        if let Ok(mut dom) = self.dom() {
            dom.tints.push((region, tint));
        }
    }
}

impl PanelHost for MemoryHost {
    fn probe_panel(&self) -> PanelProbe {
        let Ok(dom) = self.dom() else {
            return PanelProbe::AnchorMissing;
        };
        if !dom.panel.anchored {
            return PanelProbe::AnchorMissing;
        }
        match &dom.panel.page {
            Some(page) => PanelProbe::Ready {
                fingerprint: page.fingerprint.clone(),
            },
            None => PanelProbe::ChildrenMissing,
        }
    }

    fn remove_panel_clone(&mut self) -> Option<RegionId> {
        let mut dom = self.dom().ok()?;
        let clone = dom.panel.clone.take()?;
        dom.remove_region(clone);
        Some(clone)
    }

    fn install_panel_clone(&mut self) -> OverlayResult<RegionId> {
        let mut dom = self.dom()?;
        let source = dom
            .panel
            .page
            .as_ref()
            .map(|page| page.source)
            .ok_or_else(|| OverlayError::host("reader panel has no page to clone"))?;
        let original = dom
            .regions
            .get(&source)
            .cloned()
            .ok_or_else(|| OverlayError::host(format!("panel source {} is gone", source)))?;

        let copied: Vec<Vec<TextNode>> = original
            .iter()
            .map(|block| {
                block
                    .iter()
                    .filter_map(|node| dom.nodes.get(node).cloned())
                    .collect()
            })
            .collect();
        let blocks = copied
            .into_iter()
            .map(|block| {
                block
                    .into_iter()
                    .map(|node| TextNode {
                        node: dom.allocate_node(),
                        ..node
                    })
                    .collect()
            })
            .collect();

        if let Some(previous) = dom.panel.clone.take() {
            dom.remove_region(previous);
        }
        let clone = dom.allocate_region();
        dom.insert_region(clone, blocks);
        dom.panel.clone = Some(clone);
        Ok(clone)
    }
}

/// Viewport primitive that records which regions are observed.
#[derive(Debug, Clone, Default)]
pub struct MemoryViewport {
    observed: Arc<Mutex<Vec<RegionId>>>,
}

impl MemoryViewport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Regions currently observed, in observation order.
    pub fn observed(&self) -> Vec<RegionId> {
        self.observed
            .lock()
            .recover_poison("MemoryViewport::observed")
            .map(|observed| observed.clone())
            .unwrap_or_default()
    }
}

impl ViewportObserver for MemoryViewport {
    fn observe(&mut self, region: RegionId) {
        if let Ok(mut observed) = self.observed.lock().recover_poison("MemoryViewport::observe") {
            if !observed.contains(&region) {
                observed.push(region);
            }
        }
    }

    fn unobserve(&mut self, region: RegionId) {
        if let Ok(mut observed) = self
            .observed
            .lock()
            .recover_poison("MemoryViewport::unobserve")
        {
            observed.retain(|r| *r != region);
        }
    }
}
