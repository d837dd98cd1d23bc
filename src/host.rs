//! Host adapter seams and host detection.
//!
//! The overlay never touches a render tree directly. Everything it needs
//! from the page goes through the traits in this module:
//!
//! - [`RegionHost`]: enumerate regions, read their text, write normalized text
//!   back, and tint them
//! - [`PanelHost`]: the reader panel that is rebuilt on every navigation
//!
//! [`HostProfile`] recognises which kind of reader page the overlay runs on.

use serde::{Deserialize, Serialize};

use crate::error::OverlayResult;
use crate::region::{NodeId, RegionId};
use crate::text::TextNode;

/// Class name of OCR containers inserted by the userscript variant.
pub const OCR_CONTAINER_CLASS: &str = "ocr-text-container";

/// Cosmetic per-region marker. Never read back for control decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tint {
    Neutral,
    InFlight,
    Cancelled,
}

/// Render tree access for text extraction and visual feedback.
pub trait RegionHost {
    /// Regions present right now, for one-time enumeration.
    fn enumerate_regions(&self) -> OverlayResult<Vec<RegionId>>;

    /// Raw text of a region, one inner list per text block.
    ///
    /// A region the host no longer has yields no blocks.
    fn text_blocks(&self, region: RegionId) -> Vec<Vec<TextNode>>;

    /// Store normalized text into a node.
    fn replace_text(&mut self, node: NodeId, text: &str);

    fn set_tint(&mut self, region: RegionId, tint: Tint);
}

/// Result of inspecting the reader panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelProbe {
    /// The panel element does not exist (yet)
    AnchorMissing,
    /// The panel exists but its page children are not rendered
    ChildrenMissing,
    /// Panel and pages exist; `fingerprint` identifies the displayed content
    Ready { fingerprint: String },
}

/// Reader panel of hosts that replace their render tree on navigation.
pub trait PanelHost {
    fn probe_panel(&self) -> PanelProbe;

    /// Remove the clone installed by a previous cycle. Idempotent.
    ///
    /// Returns the region that was destroyed, if there was one.
    fn remove_panel_clone(&mut self) -> Option<RegionId>;

    /// Clone the panel subtree under a distinct identity, hide the original,
    /// and show the clone in its place.
    fn install_panel_clone(&mut self) -> OverlayResult<RegionId>;
}

/// Reader page variants the overlay knows how to instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostProfile {
    /// Exported HTML with every page present up front
    Static,
    /// Single-page reader that rebuilds its panel on each page turn
    Reader,
    /// OCR containers injected over arbitrary image sites
    Userscript,
}

/// How regions reach the visibility sensor for a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryMode {
    Snapshot,
    Readiness,
    Continuous,
}

impl HostProfile {
    /// Detect a reader page from its markup.
    ///
    /// The userscript variant cannot be detected and must be chosen explicitly.
    pub fn detect(markup: &str) -> Option<Self> {
        let is_reader_export =
            markup.contains("Mokuro</span>") || markup.contains("| mokuro</title>");
        if !is_reader_export {
            return None;
        }

        if markup.contains("svelte") {
            Some(HostProfile::Reader)
        } else {
            Some(HostProfile::Static)
        }
    }

    pub fn discovery_mode(self) -> DiscoveryMode {
        match self {
            HostProfile::Static => DiscoveryMode::Snapshot,
            HostProfile::Reader => DiscoveryMode::Readiness,
            HostProfile::Userscript => DiscoveryMode::Continuous,
        }
    }
}
