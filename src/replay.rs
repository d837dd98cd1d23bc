//! Scripted replay of a page session against the in-memory host.
//!
//! A trace describes the page (profile, regions, reader panel) and a list of
//! host callbacks to feed the overlay. The driver runs the real event loop
//! with [`DelayedAnalysis`] and reports what every region ended up as.
//!
//! ```json
//! {
//!   "profile": "static",
//!   "latencyMs": 20,
//!   "regions": [{ "id": 1, "blocks": [["．．．test", { "text": "漢字", "ruby": true }]] }],
//!   "steps": [{ "visible": [1] }, { "waitMs": 50 }]
//! }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{Instant, timeout_at};

use crate::analysis::DelayedAnalysis;
use crate::config::OverlaySettings;
use crate::discovery::AddedNode;
use crate::error::OverlayResult;
use crate::host::{HostProfile, Tint};
use crate::memory::{MemoryHost, MemoryViewport};
use crate::notify::CollectingNotifier;
use crate::overlay::launch;
use crate::readiness::NavigationSignal;
use crate::region::{NodeId, RegionId};
use crate::text::TextNode;
use crate::visibility::IntersectionEntry;

const LOG_TARGET: &str = "parse_overlay::replay";

fn default_latency_ms() -> u64 {
    50
}

/// Recorded page session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trace {
    pub profile: HostProfile,
    /// Latency of the simulated analysis service
    #[serde(default = "default_latency_ms")]
    pub latency_ms: u64,
    #[serde(default)]
    pub regions: Vec<RegionSpec>,
    /// Page shown in the reader panel at load time
    #[serde(default)]
    pub panel: Option<PanelSpec>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSpec {
    pub id: RegionId,
    #[serde(default)]
    pub blocks: Vec<Vec<NodeSpec>>,
}

/// Text node of a region, either plain text or text with flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeSpec {
    Plain(String),
    Annotated {
        text: String,
        #[serde(default)]
        ruby: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelSpec {
    pub source: RegionId,
    pub fingerprint: String,
}

/// Region created at runtime, with the classes of its container node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationSpec {
    #[serde(flatten)]
    pub region: RegionSpec,
    #[serde(default)]
    pub classes: Vec<String>,
}

/// One host callback, or a pause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Step {
    /// Regions scrolled into view
    Visible(Vec<RegionId>),
    /// Regions scrolled out of view
    Hidden(Vec<RegionId>),
    /// Regions added to the render tree
    Mutate(Vec<MutationSpec>),
    /// Reader is about to rebuild its panel
    Navigate(NavigationSignal),
    /// Reader finished rendering a page
    ShowPage(PanelSpec),
    /// Reader panel torn down
    HidePanel,
    /// Let timers and settlements run
    WaitMs(u64),
}

/// Final state of one region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionReport {
    pub id: RegionId,
    pub text: Vec<Vec<String>>,
    pub tints: Vec<Tint>,
    /// Marker colour of each tint change; `None` clears the marker
    pub markers: Vec<Option<String>>,
    pub retired: bool,
}

/// Outcome of a replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    /// Whether the overlay instrumented the page at all
    pub started: bool,
    pub regions: Vec<RegionReport>,
    pub panel_clone: Option<RegionId>,
    pub notifications: Vec<String>,
}

pub fn parse_trace(contents: &str) -> OverlayResult<Trace> {
    Ok(serde_json::from_str(contents)?)
}

fn to_nodes(region: RegionId, blocks: &[Vec<NodeSpec>]) -> Vec<Vec<TextNode>> {
    let mut next = region.0 * 1000;
    blocks
        .iter()
        .map(|block| {
            block
                .iter()
                .map(|spec| {
                    next += 1;
                    match spec {
                        NodeSpec::Plain(text) => TextNode::new(NodeId(next), text.clone()),
                        NodeSpec::Annotated { text, ruby } => TextNode {
                            node: NodeId(next),
                            text: text.clone(),
                            ruby: *ruby,
                        },
                    }
                })
                .collect()
        })
        .collect()
}

/// Replay `trace` and report the final state of every region.
pub async fn replay(trace: &Trace, settings: &OverlaySettings) -> ReplayReport {
    let host = MemoryHost::new();
    for spec in &trace.regions {
        host.add_region_nodes(spec.id, to_nodes(spec.id, &spec.blocks));
    }
    if let Some(panel) = &trace.panel {
        host.point_panel_at(panel.source, &panel.fingerprint);
    }

    let notifier = CollectingNotifier::new();
    let analysis = DelayedAnalysis::new(Duration::from_millis(trace.latency_ms));
    let Some((mut overlay, handle)) = launch(
        trace.profile,
        settings,
        host.clone(),
        MemoryViewport::new(),
        analysis,
        notifier.clone(),
    ) else {
        return ReplayReport {
            started: false,
            regions: Vec::new(),
            panel_clone: None,
            notifications: notifier.messages(),
        };
    };

    for (index, step) in trace.steps.iter().enumerate() {
        log::debug!(target: LOG_TARGET, "Step {}: {:?}", index, step);
        match step {
            Step::Visible(regions) => {
                handle.report_intersections(
                    regions.iter().copied().map(IntersectionEntry::visible).collect(),
                );
            }
            Step::Hidden(regions) => {
                handle.report_intersections(
                    regions.iter().copied().map(IntersectionEntry::hidden).collect(),
                );
            }
            Step::Mutate(mutations) => {
                let added = mutations
                    .iter()
                    .map(|mutation| {
                        let id = mutation.region.id;
                        host.add_region_nodes(id, to_nodes(id, &mutation.region.blocks));
                        AddedNode {
                            region: id,
                            classes: mutation.classes.clone(),
                            children: Vec::new(),
                        }
                    })
                    .collect();
                handle.report_mutations(added);
            }
            Step::Navigate(signal) => {
                handle.navigate(*signal);
            }
            Step::ShowPage(panel) => host.point_panel_at(panel.source, &panel.fingerprint),
            Step::HidePanel => host.hide_panel(),
            Step::WaitMs(ms) => {
                overlay.pump();
                let until = Instant::now() + Duration::from_millis(*ms);
                while let Ok(true) = timeout_at(until, overlay.step()).await {}
                tokio::time::sleep_until(until).await;
            }
        }
        overlay.pump();
    }

    handle.shutdown();
    drop(handle);
    let overlay = overlay.run().await;

    let regions = host
        .regions()
        .into_iter()
        .map(|id| {
            let tints = host.tints(id);
            let markers = tints
                .iter()
                .map(|tint| settings.tint.colour(*tint).map(str::to_string))
                .collect();
            RegionReport {
                id,
                text: host.region_text(id),
                tints,
                markers,
                retired: overlay.scheduler().arena().is_retired(id),
            }
        })
        .collect();

    ReplayReport {
        started: true,
        regions,
        panel_clone: host.panel_clone(),
        notifications: notifier.messages(),
    }
}
