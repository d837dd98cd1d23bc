//! End-to-end region lifecycle through the overlay event loop.

mod helpers;

use helpers::{Fixture, ManualAnalysis};
use parse_overlay::analysis::{AnalysisChannel, ParseBatch, Settlement};
use parse_overlay::config::OverlaySettings;
use parse_overlay::discovery::{AddedNode, RegionDiscovery, ShapePredicate};
use parse_overlay::error::AnalysisError;
use parse_overlay::host::{OCR_CONTAINER_CLASS, Tint};
use parse_overlay::memory::{MemoryHost, MemoryViewport};
use parse_overlay::notify::CollectingNotifier;
use parse_overlay::overlay::Overlay;
use parse_overlay::region::RegionId;
use parse_overlay::visibility::IntersectionEntry;

const R1: RegionId = RegionId(1);
const R2: RegionId = RegionId(2);

fn two_block_page() -> MemoryHost {
    let host = MemoryHost::new();
    host.add_region(R1, &[&["吹き出し一"], &["吹き出し二"]]);
    host
}

#[tokio::test(start_paused = true)]
async fn enter_leave_then_succeed_cleans_up_once() {
    let mut f = Fixture::with_snapshot(two_block_page());

    f.handle.report_intersections(vec![IntersectionEntry::visible(R1)]);
    f.settle().await;
    let batches = f.analysis.batches();
    assert_eq!(batches.len(), 2);
    assert_eq!(f.analysis.calls(), 1);
    assert_eq!(f.host.last_tint(R1), Some(Tint::InFlight));

    f.handle.report_intersections(vec![IntersectionEntry::hidden(R1)]);
    f.settle().await;
    assert!(batches.iter().all(ParseBatch::is_aborted));
    assert_eq!(f.host.last_tint(R1), Some(Tint::Cancelled));
    assert_eq!(f.overlay.pending_regions(), vec![R1]);

    // The channel finishes anyway
    assert_eq!(f.analysis.settle_all_ok(), 2);
    f.settle().await;

    assert!(f.overlay.pending_regions().is_empty());
    assert_eq!(
        f.host.tints(R1),
        vec![Tint::InFlight, Tint::Cancelled, Tint::Neutral]
    );
    assert!(!f.overlay.sensor().is_observed(R1));
    assert!(f.viewport.observed().is_empty());
    assert!(f.overlay.scheduler().arena().is_retired(R1));
    assert!(f.notifier.messages().is_empty());
}

#[tokio::test(start_paused = true)]
async fn reentering_pending_region_sends_nothing_new() {
    let mut f = Fixture::with_snapshot(two_block_page());

    f.handle.report_intersections(vec![IntersectionEntry::visible(R1)]);
    f.handle.report_intersections(vec![IntersectionEntry::hidden(R1)]);
    f.handle.report_intersections(vec![IntersectionEntry::visible(R1)]);
    f.handle.report_intersections(vec![IntersectionEntry::hidden(R1)]);
    f.settle().await;

    assert_eq!(f.analysis.batches().len(), 2);
    assert_eq!(f.overlay.scheduler().registry().len(), 1);
    assert_eq!(f.overlay.scheduler().registry().batches(R1).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn mixed_outcomes_still_clean_up_exactly_once() {
    let mut f = Fixture::with_snapshot(two_block_page());
    f.handle.report_intersections(vec![IntersectionEntry::visible(R1)]);
    f.settle().await;
    let batches = f.analysis.batches();

    f.analysis
        .settle(batches[0].id, Err(AnalysisError::rejected("too long")));
    f.settle().await;
    assert_eq!(f.overlay.pending_regions(), vec![R1]);
    assert_eq!(f.host.last_tint(R1), Some(Tint::InFlight));

    f.analysis.settle(batches[1].id, Ok(()));
    f.settle().await;

    let neutral = f
        .host
        .tints(R1)
        .into_iter()
        .filter(|tint| *tint == Tint::Neutral)
        .count();
    assert_eq!(neutral, 1);
    assert!(f.overlay.pending_regions().is_empty());
    // Rejections are expected; nothing reaches the user
    assert!(f.notifier.messages().is_empty());
}

#[tokio::test(start_paused = true)]
async fn fatal_outcome_is_reported_and_region_still_cleaned_up() {
    let host = MemoryHost::new();
    host.add_region(R1, &[&["テキスト"]]);
    let mut f = Fixture::with_snapshot(host);
    f.handle.report_intersections(vec![IntersectionEntry::visible(R1)]);
    f.settle().await;

    let batch = f.analysis.batches()[0].id;
    f.analysis
        .settle(batch, Err(AnalysisError::fatal("service crashed")));
    f.settle().await;

    assert_eq!(f.host.last_tint(R1), Some(Tint::Neutral));
    assert_eq!(f.notifier.messages().len(), 1);
    assert!(f.notifier.messages()[0].contains("service crashed"));
}

#[tokio::test(start_paused = true)]
async fn region_without_text_is_never_observed_again() {
    let host = MemoryHost::new();
    host.add_region(R1, &[]);
    host.add_region(R2, &[&["文字"]]);
    let mut f = Fixture::with_snapshot(host);
    assert_eq!(f.viewport.observed(), vec![R1, R2]);

    f.handle
        .report_intersections(vec![IntersectionEntry::visible(R1), IntersectionEntry::visible(R2)]);
    f.settle().await;

    assert_eq!(f.analysis.batches().len(), 1);
    assert_eq!(f.analysis.batches()[0].region, R2);
    assert_eq!(f.viewport.observed(), vec![R2]);
    assert!(f.host.tints(R1).is_empty());

    // Explicit re-observation of a retired region is ignored
    f.handle.observe(vec![R1]);
    f.settle().await;
    assert_eq!(f.viewport.observed(), vec![R2]);
}

#[tokio::test(start_paused = true)]
async fn normalized_text_is_written_back_and_batched() {
    let host = MemoryHost::new();
    host.add_region(R1, &[&["．．．test", "！？"]]);
    let mut f = Fixture::with_snapshot(host);

    f.handle.report_intersections(vec![IntersectionEntry::visible(R1)]);
    f.settle().await;

    let batches = f.analysis.batches();
    let batch = &batches[0];
    assert_eq!(batch.text, "…test⁉");
    assert_eq!(batch.fragments[0].length, 5);
    assert_eq!(batch.fragments[1].start, 5);
    assert_eq!(batch.fragments[1].end, 6);
    assert_eq!(f.host.region_text(R1), vec![vec!["…test", "⁉"]]);
}

#[tokio::test(start_paused = true)]
async fn one_request_per_notification_cycle() {
    let host = two_block_page();
    host.add_region(R2, &[&["三"]]);
    let mut f = Fixture::with_snapshot(host);

    f.handle
        .report_intersections(vec![IntersectionEntry::visible(R1), IntersectionEntry::visible(R2)]);
    f.settle().await;

    assert_eq!(f.analysis.calls(), 1);
    assert_eq!(f.analysis.batches().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn continuous_discovery_observes_nested_containers() {
    let host = MemoryHost::new();
    host.add_region(RegionId(7), &[&["追加"]]);
    let discovery = RegionDiscovery::continuous(ShapePredicate::has_class(OCR_CONTAINER_CLASS));
    let mut f = Fixture::build(host, Some(discovery));
    f.overlay.start(false).unwrap();
    assert!(f.viewport.observed().is_empty());

    let wrapper = AddedNode::new(RegionId(6), &["page"])
        .with_children(vec![AddedNode::new(RegionId(7), &[OCR_CONTAINER_CLASS])]);
    f.handle.report_mutations(vec![wrapper]);
    f.settle().await;
    assert_eq!(f.viewport.observed(), vec![RegionId(7)]);

    f.handle
        .report_intersections(vec![IntersectionEntry::visible(RegionId(7))]);
    f.settle().await;
    assert_eq!(f.analysis.batches()[0].text, "追加");
}

/// Channel that only hands back a settlement for the first batch.
struct LossyAnalysis;

impl AnalysisChannel for LossyAnalysis {
    fn request_parse(&mut self, batches: Vec<ParseBatch>) -> Vec<Settlement> {
        batches
            .into_iter()
            .take(1)
            .map(|_| Box::pin(async { Ok::<(), AnalysisError>(()) }) as Settlement)
            .collect()
    }
}

#[tokio::test(start_paused = true)]
async fn missing_settlements_count_as_failed() {
    let host = two_block_page();
    let discovery = RegionDiscovery::snapshot(&host).unwrap();
    let (mut overlay, handle) = Overlay::new(
        &OverlaySettings::default(),
        host.clone(),
        MemoryViewport::new(),
        LossyAnalysis,
        CollectingNotifier::new(),
        Some(discovery),
    );
    overlay.start(false).unwrap();

    handle.report_intersections(vec![IntersectionEntry::visible(R1)]);
    handle.shutdown();
    let overlay = overlay.run().await;

    assert!(overlay.pending_regions().is_empty());
    assert_eq!(host.last_tint(R1), Some(Tint::Neutral));
}

async fn explode() -> Result<(), AnalysisError> {
    panic!("analysis blew up")
}

/// Channel whose settlements panic.
struct PanickingAnalysis;

impl AnalysisChannel for PanickingAnalysis {
    fn request_parse(&mut self, batches: Vec<ParseBatch>) -> Vec<Settlement> {
        batches
            .into_iter()
            .map(|_| Box::pin(explode()) as Settlement)
            .collect()
    }
}

#[tokio::test(start_paused = true)]
async fn panicking_settlement_is_fatal_but_contained() {
    let host = MemoryHost::new();
    host.add_region(R1, &[&["a"]]);
    let notifier = CollectingNotifier::new();
    let discovery = RegionDiscovery::snapshot(&host).unwrap();
    let (mut overlay, handle) = Overlay::new(
        &OverlaySettings::default(),
        host.clone(),
        MemoryViewport::new(),
        PanickingAnalysis,
        notifier.clone(),
        Some(discovery),
    );
    overlay.start(false).unwrap();

    handle.report_intersections(vec![IntersectionEntry::visible(R1)]);
    handle.shutdown();
    let overlay = overlay.run().await;

    assert!(overlay.pending_regions().is_empty());
    assert_eq!(overlay.inflight_count(), 0);
    assert_eq!(host.last_tint(R1), Some(Tint::Neutral));
    assert_eq!(notifier.messages().len(), 1);
    assert!(notifier.messages()[0].contains("panicked"));
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_and_waits_for_settlements() {
    let mut f = Fixture::with_snapshot(two_block_page());
    f.handle.report_intersections(vec![IntersectionEntry::visible(R1)]);
    f.settle().await;
    let analysis: ManualAnalysis = f.analysis.clone();

    f.handle.shutdown();
    f.overlay.pump();
    assert!(analysis.batches().iter().all(ParseBatch::is_aborted));
    assert_eq!(f.overlay.inflight_count(), 2);

    analysis.settle_all_ok();
    let overlay = f.overlay.run().await;
    assert!(overlay.pending_regions().is_empty());
    assert_eq!(f.host.last_tint(R1), Some(Tint::Neutral));

    // The loop is gone; handles report it
    assert!(!f.handle.observe(vec![R2]));
}
