pub mod analysis;
pub mod config;
pub mod discovery;
pub mod error;
pub mod host;
pub mod memory;
pub mod notify;
pub mod overlay;
pub mod readiness;
pub mod region;
pub mod registry;
pub mod replay;
pub mod scheduler;
pub mod text;
pub mod visibility;

pub use analysis::{AnalysisChannel, BatchId, CancelHandle, DelayedAnalysis, ParseBatch, Settlement};
pub use config::OverlaySettings;
pub use error::{AnalysisError, OverlayError, OverlayResult, ReadinessFailure};
pub use host::{HostProfile, PanelHost, PanelProbe, RegionHost, Tint};
pub use notify::{LogNotifier, Notifier};
pub use overlay::{Overlay, OverlayEvent, OverlayHandle, launch};
pub use region::{NodeId, RegionId};
pub use visibility::{IntersectionEntry, ViewportObserver};
