//! Profile-driven overlay startup.

use crate::analysis::AnalysisChannel;
use crate::config::OverlaySettings;
use crate::discovery::{RegionDiscovery, ShapePredicate};
use crate::error::{OverlayError, OverlayResult};
use crate::host::{DiscoveryMode, HostProfile, OCR_CONTAINER_CLASS, PanelHost, RegionHost};
use crate::notify::Notifier;
use crate::visibility::ViewportObserver;

use super::{Overlay, OverlayHandle};

const LOG_TARGET: &str = "parse_overlay::bootstrap";

/// Build and start an overlay for `profile`.
///
/// Any setup failure is reported through `notifier` once and the page is left
/// uninstrumented: `None` is returned and nothing else happens for this load.
pub fn launch<H, O, A, N>(
    profile: HostProfile,
    settings: &OverlaySettings,
    host: H,
    observer: O,
    analysis: A,
    notifier: N,
) -> Option<(Overlay<H, O, A, N>, OverlayHandle)>
where
    H: RegionHost + PanelHost,
    O: ViewportObserver,
    A: AnalysisChannel,
    N: Notifier,
{
    let mode = profile.discovery_mode();
    let discovery = match prepare(mode, settings, &host) {
        Ok(discovery) => discovery,
        Err(err) => {
            log::error!(target: LOG_TARGET, "Not instrumenting {:?} page: {}", profile, err);
            notifier.notify(&err);
            return None;
        }
    };

    let (mut overlay, handle) =
        Overlay::new(settings, host, observer, analysis, notifier, discovery);
    if let Err(err) = overlay.start(mode == DiscoveryMode::Readiness) {
        let err = OverlayError::setup(err.to_string());
        log::error!(target: LOG_TARGET, "Not instrumenting {:?} page: {}", profile, err);
        overlay.notifier.notify(&err);
        return None;
    }

    log::info!(target: LOG_TARGET, "Overlay started for {:?} page", profile);
    Some((overlay, handle))
}

fn prepare(
    mode: DiscoveryMode,
    settings: &OverlaySettings,
    host: &impl RegionHost,
) -> OverlayResult<Option<RegionDiscovery>> {
    settings
        .validate()
        .map_err(|err| OverlayError::setup(err.to_string()))?;

    match mode {
        DiscoveryMode::Snapshot => RegionDiscovery::snapshot(host)
            .map(Some)
            .map_err(|err| OverlayError::setup(format!("cannot enumerate regions: {}", err))),
        DiscoveryMode::Readiness => Ok(None),
        DiscoveryMode::Continuous => Ok(Some(RegionDiscovery::continuous(
            ShapePredicate::has_class(OCR_CONTAINER_CLASS),
        ))),
    }
}
