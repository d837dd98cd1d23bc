pub mod defaults;
pub mod settings;
pub mod user;

pub use settings::{OverlaySettings, ReadinessSettings, TintSettings};
pub use user::{load_settings, load_user_config, parse_settings, user_config_path};

use std::path::Path;

use crate::error::OverlayResult;

/// Resolve the effective settings.
///
/// An explicit path wins and must exist; otherwise the user config is used
/// when present, and built-in defaults when not.
pub fn resolve_settings(explicit: Option<&Path>) -> OverlayResult<OverlaySettings> {
    if let Some(path) = explicit {
        return load_settings(path);
    }
    Ok(load_user_config()?.unwrap_or_default())
}
