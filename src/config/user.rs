//! User configuration loading for parse-overlay.
//!
//! User config location: $XDG_CONFIG_HOME/parse-overlay/parse-overlay.toml
//! Fallback: the platform config directory (`dirs::config_dir()`).

use std::path::{Path, PathBuf};

use super::settings::OverlaySettings;
use crate::error::OverlayResult;

const APP_DIR: &str = "parse-overlay";
const CONFIG_FILE: &str = "parse-overlay.toml";

/// Returns the path to the user configuration file.
///
/// The path is determined by:
/// 1. If $XDG_CONFIG_HOME is set: $XDG_CONFIG_HOME/parse-overlay/parse-overlay.toml
/// 2. Otherwise: <platform config dir>/parse-overlay/parse-overlay.toml
///
/// Returns None if no config directory can be determined.
pub fn user_config_path() -> Option<PathBuf> {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg_config.is_empty() {
            return Some(PathBuf::from(xdg_config).join(APP_DIR).join(CONFIG_FILE));
        }
    }

    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

/// Parse settings from TOML text and validate them.
pub fn parse_settings(contents: &str) -> OverlayResult<OverlaySettings> {
    let settings: OverlaySettings = toml::from_str(contents)?;
    settings.validate()?;
    Ok(settings)
}

/// Load settings from a file.
pub fn load_settings(path: &Path) -> OverlayResult<OverlaySettings> {
    let contents = std::fs::read_to_string(path)?;
    parse_settings(&contents)
}

/// Load the user configuration if the file exists.
pub fn load_user_config() -> OverlayResult<Option<OverlaySettings>> {
    let Some(path) = user_config_path() else {
        return Ok(None);
    };
    if !path.exists() {
        return Ok(None);
    }

    log::debug!(
        target: "parse_overlay::config",
        "Loading user config from {}",
        path.display()
    );
    load_settings(&path).map(Some)
}
