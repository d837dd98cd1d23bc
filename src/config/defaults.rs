//! Default configuration values for parse-overlay.
//!
//! This module provides the fully populated settings used by `config init`
//! to generate a configuration template.

use super::settings::{OverlaySettings, ReadinessSettings, TintSettings};
use crate::text::normalize::default_replacements;

/// Returns the default settings with every section spelled out.
pub fn default_settings() -> OverlaySettings {
    OverlaySettings {
        readiness: ReadinessSettings::default(),
        normalization: Some(default_replacements()),
        tint: TintSettings::default(),
    }
}

/// Default settings rendered as a TOML template.
pub fn default_settings_toml() -> Result<String, toml::ser::Error> {
    toml::to_string_pretty(&default_settings())
}
