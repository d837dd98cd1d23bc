use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{OverlayError, OverlayResult};
use crate::host::Tint;
use crate::text::{Normalizer, Replacement};

/// Readiness polling policy for readers that rebuild their panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReadinessSettings {
    /// Delay between readiness probes, in milliseconds
    pub retry_delay_ms: u64,
    /// Retries per navigation signal before giving up
    pub max_retry_count: u32,
}

impl ReadinessSettings {
    pub const DEFAULT_RETRY_DELAY_MS: u64 = 100;
    pub const DEFAULT_MAX_RETRY_COUNT: u32 = 10;

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for ReadinessSettings {
    fn default() -> Self {
        Self {
            retry_delay_ms: Self::DEFAULT_RETRY_DELAY_MS,
            max_retry_count: Self::DEFAULT_MAX_RETRY_COUNT,
        }
    }
}

/// Colours hosts use for the per-region markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TintSettings {
    pub in_flight: String,
    pub cancelled: String,
}

impl Default for TintSettings {
    fn default() -> Self {
        Self {
            in_flight: "rgba(255, 0, 0, 0.3)".to_string(),
            cancelled: "rgba(0, 255, 0, 0.3)".to_string(),
        }
    }
}

impl TintSettings {
    /// Colour for a marker; `None` clears the marker.
    pub fn colour(&self, tint: Tint) -> Option<&str> {
        match tint {
            Tint::Neutral => None,
            Tint::InFlight => Some(&self.in_flight),
            Tint::Cancelled => Some(&self.cancelled),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OverlaySettings {
    pub readiness: ReadinessSettings,
    /// Replaces the built-in substitution table when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalization: Option<Vec<Replacement>>,
    pub tint: TintSettings,
}

impl OverlaySettings {
    pub fn normalizer(&self) -> Normalizer {
        match &self.normalization {
            Some(rules) => Normalizer::new(rules.clone()),
            None => Normalizer::default(),
        }
    }

    /// Reject values that would make the overlay spin or never start.
    pub fn validate(&self) -> OverlayResult<()> {
        if self.readiness.retry_delay_ms == 0 {
            return Err(OverlayError::config(
                "readiness.retryDelayMs must be greater than zero",
            ));
        }
        if let Some(rules) = &self.normalization {
            if rules.iter().any(|rule| rule.from.is_empty()) {
                return Err(OverlayError::config(
                    "normalization rules must have a non-empty `from`",
                ));
            }
        }
        Ok(())
    }
}
