//! Error handling types for parse-overlay
//!
//! This module provides error types used throughout the overlay pipeline.

use std::sync::PoisonError;
use thiserror::Error;

use crate::region::RegionId;

/// Comprehensive error type for overlay operations
#[derive(Debug, Error)]
pub enum OverlayError {
    /// Configuration error
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// Configuration file could not be parsed
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Replay trace could not be parsed
    #[error("Failed to parse trace: {0}")]
    Trace(#[from] serde_json::Error),

    /// Pipeline setup failed; the overlay stays inert for this page load
    #[error("Setup failed: {message}")]
    Setup { message: String },

    /// The render tree did not behave as the host adapter expected
    #[error("Host error: {message}")]
    Host { message: String },

    /// A region was registered while it already had outstanding batches
    #[error("Region {region} already has pending batches")]
    AlreadyPending { region: RegionId },

    /// Unexpected failure reported by the analysis channel
    #[error("Analysis failed: {0}")]
    Analysis(#[from] AnalysisError),

    /// The readiness detector gave up waiting for new content
    #[error("Reader content did not become ready: {0}")]
    Readiness(#[from] ReadinessFailure),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for overlay operations
pub type OverlayResult<T> = Result<T, OverlayError>;

/// Settlement failure of a single parse batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    /// The batch was cancelled before the channel finished it
    #[error("batch aborted")]
    Aborted,

    /// The channel rejected or failed the batch; siblings are unaffected
    #[error("batch rejected: {message}")]
    Rejected { message: String },

    /// Unexpected failure that must reach the user
    #[error("fatal analysis failure: {message}")]
    Fatal { message: String },
}

impl AnalysisError {
    pub fn rejected(message: impl Into<String>) -> Self {
        AnalysisError::Rejected {
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        AnalysisError::Fatal {
            message: message.into(),
        }
    }

    /// Whether this failure propagates to the notification channel.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AnalysisError::Fatal { .. })
    }
}

/// Why a readiness probe did not accept the current render tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReadinessFailure {
    #[error("reader panel not found")]
    AnchorMissing,

    #[error("reader pages not found")]
    ChildrenMissing,

    #[error("page content did not change")]
    FingerprintUnchanged,
}

/// Helper trait to convert PoisonError to OverlayError
pub trait LockResultExt<T> {
    /// Convert a PoisonError to OverlayError with recovery and logging.
    ///
    /// The context parameter identifies which operation triggered lock recovery.
    fn recover_poison(self, context: &str) -> Result<T, OverlayError>;
}

impl<T> LockResultExt<T> for Result<T, PoisonError<T>> {
    fn recover_poison(self, context: &str) -> Result<T, OverlayError> {
        match self {
            Ok(guard) => Ok(guard),
            Err(poisoned) => {
                log::warn!(
                    target: "parse_overlay::lock_recovery",
                    "Recovered from poisoned lock in {}",
                    context
                );
                Ok(poisoned.into_inner())
            }
        }
    }
}

/// Helper functions for common error patterns
impl OverlayError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        OverlayError::Config {
            message: message.into(),
        }
    }

    /// Create a setup error
    pub fn setup(message: impl Into<String>) -> Self {
        OverlayError::Setup {
            message: message.into(),
        }
    }

    /// Create a host error
    pub fn host(message: impl Into<String>) -> Self {
        OverlayError::Host {
            message: message.into(),
        }
    }

    /// Whether the pipeline can keep running after reporting this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, OverlayError::Readiness(_))
    }
}
