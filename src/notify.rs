//! User-facing error notification.
//!
//! Uncaught errors are forwarded once, without blocking the pipeline and
//! without automatic retry. Hosts route them to a toast or similar surface.

use std::sync::{Arc, Mutex};

use crate::error::{LockResultExt, OverlayError};

/// Notification channel for errors that must reach the user.
pub trait Notifier {
    fn notify(&self, error: &OverlayError);
}

/// Forwards notifications to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, error: &OverlayError) {
        if error.is_recoverable() {
            log::warn!(target: "parse_overlay::notify", "{}", error);
        } else {
            log::error!(target: "parse_overlay::notify", "{}", error);
        }
    }
}

/// Keeps the rendered messages; handy for hosts that show them later.
#[derive(Debug, Clone, Default)]
pub struct CollectingNotifier {
    messages: Arc<Mutex<Vec<String>>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .recover_poison("CollectingNotifier::messages")
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }
}

impl Notifier for CollectingNotifier {
    fn notify(&self, error: &OverlayError) {
        if let Ok(mut messages) = self
            .messages
            .lock()
            .recover_poison("CollectingNotifier::notify")
        {
            messages.push(error.to_string());
        }
    }
}
