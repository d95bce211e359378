//! Cancellation handle

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancel flag for the in-flight user turn.
///
/// Cloned into signal handlers; the loop checks it at every suspension
/// point (channel receives, between tool calls).
#[derive(Clone, Debug, Default)]
pub struct AgentControl {
    cancelled: Arc<AtomicBool>,
}

impl AgentControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clear a consumed cancel so the next turn can run
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}
