//! Cancellation tokens tied to a screen or operation lifetime.
//!
//! The original applied in-flight completions even after the user navigated
//! away. Here every long-running operation takes a `CancelToken`; a
//! completion that observes a cancelled token is discarded rather than
//! applied.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag. Clones observe the same flag, so the screen
/// keeps one clone and hands another to the operation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
