//! Cooperative cancellation for in-flight renders

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Abort flag shared between a queued request and the engine rasterizing it.
///
/// The engine is expected to poll [`CancelToken::is_cancelled`] at safe points
/// and return early; the worker never interrupts a render on its own. Clones
/// observe the same state.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
